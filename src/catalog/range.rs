//! Host-version ranges attached to catalog binaries.
//!
//! A range is a half-open interval `[lower, upper)` over [`HostVersion`]s. Both
//! bounds are optional; a range with neither is "always satisfied" and is the
//! only kind an unknown host satisfies.
//!
//! Accepted text (whitespace ignored, missing components default to zero):
//!
//! | text              | interval                  |
//! |-------------------|---------------------------|
//! | `>=6.14`          | `[6.14.0, inf)`           |
//! | `<7`              | `[0, 7.0.0)`              |
//! | `>=6.14<7.0`      | `[6.14.0, 7.0.0)`         |
//! | `>=6.14,<7.0`     | `[6.14.0, 7.0.0)`         |
//! | `>6.14.0`         | `[6.14.1, inf)`           |
//! | `<=6.18`          | `[0, 6.18.1)`             |
//! | `==6.18.0`        | `[6.18.0, 6.18.1)`        |
//! | empty or `*`      | unbounded                 |

use crate::platform::HostVersion;
use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VersionRange {
    /// Inclusive lower bound
    pub lower: Option<HostVersion>,
    /// Exclusive upper bound
    pub upper: Option<HostVersion>,
}

impl VersionRange {
    /// The range every host (including an unknown one) satisfies.
    #[must_use]
    pub const fn any() -> Self {
        Self {
            lower: None,
            upper: None,
        }
    }

    #[must_use]
    pub const fn between(lower: Option<HostVersion>, upper: Option<HostVersion>) -> Self {
        Self { lower, upper }
    }

    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }

    /// Whether `host` falls inside the range.
    ///
    /// An unknown host only satisfies the unbounded range.
    #[must_use]
    pub fn satisfied_by(&self, host: Option<HostVersion>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some(host) = host else {
            return false;
        };
        self.lower.is_none_or(|l| host >= l) && self.upper.is_none_or(|u| host < u)
    }

    /// Whether every version in `self` is also in `other`.
    #[must_use]
    pub fn is_within(&self, other: &Self) -> bool {
        let lower_ok = match (self.lower, other.lower) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(a), Some(b)) => a >= b,
        };
        let upper_ok = match (self.upper, other.upper) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(a), Some(b)) => a <= b,
        };
        lower_ok && upper_ok
    }

    /// Whether some host version satisfies both ranges.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        let lower = match (self.lower, other.lower) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let upper = match (self.upper, other.upper) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        match (lower, upper) {
            (Some(l), Some(u)) => l < u,
            _ => true,
        }
    }

    /// Parses the textual forms listed in the module docs.
    ///
    /// Returns a human readable reason on failure; callers wrap it in a
    /// catalog format error naming the plugin.
    pub fn parse(text: &str) -> Result<Self, String> {
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() || compact == "*" {
            return Ok(Self::any());
        }

        if let Some(rest) = compact.strip_prefix("==") {
            let exact = parse_bound(rest, text)?;
            return Ok(Self::between(Some(exact), Some(bump_patch(exact, text)?)));
        }

        let mut range = Self::any();
        let mut rest = compact.as_str();
        while !rest.is_empty() {
            rest = rest.trim_start_matches(',');
            if rest.is_empty() {
                break;
            }
            let (op, after_op) = split_operator(rest)
                .ok_or_else(|| format!("invalid version range '{text}': expected >=, >, <= or <"))?;
            let end = after_op.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(after_op.len());
            let version = parse_bound(&after_op[..end], text)?;
            rest = &after_op[end..];

            match op {
                ">=" | ">" => {
                    if range.lower.is_some() {
                        return Err(format!("invalid version range '{text}': two lower bounds"));
                    }
                    range.lower =
                        Some(if op == ">" { bump_patch(version, text)? } else { version });
                }
                _ => {
                    if range.upper.is_some() {
                        return Err(format!("invalid version range '{text}': two upper bounds"));
                    }
                    range.upper =
                        Some(if op == "<=" { bump_patch(version, text)? } else { version });
                }
            }
        }

        if let (Some(l), Some(u)) = (range.lower, range.upper) {
            if l >= u {
                return Err(format!("invalid version range '{text}': no version satisfies it"));
            }
        }
        Ok(range)
    }
}

fn split_operator(s: &str) -> Option<(&'static str, &str)> {
    for op in [">=", "<=", ">", "<"] {
        if let Some(rest) = s.strip_prefix(op) {
            return Some((op, rest));
        }
    }
    None
}

fn parse_bound(version: &str, text: &str) -> Result<HostVersion, String> {
    HostVersion::parse(version)
        .ok_or_else(|| format!("invalid version range '{text}': bad version '{version}'"))
}

/// Smallest version above `v`, turning `>` and `<=` into half-open bounds.
fn bump_patch(v: HostVersion, text: &str) -> Result<HostVersion, String> {
    v.patch
        .checked_add(1)
        .map(|patch| HostVersion::new(v.major, v.minor, patch))
        .ok_or_else(|| format!("invalid version range '{text}': version out of range"))
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.lower, self.upper) {
            (None, None) => f.write_str("any"),
            (Some(l), None) => write!(f, ">={l}"),
            (None, Some(u)) => write!(f, "<{u}"),
            (Some(l), Some(u)) => write!(f, ">={l},<{u}"),
        }
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_unbounded() {
            serializer.serialize_none()
        } else {
            serializer.serialize_str(&self.to_string())
        }
    }
}
