//! Cross-cutting utilities: atomic file operations, checksums and progress output.

pub mod checksum;
pub mod fs;
pub mod progress;

/// Closest candidate to `name` by Jaro-Winkler similarity, if any is close enough.
///
/// Used for "did you mean" hints on unknown plugin names.
pub fn closest_match<'a, I>(name: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let needle = name.to_ascii_lowercase();
    candidates
        .into_iter()
        .map(|c| (strsim::jaro_winkler(&needle, &c.to_ascii_lowercase()), c))
        .filter(|(score, _)| *score >= 0.8)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| c.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closest_match() {
        let names = ["poly", "klib", "else"];
        assert_eq!(closest_match("pol", names), Some("poly".to_string()));
        assert_eq!(closest_match("zzzzzz", names), None);
    }
}
