//! Integration test suite for opm
//!
//! End-to-end tests that run the `opm` binary against a catalog on the local
//! filesystem. They never reach the network.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **install**: installing raw and archived builds, idempotence, batches
//! - **remove**: removal and its failure modes
//! - **upgrade**: catalog refresh followed by upgrades
//! - **list**: status listing and filters
//! - **download**: fetching libraries without installing
//! - **commands**: show, info, validate, adopt, reset, list-opcodes

#[path = "../common/mod.rs"]
mod common;

mod commands;
mod download;
mod install;
mod list;
mod remove;
mod upgrade;
