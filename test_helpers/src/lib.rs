//! Test helpers shared across crates.
//!
//! This crate provides temporary manifest fixtures and `figment::Jail`
//! plumbing for settings tests.

pub mod figment;
pub mod manifest;
