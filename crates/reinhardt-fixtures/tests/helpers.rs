//! Test helpers for reinhardt-fixtures integration tests.
//!
//! This module provides shared schemas, sources and importer builders.

#[path = "helpers/catalogs.rs"]
pub mod catalogs;
