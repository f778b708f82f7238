//! Where fixture definitions come from.
//!
//! A [`DefinitionSource`] lists fixture bases and names, reads raw
//! definitions and resolves files stored next to them. Two implementations
//! ship with the crate: [`FileSystemSource`] for on-disk fixture trees and
//! [`MemorySource`] for programmatic catalogs.

mod filesystem;
mod format;
mod generator;
mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FixtureResult;
use crate::identifier::FixtureId;

pub use filesystem::FileSystemSource;
pub use format::DefinitionFormat;
pub(crate) use generator::FixtureIdGenerator;
pub use generator::{FnGenerator, Generated, GeneratorHelpers, GeneratorModule};
pub use memory::MemorySource;

/// A raw definition as read from a source.
#[derive(Clone)]
pub enum Definition {
	/// Attribute mapping of a single fixture.
	Static(Value),
	/// Module producing every fixture of a base in one batch.
	Generated(Arc<dyn GeneratorModule>),
}

impl fmt::Debug for Definition {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
			Self::Generated(_) => f.write_str("Generated(..)"),
		}
	}
}

/// Provider of raw fixture definitions.
#[async_trait]
pub trait DefinitionSource: Send + Sync {
	/// Lists every fixture base.
	async fn list_bases(&self) -> FixtureResult<Vec<String>>;

	/// Lists the static fixture names under `base`.
	async fn list_names(&self, base: &str) -> FixtureResult<Vec<String>>;

	/// Reads a definition.
	///
	/// A base-only identifier yields the generator module of that base, if
	/// any. A full identifier yields its static definition, if any.
	async fn read_definition(&self, id: &FixtureId) -> FixtureResult<Option<Definition>>;

	/// Resolves `path` relative to the fixture directory of `fixture`, then
	/// relative to its base directory. Returns a key usable with
	/// [`DefinitionSource::read_file`].
	async fn resolve_file(&self, fixture: &FixtureId, path: &str) -> FixtureResult<Option<String>>;

	/// Reads a file previously resolved with [`DefinitionSource::resolve_file`].
	async fn read_file(&self, resolved: &str) -> FixtureResult<Vec<u8>>;
}

/// Candidate file locations for `path` relative to `fixture`, most specific first.
pub(crate) fn file_candidates(fixture: &FixtureId, path: &str) -> Vec<String> {
	let mut candidates = Vec::with_capacity(2);
	if let Some(name) = fixture.name() {
		candidates.push(format!("{}/{}/{}", fixture.base(), name, path));
	}
	candidates.push(format!("{}/{}", fixture.base(), path));
	candidates
}
