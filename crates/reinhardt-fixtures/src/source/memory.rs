use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;

use super::{Definition, DefinitionSource, GeneratorModule, file_candidates};
use crate::error::{FixtureError, FixtureResult};
use crate::identifier::FixtureId;

/// [`DefinitionSource`] backed by in-memory definitions.
///
/// # Example
///
/// ```
/// # use reinhardt_fixtures::MemorySource;
/// # use serde_json::json;
/// let source = MemorySource::new()
///     .with_definition("shops", "demo", json!({"name": "Demo"}))
///     .with_definition("products", "p1", json!({"name": "P1", "shop": "shops/demo"}));
/// # let _ = source;
/// ```
#[derive(Default)]
pub struct MemorySource {
	definitions: IndexMap<String, IndexMap<String, Value>>,
	generators: HashMap<String, Arc<dyn GeneratorModule>>,
	files: HashMap<String, Vec<u8>>,
}

impl MemorySource {
	/// Creates an empty source.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a static definition.
	pub fn with_definition(
		mut self,
		base: impl Into<String>,
		name: impl Into<String>,
		definition: Value,
	) -> Self {
		self.definitions
			.entry(base.into())
			.or_default()
			.insert(name.into(), definition);
		self
	}

	/// Registers the generator module of `base`.
	pub fn with_generator(
		mut self,
		base: impl Into<String>,
		module: impl GeneratorModule + 'static,
	) -> Self {
		self.generators.insert(base.into(), Arc::new(module));
		self
	}

	/// Adds a file at `path` (e.g. `users/admin/avatar.png`).
	pub fn with_file(mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
		self.files.insert(path.into(), content.into());
		self
	}
}

#[async_trait]
impl DefinitionSource for MemorySource {
	async fn list_bases(&self) -> FixtureResult<Vec<String>> {
		let bases: BTreeSet<String> = self
			.definitions
			.keys()
			.chain(self.generators.keys())
			.cloned()
			.collect();
		Ok(bases.into_iter().collect())
	}

	async fn list_names(&self, base: &str) -> FixtureResult<Vec<String>> {
		Ok(self
			.definitions
			.get(base)
			.map(|names| names.keys().cloned().collect())
			.unwrap_or_default())
	}

	async fn read_definition(&self, id: &FixtureId) -> FixtureResult<Option<Definition>> {
		let Some(name) = id.name() else {
			return Ok(self
				.generators
				.get(id.base())
				.map(|module| Definition::Generated(Arc::clone(module))));
		};
		Ok(self
			.definitions
			.get(id.base())
			.and_then(|names| names.get(name))
			.map(|value| Definition::Static(value.clone())))
	}

	async fn resolve_file(&self, fixture: &FixtureId, path: &str) -> FixtureResult<Option<String>> {
		Ok(file_candidates(fixture, path)
			.into_iter()
			.find(|candidate| self.files.contains_key(candidate)))
	}

	async fn read_file(&self, resolved: &str) -> FixtureResult<Vec<u8>> {
		self.files
			.get(resolved)
			.cloned()
			.ok_or_else(|| FixtureError::FileNotFound(resolved.to_string()))
	}
}
