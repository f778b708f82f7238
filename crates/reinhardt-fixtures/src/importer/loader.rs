//! Definition lookup with per-run caching.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;

use super::guard::WaitGraph;
use super::memo::AsyncMemo;
use crate::error::{FixtureError, FixtureResult};
use crate::identifier::FixtureId;
use crate::schema::SchemaIntrospector;
use crate::source::{
	Definition, DefinitionSource, FixtureIdGenerator, GeneratorHelpers, GeneratorModule,
};

type Loaded = Arc<IndexMap<String, Value>>;

/// Resolves identifiers to raw definitions.
///
/// Static definitions are read once per identifier. Generator modules are
/// invoked once per base and their output is shared by every lookup under
/// that base. A module awaiting another base's output is recorded in a wait
/// graph so that modules loading each other fail instead of hanging.
pub(crate) struct DefinitionLoader {
	source: Arc<dyn DefinitionSource>,
	schema: Arc<dyn SchemaIntrospector>,
	definitions: AsyncMemo<Arc<Value>>,
	modules: AsyncMemo<Option<Arc<dyn GeneratorModule>>>,
	generated: AsyncMemo<Loaded>,
	waits: WaitGraph,
	ids: Mutex<HashMap<String, Arc<FixtureIdGenerator>>>,
}

impl DefinitionLoader {
	pub(crate) fn new(source: Arc<dyn DefinitionSource>, schema: Arc<dyn SchemaIntrospector>) -> Self {
		Self {
			source,
			schema,
			definitions: AsyncMemo::new(),
			modules: AsyncMemo::new(),
			generated: AsyncMemo::new(),
			waits: WaitGraph::default(),
			ids: Mutex::new(HashMap::new()),
		}
	}

	pub(crate) fn source(&self) -> &Arc<dyn DefinitionSource> {
		&self.source
	}

	/// Bases that map to a known entity type.
	pub(crate) async fn bases(&self) -> FixtureResult<Vec<String>> {
		let bases = self.source.list_bases().await?;
		Ok(bases
			.into_iter()
			.filter(|base| {
				let known = self.schema.entity_type(base).is_some();
				if !known {
					tracing::debug!("Skipping fixture directory without entity type: {}", base);
				}
				known
			})
			.collect())
	}

	/// Fixture names under `base`, generated or static.
	pub(crate) async fn names(&self, base: &str) -> FixtureResult<Vec<String>> {
		match self.generated(base, &[]).await? {
			Some(loaded) => Ok(loaded.keys().cloned().collect()),
			None => self.source.list_names(base).await,
		}
	}

	pub(crate) fn entity_type(&self, base: &str) -> FixtureResult<String> {
		self.schema
			.entity_type(base)
			.ok_or_else(|| FixtureError::UnknownEntityType(base.to_string()))
	}

	async fn module(&self, base: &str) -> FixtureResult<Option<Arc<dyn GeneratorModule>>> {
		self.modules
			.get_or_try_init(base, || async {
				match self.source.read_definition(&FixtureId::of_base(base)).await? {
					Some(Definition::Generated(module)) => Ok(Some(module)),
					_ => {
						tracing::debug!("No generated module found for {}", base);
						Ok(None)
					}
				}
			})
			.await
	}

	/// Returns true if `base` is produced by a generator module.
	pub(crate) async fn is_generated(&self, base: &str) -> FixtureResult<bool> {
		Ok(self.module(base).await?.is_some())
	}

	fn id_generator(&self, base: &str) -> FixtureResult<Arc<FixtureIdGenerator>> {
		let entity_type = self.entity_type(base)?;
		Ok(Arc::clone(
			self.ids
				.lock()
				.entry(base.to_string())
				.or_insert_with(|| Arc::new(FixtureIdGenerator::new(&entity_type))),
		))
	}

	/// Raw output of the generator module of `base`, or `None` for static bases.
	///
	/// `chain` lists the modules already generating on this call path.
	pub(crate) fn generated<'a>(
		&'a self,
		base: &'a str,
		chain: &'a [String],
	) -> BoxFuture<'a, FixtureResult<Option<Loaded>>> {
		async move {
			let Some(module) = self.module(base).await? else {
				return Ok(None);
			};
			if let Some(loaded) = self.generated.get(base) {
				return Ok(Some(loaded));
			}
			if chain.iter().any(|generating| generating == base) {
				return Err(FixtureError::GeneratorError(format!(
					"Generator module {} requested its own definitions ({} -> {})",
					base,
					chain.join(" -> "),
					base
				)));
			}
			let _wait = match chain.last() {
				Some(requester) => Some(self.waits.enter(requester, base).map_err(|cycle| {
					FixtureError::GeneratorError(format!(
						"Generator modules load each other's definitions ({})",
						cycle.join(" -> ")
					))
				})?),
				None => None,
			};
			let loaded = self
				.generated
				.get_or_try_init(base, || async {
					tracing::debug!("Loading generated module {}", base);
					let ids = self.id_generator(base)?;
					let mut nested = chain.to_vec();
					nested.push(base.to_string());
					let helpers = GeneratorHelpers {
						loader: self,
						base,
						ids: &ids,
						chain: &nested,
					};
					let output = module.generate(&helpers).await?;
					Ok(Arc::new(output.into_named(&ids)))
				})
				.await?;
			Ok(Some(loaded))
		}
		.boxed()
	}

	/// Static definition of a single fixture.
	pub(crate) async fn definition(&self, id: &FixtureId) -> FixtureResult<Arc<Value>> {
		self.definitions
			.get_or_try_init(&id.to_string(), || async {
				match self.source.read_definition(id).await? {
					Some(Definition::Static(value)) => Ok(Arc::new(value)),
					_ => Err(FixtureError::DefinitionNotFound(id.to_string())),
				}
			})
			.await
	}

	/// Raw definitions for a generator's `load_definitions` helper.
	pub(crate) async fn raw_definitions(
		&self,
		id: &FixtureId,
		chain: &[String],
	) -> FixtureResult<IndexMap<String, Value>> {
		if id.is_root() {
			return Err(FixtureError::InvalidIdentifier(
				"definitions must be loaded per base".to_string(),
			));
		}
		if let Some(loaded) = self.generated(id.base(), chain).await? {
			return match id.name() {
				Some(name) => loaded
					.get(name)
					.map(|value| IndexMap::from([(name.to_string(), value.clone())]))
					.ok_or_else(|| FixtureError::DefinitionNotFound(id.to_string())),
				None => Ok((*loaded).clone()),
			};
		}
		let names = match id.name() {
			Some(name) => vec![name.to_string()],
			None => self.source.list_names(id.base()).await?,
		};
		let mut definitions = IndexMap::with_capacity(names.len());
		for name in names {
			let value = self.definition(&id.join(name.clone())).await?;
			definitions.insert(name, (*value).clone());
		}
		Ok(definitions)
	}

	/// Node awaited when importing `id`: the batch for generated bases.
	pub(crate) async fn wait_node(&self, id: &FixtureId) -> FixtureResult<String> {
		if self.is_generated(id.base()).await? {
			Ok(id.base().to_string())
		} else {
			Ok(id.to_string())
		}
	}

	pub(crate) fn clear(&self) {
		self.definitions.clear();
		self.modules.clear();
		self.generated.clear();
		self.waits.clear();
		self.ids.lock().clear();
	}
}
