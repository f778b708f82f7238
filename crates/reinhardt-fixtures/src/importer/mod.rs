//! The fixture importer.
//!
//! [`FixtureImporter`] is the session object of one import run. It walks
//! raw definitions, resolves symbolic references into persisted entities
//! and breaks reference cycles with placeholders that are patched once the
//! referenced entity exists.
//!
//! # Resolution
//!
//! Importing `products/p1` with `{"name": "P1", "shop": "demo"}` where
//! `shop` is a reference to `shops`:
//!
//! 1. every attribute is transformed; `shop` recursively imports `shops/demo`
//! 2. per-type field transforms run in registration order
//! 3. the entity is created through the [`PersistenceAdapter`]
//! 4. the entity is recorded and pending entities are patched
//!
//! When `shops/demo` in turn references `products/p1`, the nested import
//! sees `products/p1` in its call chain and stores a placeholder instead.
//! Once `products/p1` is created the placeholder is replaced and the shop
//! is updated.

mod catalog;
mod files;
mod guard;
mod loader;
mod memo;
mod placeholders;
mod stats;

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, try_join_all};
use serde_json::Value;

use crate::config::ImporterConfig;
use crate::entity::{Entity, EntityRef};
use crate::error::{FixtureError, FixtureResult};
use crate::identifier::{FixtureId, SEPARATOR};
use crate::schema::{FieldKind, FieldPath, RefTarget, SchemaIntrospector};
use crate::source::DefinitionSource;
use crate::store::PersistenceAdapter;
use crate::transforms::{TransformContext, TransformRegistry};
use crate::value::{Attributes, EntityKey, FieldValue, Placeholder, RawToken};

pub use catalog::{Catalog, FixtureSet, Imported};
pub(crate) use guard::ImportFrame;
pub(crate) use loader::DefinitionLoader;
pub use stats::ImportStats;

use files::FileImports;
use guard::WaitGraph;
use memo::{AsyncMemo, SeenSet};
use placeholders::{PlaceholderRegistry, Settled};
use stats::StatsRecorder;

/// What a guarded reference resolved to.
#[derive(Debug, Clone)]
pub(crate) enum Resolution {
	Entity(EntityRef),
	Placeholder(Placeholder),
}

impl From<Resolution> for FieldValue {
	fn from(resolution: Resolution) -> Self {
		match resolution {
			Resolution::Entity(entity) => FieldValue::Ref(entity.key().clone()),
			Resolution::Placeholder(placeholder) => FieldValue::Placeholder(placeholder),
		}
	}
}

/// Imports fixture graphs into a persistence adapter.
///
/// All caches, the resolution record and the pending set live in the
/// importer; call [`FixtureImporter::reset`] between independent runs or
/// create a fresh importer.
///
/// # Example
///
/// ```
/// # use std::sync::Arc;
/// # use reinhardt_fixtures::{EntitySchema, FixtureImporter, MemorySource, MemoryStore, SchemaRegistry};
/// # use serde_json::json;
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let source = MemorySource::new()
///     .with_definition("shops", "demo", json!({"name": "Demo"}))
///     .with_definition("products", "p1", json!({"name": "P1", "shop": "demo"}));
/// let schema = SchemaRegistry::new()
///     .with(EntitySchema::new("Shop", "shops").text("name"))
///     .with(EntitySchema::new("Product", "products").text("name").reference("shop", "shops"));
/// let store = Arc::new(MemoryStore::new());
///
/// let importer = FixtureImporter::new(Arc::new(source), store.clone(), Arc::new(schema));
/// let product = importer.import_one("products/p1").await.unwrap();
/// let shop = importer.import_one("shops/demo").await.unwrap();
///
/// assert_eq!(product.get("shop").unwrap().as_entity_key(), Some(shop.key()));
/// assert_eq!(store.len(), 2);
/// # }
/// ```
pub struct FixtureImporter {
	store: Arc<dyn PersistenceAdapter>,
	schema: Arc<dyn SchemaIntrospector>,
	transforms: TransformRegistry,
	config: ImporterConfig,
	loader: DefinitionLoader,
	documents: AsyncMemo<EntityRef>,
	batches: AsyncMemo<Arc<FixtureSet>>,
	files: FileImports,
	placeholders: PlaceholderRegistry,
	waits: WaitGraph,
	stats: StatsRecorder,
	bad_fields: SeenSet,
	circular: SeenSet,
}

impl FixtureImporter {
	/// Creates an importer with the default transforms and configuration.
	pub fn new(
		source: Arc<dyn DefinitionSource>,
		store: Arc<dyn PersistenceAdapter>,
		schema: Arc<dyn SchemaIntrospector>,
	) -> Self {
		Self {
			loader: DefinitionLoader::new(source, Arc::clone(&schema)),
			store,
			schema,
			transforms: TransformRegistry::with_defaults(),
			config: ImporterConfig::default(),
			documents: AsyncMemo::new(),
			batches: AsyncMemo::new(),
			files: FileImports::new(),
			placeholders: PlaceholderRegistry::default(),
			waits: WaitGraph::default(),
			stats: StatsRecorder::default(),
			bad_fields: SeenSet::default(),
			circular: SeenSet::default(),
		}
	}

	/// Replaces the transform registry.
	pub fn with_transforms(mut self, transforms: TransformRegistry) -> Self {
		self.transforms = transforms;
		self
	}

	/// Replaces the configuration.
	pub fn with_config(mut self, config: ImporterConfig) -> Self {
		self.config = config;
		self
	}

	/// Importer configuration.
	pub fn config(&self) -> &ImporterConfig {
		&self.config
	}

	/// Registered transforms.
	pub fn transforms(&self) -> &TransformRegistry {
		&self.transforms
	}

	/// Imports every fixture of every base with a known entity type.
	pub async fn import_all(&self) -> FixtureResult<Catalog> {
		match self.import(FixtureId::root()).await? {
			Imported::All(catalog) => Ok(catalog),
			_ => Err(FixtureError::InvalidIdentifier(String::new())),
		}
	}

	/// Imports every fixture under `base`.
	///
	/// # Errors
	///
	/// Returns [`FixtureError::InvalidIdentifier`] unless `base` is a bare base.
	pub async fn import_base(&self, base: &str) -> FixtureResult<FixtureSet> {
		let id = FixtureId::parse(base)?;
		if id.is_root() || id.is_fixture() {
			return Err(FixtureError::InvalidIdentifier(base.to_string()));
		}
		self.import(id)
			.await?
			.set()
			.ok_or_else(|| FixtureError::InvalidIdentifier(base.to_string()))
	}

	/// Imports a single fixture (`base/name`).
	///
	/// Calling this twice for the same identifier returns the same entity.
	pub async fn import_one(&self, id: &str) -> FixtureResult<EntityRef> {
		let parsed = FixtureId::parse(id)?;
		if !parsed.is_fixture() {
			return Err(FixtureError::InvalidIdentifier(id.to_string()));
		}
		self.import(parsed)
			.await?
			.entity()
			.ok_or_else(|| FixtureError::InvalidIdentifier(id.to_string()))
	}

	/// Imports whatever `id` addresses: the catalog, a base or one fixture.
	pub async fn import(&self, id: FixtureId) -> FixtureResult<Imported> {
		let imported = self.import_with_frame(id, None).await?;
		self.resolve_pending().await?;
		Ok(imported)
	}

	/// Full run: resets statistics, imports everything and logs a summary.
	pub async fn load_all(&self) -> FixtureResult<Catalog> {
		self.stats.reset();
		tracing::info!("Starting fixture import...");
		let catalog = self.import_all().await?;
		self.stats().log();
		Ok(catalog)
	}

	/// Runs [`load_all`](Self::load_all) unless the store reports it is
	/// already seeded. Returns `None` when the run was skipped.
	pub async fn load_unless_seeded(&self) -> FixtureResult<Option<Catalog>> {
		if self.store.is_seeded().await? {
			tracing::info!("Fixtures already loaded, skipping import");
			return Ok(None);
		}
		self.load_all().await.map(Some)
	}

	/// Clears every cache, the resolution record, the pending set and the
	/// statistics.
	pub fn reset(&self) {
		self.loader.clear();
		self.documents.clear();
		self.batches.clear();
		self.files.clear();
		self.placeholders.clear();
		self.waits.clear();
		self.stats.reset();
		self.bad_fields.clear();
		self.circular.clear();
	}

	/// Statistics of the current run.
	pub fn stats(&self) -> ImportStats {
		self.stats
			.snapshot(self.placeholders.issued(), self.placeholders.pending_len())
	}

	/// Entity created under a persisted key.
	pub fn entity(&self, key: &EntityKey) -> Option<EntityRef> {
		self.placeholders.entity_by_key(key)
	}

	/// Entity created for a fixture identifier, if it was imported.
	pub fn fixture(&self, id: &str) -> Option<EntityRef> {
		self.placeholders.entity(id)
	}

	/// Number of entities still holding unresolved placeholders.
	pub fn pending_count(&self) -> usize {
		self.placeholders.pending_len()
	}

	fn import_with_frame(
		&self,
		id: FixtureId,
		parent: Option<Arc<ImportFrame>>,
	) -> BoxFuture<'_, FixtureResult<Imported>> {
		async move {
			if id.is_root() {
				return self.import_root(parent).await.map(Imported::All);
			}
			if let Some(set) = self.generated_set(id.base(), &parent).await? {
				return match id.name() {
					Some(name) => set.get(name).cloned().map(Imported::One).ok_or_else(|| {
						tracing::debug!(
							"Could not import {} from generated directory {}",
							id,
							id.base()
						);
						FixtureError::DefinitionNotFound(id.to_string())
					}),
					None => Ok(Imported::Base(FixtureSet::clone(&set))),
				};
			}
			if id.is_fixture() {
				self.import_fixture(id, parent).await.map(Imported::One)
			} else {
				self.import_directory(id.base(), parent)
					.await
					.map(Imported::Base)
			}
		}
		.boxed()
	}

	async fn import_root(&self, parent: Option<Arc<ImportFrame>>) -> FixtureResult<Catalog> {
		let bases = self.loader.bases().await?;
		let sets = try_join_all(bases.iter().map(|base| {
			let parent = parent.clone();
			async move {
				let set = self
					.import_with_frame(FixtureId::of_base(base.clone()), parent)
					.await?
					.set()
					.unwrap_or_default();
				Ok::<_, FixtureError>((base.clone(), set))
			}
		}))
		.await?;

		let mut catalog = Catalog::default();
		for (base, set) in sets {
			catalog.insert(base, set);
		}
		Ok(catalog)
	}

	async fn import_directory(
		&self,
		base: &str,
		parent: Option<Arc<ImportFrame>>,
	) -> FixtureResult<FixtureSet> {
		let names = self.loader.names(base).await?;
		let entities = try_join_all(names.iter().map(|name| {
			self.import_fixture(FixtureId::new(base, name.clone()), parent.clone())
		}))
		.await?;
		Ok(names.into_iter().zip(entities).collect())
	}

	async fn import_fixture(
		&self,
		id: FixtureId,
		parent: Option<Arc<ImportFrame>>,
	) -> FixtureResult<EntityRef> {
		if let Some(entity) = self.documents.get(&id.to_string()) {
			return Ok(entity);
		}
		let definition = self.loader.definition(&id).await?;
		let entity_type = self.loader.entity_type(id.base())?;
		let frame = ImportFrame::document(id, entity_type, definition, None, parent);
		self.create_document(Arc::new(frame)).await
	}

	/// Imports the batch of a generated base once and returns its entities.
	async fn generated_set(
		&self,
		base: &str,
		parent: &Option<Arc<ImportFrame>>,
	) -> FixtureResult<Option<Arc<FixtureSet>>> {
		if !self.loader.is_generated(base).await? {
			return Ok(None);
		}
		let set = self
			.batches
			.get_or_try_init(base, || self.import_batch(base, parent.clone()))
			.await?;
		Ok(Some(set))
	}

	async fn import_batch(
		&self,
		base: &str,
		parent: Option<Arc<ImportFrame>>,
	) -> FixtureResult<Arc<FixtureSet>> {
		let loaded = self
			.loader
			.generated(base, &[])
			.await?
			.ok_or_else(|| FixtureError::GeneratorError(format!("No generated module for {}", base)))?;
		let entity_type = self.loader.entity_type(base)?;
		tracing::debug!("Importing generated module {} ({} fixtures)", base, loaded.len());
		self.stats.module(base);

		let entities = try_join_all(loaded.iter().map(|(name, definition)| {
			let frame = ImportFrame::document(
				FixtureId::new(base, name.clone()),
				entity_type.clone(),
				Arc::new(definition.clone()),
				Some(base.to_string()),
				parent.clone(),
			);
			self.create_document(Arc::new(frame))
		}))
		.await?;

		Ok(Arc::new(loaded.keys().cloned().zip(entities).collect()))
	}

	async fn create_document(&self, frame: Arc<ImportFrame>) -> FixtureResult<EntityRef> {
		let key = frame.key().to_string();
		self.documents
			.get_or_try_init(&key, move || self.build_document(frame))
			.await
	}

	async fn build_document(&self, frame: Arc<ImportFrame>) -> FixtureResult<EntityRef> {
		let key = frame.key();
		tracing::debug!("Importing: {}", key);

		let entity_type = frame
			.entity_type()
			.ok_or_else(|| FixtureError::UnknownEntityType(key.to_string()))?;
		let Some(Value::Object(raw)) = frame.definition() else {
			return Err(FixtureError::ParseError(format!(
				"Definition of {} is not a mapping",
				key
			)));
		};

		let values = try_join_all(
			raw.iter()
				.map(|(field, value)| self.transform_property(FieldPath::root(field.clone()), value, &frame)),
		)
		.await?;
		let mut attributes: Attributes = raw.keys().cloned().zip(values).collect();

		let ctx = TransformContext::new(self, &frame);
		for transform in self.transforms.field_transforms(entity_type) {
			transform.apply(&mut attributes, &ctx).await?;
		}

		let pk = self.store.create(entity_type, &attributes).await?;
		let entity = Arc::new(Entity::new(EntityKey::new(entity_type, pk), key, attributes));
		self.finish_entity(key, &entity).await?;

		tracing::debug!("Finished import: {}", key);
		self.stats.fixture(key);
		Ok(entity)
	}

	/// Records a created entity, queues it if it holds placeholders and
	/// patches whatever became resolvable.
	async fn finish_entity(&self, key: &str, entity: &EntityRef) -> FixtureResult<()> {
		self.placeholders.record(key, entity);
		if entity.has_placeholders() {
			self.placeholders.queue(key, entity);
		}
		self.resolve_pending().await
	}

	fn field_kind(&self, entity_type: &str, path: &FieldPath) -> FieldKind {
		match self.schema.field_kind(entity_type, path) {
			FieldKind::Unknown
				if path.is_top_level()
					&& path
						.first()
						.is_some_and(|field| self.transforms.has_field_transform(entity_type, field)) =>
			{
				FieldKind::Scalar
			}
			kind => kind,
		}
	}

	fn transform_property<'a>(
		&'a self,
		path: FieldPath,
		value: &'a Value,
		frame: &'a Arc<ImportFrame>,
	) -> BoxFuture<'a, FixtureResult<FieldValue>> {
		async move {
			let kind = self.field_kind(frame.entity_type().unwrap_or_default(), &path);
			let token = RawToken::classify(value);

			if kind == FieldKind::Unknown {
				if !token.is_container() {
					self.log_bad_field(frame, &path, value);
				}
				return Ok(FieldValue::from(value));
			}

			match token {
				RawToken::List(items) => {
					let values = try_join_all(
						items
							.iter()
							.enumerate()
							.map(|(index, item)| self.transform_property(path.child_index(index), item, frame)),
					)
					.await?;
					Ok(FieldValue::List(values))
				}
				RawToken::Map(map) => {
					let values = try_join_all(
						map.iter()
							.map(|(key, item)| self.transform_property(path.child(key.clone()), item, frame)),
					)
					.await?;
					Ok(FieldValue::Map(map.keys().cloned().zip(values).collect()))
				}
				RawToken::File(file) => self.transform_file(&kind, file, frame).await,
				RawToken::Custom { name, token } => {
					let transform = self.transforms.custom(name)?;
					let ctx = TransformContext::new(self, frame);
					transform.apply(token, &ctx).await
				}
				RawToken::Text(text) => match &kind {
					FieldKind::Reference(target) => {
						let id = self.reference_id(target, text, frame)?;
						Ok(self.resolve_reference(id, frame).await?.into())
					}
					_ => Ok(FieldValue::from(value)),
				},
				RawToken::Scalar(_) => Ok(FieldValue::from(value)),
			}
		}
		.boxed()
	}

	fn log_bad_field(&self, frame: &ImportFrame, path: &FieldPath, value: &Value) {
		if self
			.bad_fields
			.first(format!("{}{}{}", frame.key(), path, value))
		{
			tracing::warn!("Possible bad data in {} -> \"{}\": {}", frame.key(), path, value);
			self.stats.bad_field();
		}
	}

	fn log_circular(&self, chain: &str) {
		if self.circular.first(chain) {
			tracing::warn!("Circular reference detected: {}", chain);
			self.stats.circular(chain);
		}
	}

	/// Identifier named by a reference value: a bare name inside the
	/// target base, or a full `base/name`.
	fn reference_id(
		&self,
		target: &RefTarget,
		value: &str,
		frame: &ImportFrame,
	) -> FixtureResult<FixtureId> {
		if value.contains(SEPARATOR) {
			let id = FixtureId::parse(value)?;
			if !id.is_fixture() {
				return Err(FixtureError::InvalidIdentifier(value.to_string()));
			}
			return Ok(id);
		}
		let base = match target {
			RefTarget::Base(base) => base.clone(),
			RefTarget::FromAttribute(attribute) => {
				let entity_type = frame
					.definition()
					.and_then(|definition| definition.get(attribute))
					.and_then(Value::as_str)
					.ok_or_else(|| FixtureError::ValidationError {
						field: attribute.clone(),
						message: format!("{} must name the referenced entity type", frame.key()),
					})?;
				self.schema
					.base_for(entity_type)
					.ok_or_else(|| FixtureError::UnknownEntityType(entity_type.to_string()))?
			}
		};
		Ok(FixtureId::new(base, value))
	}

	/// Stable placeholder of `key`, or the entity if it already exists.
	fn placeholder(&self, key: &str) -> Resolution {
		match self.placeholders.entity(key) {
			Some(entity) => Resolution::Entity(entity),
			None => Resolution::Placeholder(self.placeholders.placeholder_for(key)),
		}
	}

	/// Imports `target` on behalf of `frame` unless that would close a cycle,
	/// in which case a placeholder stands in for it.
	async fn resolve_reference(
		&self,
		target: FixtureId,
		frame: &Arc<ImportFrame>,
	) -> FixtureResult<Resolution> {
		let key = target.to_string();
		if let Some(entity) = self.documents.get(&key) {
			return Ok(Resolution::Entity(entity));
		}
		if let Some(chain) = frame.cycle_to(&key) {
			self.log_circular(&chain);
			return Ok(self.placeholder(&key));
		}
		if frame.generated_context() == Some(target.base()) {
			tracing::debug!("Generated conflict in {}. Falling back to placeholder.", key);
			self.stats.generated_conflict();
			return Ok(self.placeholder(&key));
		}

		let node = self.loader.wait_node(&target).await?;
		let _wait = match self.waits.enter(frame.wait_node(), &node) {
			Ok(guard) => guard,
			Err(cycle) => {
				self.log_circular(&cycle.join(" -> "));
				return Ok(self.placeholder(&key));
			}
		};

		match self
			.import_with_frame(target, Some(Arc::clone(frame)))
			.await?
		{
			Imported::One(entity) => Ok(Resolution::Entity(entity)),
			_ => Err(FixtureError::InvalidIdentifier(key)),
		}
	}

	/// Value for [`TransformContext::reference`].
	pub(crate) async fn reference_value(
		&self,
		id: &str,
		frame: &Arc<ImportFrame>,
	) -> FixtureResult<FieldValue> {
		let id = FixtureId::parse(id)?;
		if id.is_root() {
			return Err(FixtureError::InvalidIdentifier(
				"cannot reference the whole catalog".to_string(),
			));
		}
		if id.is_fixture() {
			return Ok(self.resolve_reference(id, frame).await?.into());
		}
		let names = self.loader.names(id.base()).await?;
		let values = try_join_all(
			names
				.iter()
				.map(|name| self.resolve_reference(id.join(name.clone()), frame)),
		)
		.await?;
		Ok(FieldValue::Map(
			names
				.into_iter()
				.zip(values.into_iter().map(FieldValue::from))
				.collect(),
		))
	}

	/// Entity for [`TransformContext::entity`].
	pub(crate) async fn entity_for_transform(
		&self,
		id: &str,
		frame: &Arc<ImportFrame>,
	) -> FixtureResult<EntityRef> {
		let parsed = FixtureId::parse(id)?;
		if !parsed.is_fixture() {
			return Err(FixtureError::InvalidIdentifier(id.to_string()));
		}
		match self.resolve_reference(parsed, frame).await? {
			Resolution::Entity(entity) => Ok(entity),
			Resolution::Placeholder(_) => Err(FixtureError::transform(
				id,
				format!("circular reference from {} cannot be embedded", frame.key()),
			)),
		}
	}

	/// Deferred resolution pass: patches every pending entity whose
	/// placeholders have resolved and persists fully resolved ones.
	async fn resolve_pending(&self) -> FixtureResult<()> {
		let pending = self.placeholders.pending_snapshot();
		if pending.is_empty() {
			return Ok(());
		}
		let lookup = |placeholder: &Placeholder| self.placeholders.lookup(placeholder);
		try_join_all(pending.into_iter().map(|(key, entity)| async move {
			let (changed, remaining) = entity.patch_placeholders(&lookup);
			match self.placeholders.settle(&key, changed, remaining) {
				Settled::Ready { dirty: true } => {
					tracing::debug!("Resolved placeholders in {}", key);
					self.store.update(entity.key(), &entity.attributes()).await
				}
				Settled::Ready { dirty: false } | Settled::Unresolved | Settled::Skipped => Ok(()),
			}
		}))
		.await?;
		Ok(())
	}
}
