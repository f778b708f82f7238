//! Pluggable value transforms.
//!
//! Two kinds of transforms exist:
//!
//! - **Custom transforms** are addressed explicitly by a `<name:token>` string
//!   in a definition, e.g. `"<env:ADMIN_EMAIL>"` or `"<ref:users/admin>"`.
//! - **Field transforms** are registered per entity type and attribute name
//!   and post-process the attribute bag before the entity is created, e.g.
//!   splitting `name` into `firstName`/`lastName`.

mod builtin;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::ImporterConfig;
use crate::entity::EntityRef;
use crate::error::{FixtureError, FixtureResult};
use crate::identifier::FixtureId;
use crate::importer::{FixtureImporter, ImportFrame};
use crate::value::{Attributes, FieldValue};

pub use builtin::{
	DefaultValueTransform, EnvTransform, FnFieldTransform, FnTransform, ObjTransform, RefTransform,
	SplitNameTransform,
};

/// Context handed to transforms.
///
/// Gives access to the fixture being imported and lets transforms import
/// other fixtures through the same cycle guard attribute references use.
pub struct TransformContext<'a> {
	pub(crate) importer: &'a FixtureImporter,
	pub(crate) frame: &'a Arc<ImportFrame>,
}

impl<'a> TransformContext<'a> {
	pub(crate) fn new(importer: &'a FixtureImporter, frame: &'a Arc<ImportFrame>) -> Self {
		Self { importer, frame }
	}

	/// Fixture being imported.
	pub fn fixture_id(&self) -> Option<&FixtureId> {
		self.frame.fixture()
	}

	/// Entity type being imported.
	pub fn entity_type(&self) -> Option<&str> {
		self.frame.entity_type()
	}

	/// Raw definition of the fixture being imported.
	pub fn definition(&self) -> Option<&Value> {
		self.frame.definition()
	}

	/// Importer configuration.
	pub fn config(&self) -> &ImporterConfig {
		self.importer.config()
	}

	/// Imports `id` and returns a value suitable for a reference attribute.
	///
	/// A single fixture yields a reference, or a placeholder when importing it
	/// now would close a cycle. A base yields a map of name to reference.
	pub async fn reference(&self, id: &str) -> FixtureResult<FieldValue> {
		self.importer.reference_value(id, self.frame).await
	}

	/// Imports a single fixture and returns the entity.
	///
	/// # Errors
	///
	/// Returns [`FixtureError::TransformError`] when the fixture is part of a
	/// cycle with the fixture being imported and therefore cannot exist yet.
	pub async fn entity(&self, id: &str) -> FixtureResult<EntityRef> {
		self.importer.entity_for_transform(id, self.frame).await
	}
}

/// Transform invoked by `<name:token>` values.
#[async_trait]
pub trait CustomTransform: Send + Sync {
	/// Computes the attribute value for `token`.
	async fn apply(&self, token: &str, ctx: &TransformContext<'_>) -> FixtureResult<FieldValue>;
}

/// Transform post-processing the attribute bag of one entity type.
#[async_trait]
pub trait FieldTransform: Send + Sync {
	/// Mutates `attributes` in place.
	async fn apply(
		&self,
		attributes: &mut Attributes,
		ctx: &TransformContext<'_>,
	) -> FixtureResult<()>;
}

/// Lookup table of custom and field transforms.
///
/// # Example
///
/// ```
/// # use reinhardt_fixtures::transforms::{SplitNameTransform, TransformRegistry};
/// let registry = TransformRegistry::with_defaults()
///     .with_field_transform("User", "name", SplitNameTransform::new("name"));
/// assert!(registry.has_custom("env"));
/// assert!(registry.has_field_transform("User", "name"));
/// ```
#[derive(Clone, Default)]
pub struct TransformRegistry {
	custom: HashMap<String, Arc<dyn CustomTransform>>,
	fields: HashMap<String, Vec<(String, Arc<dyn FieldTransform>)>>,
}

impl TransformRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a registry with the built-in `env`, `ref` and `obj` transforms.
	pub fn with_defaults() -> Self {
		let mut registry = Self::new();
		registry.register_custom("env", EnvTransform);
		registry.register_custom("ref", RefTransform);
		registry.register_custom("obj", ObjTransform);
		registry
	}

	/// Registers a custom transform, replacing any previous one of that name.
	pub fn register_custom(
		&mut self,
		name: impl Into<String>,
		transform: impl CustomTransform + 'static,
	) {
		self.custom.insert(name.into(), Arc::new(transform));
	}

	/// Builder variant of [`TransformRegistry::register_custom`].
	pub fn with_custom(
		mut self,
		name: impl Into<String>,
		transform: impl CustomTransform + 'static,
	) -> Self {
		self.register_custom(name, transform);
		self
	}

	/// Registers a field transform for `entity_type`.
	///
	/// `field` marks the attribute the transform consumes, so definitions
	/// may use it even though the schema does not describe it.
	pub fn register_field_transform(
		&mut self,
		entity_type: impl Into<String>,
		field: impl Into<String>,
		transform: impl FieldTransform + 'static,
	) {
		self.fields
			.entry(entity_type.into())
			.or_default()
			.push((field.into(), Arc::new(transform)));
	}

	/// Builder variant of [`TransformRegistry::register_field_transform`].
	pub fn with_field_transform(
		mut self,
		entity_type: impl Into<String>,
		field: impl Into<String>,
		transform: impl FieldTransform + 'static,
	) -> Self {
		self.register_field_transform(entity_type, field, transform);
		self
	}

	/// Returns true if a custom transform is registered under `name`.
	pub fn has_custom(&self, name: &str) -> bool {
		self.custom.contains_key(name)
	}

	/// Returns the custom transform registered under `name`.
	///
	/// # Errors
	///
	/// Returns [`FixtureError::UnregisteredTransform`] if there is none.
	pub fn custom(&self, name: &str) -> FixtureResult<Arc<dyn CustomTransform>> {
		self.custom
			.get(name)
			.cloned()
			.ok_or_else(|| FixtureError::UnregisteredTransform(name.to_string()))
	}

	/// Returns true if a field transform consumes `field` on `entity_type`.
	pub fn has_field_transform(&self, entity_type: &str, field: &str) -> bool {
		self.fields
			.get(entity_type)
			.is_some_and(|transforms| transforms.iter().any(|(name, _)| name == field))
	}

	/// Field transforms of `entity_type`, in registration order.
	pub fn field_transforms(&self, entity_type: &str) -> Vec<Arc<dyn FieldTransform>> {
		self.fields
			.get(entity_type)
			.map(|transforms| {
				transforms
					.iter()
					.map(|(_, transform)| Arc::clone(transform))
					.collect()
			})
			.unwrap_or_default()
	}
}

impl fmt::Debug for TransformRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut custom: Vec<_> = self.custom.keys().collect();
		custom.sort();
		f.debug_struct("TransformRegistry")
			.field("custom", &custom)
			.field("fields", &self.fields.keys().collect::<Vec<_>>())
			.finish()
	}
}
