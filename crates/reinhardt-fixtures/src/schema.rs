//! Entity type metadata driving attribute transforms.
//!
//! The importer asks a [`SchemaIntrospector`] which entity type lives under a
//! fixture base and what kind each attribute path is. [`SchemaRegistry`] is
//! the in-process implementation, filled with [`EntitySchema`] builders.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;

/// Where a reference field points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefTarget {
	/// Fixtures under a fixed base (e.g. `users`).
	Base(String),
	/// Entity type named by another top-level attribute of the same definition.
	FromAttribute(String),
}

/// Kind of an attribute path on an entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
	/// Points at another entity.
	Reference(RefTarget),
	/// Free text; file tokens are inlined as their content.
	Text,
	/// Raw bytes; file tokens are read as a buffer.
	Binary,
	/// Any other known value.
	Scalar,
	/// Prefix of known nested paths.
	Object,
	/// Not described by the schema.
	Unknown,
}

impl FieldKind {
	/// Returns true for reference fields.
	pub fn is_reference(&self) -> bool {
		matches!(self, Self::Reference(_))
	}
}

/// Path of an attribute inside a (possibly nested) definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
	/// Path of a top-level attribute.
	pub fn root(field: impl Into<String>) -> Self {
		Self(vec![field.into()])
	}

	/// Path of a nested key.
	pub fn child(&self, key: impl Into<String>) -> Self {
		let mut segments = self.0.clone();
		segments.push(key.into());
		Self(segments)
	}

	/// Path of a list element.
	pub fn child_index(&self, index: usize) -> Self {
		self.child(index.to_string())
	}

	/// Top-level attribute this path starts at.
	pub fn first(&self) -> Option<&str> {
		self.0.first().map(String::as_str)
	}

	/// Returns true for top-level attributes.
	pub fn is_top_level(&self) -> bool {
		self.0.len() == 1
	}

	/// Dotted key used for schema lookups; list indices are dropped.
	pub fn schema_key(&self) -> String {
		self.0
			.iter()
			.filter(|segment| !segment.chars().all(|c| c.is_ascii_digit()))
			.map(String::as_str)
			.collect::<Vec<_>>()
			.join(".")
	}
}

impl fmt::Display for FieldPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0.join("."))
	}
}

/// Schema metadata provider.
pub trait SchemaIntrospector: Send + Sync {
	/// Entity type stored under a fixture base, if any.
	fn entity_type(&self, base: &str) -> Option<String>;

	/// Fixture base holding fixtures of `entity_type`, if any.
	fn base_for(&self, entity_type: &str) -> Option<String>;

	/// Kind of `path` on `entity_type`.
	fn field_kind(&self, entity_type: &str, path: &FieldPath) -> FieldKind;
}

/// Field metadata of one entity type.
#[derive(Debug, Clone)]
pub struct EntitySchema {
	name: String,
	base: String,
	fields: IndexMap<String, FieldKind>,
}

impl EntitySchema {
	/// Creates a schema for entity type `name` stored under fixture base `base`.
	///
	/// # Example
	///
	/// ```
	/// # use reinhardt_fixtures::{EntitySchema, FieldKind, FieldPath, SchemaIntrospector, SchemaRegistry};
	/// let registry = SchemaRegistry::new().with(
	///     EntitySchema::new("Product", "products")
	///         .text("name")
	///         .reference("shop", "shops"),
	/// );
	/// assert!(registry.field_kind("Product", &FieldPath::root("shop")).is_reference());
	/// assert_eq!(registry.field_kind("Product", &FieldPath::root("foo")), FieldKind::Unknown);
	/// ```
	pub fn new(name: impl Into<String>, base: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			base: base.into(),
			fields: IndexMap::new(),
		}
	}

	/// Adds a field of any kind. Nested paths use dots (`address.city`).
	pub fn field(mut self, path: impl Into<String>, kind: FieldKind) -> Self {
		self.fields.insert(path.into(), kind);
		self
	}

	/// Adds a text field.
	pub fn text(self, path: impl Into<String>) -> Self {
		self.field(path, FieldKind::Text)
	}

	/// Adds a scalar field.
	pub fn scalar(self, path: impl Into<String>) -> Self {
		self.field(path, FieldKind::Scalar)
	}

	/// Adds a binary field.
	pub fn binary(self, path: impl Into<String>) -> Self {
		self.field(path, FieldKind::Binary)
	}

	/// Adds a reference to fixtures under `base`.
	pub fn reference(self, path: impl Into<String>, base: impl Into<String>) -> Self {
		self.field(path, FieldKind::Reference(RefTarget::Base(base.into())))
	}

	/// Adds a reference whose entity type is read from `type_attribute`.
	pub fn dynamic_reference(
		self,
		path: impl Into<String>,
		type_attribute: impl Into<String>,
	) -> Self {
		self.field(
			path,
			FieldKind::Reference(RefTarget::FromAttribute(type_attribute.into())),
		)
	}

	/// Entity type name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Fixture base.
	pub fn base(&self) -> &str {
		&self.base
	}

	fn kind(&self, key: &str) -> FieldKind {
		if let Some(kind) = self.fields.get(key) {
			return kind.clone();
		}
		let prefix = format!("{}.", key);
		if self.fields.keys().any(|field| field.starts_with(&prefix)) {
			FieldKind::Object
		} else {
			FieldKind::Unknown
		}
	}
}

/// In-process [`SchemaIntrospector`].
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
	schemas: HashMap<String, EntitySchema>,
	bases: HashMap<String, String>,
}

impl SchemaRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers an entity schema, replacing any previous one of the same name.
	pub fn register(&mut self, schema: EntitySchema) {
		self.bases
			.insert(schema.base.clone(), schema.name.clone());
		self.schemas.insert(schema.name.clone(), schema);
	}

	/// Builder variant of [`SchemaRegistry::register`].
	pub fn with(mut self, schema: EntitySchema) -> Self {
		self.register(schema);
		self
	}

	/// Returns the schema of an entity type.
	pub fn get(&self, entity_type: &str) -> Option<&EntitySchema> {
		self.schemas.get(entity_type)
	}

	/// Number of registered entity types.
	pub fn len(&self) -> usize {
		self.schemas.len()
	}

	/// Returns true if nothing is registered.
	pub fn is_empty(&self) -> bool {
		self.schemas.is_empty()
	}
}

impl SchemaIntrospector for SchemaRegistry {
	fn entity_type(&self, base: &str) -> Option<String> {
		self.bases.get(base).cloned()
	}

	fn base_for(&self, entity_type: &str) -> Option<String> {
		self.schemas
			.get(entity_type)
			.map(|schema| schema.base.clone())
	}

	fn field_kind(&self, entity_type: &str, path: &FieldPath) -> FieldKind {
		self.schemas
			.get(entity_type)
			.map(|schema| schema.kind(&path.schema_key()))
			.unwrap_or(FieldKind::Unknown)
	}
}
