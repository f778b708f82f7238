//! Shared schemas and importer builders.

#![allow(dead_code)]

use std::sync::Arc;

use reinhardt_fixtures::{
	DefinitionSource, EntitySchema, FixtureImporter, MemoryStore, SchemaRegistry,
};
use rstest::fixture;

/// Schema of the demo catalog used across the integration tests.
pub fn demo_schema() -> SchemaRegistry {
	SchemaRegistry::new()
		.with(
			EntitySchema::new("User", "users")
				.text("name")
				.text("email")
				.text("bio")
				.reference("avatar", "uploads")
				.reference("company", "companies")
				.reference("friend", "users")
				.binary("key"),
		)
		.with(
			EntitySchema::new("Company", "companies")
				.text("name")
				.reference("owner", "users")
				.reference("members", "users"),
		)
		.with(EntitySchema::new("Shop", "shops").text("name").reference("featured", "products"))
		.with(
			EntitySchema::new("Product", "products")
				.text("name")
				.reference("shop", "shops")
				.reference("color", "colors"),
		)
		.with(EntitySchema::new("Widget", "widgets").text("name"))
		.with(
			EntitySchema::new("Node", "nodes")
				.text("label")
				.reference("ref", "nodes"),
		)
		.with(EntitySchema::new("Color", "colors").text("name"))
}

#[fixture]
pub fn schema() -> SchemaRegistry {
	demo_schema()
}

#[fixture]
pub fn store() -> Arc<MemoryStore> {
	Arc::new(MemoryStore::new())
}

/// Importer over `source` writing into `store`.
pub fn importer_for(
	source: impl DefinitionSource + 'static,
	store: &Arc<MemoryStore>,
	schema: SchemaRegistry,
) -> FixtureImporter {
	FixtureImporter::new(Arc::new(source), store.clone(), Arc::new(schema))
}
