//! Generator module tests.

mod helpers;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use helpers::catalogs::{importer_for, schema, store};
use reinhardt_fixtures::source::{FnGenerator, Generated, GeneratorHelpers, GeneratorModule};
use reinhardt_fixtures::{
	EntitySchema, FieldValue, FixtureError, FixtureResult, MemorySource, MemoryStore,
	SchemaRegistry,
};
use rstest::rstest;
use serde_json::json;

fn counted_nodes(calls: &Arc<AtomicUsize>) -> impl GeneratorModule + 'static {
	let calls = Arc::clone(calls);
	FnGenerator::new(move |_| {
		calls.fetch_add(1, Ordering::SeqCst);
		Ok(Generated::named([
			("a", json!({"label": "A", "ref": "b"})),
			("b", json!({"label": "B", "ref": "a"})),
		]))
	})
}

#[rstest]
#[tokio::test]
async fn test_batch_self_reference_invokes_module_once(
	schema: SchemaRegistry,
	store: Arc<MemoryStore>,
) {
	let calls = Arc::new(AtomicUsize::new(0));
	let source = MemorySource::new().with_generator("nodes", counted_nodes(&calls));
	let importer = importer_for(source, &store, schema);

	let nodes = importer.import_base("nodes").await.unwrap();
	let a = importer.import_one("nodes/a").await.unwrap();
	let b = importer.import_one("nodes/b").await.unwrap();

	assert!(Arc::ptr_eq(&nodes["a"], &a));
	assert_eq!(a.get("ref").unwrap().as_entity_key(), Some(b.key()));
	assert_eq!(b.get("ref").unwrap().as_entity_key(), Some(a.key()));
	assert_eq!(calls.load(Ordering::SeqCst), 1);
	assert_eq!(store.count("Node"), 2);

	let stats = importer.stats();
	assert_eq!(stats.generated_modules, 1);
	assert_eq!(stats.modules, vec!["nodes"]);
	assert_eq!(stats.generated_conflicts, 1);
	assert_eq!(stats.circular_refs, 0);
	assert_eq!(stats.unresolved, 0);
}

#[rstest]
#[tokio::test]
async fn test_list_output_gets_generated_names(schema: SchemaRegistry, store: Arc<MemoryStore>) {
	let source = MemorySource::new()
		.with_generator(
			"colors",
			FnGenerator::new(|_| {
				Ok(Generated::List(vec![
					json!({"name": "Red"}),
					json!({"name": "Blue"}),
				]))
			}),
		)
		.with_definition("products", "p1", json!({"name": "P1", "color": "color-2"}));
	let importer = importer_for(source, &store, schema);

	let colors = importer.import_base("colors").await.unwrap();
	let product = importer.import_one("products/p1").await.unwrap();

	assert_eq!(colors.keys().collect::<Vec<_>>(), vec!["color-1", "color-2"]);
	assert_eq!(
		product.get("color").unwrap().as_entity_key(),
		Some(colors["color-2"].key())
	);
	assert_eq!(colors["color-2"].get("name"), Some(FieldValue::from("Blue")));
}

#[rstest]
#[tokio::test]
async fn test_missing_generated_name(schema: SchemaRegistry, store: Arc<MemoryStore>) {
	let calls = Arc::new(AtomicUsize::new(0));
	let source = MemorySource::new().with_generator("nodes", counted_nodes(&calls));
	let importer = importer_for(source, &store, schema);

	let err = importer.import_one("nodes/c").await.unwrap_err();

	assert!(matches!(err, FixtureError::DefinitionNotFound(ref id) if id == "nodes/c"));
}

#[rstest]
#[tokio::test]
async fn test_cycle_through_generated_batch(schema: SchemaRegistry, store: Arc<MemoryStore>) {
	let source = MemorySource::new()
		.with_definition("users", "admin", json!({"name": "Admin", "company": "acme"}))
		.with_generator(
			"companies",
			FnGenerator::new(|_| {
				Ok(Generated::named([(
					"acme",
					json!({"name": "Acme", "owner": "admin"}),
				)]))
			}),
		);
	let importer = importer_for(source, &store, schema);

	let admin = importer.import_one("users/admin").await.unwrap();
	let acme = importer.fixture("companies/acme").unwrap();

	assert_eq!(admin.get("company").unwrap().as_entity_key(), Some(acme.key()));
	assert_eq!(acme.get("owner").unwrap().as_entity_key(), Some(admin.key()));
	assert_eq!(importer.pending_count(), 0);
	assert_eq!(importer.stats().circular_refs, 1);
}

/// Builds one profile per user from the raw user definitions.
struct Profiles;

#[async_trait]
impl GeneratorModule for Profiles {
	async fn generate(&self, helpers: &GeneratorHelpers<'_>) -> FixtureResult<Generated> {
		let users = helpers.load_definitions("users").await?;
		Ok(Generated::named(users.into_iter().map(|(name, user)| {
			let display = user["name"].as_str().unwrap_or_default().to_uppercase();
			(name.clone(), json!({"user": name, "display": display}))
		})))
	}
}

/// Asks for its own definitions while generating them.
struct Recursive;

#[async_trait]
impl GeneratorModule for Recursive {
	async fn generate(&self, helpers: &GeneratorHelpers<'_>) -> FixtureResult<Generated> {
		let own = helpers.load_definitions(helpers.base()).await?;
		Ok(Generated::Named(own))
	}
}

#[rstest]
#[tokio::test]
async fn test_generator_loads_raw_definitions(store: Arc<MemoryStore>) {
	let schema = SchemaRegistry::new()
		.with(EntitySchema::new("User", "users").text("name"))
		.with(
			EntitySchema::new("Profile", "profiles")
				.reference("user", "users")
				.text("display"),
		);
	let source = MemorySource::new()
		.with_definition("users", "admin", json!({"name": "Admin"}))
		.with_definition("users", "guest", json!({"name": "Guest"}))
		.with_generator("profiles", Profiles);
	let importer = importer_for(source, &store, schema);

	let profiles = importer.import_base("profiles").await.unwrap();
	let admin = importer.fixture("users/admin").unwrap();

	assert_eq!(profiles.len(), 2);
	assert_eq!(
		profiles["admin"].get("display"),
		Some(FieldValue::from("ADMIN"))
	);
	assert_eq!(
		profiles["admin"].get("user").unwrap().as_entity_key(),
		Some(admin.key())
	);
}

#[rstest]
#[tokio::test]
async fn test_generator_requesting_itself_fails(store: Arc<MemoryStore>) {
	let schema = SchemaRegistry::new().with(EntitySchema::new("Loop", "loops").text("name"));
	let source = MemorySource::new().with_generator("loops", Recursive);
	let importer = importer_for(source, &store, schema);

	let err = importer.import_base("loops").await.unwrap_err();

	assert!(matches!(err, FixtureError::GeneratorError(_)), "{:?}", err);
	assert!(store.is_empty());
}

/// Copies the output of another generated base.
struct Mirror(&'static str);

#[async_trait]
impl GeneratorModule for Mirror {
	async fn generate(&self, helpers: &GeneratorHelpers<'_>) -> FixtureResult<Generated> {
		tokio::task::yield_now().await;
		let other = helpers.load_definitions(self.0).await?;
		Ok(Generated::Named(other))
	}
}

#[rstest]
#[tokio::test]
async fn test_mutually_dependent_generators_fail(store: Arc<MemoryStore>) {
	let schema = SchemaRegistry::new()
		.with(EntitySchema::new("Color", "colors").text("name"))
		.with(EntitySchema::new("Size", "sizes").text("name"));
	let source = MemorySource::new()
		.with_generator("colors", Mirror("sizes"))
		.with_generator("sizes", Mirror("colors"));
	let importer = importer_for(source, &store, schema);

	let result = tokio::time::timeout(Duration::from_secs(5), importer.import_all())
		.await
		.expect("generators loading each other must not hang");

	let err = result.unwrap_err();
	assert!(matches!(err, FixtureError::GeneratorError(_)), "{:?}", err);
	assert!(store.is_empty());
}

#[rstest]
#[tokio::test]
async fn test_generated_helpers_issue_sequential_ids(store: Arc<MemoryStore>) {
	let schema = SchemaRegistry::new().with(EntitySchema::new("SalesRegion", "regions").text("name"));
	let source = MemorySource::new().with_generator(
		"regions",
		FnGenerator::new(|helpers| {
			let first = helpers.generate_fixture_id();
			Ok(Generated::named([
				(first, json!({"name": "North"})),
				(helpers.generate_fixture_id(), json!({"name": "South"})),
			]))
		}),
	);
	let importer = importer_for(source, &store, schema);

	let regions = importer.import_base("regions").await.unwrap();

	assert_eq!(
		regions.keys().collect::<Vec<_>>(),
		vec!["sales-region-1", "sales-region-2"]
	);
}
