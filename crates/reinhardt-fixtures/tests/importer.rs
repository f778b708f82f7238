//! Graph resolution tests: references, cycles, caching and errors.

mod helpers;

use std::sync::Arc;

use helpers::catalogs::{importer_for, schema, store};
use reinhardt_fixtures::store::StoreOperation;
use reinhardt_fixtures::{
	EntitySchema, FieldValue, FixtureError, MemorySource, MemoryStore, SchemaRegistry,
};
use rstest::rstest;
use serde_json::json;

fn shop_source() -> MemorySource {
	MemorySource::new()
		.with_definition("shops", "demo", json!({"name": "Demo"}))
		.with_definition("products", "p1", json!({"name": "P1", "shop": "shops/demo"}))
}

fn cycle_source() -> MemorySource {
	MemorySource::new()
		.with_definition("users", "a", json!({"name": "A", "friend": "b"}))
		.with_definition("users", "b", json!({"name": "B", "friend": "a"}))
}

#[rstest]
#[tokio::test]
async fn test_flat_reference_resolves_to_created_entity(
	schema: SchemaRegistry,
	store: Arc<MemoryStore>,
) {
	let importer = importer_for(shop_source(), &store, schema);

	let product = importer.import_one("products/p1").await.unwrap();
	let shop = importer.import_one("shops/demo").await.unwrap();

	assert_eq!(product.get("shop").unwrap().as_entity_key(), Some(shop.key()));
	assert_eq!(shop.get("name"), Some(FieldValue::from("Demo")));
	assert_eq!(store.len(), 2);
	assert_eq!(importer.stats().circular_refs, 0);
}

#[rstest]
#[tokio::test]
async fn test_import_one_is_idempotent(schema: SchemaRegistry, store: Arc<MemoryStore>) {
	let importer = importer_for(shop_source(), &store, schema);

	let first = importer.import_one("shops/demo").await.unwrap();
	let second = importer.import_one("shops/demo").await.unwrap();

	assert!(Arc::ptr_eq(&first, &second));
	assert_eq!(store.count("Shop"), 1);
	assert!(Arc::ptr_eq(&importer.fixture("shops/demo").unwrap(), &first));
	assert!(Arc::ptr_eq(&importer.entity(first.key()).unwrap(), &first));
}

#[rstest]
#[tokio::test]
async fn test_bare_reference_names_target_base(schema: SchemaRegistry, store: Arc<MemoryStore>) {
	let source = MemorySource::new()
		.with_definition("shops", "demo", json!({"name": "Demo"}))
		.with_definition("products", "p1", json!({"name": "P1", "shop": "demo"}));
	let importer = importer_for(source, &store, schema);

	let product = importer.import_one("products/p1").await.unwrap();

	let shop = product.get("shop").unwrap();
	assert_eq!(shop.as_entity_key().unwrap().entity_type, "Shop");
}

#[rstest]
#[tokio::test]
async fn test_mutual_references_terminate_and_resolve(
	schema: SchemaRegistry,
	store: Arc<MemoryStore>,
) {
	let importer = importer_for(cycle_source(), &store, schema);

	let a = importer.import_one("users/a").await.unwrap();
	let b = importer.fixture("users/b").unwrap();

	assert_eq!(a.get("friend").unwrap().as_entity_key(), Some(b.key()));
	assert_eq!(b.get("friend").unwrap().as_entity_key(), Some(a.key()));
	assert_eq!(importer.pending_count(), 0);

	let stats = importer.stats();
	assert_eq!(stats.circular_refs, 1);
	assert_eq!(stats.circular, vec!["users/a -> users/b -> users/a"]);
	assert_eq!(stats.placeholders, 1);
	assert_eq!(stats.unresolved, 0);
	assert_eq!(stats.generated_conflicts, 0);

	// The persisted copy of b was patched as well.
	let stored = store.get(b.key()).unwrap();
	assert_eq!(stored.get("friend").unwrap().as_entity_key(), Some(a.key()));
}

#[rstest]
#[tokio::test]
async fn test_placeholder_is_stored_until_target_exists(
	schema: SchemaRegistry,
	store: Arc<MemoryStore>,
) {
	let importer = importer_for(cycle_source(), &store, schema);
	importer.import_one("users/a").await.unwrap();

	let operations = store.operations();
	assert_eq!(operations.len(), 3);
	let StoreOperation::Create { key, attributes } = &operations[0] else {
		panic!("expected b to be created first, got {:?}", operations[0]);
	};
	assert_eq!(key.pk, json!(1));
	assert!(attributes.get("friend").unwrap().as_placeholder().is_some());
	assert!(matches!(&operations[1], StoreOperation::Create { .. }));
	let StoreOperation::Update { key, attributes } = &operations[2] else {
		panic!("expected b to be patched, got {:?}", operations[2]);
	};
	assert_eq!(key, operations[0].key());
	assert_eq!(
		attributes.get("friend").unwrap().as_entity_key(),
		Some(operations[1].key())
	);
}

#[rstest]
#[tokio::test]
async fn test_cycle_across_concurrent_branches(schema: SchemaRegistry, store: Arc<MemoryStore>) {
	let source = MemorySource::new()
		.with_definition("users", "admin", json!({"name": "Admin", "company": "acme"}))
		.with_definition("users", "guest", json!({"name": "Guest", "company": "acme"}))
		.with_definition(
			"companies",
			"acme",
			json!({"name": "Acme", "owner": "admin", "members": ["admin", "guest"]}),
		);
	let importer = importer_for(source, &store, schema);

	let catalog = importer.import_all().await.unwrap();

	assert_eq!(catalog.len(), 3);
	assert_eq!(importer.pending_count(), 0);
	let acme = catalog.get("companies/acme").unwrap();
	let admin = catalog.get("users/admin").unwrap();
	let guest = catalog.get("users/guest").unwrap();
	assert_eq!(acme.get("owner").unwrap().as_entity_key(), Some(admin.key()));
	assert_eq!(
		acme.get("members"),
		Some(FieldValue::List(vec![
			FieldValue::Ref(admin.key().clone()),
			FieldValue::Ref(guest.key().clone()),
		]))
	);
	assert_eq!(admin.get("company").unwrap().as_entity_key(), Some(acme.key()));
	assert_eq!(guest.get("company").unwrap().as_entity_key(), Some(acme.key()));
	assert_eq!(store.len(), 3);
}

#[rstest]
#[tokio::test]
async fn test_directory_import(schema: SchemaRegistry, store: Arc<MemoryStore>) {
	let source = MemorySource::new()
		.with_definition("users", "admin", json!({"name": "Admin"}))
		.with_definition("users", "guest", json!({"name": "Guest"}));
	let importer = importer_for(source, &store, schema);

	let users = importer.import_base("users").await.unwrap();

	assert_eq!(users.keys().collect::<Vec<_>>(), vec!["admin", "guest"]);
	assert!(!Arc::ptr_eq(&users["admin"], &users["guest"]));
	assert_ne!(users["admin"].key(), users["guest"].key());
}

#[rstest]
#[tokio::test]
async fn test_import_all_skips_unknown_bases(schema: SchemaRegistry, store: Arc<MemoryStore>) {
	let source = shop_source().with_definition("drafts", "x", json!({"title": "ignored"}));
	let importer = importer_for(source, &store, schema);

	let catalog = importer.import_all().await.unwrap();

	assert_eq!(catalog.bases().collect::<Vec<_>>(), vec!["products", "shops"]);
	assert!(catalog.get("drafts/x").is_none());
	assert_eq!(catalog.flatten().len(), 2);
}

#[rstest]
#[tokio::test]
async fn test_bad_field_is_logged_once_and_kept(schema: SchemaRegistry, store: Arc<MemoryStore>) {
	let source = MemorySource::new().with_definition("widgets", "w1", json!({"foo": "bar"}));
	let importer = importer_for(source, &store, schema);

	let widget = importer.import_one("widgets/w1").await.unwrap();
	importer.import_one("widgets/w1").await.unwrap();

	assert_eq!(widget.get("foo"), Some(FieldValue::from("bar")));
	assert_eq!(importer.stats().bad_fields, 1);
}

#[rstest]
#[tokio::test]
async fn test_nested_references_are_resolved(store: Arc<MemoryStore>) {
	let schema = SchemaRegistry::new()
		.with(EntitySchema::new("Tag", "tags").text("name"))
		.with(
			EntitySchema::new("Post", "posts")
				.text("title")
				.reference("meta.tags", "tags"),
		);
	let source = MemorySource::new()
		.with_definition("tags", "rust", json!({"name": "Rust"}))
		.with_definition(
			"posts",
			"hello",
			json!({"title": "Hello", "meta": {"tags": ["rust"]}}),
		);
	let importer = importer_for(source, &store, schema);

	let post = importer.import_one("posts/hello").await.unwrap();
	let tag = importer.fixture("tags/rust").unwrap();

	let Some(FieldValue::Map(meta)) = post.get("meta") else {
		panic!("meta should be a map");
	};
	assert_eq!(
		meta.get("tags"),
		Some(&FieldValue::List(vec![FieldValue::Ref(tag.key().clone())]))
	);
	assert_eq!(importer.stats().bad_fields, 0);
}

#[rstest]
#[tokio::test]
async fn test_dynamic_reference_target(store: Arc<MemoryStore>) {
	let schema = SchemaRegistry::new()
		.with(EntitySchema::new("Article", "articles").text("title"))
		.with(
			EntitySchema::new("Comment", "comments")
				.text("body")
				.text("targetType")
				.dynamic_reference("target", "targetType"),
		);
	let source = MemorySource::new()
		.with_definition("articles", "first", json!({"title": "First"}))
		.with_definition(
			"comments",
			"c1",
			json!({"body": "Nice", "targetType": "Article", "target": "first"}),
		);
	let importer = importer_for(source, &store, schema);

	let comment = importer.import_one("comments/c1").await.unwrap();
	let article = importer.fixture("articles/first").unwrap();

	assert_eq!(comment.get("target").unwrap().as_entity_key(), Some(article.key()));
}

#[rstest]
#[case("users/admin/extra")]
#[case("/admin")]
#[case("users")]
#[case("")]
#[tokio::test]
async fn test_import_one_rejects_invalid_identifiers(
	schema: SchemaRegistry,
	store: Arc<MemoryStore>,
	#[case] id: &str,
) {
	let importer = importer_for(shop_source(), &store, schema);

	let err = importer.import_one(id).await.unwrap_err();

	assert!(matches!(err, FixtureError::InvalidIdentifier(_)), "{:?}", err);
	assert!(store.is_empty());
}

#[rstest]
#[tokio::test]
async fn test_missing_definition(schema: SchemaRegistry, store: Arc<MemoryStore>) {
	let importer = importer_for(shop_source(), &store, schema);

	let err = importer.import_one("shops/nowhere").await.unwrap_err();

	assert!(matches!(err, FixtureError::DefinitionNotFound(ref id) if id == "shops/nowhere"));
}

#[rstest]
#[tokio::test]
async fn test_missing_reference_aborts_import(schema: SchemaRegistry, store: Arc<MemoryStore>) {
	let source = MemorySource::new()
		.with_definition("products", "p1", json!({"name": "P1", "shop": "ghost"}));
	let importer = importer_for(source, &store, schema);

	let err = importer.import_one("products/p1").await.unwrap_err();

	assert!(matches!(err, FixtureError::DefinitionNotFound(ref id) if id == "shops/ghost"));
	assert!(store.is_empty());
}

#[rstest]
#[tokio::test]
async fn test_persistence_failure_propagates(schema: SchemaRegistry) {
	let store = Arc::new(MemoryStore::new().fail_on("Shop"));
	let importer = importer_for(shop_source(), &store, schema);

	let err = importer.import_one("products/p1").await.unwrap_err();

	assert!(matches!(err, FixtureError::PersistenceError(_)));
	assert!(store.is_empty());
}

#[rstest]
#[tokio::test]
async fn test_reset_starts_a_fresh_run(schema: SchemaRegistry, store: Arc<MemoryStore>) {
	let importer = importer_for(cycle_source(), &store, schema);
	let before = importer.import_one("users/a").await.unwrap();

	importer.reset();
	assert!(importer.fixture("users/a").is_none());
	assert_eq!(importer.stats().imported, 0);

	let after = importer.import_one("users/a").await.unwrap();
	assert!(!Arc::ptr_eq(&before, &after));
	assert_eq!(store.count("User"), 4);
	assert_eq!(importer.stats().circular_refs, 1);
}

#[rstest]
#[tokio::test]
async fn test_load_all_collects_stats(schema: SchemaRegistry, store: Arc<MemoryStore>) {
	let importer = importer_for(cycle_source(), &store, schema);

	let catalog = importer.load_all().await.unwrap();
	let stats = importer.stats();

	assert_eq!(catalog.len(), 2);
	assert_eq!(stats.imported, 2);
	assert_eq!(stats.fixtures.len(), 2);
	assert_eq!(stats.circular_refs, 1);
	assert_eq!(stats.unresolved, 0);
	let report = serde_json::to_value(&stats).unwrap();
	assert_eq!(report["circular_refs"], json!(1));
}

#[rstest]
#[tokio::test]
async fn test_load_unless_seeded_skips_second_run(schema: SchemaRegistry, store: Arc<MemoryStore>) {
	let first = importer_for(cycle_source(), &store, schema.clone());
	let second = importer_for(cycle_source(), &store, schema);

	let loaded = first.load_unless_seeded().await.unwrap();
	let skipped = second.load_unless_seeded().await.unwrap();

	assert_eq!(loaded.map(|catalog| catalog.len()), Some(2));
	assert!(skipped.is_none());
	assert_eq!(store.count("User"), 2);
	assert_eq!(second.stats().imported, 0);
}
