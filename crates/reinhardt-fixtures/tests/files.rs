//! File token tests: uploads, inlined text content and raw bytes.

mod helpers;

use std::sync::Arc;

use helpers::catalogs::{importer_for, schema, store};
use reinhardt_fixtures::{FieldValue, FixtureError, ImporterConfig, MemorySource, MemoryStore, SchemaRegistry};
use rstest::rstest;
use serde_json::json;

const PNG: &[u8] = &[0x89, b'P', b'N', b'G'];

fn user_files() -> MemorySource {
	MemorySource::new()
		.with_definition(
			"users",
			"admin",
			json!({"name": "Admin", "avatar": "avatar.png", "bio": "bio.md"}),
		)
		.with_definition("users", "guest", json!({"name": "Guest", "avatar": "avatar.png"}))
		.with_file("users/admin/avatar.png", PNG)
		.with_file("users/avatar.png", PNG)
		.with_file(
			"users/admin/bio.md",
			"# Admin\n\n![portrait](avatar.png)\n\n[CV](cv.pdf)\n",
		)
		.with_file("users/admin/cv.pdf", b"%PDF".to_vec())
}

#[rstest]
#[tokio::test]
async fn test_reference_field_creates_upload(schema: SchemaRegistry, store: Arc<MemoryStore>) {
	let importer = importer_for(user_files(), &store, schema);

	let guest = importer.import_one("users/guest").await.unwrap();
	let admin = importer.fixture("users/admin").unwrap();

	let upload_key = guest.get("avatar").unwrap().as_entity_key().cloned().unwrap();
	assert_eq!(upload_key.entity_type, "Upload");
	let upload = importer.entity(&upload_key).unwrap();
	assert_eq!(upload.get("filename"), Some(FieldValue::from("avatar.png")));
	assert_eq!(upload.get("mime_type"), Some(FieldValue::from("image/png")));
	assert_eq!(upload.get("size"), Some(FieldValue::from(4_i64)));
	assert_eq!(upload.get("content"), Some(FieldValue::Bytes(PNG.to_vec())));
	assert_eq!(upload.get("owner").unwrap().as_entity_key(), Some(admin.key()));
}

#[rstest]
#[tokio::test]
async fn test_owner_files_are_not_owned(schema: SchemaRegistry, store: Arc<MemoryStore>) {
	let importer = importer_for(user_files(), &store, schema);

	let admin = importer.import_one("users/admin").await.unwrap();

	let upload_key = admin.get("avatar").unwrap().as_entity_key().cloned().unwrap();
	let upload = importer.entity(&upload_key).unwrap();
	assert_eq!(upload.get("owner"), None);
}

#[rstest]
#[tokio::test]
async fn test_uploads_are_created_once_per_file(schema: SchemaRegistry, store: Arc<MemoryStore>) {
	let importer = importer_for(user_files(), &store, schema);

	importer.import_base("users").await.unwrap();

	// admin/avatar.png (shared by the avatar and the bio), users/avatar.png and cv.pdf
	assert_eq!(store.count("Upload"), 3);
	assert_eq!(store.count("User"), 2);
}

#[rstest]
#[tokio::test]
async fn test_markdown_links_are_inlined(schema: SchemaRegistry, store: Arc<MemoryStore>) {
	let config = ImporterConfig::default().with_api_url("https://api.example.com/");
	let importer = importer_for(user_files(), &store, schema).with_config(config);

	let admin = importer.import_one("users/admin").await.unwrap();

	let avatar = admin.get("avatar").unwrap().as_entity_key().cloned().unwrap();
	let cv = store
		.records("Upload")
		.into_iter()
		.find(|(_, attributes)| attributes.get("filename") == Some(&FieldValue::from("cv.pdf")))
		.map(|(key, _)| key)
		.unwrap();
	let expected = format!(
		"# Admin\n\n![portrait](https://api.example.com/1/uploads/{}/image)\n\n[CV](https://api.example.com/1/uploads/{}/image)\n",
		avatar.pk_string(),
		cv.pk_string()
	);
	assert_eq!(admin.get("bio"), Some(FieldValue::String(expected)));
}

#[rstest]
#[tokio::test]
async fn test_plain_text_and_binary_fields(schema: SchemaRegistry, store: Arc<MemoryStore>) {
	let source = MemorySource::new()
		.with_definition(
			"users",
			"dev",
			json!({"name": "Dev", "bio": "about.txt", "key": "id.png"}),
		)
		.with_file("users/dev/about.txt", "plain (notes.png) text")
		.with_file("users/id.png", PNG);
	let importer = importer_for(source, &store, schema);

	let dev = importer.import_one("users/dev").await.unwrap();

	assert_eq!(dev.get("bio"), Some(FieldValue::from("plain (notes.png) text")));
	assert_eq!(dev.get("key"), Some(FieldValue::Bytes(PNG.to_vec())));
	assert_eq!(store.count("Upload"), 0);
}

#[rstest]
#[tokio::test]
async fn test_missing_file(schema: SchemaRegistry, store: Arc<MemoryStore>) {
	let source = MemorySource::new()
		.with_definition("users", "dev", json!({"name": "Dev", "avatar": "missing.png"}));
	let importer = importer_for(source, &store, schema);

	let err = importer.import_one("users/dev").await.unwrap_err();

	assert!(
		matches!(err, FixtureError::FileNotFound(ref message) if message.contains("users/dev")),
		"{:?}",
		err
	);
}

#[rstest]
#[tokio::test]
async fn test_uploads_without_owner(schema: SchemaRegistry, store: Arc<MemoryStore>) {
	let config = ImporterConfig::default()
		.with_upload_owner(None)
		.with_upload_entity_type("Asset");
	let importer = importer_for(user_files(), &store, schema).with_config(config);

	let guest = importer.import_one("users/guest").await.unwrap();

	let upload_key = guest.get("avatar").unwrap().as_entity_key().cloned().unwrap();
	assert_eq!(upload_key.entity_type, "Asset");
	assert_eq!(importer.entity(&upload_key).unwrap().get("owner"), None);
	assert!(importer.fixture("users/admin").is_none());
}
