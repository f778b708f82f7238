//! Files referenced from fixture definitions.
//!
//! Depending on the schema kind of the attribute, a file token becomes an
//! upload entity (reference fields), the file's text (text fields) or its
//! raw bytes (binary fields). Markdown and HTML text has embedded image and
//! PDF references replaced with upload URLs.

use std::ops::Range;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use super::memo::AsyncMemo;
use super::{FixtureImporter, ImportFrame, Resolution};
use crate::entity::{Entity, EntityRef};
use crate::error::{FixtureError, FixtureResult};
use crate::schema::FieldKind;
use crate::value::{Attributes, EntityKey, FieldValue};

static INLINE_CONTENT: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r#"(\(|")([^)"\n]+?\.(?:jpg|png|svg|gif|webp|pdf))([)"])"#).unwrap()
});

static INLINE_CONTENT_TYPES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.(md|html)$").unwrap());

/// MIME type guessed from a file extension.
pub(crate) fn mime_type(filename: &str) -> String {
	mime_guess::from_path(filename)
		.first_or_octet_stream()
		.essence_str()
		.to_string()
}

pub(crate) struct FileImports {
	uploads: AsyncMemo<EntityRef>,
	content: AsyncMemo<Arc<String>>,
	buffers: AsyncMemo<Arc<Vec<u8>>>,
}

impl FileImports {
	pub(crate) fn new() -> Self {
		Self {
			uploads: AsyncMemo::new(),
			content: AsyncMemo::new(),
			buffers: AsyncMemo::new(),
		}
	}

	pub(crate) fn clear(&self) {
		self.uploads.clear();
		self.content.clear();
		self.buffers.clear();
	}
}

struct InlineFile {
	span: Range<usize>,
	open: String,
	file: String,
	close: String,
}

impl FixtureImporter {
	pub(super) async fn transform_file(
		&self,
		kind: &FieldKind,
		file: &str,
		frame: &Arc<ImportFrame>,
	) -> FixtureResult<FieldValue> {
		match kind {
			FieldKind::Reference(_) => Ok(self.import_upload(file, frame).await?.into()),
			FieldKind::Text => Ok(FieldValue::String(self.import_content(file, frame).await?)),
			FieldKind::Binary => Ok(FieldValue::Bytes(
				self.import_buffer(file, frame).await?.to_vec(),
			)),
			_ => Ok(FieldValue::String(file.to_string())),
		}
	}

	async fn resolve_file(&self, file: &str, frame: &ImportFrame) -> FixtureResult<String> {
		let Some(fixture) = frame.fixture() else {
			return Err(FixtureError::FileNotFound(file.to_string()));
		};
		self.loader
			.source()
			.resolve_file(fixture, file)
			.await?
			.ok_or_else(|| {
				FixtureError::FileNotFound(format!("{} (referenced by {})", file, fixture))
			})
	}

	async fn read_buffer(&self, resolved: &str) -> FixtureResult<Arc<Vec<u8>>> {
		self.files
			.buffers
			.get_or_try_init(resolved, || async {
				Ok(Arc::new(self.loader.source().read_file(resolved).await?))
			})
			.await
	}

	async fn import_buffer(&self, file: &str, frame: &ImportFrame) -> FixtureResult<Arc<Vec<u8>>> {
		let resolved = self.resolve_file(file, frame).await?;
		self.read_buffer(&resolved).await
	}

	async fn import_content(&self, file: &str, frame: &Arc<ImportFrame>) -> FixtureResult<String> {
		let resolved = self.resolve_file(file, frame).await?;
		let content = self
			.files
			.content
			.get_or_try_init(&resolved, || async {
				let bytes = self.read_buffer(&resolved).await?;
				let text = String::from_utf8(bytes.to_vec()).map_err(|e| {
					FixtureError::ParseError(format!("{} is not valid UTF-8: {}", resolved, e))
				})?;
				if INLINE_CONTENT_TYPES.is_match(&resolved) {
					Ok(Arc::new(self.inline_content_files(&text, frame).await?))
				} else {
					Ok(Arc::new(text))
				}
			})
			.await?;
		Ok(String::clone(&content))
	}

	async fn inline_content_files(
		&self,
		content: &str,
		frame: &Arc<ImportFrame>,
	) -> FixtureResult<String> {
		let matches: Vec<InlineFile> = INLINE_CONTENT
			.captures_iter(content)
			.filter_map(|captures| {
				Some(InlineFile {
					span: captures.get(0)?.range(),
					open: captures.get(1)?.as_str().to_string(),
					file: captures.get(2)?.as_str().to_string(),
					close: captures.get(3)?.as_str().to_string(),
				})
			})
			.collect();

		let api_url = self.config.api_url.trim_end_matches('/');
		let mut out = String::with_capacity(content.len());
		let mut last = 0;
		for inline in matches {
			let upload = match self.import_upload(&inline.file, frame).await? {
				Resolution::Entity(entity) => entity,
				Resolution::Placeholder(_) => {
					return Err(FixtureError::transform(
						inline.file,
						format!("circular reference from {} cannot be inlined", frame.key()),
					));
				}
			};
			out.push_str(&content[last..inline.span.start]);
			out.push_str(&inline.open);
			out.push_str(&format!(
				"{}/1/uploads/{}/image",
				api_url,
				upload.key().pk_string()
			));
			out.push_str(&inline.close);
			last = inline.span.end;
		}
		out.push_str(&content[last..]);
		Ok(out)
	}

	/// Imports a file as an upload entity, once per resolved file.
	pub(super) async fn import_upload(
		&self,
		file: &str,
		frame: &Arc<ImportFrame>,
	) -> FixtureResult<Resolution> {
		let resolved = self.resolve_file(file, frame).await?;
		let key = format!("file:{}", resolved);
		if let Some(entity) = self.files.uploads.get(&key) {
			return Ok(Resolution::Entity(entity));
		}
		if let Some(chain) = frame.cycle_to(&key) {
			self.log_circular(&chain);
			return Ok(self.placeholder(&key));
		}
		let _wait = match self.waits.enter(frame.wait_node(), &key) {
			Ok(guard) => guard,
			Err(cycle) => {
				self.log_circular(&cycle.join(" -> "));
				return Ok(self.placeholder(&key));
			}
		};
		let entity = self
			.files
			.uploads
			.get_or_try_init(&key, || self.create_upload(&resolved, &key, frame))
			.await?;
		Ok(Resolution::Entity(entity))
	}

	async fn create_upload(
		&self,
		resolved: &str,
		key: &str,
		parent: &Arc<ImportFrame>,
	) -> FixtureResult<EntityRef> {
		tracing::debug!("Importing upload: {}", resolved);
		let content = self.read_buffer(resolved).await?;
		let filename = resolved
			.rsplit(['/', '\\'])
			.next()
			.unwrap_or(resolved)
			.to_string();

		let mut attributes = Attributes::new();
		attributes.insert(
			"mime_type".to_string(),
			FieldValue::from(mime_type(&filename)),
		);
		attributes.insert("filename".to_string(), FieldValue::String(filename));
		attributes.insert(
			"size".to_string(),
			FieldValue::from(i64::try_from(content.len()).unwrap_or(i64::MAX)),
		);
		attributes.insert("content".to_string(), FieldValue::Bytes(content.to_vec()));

		// The owner's own files stay unowned so the owner can be bootstrapped.
		if let Some(owner) = self.config.upload_owner_id()?
			&& parent.fixture() != Some(&owner)
		{
			let frame = Arc::new(ImportFrame::upload(key.to_string(), parent));
			let value = self.resolve_reference(owner, &frame).await?;
			attributes.insert("owner".to_string(), value.into());
		}

		let entity_type = self.config.upload_entity_type.as_str();
		let pk = self.store.create(entity_type, &attributes).await?;
		let entity = Arc::new(Entity::new(EntityKey::new(entity_type, pk), key, attributes));
		self.finish_entity(key, &entity).await?;
		Ok(entity)
	}
}
