//! On-disk fixture trees.
//!
//! Layout:
//!
//! ```text
//! fixtures/
//!   users/
//!     admin/
//!       index.json
//!       avatar.png
//!     guest.yaml
//!   shops/
//!     demo.json
//! ```

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use super::{Definition, DefinitionFormat, DefinitionSource, GeneratorModule, file_candidates};
use crate::error::{FixtureError, FixtureResult};
use crate::identifier::FixtureId;

/// [`DefinitionSource`] reading fixtures from a directory tree.
///
/// Generator modules cannot be loaded from disk; register them with
/// [`FileSystemSource::with_generator`].
pub struct FileSystemSource {
	root: PathBuf,
	generators: HashMap<String, Arc<dyn GeneratorModule>>,
}

impl FileSystemSource {
	/// Creates a source rooted at `root`.
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self {
			root: root.into(),
			generators: HashMap::new(),
		}
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

	/// Root directory.
	pub fn root(&self) -> &Path {
		&self.root
	}

	async fn definition_path(&self, id: &FixtureId) -> FixtureResult<Option<PathBuf>> {
		let Some(name) = id.name() else {
			return Ok(None);
		};
		let base_dir = self.root.join(id.base());
		for ext in DefinitionFormat::EXTENSIONS {
			for candidate in [
				base_dir.join(name).join(format!("index.{}", ext)),
				base_dir.join(format!("{}.{}", name, ext)),
			] {
				if tokio::fs::try_exists(&candidate).await? {
					return Ok(Some(candidate));
				}
			}
		}
		Ok(None)
	}
}

fn is_hidden(name: &str) -> bool {
	name.starts_with('.') || name.starts_with('_')
}

#[async_trait]
impl DefinitionSource for FileSystemSource {
	async fn list_bases(&self) -> FixtureResult<Vec<String>> {
		let mut bases: BTreeSet<String> = self.generators.keys().cloned().collect();
		let mut entries = match tokio::fs::read_dir(&self.root).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return Err(FixtureError::FileNotFound(self.root.display().to_string()));
			}
			Err(e) => return Err(e.into()),
		};
		while let Some(entry) = entries.next_entry().await? {
			let name = entry.file_name().to_string_lossy().into_owned();
			if entry.file_type().await?.is_dir() && !is_hidden(&name) {
				bases.insert(name);
			}
		}
		Ok(bases.into_iter().collect())
	}

	async fn list_names(&self, base: &str) -> FixtureResult<Vec<String>> {
		let dir = self.root.join(base);
		let mut entries = match tokio::fs::read_dir(&dir).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(e.into()),
		};
		let mut names = BTreeSet::new();
		while let Some(entry) = entries.next_entry().await? {
			let path = entry.path();
			let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
				continue;
			};
			if is_hidden(&stem) {
				continue;
			}
			if entry.file_type().await?.is_dir() {
				names.insert(stem);
			} else if DefinitionFormat::from_path(&path).is_some() {
				names.insert(stem);
			}
		}
		Ok(names.into_iter().collect())
	}

	async fn read_definition(&self, id: &FixtureId) -> FixtureResult<Option<Definition>> {
		if !id.is_fixture() {
			return Ok(self
				.generators
				.get(id.base())
				.map(|module| Definition::Generated(Arc::clone(module))));
		}
		let Some(path) = self.definition_path(id).await? else {
			return Ok(None);
		};
		let format = DefinitionFormat::from_path(&path).ok_or_else(|| {
			FixtureError::UnsupportedExtension(path.display().to_string())
		})?;
		let content = tokio::fs::read_to_string(&path).await?;
		let value = format.parse(&content).map_err(|e| {
			FixtureError::ParseError(format!("{}: {}", path.display(), e))
		})?;
		Ok(Some(Definition::Static(value)))
	}

	async fn resolve_file(&self, fixture: &FixtureId, path: &str) -> FixtureResult<Option<String>> {
		for candidate in file_candidates(fixture, path) {
			let full = self.root.join(&candidate);
			if tokio::fs::try_exists(&full).await? {
				return Ok(Some(full.display().to_string()));
			}
		}
		Ok(None)
	}

	async fn read_file(&self, resolved: &str) -> FixtureResult<Vec<u8>> {
		tokio::fs::read(resolved).await.map_err(|e| {
			if e.kind() == std::io::ErrorKind::NotFound {
				FixtureError::FileNotFound(resolved.to_string())
			} else {
				FixtureError::IoError(e)
			}
		})
	}
}
