//! Importer configuration.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `REINHARDT_FIXTURES_*` environment variables.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FixtureError, FixtureResult};
use crate::identifier::FixtureId;

/// Prefix of environment variables read by [`ImporterConfig::with_env_overrides`].
pub const ENV_PREFIX: &str = "REINHARDT_FIXTURES_";

/// Settings consumed by the importer and its built-in transforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImporterConfig {
	/// Root directory of the filesystem definition source.
	pub fixtures_dir: PathBuf,
	/// Base URL used when inlining upload links into markup.
	pub api_url: String,
	/// Entity type used for file-derived fixtures.
	pub upload_entity_type: String,
	/// Fixture owning uploaded files. `None` leaves uploads unowned.
	pub upload_owner: Option<String>,
	/// Values exposed to the `env` custom transform.
	pub env: BTreeMap<String, String>,
}

impl Default for ImporterConfig {
	fn default() -> Self {
		Self {
			fixtures_dir: PathBuf::from("fixtures"),
			api_url: "http://localhost:8000".to_string(),
			upload_entity_type: "Upload".to_string(),
			upload_owner: Some("users/admin".to_string()),
			env: BTreeMap::new(),
		}
	}
}

impl ImporterConfig {
	/// Creates a configuration with defaults.
	pub fn new() -> Self {
		Self::default()
	}

	/// Parses a TOML document. Missing keys keep their defaults.
	///
	/// # Example
	///
	/// ```
	/// # use reinhardt_fixtures::ImporterConfig;
	/// let config = ImporterConfig::from_toml_str(r#"
	///     api_url = "https://api.example.com"
	///
	///     [env]
	///     ADMIN_EMAIL = "admin@example.com"
	/// "#).unwrap();
	/// assert_eq!(config.api_url, "https://api.example.com");
	/// assert_eq!(config.upload_entity_type, "Upload");
	/// ```
	pub fn from_toml_str(contents: &str) -> FixtureResult<Self> {
		let config: Self = toml::from_str(contents)?;
		config.validate()?;
		Ok(config)
	}

	/// Reads and parses a TOML file.
	pub fn from_toml_file(path: impl AsRef<Path>) -> FixtureResult<Self> {
		let path = path.as_ref();
		let contents = std::fs::read_to_string(path).map_err(|e| {
			FixtureError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
		})?;
		Self::from_toml_str(&contents)
	}

	/// Applies `REINHARDT_FIXTURES_*` overrides from the process environment.
	pub fn with_env_overrides(self) -> FixtureResult<Self> {
		self.apply_env(|key| std::env::var(key).ok())
	}

	/// Applies overrides from `lookup`, which receives full variable names.
	///
	/// Recognized variables: `REINHARDT_FIXTURES_DIR`, `REINHARDT_FIXTURES_API_URL`,
	/// `REINHARDT_FIXTURES_UPLOAD_ENTITY_TYPE` and `REINHARDT_FIXTURES_UPLOAD_OWNER`
	/// (an empty owner disables upload ownership).
	pub fn apply_env<F>(mut self, lookup: F) -> FixtureResult<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

		if let Some(dir) = var("DIR") {
			self.fixtures_dir = PathBuf::from(dir);
		}
		if let Some(url) = var("API_URL") {
			self.api_url = url;
		}
		if let Some(entity_type) = var("UPLOAD_ENTITY_TYPE") {
			self.upload_entity_type = entity_type;
		}
		if let Some(owner) = var("UPLOAD_OWNER") {
			self.upload_owner = (!owner.trim().is_empty()).then(|| owner.trim().to_string());
		}

		self.validate()?;
		Ok(self)
	}

	/// Sets the fixtures directory.
	pub fn with_fixtures_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.fixtures_dir = dir.into();
		self
	}

	/// Sets the API base URL.
	pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
		self.api_url = url.into();
		self
	}

	/// Sets the upload entity type.
	pub fn with_upload_entity_type(mut self, entity_type: impl Into<String>) -> Self {
		self.upload_entity_type = entity_type.into();
		self
	}

	/// Sets (or clears) the upload owner fixture.
	pub fn with_upload_owner(mut self, owner: Option<&str>) -> Self {
		self.upload_owner = owner.map(str::to_string);
		self
	}

	/// Adds a value for the `env` custom transform.
	pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.env.insert(key.into(), value.into());
		self
	}

	/// Looks up `key` in the configured table, then in the process environment.
	pub fn env_value(&self, key: &str) -> Option<String> {
		self.env
			.get(key)
			.cloned()
			.or_else(|| std::env::var(key).ok())
	}

	/// Parsed upload owner identifier.
	pub fn upload_owner_id(&self) -> FixtureResult<Option<FixtureId>> {
		self.upload_owner
			.as_deref()
			.map(FixtureId::parse)
			.transpose()
	}

	/// Validates the settings.
	pub fn validate(&self) -> FixtureResult<()> {
		if self.upload_entity_type.trim().is_empty() {
			return Err(FixtureError::ConfigError(
				"upload_entity_type must not be empty".to_string(),
			));
		}
		if let Some(owner) = self.upload_owner_id()?
			&& !owner.is_fixture()
		{
			return Err(FixtureError::ConfigError(format!(
				"upload_owner must name a single fixture, got \"{}\"",
				owner
			)));
		}
		Ok(())
	}
}
