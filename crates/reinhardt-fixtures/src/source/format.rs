//! Definition file formats.

use std::fmt;
use std::path::Path;

use serde_json::Value;

use crate::error::{FixtureError, FixtureResult};

/// Supported definition file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum DefinitionFormat {
	/// JSON format (default).
	#[default]
	Json,

	/// YAML format (requires `yaml` feature).
	Yaml,
}

impl DefinitionFormat {
	/// Extensions probed for definition files, in lookup order.
	pub const EXTENSIONS: [&'static str; 3] = ["json", "yaml", "yml"];

	/// Determines the format from a file extension.
	///
	/// # Example
	///
	/// ```
	/// # use reinhardt_fixtures::source::DefinitionFormat;
	/// assert_eq!(DefinitionFormat::from_extension("json"), Some(DefinitionFormat::Json));
	/// assert_eq!(DefinitionFormat::from_extension("yml"), Some(DefinitionFormat::Yaml));
	/// assert_eq!(DefinitionFormat::from_extension("png"), None);
	/// ```
	pub fn from_extension(ext: &str) -> Option<Self> {
		match ext.to_lowercase().as_str() {
			"json" => Some(Self::Json),
			"yaml" | "yml" => Some(Self::Yaml),
			_ => None,
		}
	}

	/// Determines the format from a file path.
	pub fn from_path(path: &Path) -> Option<Self> {
		path.extension()
			.and_then(|ext| ext.to_str())
			.and_then(Self::from_extension)
	}

	/// Parses a definition document.
	///
	/// # Errors
	///
	/// Returns [`FixtureError::ParseError`] when the document is not a mapping,
	/// and [`FixtureError::UnsupportedExtension`] for YAML without the `yaml` feature.
	pub fn parse(&self, content: &str) -> FixtureResult<Value> {
		let value = match self {
			Self::Json => serde_json::from_str::<Value>(content)?,
			Self::Yaml => parse_yaml(content)?,
		};
		if !value.is_object() {
			return Err(FixtureError::ParseError(format!(
				"Expected a {} mapping at the top level",
				self
			)));
		}
		Ok(value)
	}
}

#[cfg(feature = "yaml")]
fn parse_yaml(content: &str) -> FixtureResult<Value> {
	Ok(serde_yaml::from_str::<Value>(content)?)
}

#[cfg(not(feature = "yaml"))]
fn parse_yaml(_content: &str) -> FixtureResult<Value> {
	Err(FixtureError::UnsupportedExtension(
		"yaml (enable the `yaml` feature)".to_string(),
	))
}

impl fmt::Display for DefinitionFormat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Json => write!(f, "JSON"),
			Self::Yaml => write!(f, "YAML"),
		}
	}
}
