//! Error types for the fixture importer.
//!
//! Circular references and same-batch conflicts are not represented here:
//! the importer recovers from them with placeholders and only logs them.

use thiserror::Error;

/// Errors that can occur while importing fixtures.
#[derive(Debug, Error)]
pub enum FixtureError {
	/// No static or generated definition exists for the identifier.
	#[error("Fixture definition not found: {0}")]
	DefinitionNotFound(String),

	/// Identifier is malformed (e.g. more than two path segments).
	#[error("Invalid fixture id: {0}")]
	InvalidIdentifier(String),

	/// A custom token names a transform that was never registered.
	#[error("Custom transform \"{0}\" not recognized")]
	UnregisteredTransform(String),

	/// No entity type is known for the fixture base directory.
	#[error("Unknown entity type for fixture base: {0}")]
	UnknownEntityType(String),

	/// A custom or field transform failed.
	#[error("Transform {name} failed: {message}")]
	TransformError {
		/// Transform name.
		name: String,
		/// Failure message.
		message: String,
	},

	/// A generator module failed or was misused.
	#[error("Generator error: {0}")]
	GeneratorError(String),

	/// Error parsing a definition file.
	#[error("Parse error: {0}")]
	ParseError(String),

	/// Validation failed for a specific field.
	#[error("Validation error: {field}: {message}")]
	ValidationError {
		/// Field that failed validation.
		field: String,
		/// Validation error message.
		message: String,
	},

	/// The persistence adapter rejected an operation.
	#[error("Persistence error: {0}")]
	PersistenceError(String),

	/// Importer configuration is invalid.
	#[error("Configuration error: {0}")]
	ConfigError(String),

	/// A file referenced by a fixture could not be found.
	#[error("Fixture file not found: {0}")]
	FileNotFound(String),

	/// Unsupported definition file extension.
	#[error("Unsupported file extension: {0}")]
	UnsupportedExtension(String),

	/// I/O operation failed.
	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	JsonError(#[from] serde_json::Error),

	/// YAML deserialization error (when yaml feature is enabled).
	#[cfg(feature = "yaml")]
	#[error("YAML error: {0}")]
	YamlError(#[from] serde_yaml::Error),

	/// TOML configuration error.
	#[error("TOML error: {0}")]
	TomlError(#[from] toml::de::Error),
}

impl FixtureError {
	/// Builds a [`FixtureError::TransformError`].
	pub fn transform(name: impl Into<String>, message: impl Into<String>) -> Self {
		Self::TransformError {
			name: name.into(),
			message: message.into(),
		}
	}
}

/// Result type alias for fixture operations.
pub type FixtureResult<T> = Result<T, FixtureError>;
