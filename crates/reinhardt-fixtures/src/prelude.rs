//! Convenience re-exports for common usage.
//!
//! # Example
//!
//! ```
//! use reinhardt_fixtures::prelude::*;
//!
//! let id = FixtureId::parse("users/admin").unwrap();
//! assert_eq!(id.base(), "users");
//! ```

pub use std::sync::Arc;

// Error types
pub use crate::error::{FixtureError, FixtureResult};

// Identifiers and values
pub use crate::entity::{Entity, EntityRef};
pub use crate::identifier::FixtureId;
pub use crate::value::{Attributes, EntityKey, FieldValue, Placeholder};

// Importer
pub use crate::config::ImporterConfig;
pub use crate::importer::{Catalog, FixtureImporter, FixtureSet, ImportStats, Imported};

// Collaborators
pub use crate::schema::{EntitySchema, FieldKind, FieldPath, RefTarget, SchemaIntrospector, SchemaRegistry};
pub use crate::source::{
	DefinitionSource, FileSystemSource, FnGenerator, Generated, GeneratorHelpers, GeneratorModule,
	MemorySource,
};
pub use crate::store::{MemoryStore, PersistenceAdapter};

// Transforms
pub use crate::transforms::{
	CustomTransform, FieldTransform, TransformContext, TransformRegistry,
};
