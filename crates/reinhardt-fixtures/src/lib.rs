//! Graph-aware fixture importing for the Reinhardt framework.
//!
//! Fixtures are named definitions (`users/admin`) whose attributes may refer
//! to other fixtures. This crate materializes them into persisted entities in
//! dependency order, importing referenced fixtures first:
//!
//! - **References**: attributes the schema marks as references are resolved
//!   into the referenced entity, importing it on demand
//! - **Circular references**: cycles are broken with placeholders that are
//!   patched, and the entity updated, once the target exists
//! - **Generated fixtures**: a base may be produced by a generator module in
//!   one batch instead of one definition per file
//! - **Custom transforms**: `<env:...>`, `<ref:...>` and `<obj:...>` tokens,
//!   user-registered tokens and per-type field transforms
//! - **Files**: values naming a file next to the definition (`avatar.png`,
//!   `about.md`) become uploads, text content or bytes
//!
//! # Features
//!
//! - `json` - JSON definition files (enabled by default)
//! - `yaml` - YAML definition files
//! - `full` - All features enabled
//!
//! # Quick Start
//!
//! A fixture tree on disk:
//!
//! ```text
//! fixtures/
//! ├── users/
//! │   └── admin.json        {"name": "Admin", "company": "acme"}
//! └── companies/
//!     └── acme.yaml         {name: Acme, owner: admin}
//! ```
//!
//! Import it into a store:
//!
//! ```ignore
//! use reinhardt_fixtures::prelude::*;
//!
//! let schema = SchemaRegistry::new()
//!     .with(EntitySchema::new("User", "users").text("name").reference("company", "companies"))
//!     .with(EntitySchema::new("Company", "companies").text("name").reference("owner", "users"));
//!
//! let importer = FixtureImporter::new(
//!     Arc::new(FileSystemSource::new("fixtures")),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(schema),
//! );
//! let catalog = importer.load_all().await?;
//! let admin = catalog.get("users/admin").unwrap();
//! ```
//!
//! # Architecture
//!
//! - [`DefinitionSource`] - where raw definitions and files come from
//! - [`SchemaIntrospector`] - entity types and attribute kinds
//! - [`PersistenceAdapter`] - where entities are created and updated
//! - [`TransformRegistry`] - custom token and field transforms
//! - [`FixtureImporter`] - the import session tying them together

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod entity;
pub mod error;
pub mod identifier;
pub mod importer;
pub mod prelude;
pub mod schema;
pub mod source;
pub mod store;
pub mod transforms;
pub mod value;

// Re-export commonly used types at crate root
pub use config::ImporterConfig;
pub use entity::{Entity, EntityRef};
pub use error::{FixtureError, FixtureResult};
pub use identifier::FixtureId;
pub use importer::{Catalog, FixtureImporter, FixtureSet, ImportStats, Imported};
pub use schema::{EntitySchema, FieldKind, FieldPath, RefTarget, SchemaIntrospector, SchemaRegistry};
pub use source::{DefinitionSource, FileSystemSource, MemorySource};
pub use store::{MemoryStore, PersistenceAdapter};
pub use transforms::TransformRegistry;
pub use value::{Attributes, EntityKey, FieldValue, Placeholder, RawToken};
