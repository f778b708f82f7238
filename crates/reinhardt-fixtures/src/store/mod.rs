//! Persistence of imported entities.

mod memory;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FixtureResult;
use crate::value::{Attributes, EntityKey};

pub use memory::{MemoryStore, StoreOperation};

/// Adapter creating and updating entities in a backing store.
///
/// Attributes may still contain [`FieldValue::Placeholder`](crate::FieldValue::Placeholder)
/// values on `create`; the importer calls `update` once they resolve.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
	/// Creates an entity and returns its primary key.
	///
	/// # Arguments
	///
	/// * `entity_type` - Entity type name (e.g., "User")
	/// * `attributes` - Fully transformed attributes
	async fn create(&self, entity_type: &str, attributes: &Attributes) -> FixtureResult<Value>;

	/// Replaces the attributes of an existing entity.
	async fn update(&self, key: &EntityKey, attributes: &Attributes) -> FixtureResult<()>;

	/// Returns true if the store already holds imported fixtures.
	///
	/// Used by [`FixtureImporter::load_unless_seeded`](crate::FixtureImporter::load_unless_seeded).
	/// Defaults to `false`, so every run imports.
	async fn is_seeded(&self) -> FixtureResult<bool> {
		Ok(false)
	}
}
