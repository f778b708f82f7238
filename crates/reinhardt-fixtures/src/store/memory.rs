use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;

use super::PersistenceAdapter;
use crate::error::{FixtureError, FixtureResult};
use crate::value::{Attributes, EntityKey};

/// A write recorded by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOperation {
	/// Entity creation with the attributes as received.
	Create {
		/// Created entity.
		key: EntityKey,
		/// Attributes passed to `create`.
		attributes: Attributes,
	},
	/// Attribute update.
	Update {
		/// Updated entity.
		key: EntityKey,
		/// Attributes passed to `update`.
		attributes: Attributes,
	},
}

impl StoreOperation {
	/// Entity the operation touched.
	pub fn key(&self) -> &EntityKey {
		match self {
			Self::Create { key, .. } | Self::Update { key, .. } => key,
		}
	}
}

#[derive(Default)]
struct StoreState {
	records: IndexMap<String, (EntityKey, Attributes)>,
	sequences: HashMap<String, u64>,
	operations: Vec<StoreOperation>,
}

/// In-memory [`PersistenceAdapter`] with auto-increment primary keys.
///
/// Every write is logged, which makes it useful for dry runs and for
/// asserting the order of creations and patches.
#[derive(Default)]
pub struct MemoryStore {
	state: Mutex<StoreState>,
	failing: HashSet<String>,
}

impl MemoryStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Makes every `create` of `entity_type` fail.
	pub fn fail_on(mut self, entity_type: impl Into<String>) -> Self {
		self.failing.insert(entity_type.into());
		self
	}

	/// Current attributes of an entity.
	pub fn get(&self, key: &EntityKey) -> Option<Attributes> {
		self.state
			.lock()
			.records
			.get(&key.index_key())
			.map(|(_, attributes)| attributes.clone())
	}

	/// Every stored entity of `entity_type`, in creation order.
	pub fn records(&self, entity_type: &str) -> Vec<(EntityKey, Attributes)> {
		self.state
			.lock()
			.records
			.values()
			.filter(|(key, _)| key.entity_type == entity_type)
			.cloned()
			.collect()
	}

	/// Number of stored entities of `entity_type`.
	pub fn count(&self, entity_type: &str) -> usize {
		self.state
			.lock()
			.records
			.values()
			.filter(|(key, _)| key.entity_type == entity_type)
			.count()
	}

	/// Number of stored entities.
	pub fn len(&self) -> usize {
		self.state.lock().records.len()
	}

	/// Returns true if nothing was stored.
	pub fn is_empty(&self) -> bool {
		self.state.lock().records.is_empty()
	}

	/// Write log in execution order.
	pub fn operations(&self) -> Vec<StoreOperation> {
		self.state.lock().operations.clone()
	}
}

#[async_trait]
impl PersistenceAdapter for MemoryStore {
	async fn create(&self, entity_type: &str, attributes: &Attributes) -> FixtureResult<Value> {
		if self.failing.contains(entity_type) {
			return Err(FixtureError::PersistenceError(format!(
				"Refusing to create {}",
				entity_type
			)));
		}
		let mut state = self.state.lock();
		let sequence = state.sequences.entry(entity_type.to_string()).or_insert(0);
		*sequence += 1;
		let key = EntityKey::new(entity_type, Value::from(*sequence));
		state
			.records
			.insert(key.index_key(), (key.clone(), attributes.clone()));
		state.operations.push(StoreOperation::Create {
			key: key.clone(),
			attributes: attributes.clone(),
		});
		Ok(key.pk)
	}

	async fn update(&self, key: &EntityKey, attributes: &Attributes) -> FixtureResult<()> {
		let mut state = self.state.lock();
		let Some(record) = state.records.get_mut(&key.index_key()) else {
			return Err(FixtureError::PersistenceError(format!(
				"Cannot update missing entity {}",
				key
			)));
		};
		record.1 = attributes.clone();
		state.operations.push(StoreOperation::Update {
			key: key.clone(),
			attributes: attributes.clone(),
		});
		Ok(())
	}

	async fn is_seeded(&self) -> FixtureResult<bool> {
		Ok(!self.is_empty())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::value::FieldValue;
	use rstest::rstest;
	use serde_json::json;

	fn attrs(name: &str) -> Attributes {
		Attributes::from([("name".to_string(), FieldValue::from(name))])
	}

	#[rstest]
	#[tokio::test]
	async fn test_create_assigns_sequential_keys_per_type() {
		let store = MemoryStore::new();
		let a = store.create("User", &attrs("a")).await.unwrap();
		let b = store.create("User", &attrs("b")).await.unwrap();
		let s = store.create("Shop", &attrs("s")).await.unwrap();

		assert_eq!((a, b, s), (json!(1), json!(2), json!(1)));
		assert_eq!(store.count("User"), 2);
		assert_eq!(store.len(), 3);
	}

	#[rstest]
	#[tokio::test]
	async fn test_update_replaces_attributes() {
		let store = MemoryStore::new();
		let pk = store.create("User", &attrs("old")).await.unwrap();
		let key = EntityKey::new("User", pk);

		store.update(&key, &attrs("new")).await.unwrap();

		assert_eq!(store.get(&key), Some(attrs("new")));
		assert_eq!(store.operations().len(), 2);
		assert!(matches!(store.operations()[1], StoreOperation::Update { .. }));
	}

	#[rstest]
	#[tokio::test]
	async fn test_failures() {
		let store = MemoryStore::new().fail_on("Shop");
		assert!(matches!(
			store.create("Shop", &attrs("x")).await,
			Err(FixtureError::PersistenceError(_))
		));
		let missing = EntityKey::new("User", json!(42));
		assert!(store.update(&missing, &attrs("x")).await.is_err());
		assert!(store.is_empty());
	}
}
