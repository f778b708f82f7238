//! Persisted entity handles.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::value::{Attributes, EntityKey, FieldValue, Placeholder};

/// Shared handle to an imported entity.
pub type EntityRef = Arc<Entity>;

/// An entity created through the persistence adapter.
///
/// The attribute bag is behind a lock because the deferred patch pass
/// replaces placeholders after the entity has been handed out.
#[derive(Debug)]
pub struct Entity {
	key: EntityKey,
	fixture: String,
	attributes: RwLock<Attributes>,
}

impl Entity {
	pub(crate) fn new(key: EntityKey, fixture: impl Into<String>, attributes: Attributes) -> Self {
		Self {
			key,
			fixture: fixture.into(),
			attributes: RwLock::new(attributes),
		}
	}

	/// Foreign key of this entity.
	pub fn key(&self) -> &EntityKey {
		&self.key
	}

	/// Primary key assigned by the persistence adapter.
	pub fn pk(&self) -> &Value {
		&self.key.pk
	}

	/// Entity type name.
	pub fn entity_type(&self) -> &str {
		&self.key.entity_type
	}

	/// Identifier of the fixture this entity was created from.
	pub fn fixture(&self) -> &str {
		&self.fixture
	}

	/// Snapshot of the current attributes.
	pub fn attributes(&self) -> Attributes {
		self.attributes.read().clone()
	}

	/// Returns a single attribute.
	pub fn get(&self, field: &str) -> Option<FieldValue> {
		self.attributes.read().get(field).cloned()
	}

	/// Returns true while any attribute still holds a placeholder.
	pub fn has_placeholders(&self) -> bool {
		self.attributes
			.read()
			.values()
			.any(FieldValue::has_placeholders)
	}

	/// Replaces resolvable placeholders in place. Returns `(changed, remaining)`.
	pub(crate) fn patch_placeholders<F>(&self, lookup: &F) -> (bool, usize)
	where
		F: Fn(&Placeholder) -> Option<EntityKey>,
	{
		let mut attributes = self.attributes.write();
		attributes
			.values_mut()
			.map(|value| value.resolve_placeholders(lookup))
			.fold((false, 0), |acc, next| (acc.0 || next.0, acc.1 + next.1))
	}
}
