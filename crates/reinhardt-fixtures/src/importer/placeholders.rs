//! Placeholders, the resolution record and the pending set.

use std::collections::HashMap;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::entity::EntityRef;
use crate::value::{EntityKey, Placeholder};

/// Result of settling one pending entity after a patch sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Settled {
	/// Placeholders remain; the entity stays pending.
	Unresolved,
	/// Fully resolved and removed from the pending set. `dirty` tells whether
	/// the attributes changed since creation.
	Ready { dirty: bool },
	/// Another pass already settled this entity.
	Skipped,
}

struct Pending {
	entity: EntityRef,
	dirty: bool,
}

#[derive(Default)]
struct State {
	by_key: HashMap<String, Placeholder>,
	resolved: HashMap<Placeholder, EntityKey>,
	entities: HashMap<String, EntityRef>,
	by_entity: HashMap<String, EntityRef>,
	pending: IndexMap<String, Pending>,
}

/// Issues placeholders and records which entity each key resolved to.
///
/// Keys are fixture identifiers (`users/admin`) or upload keys
/// (`file:<path>`). Resolution is monotonic: once recorded, a key keeps
/// its entity for the rest of the run.
#[derive(Default)]
pub(crate) struct PlaceholderRegistry {
	state: Mutex<State>,
}

impl PlaceholderRegistry {
	/// Placeholder of `key`, issued once and stable afterwards.
	pub(crate) fn placeholder_for(&self, key: &str) -> Placeholder {
		let mut state = self.state.lock();
		if let Some(placeholder) = state.by_key.get(key) {
			return *placeholder;
		}
		let placeholder = Placeholder::new();
		state.by_key.insert(key.to_string(), placeholder);
		if let Some(entity) = state.entities.get(key) {
			let entity_key = entity.key().clone();
			state.resolved.insert(placeholder, entity_key);
		}
		placeholder
	}

	/// Records the entity created for `key`.
	pub(crate) fn record(&self, key: &str, entity: &EntityRef) {
		let mut state = self.state.lock();
		state.entities.insert(key.to_string(), EntityRef::clone(entity));
		state
			.by_entity
			.insert(entity.key().index_key(), EntityRef::clone(entity));
		if let Some(placeholder) = state.by_key.get(key).copied() {
			state.resolved.insert(placeholder, entity.key().clone());
		}
	}

	/// Entity recorded for `key`.
	pub(crate) fn entity(&self, key: &str) -> Option<EntityRef> {
		self.state.lock().entities.get(key).cloned()
	}

	/// Entity recorded under a persisted key.
	pub(crate) fn entity_by_key(&self, key: &EntityKey) -> Option<EntityRef> {
		self.state.lock().by_entity.get(&key.index_key()).cloned()
	}

	/// Entity key a placeholder resolved to.
	pub(crate) fn lookup(&self, placeholder: &Placeholder) -> Option<EntityKey> {
		self.state.lock().resolved.get(placeholder).cloned()
	}

	/// Adds an entity holding placeholders to the pending set.
	pub(crate) fn queue(&self, key: &str, entity: &EntityRef) {
		self.state.lock().pending.insert(
			key.to_string(),
			Pending {
				entity: EntityRef::clone(entity),
				dirty: false,
			},
		);
	}

	/// Pending entities at this moment.
	pub(crate) fn pending_snapshot(&self) -> Vec<(String, EntityRef)> {
		self.state
			.lock()
			.pending
			.iter()
			.map(|(key, pending)| (key.clone(), EntityRef::clone(&pending.entity)))
			.collect()
	}

	/// Updates the pending entry of `key` after a sweep.
	pub(crate) fn settle(&self, key: &str, changed: bool, remaining: usize) -> Settled {
		let mut state = self.state.lock();
		let Some(pending) = state.pending.get_mut(key) else {
			return Settled::Skipped;
		};
		pending.dirty |= changed;
		if remaining > 0 {
			return Settled::Unresolved;
		}
		let dirty = pending.dirty;
		state.pending.shift_remove(key);
		Settled::Ready { dirty }
	}

	pub(crate) fn pending_len(&self) -> usize {
		self.state.lock().pending.len()
	}

	/// Number of placeholders issued.
	pub(crate) fn issued(&self) -> usize {
		self.state.lock().by_key.len()
	}

	pub(crate) fn clear(&self) {
		*self.state.lock() = State::default();
	}
}
