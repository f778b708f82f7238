//! Results of directory and catalog imports.

use indexmap::IndexMap;

use crate::entity::EntityRef;
use crate::identifier::SEPARATOR;
use crate::value::{Attributes, FieldValue};

/// Entities of one base keyed by fixture name.
pub type FixtureSet = IndexMap<String, EntityRef>;

/// Every imported base.
///
/// Lookups work both per base (`catalog.base("users")`) and flat by full
/// identifier (`catalog.get("users/admin")`).
#[derive(Debug, Clone, Default)]
pub struct Catalog {
	bases: IndexMap<String, FixtureSet>,
}

impl Catalog {
	pub(crate) fn insert(&mut self, base: String, set: FixtureSet) {
		self.bases.insert(base, set);
	}

	/// Entities of `base`.
	pub fn base(&self, base: &str) -> Option<&FixtureSet> {
		self.bases.get(base)
	}

	/// Entity of a full identifier (`users/admin`).
	pub fn get(&self, id: &str) -> Option<&EntityRef> {
		let (base, name) = id.split_once(SEPARATOR)?;
		self.bases.get(base)?.get(name)
	}

	/// Imported bases.
	pub fn bases(&self) -> impl Iterator<Item = &str> {
		self.bases.keys().map(String::as_str)
	}

	/// Every entity keyed by full identifier.
	pub fn flatten(&self) -> IndexMap<String, EntityRef> {
		self.bases
			.iter()
			.flat_map(|(base, set)| {
				set.iter()
					.map(move |(name, entity)| (format!("{}{}{}", base, SEPARATOR, name), EntityRef::clone(entity)))
			})
			.collect()
	}

	/// Number of entities.
	pub fn len(&self) -> usize {
		self.bases.values().map(IndexMap::len).sum()
	}

	/// Returns true if no entity was imported.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// Result of [`FixtureImporter::import`](crate::FixtureImporter::import).
#[derive(Debug, Clone)]
pub enum Imported {
	/// A single fixture.
	One(EntityRef),
	/// Every fixture of a base.
	Base(FixtureSet),
	/// The whole catalog.
	All(Catalog),
}

impl Imported {
	/// The entity, if a single fixture was imported.
	pub fn entity(self) -> Option<EntityRef> {
		match self {
			Self::One(entity) => Some(entity),
			_ => None,
		}
	}

	/// The fixture set, if a base was imported.
	pub fn set(self) -> Option<FixtureSet> {
		match self {
			Self::Base(set) => Some(set),
			_ => None,
		}
	}

	/// Reference value: a key for one entity, maps of keys otherwise.
	pub fn into_field_value(self) -> FieldValue {
		fn set_value(set: &FixtureSet) -> FieldValue {
			FieldValue::Map(
				set.iter()
					.map(|(name, entity)| (name.clone(), FieldValue::Ref(entity.key().clone())))
					.collect::<Attributes>(),
			)
		}
		match self {
			Self::One(entity) => FieldValue::Ref(entity.key().clone()),
			Self::Base(set) => set_value(&set),
			Self::All(catalog) => FieldValue::Map(
				catalog
					.bases
					.iter()
					.map(|(base, set)| (base.clone(), set_value(set)))
					.collect(),
			),
		}
	}
}
