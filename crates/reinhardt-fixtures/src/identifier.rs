//! Fixture identifiers.
//!
//! A fixture is addressed as `base/name`, where `base` is the entity type
//! directory (e.g. `users`) and `name` the fixture inside it (e.g. `admin`).
//! A bare `base` addresses every fixture of that type and the empty string
//! addresses the whole catalog.

use std::fmt;

use convert_case::{Case, Casing};

use crate::error::{FixtureError, FixtureResult};

/// Separator between the base and the name of an identifier.
pub const SEPARATOR: char = '/';

/// Parsed fixture identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FixtureId {
	base: String,
	name: Option<String>,
}

impl FixtureId {
	/// Identifier of the whole catalog.
	pub fn root() -> Self {
		Self::default()
	}

	/// Identifier of every fixture under `base`.
	pub fn of_base(base: impl Into<String>) -> Self {
		Self {
			base: base.into(),
			name: None,
		}
	}

	/// Identifier of a single fixture.
	pub fn new(base: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			base: base.into(),
			name: Some(name.into()),
		}
	}

	/// Parses an identifier string.
	///
	/// # Errors
	///
	/// Returns [`FixtureError::InvalidIdentifier`] when the string has more
	/// than two segments or a name without a base.
	///
	/// # Example
	///
	/// ```
	/// # use reinhardt_fixtures::FixtureId;
	/// let id = FixtureId::parse("users/admin").unwrap();
	/// assert_eq!(id.base(), "users");
	/// assert_eq!(id.name(), Some("admin"));
	/// assert!(FixtureId::parse("users/admin/extra").is_err());
	/// ```
	pub fn parse(id: &str) -> FixtureResult<Self> {
		let mut segments = id.split(SEPARATOR);
		let base = segments.next().unwrap_or_default();
		let name = segments.next().filter(|name| !name.is_empty());
		if segments.next().is_some() || (base.is_empty() && name.is_some()) {
			return Err(FixtureError::InvalidIdentifier(id.to_string()));
		}
		Ok(Self {
			base: base.to_string(),
			name: name.map(str::to_string),
		})
	}

	/// Returns the base (entity type directory). Empty for the root.
	pub fn base(&self) -> &str {
		&self.base
	}

	/// Returns the fixture name, if any.
	pub fn name(&self) -> Option<&str> {
		self.name.as_deref()
	}

	/// Returns true if this identifier addresses the whole catalog.
	pub fn is_root(&self) -> bool {
		self.base.is_empty()
	}

	/// Returns true if this identifier addresses a single fixture.
	pub fn is_fixture(&self) -> bool {
		self.name.is_some()
	}

	/// Returns the identifier of the enclosing base.
	pub fn base_id(&self) -> Self {
		Self::of_base(self.base.clone())
	}

	/// Joins a child name onto this identifier's base.
	pub fn join(&self, name: impl Into<String>) -> Self {
		Self::new(self.base.clone(), name)
	}
}

impl fmt::Display for FixtureId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.name {
			Some(name) => write!(f, "{}{}{}", self.base, SEPARATOR, name),
			None => f.write_str(&self.base),
		}
	}
}

/// Converts an entity type name to kebab case (`UserProfile` -> `user-profile`).
pub fn kebab_case(name: &str) -> String {
	name.to_case(Case::Kebab)
}
