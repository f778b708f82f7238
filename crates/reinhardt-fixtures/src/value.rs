//! Attribute values flowing through the importer.
//!
//! Raw definitions are plain [`serde_json::Value`] trees. While importing
//! they are classified into [`RawToken`]s and transformed into
//! [`FieldValue`]s, which may additionally hold binary content, references
//! to persisted entities and placeholders for entities not created yet.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::{Map, Number, Value};
use uuid::Uuid;

/// Ordered attribute bag of an entity.
pub type Attributes = IndexMap<String, FieldValue>;

/// Strings naming a file next to the fixture definition.
static FILE_TOKEN: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r"\.(jpg|png|svg|gif|webp|mp3|mp4|md|txt|html|pdf|csv)$").unwrap()
});

/// `<func:token>` custom transform syntax.
static CUSTOM_TOKEN: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^<(?P<func>\w+):(?P<token>.+)>$").unwrap());

/// Opaque stand-in for an entity that has not been created yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placeholder(Uuid);

impl Placeholder {
	/// Issues a fresh placeholder.
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}

	/// Returns the underlying token.
	pub fn as_uuid(&self) -> &Uuid {
		&self.0
	}
}

impl Default for Placeholder {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for Placeholder {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Foreign key of a persisted entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityKey {
	/// Entity type the persistence adapter created the entity as.
	pub entity_type: String,
	/// Primary key assigned by the persistence adapter.
	pub pk: Value,
}

impl EntityKey {
	/// Creates a new entity key.
	pub fn new(entity_type: impl Into<String>, pk: Value) -> Self {
		Self {
			entity_type: entity_type.into(),
			pk,
		}
	}

	/// Primary key rendered for URLs and log lines.
	pub fn pk_string(&self) -> String {
		match &self.pk {
			Value::String(s) => s.clone(),
			other => other.to_string(),
		}
	}

	pub(crate) fn index_key(&self) -> String {
		format!("{}#{}", self.entity_type, self.pk)
	}
}

impl fmt::Display for EntityKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}({})", self.entity_type, self.pk_string())
	}
}

/// A transformed attribute value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
	/// Absent value.
	#[default]
	Null,
	/// Boolean.
	Bool(bool),
	/// Number.
	Number(Number),
	/// Text.
	String(String),
	/// Raw file content.
	Bytes(Vec<u8>),
	/// Ordered list.
	List(Vec<FieldValue>),
	/// Nested attribute map.
	Map(Attributes),
	/// Reference to a persisted entity.
	Ref(EntityKey),
	/// Reference to an entity that does not exist yet.
	Placeholder(Placeholder),
}

impl FieldValue {
	/// Returns the string content, if this is a string.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(s) => Some(s),
			_ => None,
		}
	}

	/// Returns the referenced entity key, if this is a resolved reference.
	pub fn as_entity_key(&self) -> Option<&EntityKey> {
		match self {
			Self::Ref(key) => Some(key),
			_ => None,
		}
	}

	/// Returns the placeholder, if this value is one.
	pub fn as_placeholder(&self) -> Option<Placeholder> {
		match self {
			Self::Placeholder(placeholder) => Some(*placeholder),
			_ => None,
		}
	}

	/// Returns true if a placeholder appears anywhere in this value.
	pub fn has_placeholders(&self) -> bool {
		match self {
			Self::Placeholder(_) => true,
			Self::List(items) => items.iter().any(Self::has_placeholders),
			Self::Map(map) => map.values().any(Self::has_placeholders),
			_ => false,
		}
	}

	/// Replaces every placeholder `lookup` can resolve with the resolved key.
	///
	/// Returns `(changed, remaining)`: whether anything was replaced and how
	/// many placeholders are still unresolved.
	pub fn resolve_placeholders<F>(&mut self, lookup: &F) -> (bool, usize)
	where
		F: Fn(&Placeholder) -> Option<EntityKey>,
	{
		match self {
			Self::Placeholder(placeholder) => match lookup(placeholder) {
				Some(key) => {
					*self = Self::Ref(key);
					(true, 0)
				}
				None => (false, 1),
			},
			Self::List(items) => items
				.iter_mut()
				.map(|item| item.resolve_placeholders(lookup))
				.fold((false, 0), |acc, next| (acc.0 || next.0, acc.1 + next.1)),
			Self::Map(map) => map
				.values_mut()
				.map(|item| item.resolve_placeholders(lookup))
				.fold((false, 0), |acc, next| (acc.0 || next.0, acc.1 + next.1)),
			_ => (false, 0),
		}
	}

	/// Converts to plain JSON: references become their primary key,
	/// placeholders their token and bytes a base64 string.
	pub fn to_json(&self) -> Value {
		match self {
			Self::Null => Value::Null,
			Self::Bool(b) => Value::Bool(*b),
			Self::Number(n) => Value::Number(n.clone()),
			Self::String(s) => Value::String(s.clone()),
			Self::Bytes(bytes) => Value::String(BASE64.encode(bytes)),
			Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
			Self::Map(map) => Value::Object(
				map.iter()
					.map(|(key, value)| (key.clone(), value.to_json()))
					.collect(),
			),
			Self::Ref(key) => key.pk.clone(),
			Self::Placeholder(placeholder) => Value::String(placeholder.to_string()),
		}
	}
}

impl From<Value> for FieldValue {
	fn from(value: Value) -> Self {
		match value {
			Value::Null => Self::Null,
			Value::Bool(b) => Self::Bool(b),
			Value::Number(n) => Self::Number(n),
			Value::String(s) => Self::String(s),
			Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
			Value::Object(map) => Self::Map(
				map.into_iter()
					.map(|(key, value)| (key, Self::from(value)))
					.collect(),
			),
		}
	}
}

impl From<&Value> for FieldValue {
	fn from(value: &Value) -> Self {
		Self::from(value.clone())
	}
}

impl From<&str> for FieldValue {
	fn from(value: &str) -> Self {
		Self::String(value.to_string())
	}
}

impl From<String> for FieldValue {
	fn from(value: String) -> Self {
		Self::String(value)
	}
}

impl From<bool> for FieldValue {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<i64> for FieldValue {
	fn from(value: i64) -> Self {
		Self::Number(value.into())
	}
}

impl From<EntityKey> for FieldValue {
	fn from(key: EntityKey) -> Self {
		Self::Ref(key)
	}
}

impl Serialize for FieldValue {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		match self {
			Self::Null => serializer.serialize_unit(),
			Self::Bool(b) => serializer.serialize_bool(*b),
			Self::Number(n) => n.serialize(serializer),
			Self::String(s) => serializer.serialize_str(s),
			Self::Bytes(bytes) => serializer.serialize_str(&BASE64.encode(bytes)),
			Self::List(items) => {
				let mut seq = serializer.serialize_seq(Some(items.len()))?;
				for item in items {
					seq.serialize_element(item)?;
				}
				seq.end()
			}
			Self::Map(attributes) => {
				let mut map = serializer.serialize_map(Some(attributes.len()))?;
				for (key, value) in attributes {
					map.serialize_entry(key, value)?;
				}
				map.end()
			}
			Self::Ref(key) => key.pk.serialize(serializer),
			Self::Placeholder(placeholder) => serializer.collect_str(placeholder),
		}
	}
}

/// Classification of a raw definition value, driving how it is transformed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawToken<'a> {
	/// Null, boolean or number.
	Scalar(&'a Value),
	/// Ordered list.
	List(&'a [Value]),
	/// Nested mapping.
	Map(&'a Map<String, Value>),
	/// File next to the definition (`avatar.png`, `about.md`).
	File(&'a str),
	/// Custom transform invocation (`<env:ADMIN_EMAIL>`).
	Custom {
		/// Registered transform name.
		name: &'a str,
		/// Payload passed to the transform.
		token: &'a str,
	},
	/// Any other string; a symbolic identifier when it sits in a reference field.
	Text(&'a str),
}

impl<'a> RawToken<'a> {
	/// Classifies a raw value.
	///
	/// # Example
	///
	/// ```
	/// # use reinhardt_fixtures::RawToken;
	/// # use serde_json::json;
	/// let value = json!("<env:ADMIN_EMAIL>");
	/// assert_eq!(
	///     RawToken::classify(&value),
	///     RawToken::Custom { name: "env", token: "ADMIN_EMAIL" }
	/// );
	/// ```
	pub fn classify(value: &'a Value) -> Self {
		match value {
			Value::Array(items) => Self::List(items),
			Value::Object(map) => Self::Map(map),
			Value::String(s) => Self::classify_str(s),
			scalar => Self::Scalar(scalar),
		}
	}

	fn classify_str(s: &'a str) -> Self {
		if FILE_TOKEN.is_match(s) {
			return Self::File(s);
		}
		if let Some(captures) = CUSTOM_TOKEN.captures(s)
			&& let (Some(name), Some(token)) = (captures.name("func"), captures.name("token"))
		{
			return Self::Custom {
				name: name.as_str(),
				token: token.as_str(),
			};
		}
		Self::Text(s)
	}

	/// Returns true for lists and maps.
	pub fn is_container(&self) -> bool {
		matches!(self, Self::List(_) | Self::Map(_))
	}
}
