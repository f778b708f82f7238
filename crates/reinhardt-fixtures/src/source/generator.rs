//! Generator modules producing a whole fixture base in one batch.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;

use crate::error::FixtureResult;
use crate::identifier::{FixtureId, kebab_case};
use crate::importer::DefinitionLoader;

/// Output of a generator module.
#[derive(Debug, Clone, PartialEq)]
pub enum Generated {
	/// Definitions keyed by fixture name.
	Named(IndexMap<String, Value>),
	/// Definitions named automatically (`<entity-type>-1`, `<entity-type>-2`, ...).
	List(Vec<Value>),
}

impl Generated {
	/// Builds named output from `(name, definition)` pairs.
	pub fn named<I, K>(entries: I) -> Self
	where
		I: IntoIterator<Item = (K, Value)>,
		K: Into<String>,
	{
		Self::Named(
			entries
				.into_iter()
				.map(|(name, value)| (name.into(), value))
				.collect(),
		)
	}

	pub(crate) fn into_named(self, ids: &FixtureIdGenerator) -> IndexMap<String, Value> {
		match self {
			Self::Named(named) => named,
			Self::List(list) => list.into_iter().map(|value| (ids.next(), value)).collect(),
		}
	}
}

/// Module generating every fixture of one base.
///
/// The module is invoked at most once per importer run and its output is
/// shared by every lookup under the base.
#[async_trait]
pub trait GeneratorModule: Send + Sync {
	/// Produces the raw definitions of the base.
	async fn generate(&self, helpers: &GeneratorHelpers<'_>) -> FixtureResult<Generated>;
}

/// Adapter turning a synchronous closure into a [`GeneratorModule`].
///
/// # Example
///
/// ```
/// # use reinhardt_fixtures::source::{FnGenerator, Generated};
/// # use serde_json::json;
/// let module = FnGenerator::new(|_| {
///     Ok(Generated::List(vec![json!({"name": "Red"}), json!({"name": "Blue"})]))
/// });
/// # let _ = module;
/// ```
pub struct FnGenerator<F> {
	func: F,
}

impl<F> FnGenerator<F>
where
	F: Fn(&GeneratorHelpers<'_>) -> FixtureResult<Generated> + Send + Sync,
{
	/// Wraps `func`.
	pub fn new(func: F) -> Self {
		Self { func }
	}
}

#[async_trait]
impl<F> GeneratorModule for FnGenerator<F>
where
	F: Fn(&GeneratorHelpers<'_>) -> FixtureResult<Generated> + Send + Sync,
{
	async fn generate(&self, helpers: &GeneratorHelpers<'_>) -> FixtureResult<Generated> {
		(self.func)(helpers)
	}
}

/// Auto-increment fixture names for one base.
#[derive(Debug)]
pub(crate) struct FixtureIdGenerator {
	prefix: String,
	counter: AtomicUsize,
}

impl FixtureIdGenerator {
	pub(crate) fn new(entity_type: &str) -> Self {
		Self {
			prefix: kebab_case(entity_type),
			counter: AtomicUsize::new(0),
		}
	}

	pub(crate) fn next(&self) -> String {
		let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
		format!("{}-{}", self.prefix, n)
	}
}

/// Callbacks available to a running generator module.
pub struct GeneratorHelpers<'a> {
	pub(crate) loader: &'a DefinitionLoader,
	pub(crate) base: &'a str,
	pub(crate) ids: &'a FixtureIdGenerator,
	pub(crate) chain: &'a [String],
}

impl GeneratorHelpers<'_> {
	/// Base being generated.
	pub fn base(&self) -> &str {
		self.base
	}

	/// Issues the next auto-generated fixture name of this base.
	pub fn generate_fixture_id(&self) -> String {
		self.ids.next()
	}

	/// Loads raw, untransformed definitions of other fixtures.
	///
	/// `id` may name a base (every fixture under it) or a single fixture.
	/// For a generated base this is the module's raw output.
	///
	/// # Errors
	///
	/// Returns [`FixtureError::GeneratorError`](crate::FixtureError::GeneratorError)
	/// when the request would re-enter a module that is still generating.
	pub async fn load_definitions(&self, id: &str) -> FixtureResult<IndexMap<String, Value>> {
		let id = FixtureId::parse(id)?;
		self.loader.raw_definitions(&id, self.chain).await
	}
}
