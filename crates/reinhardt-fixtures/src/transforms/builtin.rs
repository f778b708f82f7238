//! Built-in transforms.

use async_trait::async_trait;

use super::{CustomTransform, FieldTransform, TransformContext};
use crate::error::FixtureResult;
use crate::value::{Attributes, FieldValue};

/// `<env:KEY>`: value from the configured env table or the process
/// environment, `null` when unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvTransform;

#[async_trait]
impl CustomTransform for EnvTransform {
	async fn apply(&self, token: &str, ctx: &TransformContext<'_>) -> FixtureResult<FieldValue> {
		Ok(ctx
			.config()
			.env_value(token)
			.map(FieldValue::String)
			.unwrap_or(FieldValue::Null))
	}
}

/// `<ref:base/name>`: reference to another fixture.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefTransform;

#[async_trait]
impl CustomTransform for RefTransform {
	async fn apply(&self, token: &str, ctx: &TransformContext<'_>) -> FixtureResult<FieldValue> {
		ctx.reference(token).await
	}
}

/// `<obj:base/name>`: attributes of another fixture embedded as a map.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjTransform;

#[async_trait]
impl CustomTransform for ObjTransform {
	async fn apply(&self, token: &str, ctx: &TransformContext<'_>) -> FixtureResult<FieldValue> {
		let entity = ctx.entity(token).await?;
		let mut attributes = entity.attributes();
		attributes.insert("id".to_string(), FieldValue::from(entity.pk().clone()));
		Ok(FieldValue::Map(attributes))
	}
}

/// Custom transform backed by a closure.
///
/// # Example
///
/// ```
/// # use reinhardt_fixtures::transforms::{FnTransform, TransformRegistry};
/// # use reinhardt_fixtures::FieldValue;
/// let registry = TransformRegistry::new().with_custom(
///     "upper",
///     FnTransform::new(|token, _| Ok(FieldValue::from(token.to_uppercase()))),
/// );
/// # let _ = registry;
/// ```
pub struct FnTransform<F> {
	func: F,
}

impl<F> FnTransform<F>
where
	F: Fn(&str, &TransformContext<'_>) -> FixtureResult<FieldValue> + Send + Sync,
{
	/// Wraps `func`.
	pub fn new(func: F) -> Self {
		Self { func }
	}
}

#[async_trait]
impl<F> CustomTransform for FnTransform<F>
where
	F: Fn(&str, &TransformContext<'_>) -> FixtureResult<FieldValue> + Send + Sync,
{
	async fn apply(&self, token: &str, ctx: &TransformContext<'_>) -> FixtureResult<FieldValue> {
		(self.func)(token, ctx)
	}
}

/// Splits a combined name attribute into `firstName` and `lastName`.
///
/// `"Jane van Dyke"` becomes `firstName: "Jane"`, `lastName: "van Dyke"`.
/// The source attribute is removed. Missing names are left alone so that
/// invalid fixtures still fail validation downstream.
#[derive(Debug, Clone)]
pub struct SplitNameTransform {
	field: String,
}

impl SplitNameTransform {
	/// Splits the attribute named `field`.
	pub fn new(field: impl Into<String>) -> Self {
		Self {
			field: field.into(),
		}
	}
}

#[async_trait]
impl FieldTransform for SplitNameTransform {
	async fn apply(
		&self,
		attributes: &mut Attributes,
		_ctx: &TransformContext<'_>,
	) -> FixtureResult<()> {
		let Some(FieldValue::String(name)) = attributes.get(&self.field) else {
			return Ok(());
		};
		let mut parts = name.split(' ');
		let first = parts.next().unwrap_or_default().to_string();
		let last = parts.collect::<Vec<_>>().join(" ");
		attributes.shift_remove(&self.field);
		attributes.insert("firstName".to_string(), FieldValue::String(first));
		attributes.insert("lastName".to_string(), FieldValue::String(last));
		Ok(())
	}
}

/// Fills a missing or null attribute with a fixed value.
#[derive(Debug, Clone)]
pub struct DefaultValueTransform {
	field: String,
	value: FieldValue,
}

impl DefaultValueTransform {
	/// Defaults `field` to `value`.
	pub fn new(field: impl Into<String>, value: FieldValue) -> Self {
		Self {
			field: field.into(),
			value,
		}
	}
}

#[async_trait]
impl FieldTransform for DefaultValueTransform {
	async fn apply(
		&self,
		attributes: &mut Attributes,
		_ctx: &TransformContext<'_>,
	) -> FixtureResult<()> {
		match attributes.get(&self.field) {
			None | Some(FieldValue::Null) => {
				attributes.insert(self.field.clone(), self.value.clone());
			}
			Some(_) => {}
		}
		Ok(())
	}
}

/// Field transform backed by a closure.
pub struct FnFieldTransform<F> {
	func: F,
}

impl<F> FnFieldTransform<F>
where
	F: Fn(&mut Attributes, &TransformContext<'_>) -> FixtureResult<()> + Send + Sync,
{
	/// Wraps `func`.
	pub fn new(func: F) -> Self {
		Self { func }
	}
}

#[async_trait]
impl<F> FieldTransform for FnFieldTransform<F>
where
	F: Fn(&mut Attributes, &TransformContext<'_>) -> FixtureResult<()> + Send + Sync,
{
	async fn apply(
		&self,
		attributes: &mut Attributes,
		ctx: &TransformContext<'_>,
	) -> FixtureResult<()> {
		(self.func)(attributes, ctx)
	}
}
