//! Type descriptors ("silk")
//!
//! A [`Silk`] pairs a type getter with an optional validate/transform step.
//! Adapters for validation libraries only have to produce one of these; the
//! weaver reads the type and the input parser runs the validator.

use std::fmt;
use std::sync::Arc;

use async_graphql::{Name, Value};
use futures_util::future::{self, BoxFuture, FutureExt};
use serde::Serialize;

use crate::types::GraphQLType;

type TypeGetter = Arc<dyn Fn() -> GraphQLType + Send + Sync>;

/// Validate/transform step of a descriptor
pub type ValidateFn =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, Vec<Issue>>> + Send + Sync>;

/// One validation problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub message: String,
    /// Location inside the validated value, outermost first
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
}

impl Issue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: Vec::new(),
        }
    }

    /// Prepend a path segment
    pub fn at(mut self, segment: impl Into<String>) -> Self {
        self.path.insert(0, segment.into());
        self
    }

    /// GraphQL value form used in error extensions
    pub fn to_value(&self) -> Value {
        let mut entries = vec![(Name::new("message"), Value::String(self.message.clone()))];
        if !self.path.is_empty() {
            entries.push((
                Name::new("path"),
                Value::List(self.path.iter().cloned().map(Value::String).collect()),
            ));
        }
        Value::Object(entries.into_iter().collect())
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path.join("."), self.message)
        }
    }
}

/// A type descriptor
#[derive(Clone)]
pub struct Silk {
    getter: TypeGetter,
    validate: Option<ValidateFn>,
}

impl Silk {
    /// Describe a type that is already constructed
    pub fn new(ty: impl Into<GraphQLType>) -> Self {
        let ty = ty.into();
        Self {
            getter: Arc::new(move || ty.clone()),
            validate: None,
        }
    }

    /// Describe a type through a getter, for types declared later
    pub fn deferred<F>(getter: F) -> Self
    where
        F: Fn() -> GraphQLType + Send + Sync + 'static,
    {
        Self {
            getter: Arc::new(getter),
            validate: None,
        }
    }

    /// Attach an asynchronous validator, replacing any existing one
    pub fn with_validator<F, Fut>(mut self, validate: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value, Vec<Issue>>> + Send + 'static,
    {
        self.validate = Some(Arc::new(move |value: Value| validate(value).boxed()));
        self
    }

    /// Attach a synchronous validator, replacing any existing one
    pub fn with_sync_validator<F>(mut self, validate: F) -> Self
    where
        F: Fn(Value) -> Result<Value, Vec<Issue>> + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(move |value: Value| future::ready(validate(value)).boxed()));
        self
    }

    pub fn get_type(&self) -> GraphQLType {
        (self.getter)()
    }

    pub fn has_validator(&self) -> bool {
        self.validate.is_some()
    }

    /// Validate and transform a value; without a validator the value passes through
    pub async fn parse(&self, value: Value) -> Result<Value, Vec<Issue>> {
        match &self.validate {
            Some(validate) => validate(value).await,
            None => Ok(value),
        }
    }

    /// Non-null variant; null values fail before the validator runs
    pub fn non_null(&self) -> Self {
        let getter = self.getter.clone();
        let inner = self.validate.clone();
        Self {
            getter: Arc::new(move || GraphQLType::non_null(getter())),
            validate: Some(Arc::new(move |value: Value| {
                if matches!(value, Value::Null) {
                    return future::ready(Err(vec![Issue::new("Expected non-null value")])).boxed();
                }
                match &inner {
                    Some(validate) => validate(value),
                    None => future::ready(Ok(value)).boxed(),
                }
            })),
        }
    }

    /// Nullable variant; null values skip the validator
    pub fn nullable(&self) -> Self {
        let getter = self.getter.clone();
        let inner = self.validate.clone();
        Self {
            getter: Arc::new(move || getter().nullable()),
            validate: inner.map(|validate| -> ValidateFn {
                Arc::new(move |value: Value| {
                    if matches!(value, Value::Null) {
                        future::ready(Ok(Value::Null)).boxed()
                    } else {
                        validate(value)
                    }
                })
            }),
        }
    }

    /// List variant validating every item, issues carry the item index
    pub fn list(&self) -> Self {
        let getter = self.getter.clone();
        let item = self.validate.clone();
        Self {
            getter: Arc::new(move || GraphQLType::list(getter())),
            validate: item.map(|validate| -> ValidateFn {
                Arc::new(move |value: Value| {
                    let validate = validate.clone();
                    async move {
                        let items = match value {
                            Value::List(items) => items,
                            Value::Null => return Ok(Value::Null),
                            single => vec![single],
                        };

                        let mut parsed = Vec::with_capacity(items.len());
                        let mut issues = Vec::new();
                        for (index, item) in items.into_iter().enumerate() {
                            match validate(item).await {
                                Ok(value) => parsed.push(value),
                                Err(found) => issues.extend(
                                    found.into_iter().map(|issue| issue.at(index.to_string())),
                                ),
                            }
                        }

                        if issues.is_empty() {
                            Ok(Value::List(parsed))
                        } else {
                            Err(issues)
                        }
                    }
                    .boxed()
                })
            }),
        }
    }
}

impl fmt::Debug for Silk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Silk")
            .field("type", &self.get_type().to_string())
            .field("validated", &self.validate.is_some())
            .finish()
    }
}

impl From<GraphQLType> for Silk {
    fn from(ty: GraphQLType) -> Self {
        Self::new(ty)
    }
}
