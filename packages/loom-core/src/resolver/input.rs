use std::fmt;
use std::sync::Arc;

use async_graphql::{Error, ErrorExtensions, Name, Value};
use indexmap::IndexMap;
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::ResolveResult;
use crate::silk::{Issue, Silk};

/// How an operation takes its arguments
#[derive(Clone, Default)]
pub enum InputShape {
    /// No arguments
    #[default]
    None,
    /// The whole argument object goes through one descriptor
    Single(Silk),
    /// One argument per entry
    Record(IndexMap<String, Silk>),
}

impl fmt::Debug for InputShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Single(silk) => f.debug_tuple("Single").field(silk).finish(),
            Self::Record(args) => f.debug_map().entries(args.iter()).finish(),
        }
    }
}

type ParseResult = Result<Value, Vec<Issue>>;

/// Lazily validated input of one resolution
///
/// Validation runs on the first [`get_result`](Self::get_result) and is
/// shared by every clone, so middlewares and the resolver see the same
/// outcome without validating twice.
#[derive(Clone)]
pub struct InputParser {
    shape: InputShape,
    raw: Value,
    result: Arc<Mutex<Option<ParseResult>>>,
}

impl InputParser {
    pub fn new(shape: InputShape, raw: Value) -> Self {
        Self {
            shape,
            raw,
            result: Arc::new(Mutex::new(None)),
        }
    }

    /// Arguments as sent by the client
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn shape(&self) -> &InputShape {
        &self.shape
    }

    /// Validate once and return the outcome
    pub async fn get_result(&self) -> ParseResult {
        let mut result = self.result.lock().await;
        if let Some(parsed) = result.as_ref() {
            return parsed.clone();
        }

        let parsed = parse_shape(&self.shape, self.raw.clone()).await;
        *result = Some(parsed.clone());
        parsed
    }

    /// Override the outcome for everything that reads it afterwards
    pub async fn set_result(&self, parsed: ParseResult) {
        *self.result.lock().await = Some(parsed);
    }

    /// The validated value, with issues turned into a field error
    pub async fn value(&self) -> ResolveResult<Value> {
        self.get_result().await.map_err(validation_error)
    }
}

impl fmt::Debug for InputParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputParser")
            .field("shape", &self.shape)
            .field("raw", &self.raw)
            .finish_non_exhaustive()
    }
}

async fn parse_shape(shape: &InputShape, raw: Value) -> ParseResult {
    match shape {
        InputShape::None => Ok(raw),
        InputShape::Single(silk) => silk.parse(raw).await,
        InputShape::Record(args) => {
            let mut provided = match raw {
                Value::Object(object) => object,
                _ => Default::default(),
            };

            let mut parsed = Vec::with_capacity(args.len());
            let mut issues = Vec::new();
            for (name, silk) in args {
                let value = provided.swap_remove(name.as_str()).unwrap_or(Value::Null);
                match silk.parse(value).await {
                    Ok(value) => parsed.push((Name::new(name), value)),
                    Err(found) => issues.extend(found.into_iter().map(|issue| issue.at(name.clone()))),
                }
            }

            if issues.is_empty() {
                Ok(Value::Object(parsed.into_iter().collect()))
            } else {
                Err(issues)
            }
        }
    }
}

fn validation_error(issues: Vec<Issue>) -> Error {
    warn!(issues = issues.len(), "input validation failed");

    let message = issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");

    Error::new(message).extend_with(|_, e| {
        e.set("code", "VALIDATION_FAILED");
        e.set("issues", Value::List(issues.iter().map(Issue::to_value).collect()));
    })
}
