//! Schema weaving
//!
//! A weave folds resolver containers into [`LoomObject`]s, walks every type
//! reachable from the roots to deduplicate and name them, then emits an
//! async-graphql dynamic schema.
//!
//! ```ignore
//! let schema = SchemaLoom::new()
//!     .add(user_resolver)
//!     .add(post_resolver)
//!     .middleware(logging)
//!     .weave()?;
//! ```

mod alias;
mod context;
mod discover;
mod object;
mod resolve;
mod schema;

use std::fmt;

pub use alias::{alias_candidate, AliasAssigner, AliasOffer};
pub use context::{InputSource, InterfaceSource, ObjectId, WeaverContext};
pub use object::{LoomField, LoomObject};
pub use schema::{weave, SchemaLoom};

use crate::types::TypeKey;

/// Identity of a materialized type, tagged with what it was materialized as
///
/// One definition can back several slots: an object can also be used as an
/// interface and as the source of a derived input object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeSlot {
    Scalar(TypeKey),
    Object(TypeKey),
    Interface(TypeKey),
    Union(TypeKey),
    Enum(TypeKey),
    Input(TypeKey),
}

impl TypeSlot {
    pub fn key(&self) -> TypeKey {
        match *self {
            Self::Scalar(key)
            | Self::Object(key)
            | Self::Interface(key)
            | Self::Union(key)
            | Self::Enum(key)
            | Self::Input(key) => key,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Object(_) => "object",
            Self::Interface(_) => "interface",
            Self::Union(_) => "union",
            Self::Enum(_) => "enum",
            Self::Input(_) => "input object",
        }
    }
}

impl fmt::Display for TypeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}
