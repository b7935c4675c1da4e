//! GraphQL type definitions consumed by the weaver
//!
//! Every named definition is reference counted and its `Arc` pointer is its
//! identity. The weaver deduplicates by that identity, never by structure, so
//! two definitions built separately stay distinct even when they look alike.
//!
//! Field maps and union members are read through thunks so self-referential
//! and mutually recursive types can be declared before all of them exist.

use std::fmt;
use std::sync::Arc;

use async_graphql::Value;
use indexmap::IndexMap;

type Thunk<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// Hook choosing the concrete object type of an abstract value
pub type ResolveTypeFn = Arc<dyn Fn(&Value) -> Option<ObjectType> + Send + Sync>;

/// Identity of a named type definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(usize);

impl TypeKey {
    fn of<T>(inner: &Arc<T>) -> Self {
        Self(Arc::as_ptr(inner) as usize)
    }
}

/// Names of the built-in scalars
pub const BUILTIN_SCALARS: [&str; 5] = ["String", "Int", "Float", "Boolean", "ID"];

// ==================== Scalars ====================

#[derive(Debug)]
struct ScalarInner {
    name: String,
    description: Option<String>,
}

/// A leaf type
#[derive(Debug, Clone)]
pub struct ScalarType {
    inner: Arc<ScalarInner>,
}

impl ScalarType {
    /// Create a custom scalar
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ScalarInner {
                name: name.into(),
                description: None,
            }),
        }
    }

    /// Create a custom scalar with a description
    pub fn with_description(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ScalarInner {
                name: name.into(),
                description: Some(description.into()),
            }),
        }
    }

    pub fn string() -> Self {
        Self::new("String")
    }

    pub fn int() -> Self {
        Self::new("Int")
    }

    pub fn float() -> Self {
        Self::new("Float")
    }

    pub fn boolean() -> Self {
        Self::new("Boolean")
    }

    pub fn id() -> Self {
        Self::new("ID")
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn description(&self) -> Option<&str> {
        self.inner.description.as_deref()
    }

    /// Whether this is one of the five scalars every schema has
    pub fn is_builtin(&self) -> bool {
        BUILTIN_SCALARS.contains(&self.name())
    }

    pub fn key(&self) -> TypeKey {
        TypeKey::of(&self.inner)
    }
}

// ==================== Fields ====================

/// A field of an object or interface definition
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub ty: GraphQLType,
    pub description: Option<String>,
    pub deprecation: Option<String>,
    /// Raw fields this field is computed from
    pub derived_from: Vec<String>,
}

impl FieldDef {
    pub fn new(ty: impl Into<GraphQLType>) -> Self {
        Self {
            ty: ty.into(),
            description: None,
            deprecation: None,
            derived_from: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn deprecated(mut self, reason: impl Into<String>) -> Self {
        self.deprecation = Some(reason.into());
        self
    }

    /// Declare the raw fields this field needs
    pub fn derived_from<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.derived_from = fields.into_iter().map(Into::into).collect();
        self
    }
}

impl<T: Into<GraphQLType>> From<T> for FieldDef {
    fn from(ty: T) -> Self {
        Self::new(ty)
    }
}

/// A field of an input object definition
#[derive(Clone)]
pub struct InputFieldDef {
    pub ty: GraphQLType,
    pub description: Option<String>,
    pub default_value: Option<Value>,
}

impl InputFieldDef {
    pub fn new(ty: impl Into<GraphQLType>) -> Self {
        Self {
            ty: ty.into(),
            description: None,
            default_value: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

enum FieldSource<F> {
    Static(IndexMap<String, F>),
    Lazy(Thunk<IndexMap<String, F>>),
}

impl<F: Clone> FieldSource<F> {
    fn resolve(&self) -> IndexMap<String, F> {
        match self {
            Self::Static(fields) => fields.clone(),
            Self::Lazy(thunk) => thunk(),
        }
    }
}

// ==================== Objects ====================

struct ObjectInner {
    name: Option<String>,
    description: Option<String>,
    fields: FieldSource<FieldDef>,
    interfaces: Vec<GraphQLType>,
}

/// A composite output type
#[derive(Clone)]
pub struct ObjectType {
    inner: Arc<ObjectInner>,
}

impl ObjectType {
    /// Start building a named object
    pub fn builder(name: impl Into<String>) -> ObjectTypeBuilder {
        ObjectTypeBuilder::new(Some(name.into()))
    }

    /// Start building an object whose name is assigned while weaving
    pub fn anonymous() -> ObjectTypeBuilder {
        ObjectTypeBuilder::new(None)
    }

    /// A named object with no fields of its own
    pub fn empty(name: impl Into<String>) -> Self {
        Self::builder(name).build()
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.inner.description.as_deref()
    }

    /// The object's own fields, in declaration order
    pub fn fields(&self) -> IndexMap<String, FieldDef> {
        self.inner.fields.resolve()
    }

    pub fn interfaces(&self) -> &[GraphQLType] {
        &self.inner.interfaces
    }

    pub fn key(&self) -> TypeKey {
        TypeKey::of(&self.inner)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectType")
            .field("name", &self.inner.name)
            .field("key", &self.key())
            .finish()
    }
}

/// Builder for [`ObjectType`]
pub struct ObjectTypeBuilder {
    name: Option<String>,
    description: Option<String>,
    fields: IndexMap<String, FieldDef>,
    lazy: Option<Thunk<IndexMap<String, FieldDef>>>,
    interfaces: Vec<GraphQLType>,
}

impl ObjectTypeBuilder {
    fn new(name: Option<String>) -> Self {
        Self {
            name,
            description: None,
            fields: IndexMap::new(),
            lazy: None,
            interfaces: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, field: impl Into<FieldDef>) -> Self {
        self.fields.insert(name.into(), field.into());
        self
    }

    /// Supply fields through a thunk evaluated while weaving
    ///
    /// Eagerly added fields come first, the thunk's fields after them.
    pub fn lazy_fields<F>(mut self, thunk: F) -> Self
    where
        F: Fn() -> IndexMap<String, FieldDef> + Send + Sync + 'static,
    {
        self.lazy = Some(Arc::new(thunk));
        self
    }

    /// Implement an interface (an interface type or an object used as one)
    pub fn implements(mut self, interface: impl Into<GraphQLType>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn build(self) -> ObjectType {
        let fields = match self.lazy {
            None => FieldSource::Static(self.fields),
            Some(thunk) => {
                let eager = self.fields;
                FieldSource::Lazy(Arc::new(move || {
                    let mut fields = eager.clone();
                    fields.extend(thunk());
                    fields
                }))
            }
        };

        ObjectType {
            inner: Arc::new(ObjectInner {
                name: self.name,
                description: self.description,
                fields,
                interfaces: self.interfaces,
            }),
        }
    }
}

// ==================== Interfaces ====================

struct InterfaceInner {
    name: String,
    description: Option<String>,
    fields: FieldSource<FieldDef>,
    resolve_type: Option<ResolveTypeFn>,
}

/// An abstract output type implemented by objects
#[derive(Clone)]
pub struct InterfaceType {
    inner: Arc<InterfaceInner>,
}

impl InterfaceType {
    pub fn builder(name: impl Into<String>) -> InterfaceTypeBuilder {
        InterfaceTypeBuilder {
            name: name.into(),
            description: None,
            fields: IndexMap::new(),
            lazy: None,
            resolve_type: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn description(&self) -> Option<&str> {
        self.inner.description.as_deref()
    }

    pub fn fields(&self) -> IndexMap<String, FieldDef> {
        self.inner.fields.resolve()
    }

    pub fn resolve_type(&self) -> Option<&ResolveTypeFn> {
        self.inner.resolve_type.as_ref()
    }

    pub fn key(&self) -> TypeKey {
        TypeKey::of(&self.inner)
    }
}

impl fmt::Debug for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceType")
            .field("name", &self.inner.name)
            .finish()
    }
}

/// Builder for [`InterfaceType`]
pub struct InterfaceTypeBuilder {
    name: String,
    description: Option<String>,
    fields: IndexMap<String, FieldDef>,
    lazy: Option<Thunk<IndexMap<String, FieldDef>>>,
    resolve_type: Option<ResolveTypeFn>,
}

impl InterfaceTypeBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, field: impl Into<FieldDef>) -> Self {
        self.fields.insert(name.into(), field.into());
        self
    }

    pub fn lazy_fields<F>(mut self, thunk: F) -> Self
    where
        F: Fn() -> IndexMap<String, FieldDef> + Send + Sync + 'static,
    {
        self.lazy = Some(Arc::new(thunk));
        self
    }

    /// Choose the concrete object for a resolved value
    ///
    /// Without a hook the value's `__typename` entry is used.
    pub fn resolve_type<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Value) -> Option<ObjectType> + Send + Sync + 'static,
    {
        self.resolve_type = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> InterfaceType {
        let fields = match self.lazy {
            None => FieldSource::Static(self.fields),
            Some(thunk) => {
                let eager = self.fields;
                FieldSource::Lazy(Arc::new(move || {
                    let mut fields = eager.clone();
                    fields.extend(thunk());
                    fields
                }))
            }
        };

        InterfaceType {
            inner: Arc::new(InterfaceInner {
                name: self.name,
                description: self.description,
                fields,
                resolve_type: self.resolve_type,
            }),
        }
    }
}

// ==================== Unions ====================

struct UnionInner {
    name: Option<String>,
    description: Option<String>,
    members: Thunk<Vec<ObjectType>>,
    resolve_type: Option<ResolveTypeFn>,
}

/// An abstract output type over a closed set of objects
#[derive(Clone)]
pub struct UnionType {
    inner: Arc<UnionInner>,
}

impl UnionType {
    /// Create a named union
    pub fn new<I>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = ObjectType>,
    {
        Self::build(Some(name.into()), None, members.into_iter().collect(), None)
    }

    /// Create a union whose name is assigned while weaving
    pub fn anonymous<I>(members: I) -> Self
    where
        I: IntoIterator<Item = ObjectType>,
    {
        Self::build(None, None, members.into_iter().collect(), None)
    }

    /// Create a union whose members are read lazily
    pub fn lazy<F>(name: impl Into<String>, members: F) -> Self
    where
        F: Fn() -> Vec<ObjectType> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(UnionInner {
                name: Some(name.into()),
                description: None,
                members: Arc::new(members),
                resolve_type: None,
            }),
        }
    }

    fn build(
        name: Option<String>,
        description: Option<String>,
        members: Vec<ObjectType>,
        resolve_type: Option<ResolveTypeFn>,
    ) -> Self {
        Self {
            inner: Arc::new(UnionInner {
                name,
                description,
                members: Arc::new(move || members.clone()),
                resolve_type,
            }),
        }
    }

    /// Copy of this union with a description; the copy is a distinct type
    pub fn with_description(&self, description: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(UnionInner {
                name: self.inner.name.clone(),
                description: Some(description.into()),
                members: self.inner.members.clone(),
                resolve_type: self.inner.resolve_type.clone(),
            }),
        }
    }

    /// Copy of this union with a type resolution hook; the copy is a distinct type
    pub fn with_resolve_type<F>(&self, hook: F) -> Self
    where
        F: Fn(&Value) -> Option<ObjectType> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(UnionInner {
                name: self.inner.name.clone(),
                description: self.inner.description.clone(),
                members: self.inner.members.clone(),
                resolve_type: Some(Arc::new(hook)),
            }),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.inner.description.as_deref()
    }

    pub fn members(&self) -> Vec<ObjectType> {
        (self.inner.members)()
    }

    pub fn resolve_type(&self) -> Option<&ResolveTypeFn> {
        self.inner.resolve_type.as_ref()
    }

    pub fn key(&self) -> TypeKey {
        TypeKey::of(&self.inner)
    }
}

impl fmt::Debug for UnionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnionType")
            .field("name", &self.inner.name)
            .finish()
    }
}

// ==================== Enums ====================

#[derive(Debug)]
struct EnumInner {
    name: Option<String>,
    description: Option<String>,
    values: IndexMap<String, Option<String>>,
}

/// A leaf type with a fixed set of values
#[derive(Debug, Clone)]
pub struct EnumType {
    inner: Arc<EnumInner>,
}

impl EnumType {
    /// Create a named enum from its values
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::build(Some(name.into()), values)
    }

    /// Create an enum whose name is assigned while weaving
    pub fn anonymous<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::build(None, values)
    }

    fn build<I, S>(name: Option<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: Arc::new(EnumInner {
                name,
                description: None,
                values: values.into_iter().map(|v| (v.into(), None)).collect(),
            }),
        }
    }

    /// Copy with a description and per-value descriptions; the copy is a distinct type
    pub fn describe<I, K, D>(&self, description: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = (K, D)>,
        K: Into<String>,
        D: Into<String>,
    {
        let mut described = self.inner.values.clone();
        for (value, text) in values {
            described.insert(value.into(), Some(text.into()));
        }
        Self {
            inner: Arc::new(EnumInner {
                name: self.inner.name.clone(),
                description: Some(description.into()),
                values: described,
            }),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.inner.description.as_deref()
    }

    /// Values with their optional descriptions
    pub fn values(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.inner
            .values
            .iter()
            .map(|(value, description)| (value.as_str(), description.as_deref()))
    }

    pub fn key(&self) -> TypeKey {
        TypeKey::of(&self.inner)
    }
}

// ==================== Input objects ====================

struct InputObjectInner {
    name: String,
    description: Option<String>,
    fields: FieldSource<InputFieldDef>,
}

/// A composite input type
#[derive(Clone)]
pub struct InputObjectType {
    inner: Arc<InputObjectInner>,
}

impl InputObjectType {
    pub fn builder(name: impl Into<String>) -> InputObjectTypeBuilder {
        InputObjectTypeBuilder {
            name: name.into(),
            description: None,
            fields: IndexMap::new(),
            lazy: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn description(&self) -> Option<&str> {
        self.inner.description.as_deref()
    }

    pub fn fields(&self) -> IndexMap<String, InputFieldDef> {
        self.inner.fields.resolve()
    }

    pub fn key(&self) -> TypeKey {
        TypeKey::of(&self.inner)
    }
}

impl fmt::Debug for InputObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputObjectType")
            .field("name", &self.inner.name)
            .finish()
    }
}

/// Builder for [`InputObjectType`]
pub struct InputObjectTypeBuilder {
    name: String,
    description: Option<String>,
    fields: IndexMap<String, InputFieldDef>,
    lazy: Option<Thunk<IndexMap<String, InputFieldDef>>>,
}

impl InputObjectTypeBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, field: impl Into<InputFieldDef>) -> Self {
        self.fields.insert(name.into(), field.into());
        self
    }

    pub fn lazy_fields<F>(mut self, thunk: F) -> Self
    where
        F: Fn() -> IndexMap<String, InputFieldDef> + Send + Sync + 'static,
    {
        self.lazy = Some(Arc::new(thunk));
        self
    }

    pub fn build(self) -> InputObjectType {
        let fields = match self.lazy {
            None => FieldSource::Static(self.fields),
            Some(thunk) => {
                let eager = self.fields;
                FieldSource::Lazy(Arc::new(move || {
                    let mut fields = eager.clone();
                    fields.extend(thunk());
                    fields
                }))
            }
        };

        InputObjectType {
            inner: Arc::new(InputObjectInner {
                name: self.name,
                description: self.description,
                fields,
            }),
        }
    }
}

impl<T: Into<GraphQLType>> From<T> for InputFieldDef {
    fn from(ty: T) -> Self {
        Self::new(ty)
    }
}

// ==================== Type references ====================

/// Any type the weaver understands, possibly wrapped in list/non-null
#[derive(Clone, Debug)]
pub enum GraphQLType {
    Scalar(ScalarType),
    Object(ObjectType),
    Interface(InterfaceType),
    Union(UnionType),
    Enum(EnumType),
    InputObject(InputObjectType),
    List(Box<GraphQLType>),
    NonNull(Box<GraphQLType>),
}

impl GraphQLType {
    /// Wrap in non-null; already non-null types are returned unchanged
    pub fn non_null(ty: impl Into<GraphQLType>) -> Self {
        match ty.into() {
            already @ Self::NonNull(_) => already,
            other => Self::NonNull(Box::new(other)),
        }
    }

    pub fn list(ty: impl Into<GraphQLType>) -> Self {
        Self::List(Box::new(ty.into()))
    }

    /// Strip one outer non-null wrapper if present
    pub fn nullable(self) -> Self {
        match self {
            Self::NonNull(inner) => *inner,
            other => other,
        }
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, Self::NonNull(_))
    }

    /// The named type under all wrappers
    pub fn named(&self) -> &GraphQLType {
        match self {
            Self::List(inner) | Self::NonNull(inner) => inner.named(),
            named => named,
        }
    }

    /// Name of the named type under all wrappers, if it has one
    pub fn name(&self) -> Option<&str> {
        match self.named() {
            Self::Scalar(ty) => Some(ty.name()),
            Self::Object(ty) => ty.name(),
            Self::Interface(ty) => Some(ty.name()),
            Self::Union(ty) => ty.name(),
            Self::Enum(ty) => ty.name(),
            Self::InputObject(ty) => Some(ty.name()),
            Self::List(_) | Self::NonNull(_) => None,
        }
    }

    /// The object under all wrappers, if this is an object type
    pub fn as_object(&self) -> Option<&ObjectType> {
        match self.named() {
            Self::Object(ty) => Some(ty),
            _ => None,
        }
    }
}

impl fmt::Display for GraphQLType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List(inner) => write!(f, "[{inner}]"),
            Self::NonNull(inner) => write!(f, "{inner}!"),
            named => write!(f, "{}", named.name().unwrap_or("<anonymous>")),
        }
    }
}

impl From<ScalarType> for GraphQLType {
    fn from(ty: ScalarType) -> Self {
        Self::Scalar(ty)
    }
}

impl From<ObjectType> for GraphQLType {
    fn from(ty: ObjectType) -> Self {
        Self::Object(ty)
    }
}

impl From<InterfaceType> for GraphQLType {
    fn from(ty: InterfaceType) -> Self {
        Self::Interface(ty)
    }
}

impl From<UnionType> for GraphQLType {
    fn from(ty: UnionType) -> Self {
        Self::Union(ty)
    }
}

impl From<EnumType> for GraphQLType {
    fn from(ty: EnumType) -> Self {
        Self::Enum(ty)
    }
}

impl From<InputObjectType> for GraphQLType {
    fn from(ty: InputObjectType) -> Self {
        Self::InputObject(ty)
    }
}
