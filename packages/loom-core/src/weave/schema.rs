use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_graphql::dynamic::{
    Enum, EnumItem, Field, InputObject, InputValue, Interface, InterfaceField, Object, Scalar,
    Schema, SchemaBuilder, Subscription, SubscriptionField, Type, TypeRef, Union,
};
use tracing::{debug, info};

use super::context::{InputSource, InterfaceSource, ObjectId, WeaverContext};
use super::discover::{ArgPlan, FieldPlan, Resolution, TypePlan, TypeRefPlan};
use super::resolve::{
    operation_field, property_field, subscription_field, AbstractType, FieldSite, OutputShape,
};
use super::TypeSlot;
use crate::config::ConfigKey;
use crate::context::RequestScopeExtension;
use crate::error::{WeaveError, WeaveResult};
use crate::middleware::Middleware;
use crate::resolver::{BoundOperation, FieldEntry, OperationKind, ResolverContainer};
use crate::selection::{TypeEntry, TypeIndex};
use crate::silk::Silk;
use crate::types::{ObjectType, TypeKey};

type DataFn = Box<dyn FnOnce(SchemaBuilder) -> SchemaBuilder + Send>;

/// Builder assembling resolver containers into one schema
pub struct SchemaLoom {
    containers: Vec<ResolverContainer>,
    types: Vec<Silk>,
    middlewares: Vec<Middleware>,
    context: WeaverContext,
    data: Vec<DataFn>,
}

impl SchemaLoom {
    pub fn new() -> Self {
        Self {
            containers: Vec::new(),
            types: Vec::new(),
            middlewares: Vec::new(),
            context: WeaverContext::new(),
            data: Vec::new(),
        }
    }

    /// Add a resolver container
    pub fn add(mut self, container: ResolverContainer) -> Self {
        self.containers.push(container);
        self
    }

    /// Emit a type even when no field reaches it
    pub fn add_type(mut self, ty: impl Into<Silk>) -> Self {
        self.types.push(ty.into());
        self
    }

    /// Add a middleware wrapping every operation of every container
    pub fn middleware(mut self, middleware: Middleware) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Set a weave-time setting
    pub fn config<T: Any + Send + Sync>(mut self, key: ConfigKey<T>, value: T) -> Self {
        self.context.set_config(key, value);
        self
    }

    /// Attach schema-wide data, readable from every resolver through async-graphql
    pub fn data<D: Any + Send + Sync>(mut self, data: D) -> Self {
        self.data.push(Box::new(move |builder| builder.data(data)));
        self
    }

    /// Build the schema
    ///
    /// Fails on the first composition problem: conflicting fields, colliding
    /// type names, types that cannot be used where they appear, anonymous
    /// types that could not be named, or a schema async-graphql rejects.
    pub fn weave(self) -> WeaveResult<Schema> {
        let Self {
            containers,
            types,
            middlewares,
            mut context,
            data,
        } = self;

        let config = context.core_config();
        let roots = Roots::new(
            &config.query_name,
            &config.mutation_name,
            &config.subscription_name,
        );

        // Phase 1: fold containers into Loom Objects
        let query_id = context.materialize_object(&roots.query)?;
        let mut parents = Vec::new();
        for container in &containers {
            let parent = fold_container(&mut context, &roots, container, &middlewares)?;
            parents.extend(parent);
        }

        // Phase 2: walk every reachable type
        let mutation_id = Roots::used(&mut context, &roots.mutation);
        let subscription_id = Roots::used(&mut context, &roots.subscription);

        context.visit_object(query_id)?;
        for id in mutation_id.iter().chain(&subscription_id).chain(&parents) {
            context.visit_object(*id)?;
        }
        for silk in &types {
            context.visit_type(&silk.get_type())?;
        }
        context.finish_naming()?;

        // Phase 3: emit
        let emitter = Emitter::new(&context)?;
        let subscription_slot = subscription_id.map(|id| slot_of(&context, id));
        let mut emitted = Vec::with_capacity(context.plans.len());
        for (slot, plan) in &context.plans {
            let Some(plan) = plan else {
                return Err(WeaveError::InvalidComposition(format!(
                    "{slot} was never fully planned"
                )));
            };
            let ty = if Some(*slot) == subscription_slot {
                Some(emitter.subscription(*slot, plan)?)
            } else {
                emitter.emit(*slot, plan)?
            };
            emitted.extend(ty);
        }

        let mutation_name = mutation_id.map(|_| config.mutation_name.as_str());
        let subscription_name = subscription_id.map(|_| config.subscription_name.as_str());
        let mut builder = Schema::build(&config.query_name, mutation_name, subscription_name)
            .extension(RequestScopeExtension);
        let type_count = emitted.len();
        for ty in emitted {
            builder = builder.register(ty);
        }
        for attach in data {
            builder = attach(builder);
        }

        let schema = builder
            .finish()
            .map_err(|err| WeaveError::Schema(err.to_string()))?;

        info!(
            containers = containers.len(),
            types = type_count,
            mutation = mutation_id.is_some(),
            subscription = subscription_id.is_some(),
            "schema woven"
        );
        Ok(schema)
    }
}

impl Default for SchemaLoom {
    fn default() -> Self {
        Self::new()
    }
}

/// Weave containers with default settings
pub fn weave<I>(containers: I) -> WeaveResult<Schema>
where
    I: IntoIterator<Item = ResolverContainer>,
{
    containers
        .into_iter()
        .fold(SchemaLoom::new(), SchemaLoom::add)
        .weave()
}

/// Root object definitions of one weave
struct Roots {
    query: ObjectType,
    mutation: ObjectType,
    subscription: ObjectType,
}

impl Roots {
    fn new(query: &str, mutation: &str, subscription: &str) -> Self {
        Self {
            query: ObjectType::empty(query),
            mutation: ObjectType::empty(mutation),
            subscription: ObjectType::empty(subscription),
        }
    }

    fn for_kind(&self, kind: OperationKind) -> Option<&ObjectType> {
        match kind {
            OperationKind::Query => Some(&self.query),
            OperationKind::Mutation => Some(&self.mutation),
            OperationKind::Subscription => Some(&self.subscription),
            OperationKind::Field => None,
        }
    }

    /// Id of a root that received at least one field
    fn used(context: &mut WeaverContext, root: &ObjectType) -> Option<ObjectId> {
        let id = context.object_id(root.key())?;
        let fields = context.object_mut(id).get_fields();
        (!fields.is_empty()).then_some(id)
    }
}

/// Attach a container's entries; returns the parent object it extends
fn fold_container(
    context: &mut WeaverContext,
    roots: &Roots,
    container: &ResolverContainer,
    middlewares: &[Middleware],
) -> WeaveResult<Option<ObjectId>> {
    let parent = match container.parent() {
        Some(silk) => {
            let ty = silk.get_type();
            let object = ty.as_object().ok_or_else(|| {
                WeaveError::InvalidComposition(format!(
                    "resolver parent `{ty}` is not an object type"
                ))
            })?;
            Some(context.materialize_object(object)?)
        }
        None => None,
    };

    debug!(
        parent = ?parent.map(|id| context.object(id).base().name().unwrap_or("<anonymous>").to_string()),
        entries = container.entries().len(),
        "folding resolver container"
    );

    let container_middlewares = &container.options().middlewares;
    for (name, entry) in container.entries() {
        match entry {
            FieldEntry::Hidden => {
                let id = parent.ok_or_else(|| {
                    WeaveError::InvalidComposition(format!(
                        "cannot hide \"{name}\" in a resolver without a parent type"
                    ))
                })?;
                context.object_mut(id).hide_field(name);
            }
            FieldEntry::Operation(descriptor) => {
                let target = match roots.for_kind(descriptor.kind()) {
                    Some(root) => context.materialize_object(root)?,
                    None => parent.ok_or_else(|| {
                        WeaveError::InvalidComposition(format!(
                            "field \"{name}\" is declared in a resolver without a parent type"
                        ))
                    })?,
                };
                let bound =
                    BoundOperation::new(descriptor.clone(), middlewares, container_middlewares);
                context.object_mut(target).add_field(name, bound)?;
            }
        }
    }

    Ok(parent)
}

fn slot_of(context: &WeaverContext, id: ObjectId) -> TypeSlot {
    TypeSlot::Object(context.object(id).base().key())
}

// ==================== Emission ====================

/// Turns plans into async-graphql dynamic types using the final names
struct Emitter<'a> {
    context: &'a WeaverContext,
    names: HashMap<TypeSlot, String>,
    object_names: Arc<HashMap<TypeKey, String>>,
    types: Arc<TypeIndex>,
}

impl<'a> Emitter<'a> {
    fn new(context: &'a WeaverContext) -> WeaveResult<Self> {
        let mut names = HashMap::with_capacity(context.plans.len());
        let mut object_names = HashMap::new();
        for slot in context.plans.keys() {
            let name = context.name_of(*slot)?;
            if let TypeSlot::Object(key) = slot {
                object_names.insert(*key, name.clone());
            }
            names.insert(*slot, name);
        }

        let mut emitter = Self {
            context,
            names,
            object_names: Arc::new(object_names),
            types: Arc::default(),
        };
        emitter.types = Arc::new(emitter.type_index()?);
        Ok(emitter)
    }

    fn name(&self, slot: TypeSlot) -> WeaveResult<&str> {
        self.names.get(&slot).map(String::as_str).ok_or_else(|| {
            WeaveError::InvalidComposition(format!("{slot} was referenced but never planned"))
        })
    }

    /// Derived dependencies and field types of every object and interface
    fn type_index(&self) -> WeaveResult<TypeIndex> {
        let mut index = TypeIndex::default();
        for (slot, plan) in &self.context.plans {
            let fields = match plan {
                Some(TypePlan::Object { fields, .. }) | Some(TypePlan::Interface { fields }) => {
                    fields
                }
                _ => continue,
            };

            let mut entry = TypeEntry::default();
            for field in fields {
                if !field.derived_from.is_empty() {
                    entry
                        .derived
                        .insert(field.name.clone(), field.derived_from.clone());
                }
                let type_name = self.name(field.ty.named())?;
                entry.fields.insert(field.name.clone(), type_name.to_string());
            }
            index.insert(self.name(*slot)?, entry);
        }
        Ok(index)
    }

    fn type_ref(&self, plan: &TypeRefPlan) -> WeaveResult<TypeRef> {
        Ok(match plan {
            TypeRefPlan::Named(slot) => TypeRef::named(self.name(*slot)?.to_string()),
            TypeRefPlan::List(inner) => TypeRef::List(Box::new(self.type_ref(inner)?)),
            TypeRefPlan::NonNull(inner) => TypeRef::NonNull(Box::new(self.type_ref(inner)?)),
        })
    }

    fn shape(&self, plan: &TypeRefPlan) -> WeaveResult<OutputShape> {
        let slot = match plan {
            TypeRefPlan::NonNull(inner) => return self.shape(inner),
            TypeRefPlan::List(inner) => return Ok(OutputShape::List(Box::new(self.shape(inner)?))),
            TypeRefPlan::Named(slot) => *slot,
        };

        let resolve_type = match slot {
            TypeSlot::Scalar(_) | TypeSlot::Input(_) => return Ok(OutputShape::Leaf),
            TypeSlot::Enum(_) => return Ok(OutputShape::Enum),
            TypeSlot::Object(_) => return Ok(OutputShape::Object),
            TypeSlot::Interface(key) => match self.context.interface(key) {
                Some(InterfaceSource::Interface(interface)) => interface.resolve_type().cloned(),
                _ => None,
            },
            TypeSlot::Union(key) => self
                .context
                .union(key)
                .and_then(|union| union.resolve_type().cloned()),
        };

        Ok(OutputShape::Abstract(AbstractType {
            name: self.name(slot)?.to_string(),
            resolve_type,
            object_names: self.object_names.clone(),
        }))
    }

    fn site(&self, parent: &str, field: &FieldPlan) -> WeaveResult<Arc<FieldSite>> {
        Ok(Arc::new(FieldSite {
            parent_type: parent.to_string(),
            field_name: field.name.clone(),
            return_type: self.name(field.ty.named())?.to_string(),
            types: self.types.clone(),
            shape: Arc::new(self.shape(&field.ty)?),
        }))
    }

    fn input_value(&self, arg: &ArgPlan) -> WeaveResult<InputValue> {
        let mut value = InputValue::new(arg.name.clone(), self.type_ref(&arg.ty)?);
        if let Some(description) = &arg.description {
            value = value.description(description.clone());
        }
        if let Some(default) = &arg.default_value {
            value = value.default_value(default.clone());
        }
        Ok(value)
    }

    fn field(&self, parent: &str, plan: &FieldPlan) -> WeaveResult<Field> {
        let site = self.site(parent, plan)?;
        let ty = self.type_ref(&plan.ty)?;
        let mut field = match &plan.resolution {
            Resolution::Property => property_field(site, ty),
            Resolution::Operation(bound) => operation_field(site, ty, bound.clone()),
        };

        for arg in &plan.args {
            field = field.argument(self.input_value(arg)?);
        }
        if let Some(description) = &plan.description {
            field = field.description(description.clone());
        }
        if let Some(reason) = &plan.deprecation {
            field = field.deprecation(Some(reason.as_str()));
        }
        Ok(field)
    }

    /// Emit the subscription root
    fn subscription(&self, slot: TypeSlot, plan: &TypePlan) -> WeaveResult<Type> {
        let TypePlan::Object { fields, .. } = plan else {
            return Err(WeaveError::InvalidComposition(
                "the subscription root must be an object".to_string(),
            ));
        };

        let name = self.name(slot)?;
        let mut root = Subscription::new(name);
        for plan in fields {
            let Resolution::Operation(bound) = &plan.resolution else {
                return Err(WeaveError::InvalidComposition(format!(
                    "subscription field \"{}\" has no subscribe function",
                    plan.name
                )));
            };
            let site = self.site(name, plan)?;
            let mut field: SubscriptionField =
                subscription_field(site, self.type_ref(&plan.ty)?, bound.clone());
            for arg in &plan.args {
                field = field.argument(self.input_value(arg)?);
            }
            if let Some(description) = &plan.description {
                field = field.description(description.clone());
            }
            root = root.field(field);
        }

        debug!(type_name = name, fields = fields.len(), "emitted subscription root");
        Ok(root.into())
    }

    /// Emit one planned type; built-in scalars emit nothing
    fn emit(&self, slot: TypeSlot, plan: &TypePlan) -> WeaveResult<Option<Type>> {
        let name = self.name(slot)?;
        let ty: Type = match plan {
            TypePlan::Scalar => {
                let Some(scalar) = self.context.scalar(slot.key()) else {
                    return Ok(None);
                };
                if scalar.is_builtin() {
                    return Ok(None);
                }
                let mut emitted = Scalar::new(name);
                if let Some(description) = scalar.description() {
                    emitted = emitted.description(description);
                }
                emitted.into()
            }
            TypePlan::Enum => {
                let values = self.context.enum_type(slot.key()).ok_or_else(|| {
                    WeaveError::InvalidComposition(format!("enum \"{name}\" is unknown"))
                })?;
                let mut emitted = Enum::new(name);
                if let Some(description) = values.description() {
                    emitted = emitted.description(description);
                }
                for (value, description) in values.values() {
                    let mut item = EnumItem::new(value);
                    if let Some(description) = description {
                        item = item.description(description);
                    }
                    emitted = emitted.item(item);
                }
                emitted.into()
            }
            TypePlan::Object {
                id,
                fields,
                interfaces,
            } => {
                let mut emitted = Object::new(name);
                if let Some(description) = self.context.object(*id).base().description() {
                    emitted = emitted.description(description);
                }
                for interface in interfaces {
                    emitted = emitted.implement(self.name(*interface)?);
                }
                for field in fields {
                    emitted = emitted.field(self.field(name, field)?);
                }
                emitted.into()
            }
            TypePlan::Interface { fields } => {
                let mut emitted = Interface::new(name);
                let description = match self.context.interface(slot.key()) {
                    Some(InterfaceSource::Interface(interface)) => interface.description(),
                    Some(InterfaceSource::Object(object)) => object.description(),
                    None => None,
                };
                if let Some(description) = description {
                    emitted = emitted.description(description);
                }
                for field in fields {
                    let mut emitted_field =
                        InterfaceField::new(field.name.clone(), self.type_ref(&field.ty)?);
                    for arg in &field.args {
                        emitted_field = emitted_field.argument(self.input_value(arg)?);
                    }
                    if let Some(description) = &field.description {
                        emitted_field = emitted_field.description(description.clone());
                    }
                    emitted = emitted.field(emitted_field);
                }
                emitted.into()
            }
            TypePlan::Union { members } => {
                let mut emitted = Union::new(name);
                if let Some(description) = self
                    .context
                    .union(slot.key())
                    .and_then(|union| union.description())
                {
                    emitted = emitted.description(description);
                }
                for member in members {
                    emitted = emitted.possible_type(self.name(*member)?);
                }
                emitted.into()
            }
            TypePlan::Input { fields } => {
                let mut emitted = InputObject::new(name);
                let description = match self.context.input(slot.key()) {
                    Some(InputSource::Declared(input)) => input.description(),
                    Some(InputSource::Derived(object)) => object.description(),
                    None => None,
                };
                if let Some(description) = description {
                    emitted = emitted.description(description);
                }
                for field in fields {
                    emitted = emitted.field(self.input_value(field)?);
                }
                emitted.into()
            }
        };

        debug!(type_name = name, kind = slot.kind(), "emitted type");
        Ok(Some(ty))
    }
}
