//! Discovery walk
//!
//! Starting from the roots, every reachable type is materialized, anonymous
//! types record the owner and field path that reach them, and each named type
//! gets a plan describing what to emit. Plans refer to types by slot; aliases
//! are settled in `finish_naming` and names are only resolved at emission.

use async_graphql::Value;
use tracing::trace;

use super::context::{InputSource, InterfaceSource, ObjectId, WeaverContext};
use super::object::LoomField;
use super::TypeSlot;
use crate::error::{WeaveError, WeaveResult};
use crate::resolver::{BoundOperation, InputShape};
use crate::types::{FieldDef, GraphQLType, InputFieldDef};

/// Where a type is reached from: the owning type and the path below it
#[derive(Debug, Clone, Copy)]
pub(crate) struct Reach<'a> {
    pub(crate) owner: TypeSlot,
    pub(crate) path: &'a [&'a str],
}

impl<'a> Reach<'a> {
    pub(crate) fn new(owner: TypeSlot, path: &'a [&'a str]) -> Self {
        Self { owner, path }
    }
}

/// Type reference with wrappers, pointing at a materialized type
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TypeRefPlan {
    Named(TypeSlot),
    List(Box<TypeRefPlan>),
    NonNull(Box<TypeRefPlan>),
}

impl TypeRefPlan {
    pub(crate) fn named(&self) -> TypeSlot {
        match self {
            Self::Named(slot) => *slot,
            Self::List(inner) | Self::NonNull(inner) => inner.named(),
        }
    }
}

/// An argument or input object field
#[derive(Clone)]
pub(crate) struct ArgPlan {
    pub(crate) name: String,
    pub(crate) ty: TypeRefPlan,
    pub(crate) description: Option<String>,
    pub(crate) default_value: Option<Value>,
}

/// How a field gets its value
#[derive(Clone)]
pub(crate) enum Resolution {
    /// Read the property of the parent value
    Property,
    Operation(BoundOperation),
}

/// An output field ready for emission
#[derive(Clone)]
pub(crate) struct FieldPlan {
    pub(crate) name: String,
    pub(crate) ty: TypeRefPlan,
    pub(crate) args: Vec<ArgPlan>,
    pub(crate) description: Option<String>,
    pub(crate) deprecation: Option<String>,
    pub(crate) derived_from: Vec<String>,
    pub(crate) resolution: Resolution,
}

pub(crate) enum TypePlan {
    Scalar,
    Enum,
    Object {
        id: ObjectId,
        fields: Vec<FieldPlan>,
        interfaces: Vec<TypeSlot>,
    },
    Interface {
        fields: Vec<FieldPlan>,
    },
    Union {
        members: Vec<TypeSlot>,
    },
    Input {
        fields: Vec<ArgPlan>,
    },
}

impl WeaverContext {
    /// Claim a slot for planning; false when it was already seen
    fn enter(&mut self, slot: TypeSlot) -> bool {
        if self.plans.contains_key(&slot) {
            return false;
        }
        trace!(kind = slot.kind(), "discovering type");
        self.plans.insert(slot, None);
        true
    }

    /// Materialize an output type, offering `reach` as its alias source
    pub(crate) fn visit_output(
        &mut self,
        ty: &GraphQLType,
        reach: Option<Reach<'_>>,
    ) -> WeaveResult<TypeRefPlan> {
        let slot = match ty {
            GraphQLType::List(inner) => {
                return Ok(TypeRefPlan::List(Box::new(self.visit_output(inner, reach)?)))
            }
            GraphQLType::NonNull(inner) => {
                return Ok(TypeRefPlan::NonNull(Box::new(self.visit_output(inner, reach)?)))
            }
            GraphQLType::Scalar(scalar) => {
                let slot = self.materialize_scalar(scalar)?;
                if self.enter(slot) {
                    self.plans.insert(slot, Some(TypePlan::Scalar));
                }
                slot
            }
            GraphQLType::Enum(values) => {
                let slot = self.materialize_enum(values)?;
                self.offer_alias(slot, reach);
                if self.enter(slot) {
                    self.plans.insert(slot, Some(TypePlan::Enum));
                }
                slot
            }
            GraphQLType::Object(object) => {
                let id = self.materialize_object(object)?;
                let slot = TypeSlot::Object(object.key());
                self.offer_alias(slot, reach);
                self.visit_object(id)?;
                slot
            }
            GraphQLType::Interface(_) => {
                let slot = self.materialize_interface(ty)?;
                self.visit_interface(slot)?;
                slot
            }
            GraphQLType::Union(union) => {
                let slot = self.materialize_union(union)?;
                self.offer_alias(slot, reach);
                self.visit_union(slot)?;
                slot
            }
            GraphQLType::InputObject(input) => {
                return Err(WeaveError::shape(format!(
                    "input object `{}` cannot be used as an output type",
                    input.name()
                )))
            }
        };
        Ok(TypeRefPlan::Named(slot))
    }

    fn offer_alias(&mut self, slot: TypeSlot, reach: Option<Reach<'_>>) {
        if let Some(reach) = reach {
            self.aliases.offer(slot, reach.owner, reach.path);
        }
    }

    /// Plan an object and everything its fields reach
    pub(crate) fn visit_object(&mut self, id: ObjectId) -> WeaveResult<()> {
        let base = self.object(id).base().clone();
        let slot = TypeSlot::Object(base.key());
        if !self.enter(slot) {
            return Ok(());
        }

        let merged = self.object_mut(id).get_fields();
        let mut fields = Vec::with_capacity(merged.len());
        for (name, field) in merged.iter() {
            fields.push(self.to_field_config(slot, name, field)?);
        }

        let mut interfaces = Vec::new();
        for interface in base.interfaces() {
            let interface_slot = self.materialize_interface(interface)?;
            self.visit_interface(interface_slot)?;
            interfaces.push(interface_slot);
        }

        self.plans.insert(
            slot,
            Some(TypePlan::Object {
                id,
                fields,
                interfaces,
            }),
        );
        Ok(())
    }

    /// Turn a merged field into its emitted shape
    ///
    /// The output type goes through deduplication and aliasing; the input
    /// shape of attached operations becomes arguments.
    pub(crate) fn to_field_config(
        &mut self,
        owner: TypeSlot,
        name: &str,
        field: &LoomField,
    ) -> WeaveResult<FieldPlan> {
        match field {
            LoomField::Base(def) => self.base_field(owner, name, def),
            LoomField::Attached(bound) => {
                let descriptor = bound.descriptor();
                let output = descriptor.output().get_type();
                let ty = self
                    .visit_output(&output, Some(Reach::new(owner, &[name])))
                    .map_err(|err| err.at(name))?;
                let args = self
                    .arguments(owner, name, descriptor.input())
                    .map_err(|err| err.at(name))?;

                Ok(FieldPlan {
                    name: name.to_string(),
                    ty,
                    args,
                    description: descriptor.description().map(str::to_string),
                    deprecation: descriptor.deprecation().map(str::to_string),
                    derived_from: descriptor.derived_from().to_vec(),
                    resolution: Resolution::Operation(bound.clone()),
                })
            }
        }
    }

    fn base_field(
        &mut self,
        owner: TypeSlot,
        name: &str,
        def: &FieldDef,
    ) -> WeaveResult<FieldPlan> {
        let ty = self
            .visit_output(&def.ty, Some(Reach::new(owner, &[name])))
            .map_err(|err| err.at(name))?;
        Ok(FieldPlan {
            name: name.to_string(),
            ty,
            args: Vec::new(),
            description: def.description.clone(),
            deprecation: def.deprecation.clone(),
            derived_from: def.derived_from.clone(),
            resolution: Resolution::Property,
        })
    }

    /// Arguments of an operation from its input shape
    fn arguments(
        &mut self,
        owner: TypeSlot,
        field: &str,
        shape: &InputShape,
    ) -> WeaveResult<Vec<ArgPlan>> {
        match shape {
            InputShape::None => Ok(Vec::new()),
            InputShape::Record(args) => args
                .iter()
                .map(|(name, silk)| {
                    let path = [field, name.as_str()];
                    let ty = self
                        .visit_input(&silk.get_type(), Some(Reach::new(owner, &path)))
                        .map_err(|err| err.at(name.as_str()))?;
                    Ok(ArgPlan {
                        name: name.clone(),
                        ty,
                        description: None,
                        default_value: None,
                    })
                })
                .collect(),
            InputShape::Single(silk) => {
                let ty = silk.get_type().nullable();
                let fields: Vec<(String, InputFieldDef)> = match &ty {
                    GraphQLType::Object(object) => object
                        .fields()
                        .into_iter()
                        .map(|(name, def)| (name, input_field(def)))
                        .collect(),
                    GraphQLType::InputObject(input) => input.fields().into_iter().collect(),
                    GraphQLType::Interface(_) | GraphQLType::Union(_) => {
                        return Err(WeaveError::shape(format!(
                            "`{ty}` cannot be expanded into arguments"
                        )))
                    }
                    _ => return Ok(Vec::new()),
                };

                fields
                    .into_iter()
                    .map(|(name, def)| {
                        let path = [field, name.as_str()];
                        let ty = self
                            .visit_input(&def.ty, Some(Reach::new(owner, &path)))
                            .map_err(|err| err.at(name.as_str()))?;
                        Ok(ArgPlan {
                            name,
                            ty,
                            description: def.description,
                            default_value: def.default_value,
                        })
                    })
                    .collect()
            }
        }
    }

    /// Materialize an input type, offering `reach` as its alias source
    pub(crate) fn visit_input(
        &mut self,
        ty: &GraphQLType,
        reach: Option<Reach<'_>>,
    ) -> WeaveResult<TypeRefPlan> {
        let slot = match ty {
            GraphQLType::List(inner) => {
                return Ok(TypeRefPlan::List(Box::new(self.visit_input(inner, reach)?)))
            }
            GraphQLType::NonNull(inner) => {
                return Ok(TypeRefPlan::NonNull(Box::new(self.visit_input(inner, reach)?)))
            }
            GraphQLType::Scalar(scalar) => {
                let slot = self.materialize_scalar(scalar)?;
                if self.enter(slot) {
                    self.plans.insert(slot, Some(TypePlan::Scalar));
                }
                slot
            }
            GraphQLType::Enum(values) => {
                let slot = self.materialize_enum(values)?;
                self.offer_alias(slot, reach);
                if self.enter(slot) {
                    self.plans.insert(slot, Some(TypePlan::Enum));
                }
                slot
            }
            GraphQLType::Object(_) | GraphQLType::InputObject(_) => {
                let slot = self.ensure_input_object(ty)?;
                self.offer_alias(slot, reach);
                self.visit_input_object(slot)?;
                slot
            }
            GraphQLType::Interface(interface) => {
                return Err(WeaveError::shape(format!(
                    "interface `{}` cannot be used as an input type",
                    interface.name()
                )))
            }
            GraphQLType::Union(union) => {
                return Err(WeaveError::shape(format!(
                    "union `{}` cannot be used as an input type",
                    union.name().unwrap_or("<anonymous>")
                )))
            }
        };
        Ok(TypeRefPlan::Named(slot))
    }

    pub(crate) fn visit_input_object(&mut self, slot: TypeSlot) -> WeaveResult<()> {
        if !self.enter(slot) {
            return Ok(());
        }

        let fields: Vec<(String, InputFieldDef)> = match self.input(slot.key()) {
            Some(InputSource::Declared(input)) => input.fields().into_iter().collect(),
            Some(InputSource::Derived(object)) => object
                .fields()
                .into_iter()
                .map(|(name, def)| (name, input_field(def)))
                .collect(),
            None => return Err(WeaveError::InvalidComposition("unknown input object".to_string())),
        };

        let mut planned = Vec::with_capacity(fields.len());
        for (name, def) in fields {
            let ty = self
                .visit_input(&def.ty, Some(Reach::new(slot, &[name.as_str()])))
                .map_err(|err| err.at(name.as_str()))?;
            planned.push(ArgPlan {
                name,
                ty,
                description: def.description,
                default_value: def.default_value,
            });
        }

        self.plans.insert(slot, Some(TypePlan::Input { fields: planned }));
        Ok(())
    }

    pub(crate) fn visit_interface(&mut self, slot: TypeSlot) -> WeaveResult<()> {
        if !self.enter(slot) {
            return Ok(());
        }

        let defs = match self.interface(slot.key()) {
            Some(InterfaceSource::Interface(interface)) => interface.fields(),
            Some(InterfaceSource::Object(object)) => object.fields(),
            None => return Err(WeaveError::InvalidComposition("unknown interface".to_string())),
        };

        let mut fields = Vec::with_capacity(defs.len());
        for (name, def) in &defs {
            fields.push(self.base_field(slot, name, def)?);
        }

        self.plans.insert(slot, Some(TypePlan::Interface { fields }));
        Ok(())
    }

    pub(crate) fn visit_union(&mut self, slot: TypeSlot) -> WeaveResult<()> {
        if !self.enter(slot) {
            return Ok(());
        }

        let Some(union) = self.union(slot.key()).cloned() else {
            return Err(WeaveError::InvalidComposition("unknown union".to_string()));
        };

        let mut members = Vec::new();
        for member in union.members() {
            let id = self.materialize_object(&member)?;
            self.visit_object(id)?;
            members.push(TypeSlot::Object(member.key()));
        }

        self.plans.insert(slot, Some(TypePlan::Union { members }));
        Ok(())
    }

    /// Plan a type added without a field path
    pub(crate) fn visit_type(&mut self, ty: &GraphQLType) -> WeaveResult<TypeRefPlan> {
        match ty.named() {
            GraphQLType::InputObject(_) => self.visit_input(ty, None),
            _ => self.visit_output(ty, None),
        }
    }
}

fn input_field(def: FieldDef) -> InputFieldDef {
    InputFieldDef {
        ty: def.ty,
        description: def.description,
        default_value: None,
    }
}
