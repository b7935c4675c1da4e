//! Runtime side of a woven schema
//!
//! Composite values travel between fields as `Arc<Value>` wrapped in
//! `FieldValue::owned_any`. Fields without a resolver read the property of
//! that value; attached operations run through their bound middleware chain.

use std::collections::HashMap;
use std::sync::Arc;

use async_graphql::dynamic::{
    Field, FieldFuture, FieldValue, ResolverContext, SubscriptionField, SubscriptionFieldFuture,
    TypeRef,
};
use async_graphql::{Name, Value};
use futures_util::StreamExt;

use crate::context::{RequestContext, RequestScope, ResolveInfo, ResolverPayload};
use crate::error::ResolveResult;
use crate::resolver::{BoundOperation, FieldDescriptor};
use crate::selection::{FieldSelection, OperationDocument, TypeIndex};
use crate::types::{ResolveTypeFn, TypeKey};

/// How a resolved value is handed back to the executor
pub(crate) enum OutputShape {
    Leaf,
    Enum,
    Object,
    Abstract(AbstractType),
    List(Box<OutputShape>),
}

/// An interface or union whose concrete type is chosen per value
pub(crate) struct AbstractType {
    pub(crate) name: String,
    pub(crate) resolve_type: Option<ResolveTypeFn>,
    pub(crate) object_names: Arc<HashMap<TypeKey, String>>,
}

impl AbstractType {
    /// The `resolve_type` hook first, then the value's `__typename`
    fn concrete_name(&self, value: &Value) -> ResolveResult<String> {
        if let Some(object) = self.resolve_type.as_ref().and_then(|hook| hook(value)) {
            let name = self
                .object_names
                .get(&object.key())
                .cloned()
                .or_else(|| object.name().map(str::to_string));
            if let Some(name) = name {
                return Ok(name);
            }
        }

        if let Value::Object(fields) = value {
            if let Some(Value::String(name)) = fields.get("__typename") {
                return Ok(name.clone());
            }
        }

        Err(format!("cannot resolve the concrete type of \"{}\"", self.name).into())
    }
}

/// Convert a resolved value into what the executor expects for `shape`
pub(crate) fn to_field_value<'a>(
    value: Value,
    shape: &OutputShape,
) -> ResolveResult<Option<FieldValue<'a>>> {
    if value == Value::Null {
        return Ok(None);
    }

    let converted = match shape {
        OutputShape::Leaf => FieldValue::value(value),
        OutputShape::Enum => match value {
            Value::String(name) => FieldValue::value(Value::Enum(Name::new(name))),
            other => FieldValue::value(other),
        },
        OutputShape::Object => FieldValue::owned_any(Arc::new(value)),
        OutputShape::Abstract(abstract_type) => {
            let name = abstract_type.concrete_name(&value)?;
            FieldValue::owned_any(Arc::new(value)).with_type(name)
        }
        OutputShape::List(item) => {
            let Value::List(items) = value else {
                return Err("expected a list value".into());
            };
            let items = items
                .into_iter()
                .map(|value| -> ResolveResult<FieldValue<'a>> {
                    Ok(to_field_value(value, item)?.unwrap_or(FieldValue::NULL))
                })
                .collect::<ResolveResult<Vec<_>>>()?;
            FieldValue::list(items)
        }
    };
    Ok(Some(converted))
}

/// Static facts about one emitted field
pub(crate) struct FieldSite {
    pub(crate) parent_type: String,
    pub(crate) field_name: String,
    pub(crate) return_type: String,
    pub(crate) types: Arc<TypeIndex>,
    pub(crate) shape: Arc<OutputShape>,
}

impl FieldSite {
    /// Build the payload of one resolution from the executor's context
    fn payload(&self, ctx: &ResolverContext<'_>, field: Arc<FieldDescriptor>) -> ResolverPayload {
        let parent = ctx.parent_value.try_downcast_ref::<Arc<Value>>().ok().cloned();
        let args = ctx
            .args
            .as_index_map()
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();

        let scope = ctx.ctx.data_opt::<RequestScope>();
        let context = ctx
            .ctx
            .data_opt::<RequestContext>()
            .cloned()
            .or_else(|| scope.map(|scope| scope.context.clone()))
            .unwrap_or_default();
        let document = match scope {
            Some(scope) => scope
                .document
                .get_or_init(|| Arc::new(document_of(ctx)))
                .clone(),
            None => Arc::new(document_of(ctx)),
        };

        let info = ResolveInfo {
            field_name: self.field_name.clone(),
            parent_type: self.parent_type.clone(),
            return_type: self.return_type.clone(),
            path: ctx
                .ctx
                .path_node
                .map(|node| node.to_string_vec())
                .unwrap_or_default(),
            selection: Some(FieldSelection::new(
                ctx.ctx.item.node.selection_set.clone(),
                document,
            )),
            types: self.types.clone(),
        };

        ResolverPayload::new(parent, args, context, info, field)
    }
}

fn document_of(ctx: &ResolverContext<'_>) -> OperationDocument {
    OperationDocument::new(
        ctx.ctx.query_env.fragments.clone(),
        ctx.ctx.query_env.variables.clone(),
    )
}

/// A field read from the parent value
pub(crate) fn property_field(site: Arc<FieldSite>, ty: TypeRef) -> Field {
    let name = site.field_name.clone();
    Field::new(name, ty, move |ctx| {
        let site = site.clone();
        FieldFuture::new(async move {
            let value = ctx
                .parent_value
                .try_downcast_ref::<Arc<Value>>()
                .ok()
                .and_then(|parent| match parent.as_ref() {
                    Value::Object(fields) => fields.get(site.field_name.as_str()).cloned(),
                    _ => None,
                })
                .unwrap_or(Value::Null);
            to_field_value(value, &site.shape)
        })
    })
}

/// A query, mutation or field resolved by an attached operation
pub(crate) fn operation_field(site: Arc<FieldSite>, ty: TypeRef, bound: BoundOperation) -> Field {
    let name = site.field_name.clone();
    Field::new(name, ty, move |ctx| {
        let site = site.clone();
        let bound = bound.clone();
        FieldFuture::new(async move {
            let payload = site.payload(&ctx, bound.descriptor().clone());
            let value = bound.resolve(payload).await?;
            to_field_value(value, &site.shape)
        })
    })
}

/// A subscription whose events run through the bound operation
pub(crate) fn subscription_field(
    site: Arc<FieldSite>,
    ty: TypeRef,
    bound: BoundOperation,
) -> SubscriptionField {
    let name = site.field_name.clone();
    SubscriptionField::new(name, ty, move |ctx| {
        let site = site.clone();
        let bound = bound.clone();
        SubscriptionFieldFuture::new(async move {
            let payload = site.payload(&ctx, bound.descriptor().clone());
            let events = bound.subscribe(payload).await?;
            let shape = site.shape.clone();
            Ok(events.map(
                move |event: ResolveResult<Value>| -> ResolveResult<FieldValue<'_>> {
                    let value = to_field_value(event?, &shape)?;
                    Ok(value.unwrap_or(FieldValue::NULL))
                },
            ))
        })
    })
}
