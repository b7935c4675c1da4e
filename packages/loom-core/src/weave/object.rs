use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use tracing::trace;

use crate::error::{WeaveError, WeaveResult};
use crate::resolver::{BoundOperation, FieldDescriptor};
use crate::types::{FieldDef, ObjectType};

/// One field of a merged object
#[derive(Debug, Clone)]
pub enum LoomField {
    /// Declared by the base type, resolved by property lookup
    Base(FieldDef),
    /// Attached by a resolver container
    Attached(BoundOperation),
}

impl LoomField {
    pub fn derived_from(&self) -> &[String] {
        match self {
            Self::Base(def) => &def.derived_from,
            Self::Attached(bound) => bound.descriptor().derived_from(),
        }
    }
}

/// An object type merged with the fields resolver containers attach to it
///
/// Created once per distinct base object per weave. Containers add and hide
/// fields as they are folded in; the merged field map is rebuilt on the next
/// read after any change.
pub struct LoomObject {
    base: ObjectType,
    attached: IndexMap<String, BoundOperation>,
    hidden: IndexSet<String>,
    cache: Option<Arc<IndexMap<String, LoomField>>>,
}

impl LoomObject {
    pub fn new(base: ObjectType) -> Self {
        Self {
            base,
            attached: IndexMap::new(),
            hidden: IndexSet::new(),
            cache: None,
        }
    }

    pub fn base(&self) -> &ObjectType {
        &self.base
    }

    /// Attach a field
    ///
    /// Attaching the same descriptor again is a no-op; a different descriptor
    /// under a taken name is a [`WeaveError::FieldConflict`].
    pub fn add_field(&mut self, name: &str, field: BoundOperation) -> WeaveResult<()> {
        if let Some(existing) = self.attached.get(name) {
            if Arc::ptr_eq(existing.descriptor(), field.descriptor()) {
                return Ok(());
            }
            return Err(WeaveError::FieldConflict {
                type_name: self.base.name().unwrap_or("<anonymous>").to_string(),
                field: name.to_string(),
            });
        }

        trace!(field = name, "attached field");
        self.attached.insert(name.to_string(), field);
        self.cache = None;
        Ok(())
    }

    /// Hide a field; hiding wins over base and attached fields
    pub fn hide_field(&mut self, name: &str) {
        if self.hidden.insert(name.to_string()) {
            self.cache = None;
        }
    }

    /// Descriptor attached under `name`, if any
    pub fn attached(&self, name: &str) -> Option<&Arc<FieldDescriptor>> {
        self.attached.get(name).map(BoundOperation::descriptor)
    }

    pub fn is_hidden(&self, name: &str) -> bool {
        self.hidden.contains(name)
    }

    pub fn has_attached_fields(&self) -> bool {
        !self.attached.is_empty()
    }

    /// Base fields overlaid with attached ones, minus hidden names
    pub fn get_fields(&mut self) -> Arc<IndexMap<String, LoomField>> {
        if let Some(cached) = &self.cache {
            return cached.clone();
        }

        let mut fields: IndexMap<String, LoomField> = self
            .base
            .fields()
            .into_iter()
            .map(|(name, def)| (name, LoomField::Base(def)))
            .collect();
        for (name, bound) in &self.attached {
            fields.insert(name.clone(), LoomField::Attached(bound.clone()));
        }
        fields.retain(|name, _| !self.hidden.contains(name));

        let fields = Arc::new(fields);
        self.cache = Some(fields.clone());
        fields
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use async_graphql::Value;

    use super::*;
    use crate::resolver::field;
    use crate::silk::Silk;
    use crate::types::ScalarType;

    fn user() -> ObjectType {
        ObjectType::builder("User")
            .field("id", ScalarType::id())
            .field("name", ScalarType::string())
            .field("password", ScalarType::string())
            .build()
    }

    fn greeting() -> BoundOperation {
        let descriptor = field(Silk::new(ScalarType::string()))
            .resolve(|_, _, _| async { Ok(Value::from("hi")) });
        BoundOperation::new(Arc::new(descriptor), &[], &[])
    }

    #[test]
    fn test_same_descriptor_is_idempotent() {
        let mut object = LoomObject::new(user());
        let bound = greeting();
        object.add_field("greeting", bound.clone()).unwrap();
        object.add_field("greeting", bound).unwrap();
        assert_eq!(object.get_fields().len(), 4);
    }

    #[test]
    fn test_different_descriptor_conflicts() {
        let mut object = LoomObject::new(user());
        object.add_field("greeting", greeting()).unwrap();
        let result = object.add_field("greeting", greeting());
        assert_matches!(
            result,
            Err(WeaveError::FieldConflict { type_name, field }) if type_name == "User" && field == "greeting"
        );
    }

    #[test]
    fn test_hidden_wins() {
        let mut object = LoomObject::new(user());
        object.hide_field("password");
        object.add_field("greeting", greeting()).unwrap();
        object.hide_field("greeting");

        let fields = object.get_fields();
        let names: Vec<_> = fields.keys().map(String::as_str).collect();
        assert_eq!(names, ["id", "name"]);
    }

    #[test]
    fn test_attached_field_overrides_base() {
        let mut object = LoomObject::new(user());
        object.add_field("name", greeting()).unwrap();
        assert_matches!(object.get_fields().get("name"), Some(LoomField::Attached(_)));
    }

    #[test]
    fn test_cache_invalidated_on_change() {
        let mut object = LoomObject::new(user());
        let before = object.get_fields();
        assert!(Arc::ptr_eq(&before, &object.get_fields()));

        object.add_field("greeting", greeting()).unwrap();
        let after = object.get_fields();
        assert!(!Arc::ptr_eq(&before, &after));
        assert!(after.contains_key("greeting"));
    }
}
