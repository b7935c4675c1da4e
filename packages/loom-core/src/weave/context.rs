use std::any::Any;
use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::debug;

use super::alias::{alias_candidate, AliasAssigner};
use super::discover::TypePlan;
use super::object::LoomObject;
use super::TypeSlot;
use crate::config::{ConfigKey, ConfigStore, CoreSchemaConfig, CORE_SCHEMA_CONFIG};
use crate::error::{WeaveError, WeaveResult};
use crate::types::{
    EnumType, GraphQLType, InputObjectType, InterfaceType, ObjectType, ScalarType, TypeKey,
    UnionType,
};

/// Index of a [`LoomObject`] in its context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(usize);

/// What an interface is built from
#[derive(Clone)]
pub enum InterfaceSource {
    Interface(InterfaceType),
    /// An object used as an interface
    Object(ObjectType),
}

/// What an input object is built from
#[derive(Clone)]
pub enum InputSource {
    Declared(InputObjectType),
    /// Derived from the fields of an output object
    Derived(ObjectType),
}

/// Registry of everything materialized during one weave
///
/// Every map is keyed by type identity: the same definition always maps to
/// the same entry, and separately built definitions never merge. Names are
/// tracked separately so two distinct types claiming one name fail the weave.
pub struct WeaverContext {
    objects: Vec<LoomObject>,
    object_ids: HashMap<TypeKey, ObjectId>,
    interfaces: IndexMap<TypeKey, InterfaceSource>,
    unions: IndexMap<TypeKey, UnionType>,
    enums: IndexMap<TypeKey, EnumType>,
    scalars: IndexMap<TypeKey, ScalarType>,
    inputs: IndexMap<TypeKey, InputSource>,
    names: HashMap<String, TypeSlot>,
    pub(crate) aliases: AliasAssigner,
    pub(crate) plans: IndexMap<TypeSlot, Option<TypePlan>>,
    config: ConfigStore,
}

impl WeaverContext {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            object_ids: HashMap::new(),
            interfaces: IndexMap::new(),
            unions: IndexMap::new(),
            enums: IndexMap::new(),
            scalars: IndexMap::new(),
            inputs: IndexMap::new(),
            names: HashMap::new(),
            aliases: AliasAssigner::new(),
            plans: IndexMap::new(),
            config: ConfigStore::new(),
        }
    }

    // ==================== Configuration ====================

    pub fn set_config<T: Any + Send + Sync>(&mut self, key: ConfigKey<T>, value: T) {
        self.config.set(key, value);
    }

    pub fn config<T: Any + Send + Sync>(&self, key: ConfigKey<T>) -> Option<&T> {
        self.config.get(key)
    }

    pub fn config_or_default<T: Any + Send + Sync + Clone + Default>(&self, key: ConfigKey<T>) -> T {
        self.config.get_or_default(key)
    }

    pub(crate) fn core_config(&self) -> CoreSchemaConfig {
        self.config_or_default(CORE_SCHEMA_CONFIG)
    }

    // ==================== Names ====================

    pub fn get_named_type(&self, name: &str) -> Option<TypeSlot> {
        self.names.get(name).copied()
    }

    /// Claim `name` for `slot`; claiming it again for the same slot is a no-op
    pub fn register_named_type(&mut self, name: &str, slot: TypeSlot) -> WeaveResult<()> {
        match self.names.get(name) {
            Some(existing) if *existing == slot => Ok(()),
            Some(_) => Err(WeaveError::DuplicateTypeName {
                name: name.to_string(),
            }),
            None => {
                debug!(type_name = name, kind = slot.kind(), "registered type name");
                self.names.insert(name.to_string(), slot);
                Ok(())
            }
        }
    }

    /// Register a named type or queue an anonymous one for aliasing
    fn claim(&mut self, name: Option<&str>, slot: TypeSlot) -> WeaveResult<()> {
        match name {
            Some(name) => self.register_named_type(name, slot),
            None => {
                self.aliases.register_pending(slot);
                Ok(())
            }
        }
    }

    /// Final name of a materialized type
    pub fn name_of(&self, slot: TypeSlot) -> WeaveResult<String> {
        let declared = match slot {
            TypeSlot::Scalar(key) => Some(
                self.scalars
                    .get(&key)
                    .map(|scalar| scalar.name().to_string())
                    .ok_or_else(|| not_materialized(slot))?,
            ),
            TypeSlot::Object(key) => self
                .object_ids
                .get(&key)
                .map(|id| self.objects[id.0].base().name().map(str::to_string))
                .ok_or_else(|| not_materialized(slot))?,
            TypeSlot::Interface(key) => match self.interfaces.get(&key) {
                Some(InterfaceSource::Interface(interface)) => Some(interface.name().to_string()),
                Some(InterfaceSource::Object(object)) => object.name().map(str::to_string),
                None => return Err(not_materialized(slot)),
            },
            TypeSlot::Union(key) => self
                .unions
                .get(&key)
                .map(|u| u.name().map(str::to_string))
                .ok_or_else(|| not_materialized(slot))?,
            TypeSlot::Enum(key) => self
                .enums
                .get(&key)
                .map(|e| e.name().map(str::to_string))
                .ok_or_else(|| not_materialized(slot))?,
            TypeSlot::Input(key) => match self.inputs.get(&key) {
                Some(InputSource::Declared(input)) => Some(input.name().to_string()),
                Some(InputSource::Derived(object)) => {
                    let base = match object.name() {
                        Some(name) => name.to_string(),
                        None => self.alias_of(slot)?,
                    };
                    Some(self.core_config().input_name_for(&base))
                }
                None => return Err(not_materialized(slot)),
            },
        };

        match declared {
            Some(name) => Ok(name),
            None => self.alias_of(slot),
        }
    }

    /// Name nested anonymous types are prefixed with
    ///
    /// Derived inputs use the name of their source object, before the input
    /// naming hook. Types without a name yet give an empty base.
    pub(crate) fn naming_base(&self, slot: TypeSlot) -> String {
        let name = match (slot, self.inputs.get(&slot.key())) {
            (TypeSlot::Input(_), Some(InputSource::Derived(object))) => object
                .name()
                .map(str::to_string)
                .or_else(|| self.aliases.alias(slot).map(str::to_string)),
            _ => self.name_of(slot).ok(),
        };
        name.unwrap_or_default()
    }

    fn alias_of(&self, slot: TypeSlot) -> WeaveResult<String> {
        self.aliases
            .alias(slot)
            .map(str::to_string)
            .ok_or_else(|| WeaveError::UnnamedType(format!("{} was never reached through a field", slot.kind())))
    }

    /// Settle aliases, check every anonymous type got one and claim them
    pub(crate) fn finish_naming(&mut self) -> WeaveResult<()> {
        self.resolve_aliases();
        self.aliases.check_all_named()?;
        let slots: Vec<TypeSlot> = self.plans.keys().copied().collect();
        for slot in slots {
            if matches!(slot, TypeSlot::Scalar(_)) {
                continue;
            }
            let name = self.name_of(slot)?;
            self.register_named_type(&name, slot)?;
        }
        Ok(())
    }

    /// Turn recorded offers into aliases, owners before the types they reach
    fn resolve_aliases(&mut self) {
        let mut settled = HashSet::new();
        let mut visiting = HashSet::new();
        for slot in self.aliases.pending_slots() {
            self.resolve_alias(slot, &mut settled, &mut visiting);
        }
    }

    fn resolve_alias(
        &mut self,
        slot: TypeSlot,
        settled: &mut HashSet<TypeSlot>,
        visiting: &mut HashSet<TypeSlot>,
    ) {
        if settled.contains(&slot) || !visiting.insert(slot) {
            return;
        }

        let config = self.core_config();
        for offer in self.aliases.offers(slot).to_vec() {
            if self.aliases.is_pending(offer.owner) {
                self.resolve_alias(offer.owner, settled, visiting);
                // owner is still being settled further up a cycle
                if self.aliases.alias(offer.owner).is_none() {
                    continue;
                }
            }
            let candidate = alias_candidate(&self.naming_base(offer.owner), &offer.path, |name| {
                config.is_root_name(name)
            });
            self.aliases.set_alias(slot, &candidate);
        }

        visiting.remove(&slot);
        settled.insert(slot);
    }

    // ==================== Materialization ====================

    /// Get or create the Loom Object wrapping `base`
    pub fn materialize_object(&mut self, base: &ObjectType) -> WeaveResult<ObjectId> {
        if let Some(id) = self.object_ids.get(&base.key()) {
            return Ok(*id);
        }

        self.claim(base.name(), TypeSlot::Object(base.key()))?;
        let id = ObjectId(self.objects.len());
        self.objects.push(LoomObject::new(base.clone()));
        self.object_ids.insert(base.key(), id);
        Ok(id)
    }

    pub fn object(&self, id: ObjectId) -> &LoomObject {
        &self.objects[id.0]
    }

    pub fn object_mut(&mut self, id: ObjectId) -> &mut LoomObject {
        &mut self.objects[id.0]
    }

    pub(crate) fn object_id(&self, key: TypeKey) -> Option<ObjectId> {
        self.object_ids.get(&key).copied()
    }

    /// Get or create an interface from an interface type or an object
    pub fn materialize_interface(&mut self, ty: &GraphQLType) -> WeaveResult<TypeSlot> {
        let (key, source) = match ty.named() {
            GraphQLType::Interface(interface) => {
                (interface.key(), InterfaceSource::Interface(interface.clone()))
            }
            GraphQLType::Object(object) => (object.key(), InterfaceSource::Object(object.clone())),
            other => {
                return Err(WeaveError::InvalidComposition(format!(
                    "`{other}` cannot be implemented as an interface"
                )))
            }
        };

        let slot = TypeSlot::Interface(key);
        if self.interfaces.contains_key(&key) {
            return Ok(slot);
        }

        let name = match &source {
            InterfaceSource::Interface(interface) => interface.name().to_string(),
            InterfaceSource::Object(object) => object.name().map(str::to_string).ok_or_else(|| {
                WeaveError::InvalidComposition(
                    "an anonymous object cannot be used as an interface".to_string(),
                )
            })?,
        };
        self.register_named_type(&name, slot)?;
        self.interfaces.insert(key, source);
        Ok(slot)
    }

    pub(crate) fn interface(&self, key: TypeKey) -> Option<&InterfaceSource> {
        self.interfaces.get(&key)
    }

    pub fn materialize_union(&mut self, union: &UnionType) -> WeaveResult<TypeSlot> {
        let slot = TypeSlot::Union(union.key());
        if !self.unions.contains_key(&union.key()) {
            self.claim(union.name(), slot)?;
            self.unions.insert(union.key(), union.clone());
        }
        Ok(slot)
    }

    pub(crate) fn union(&self, key: TypeKey) -> Option<&UnionType> {
        self.unions.get(&key)
    }

    pub fn materialize_enum(&mut self, values: &EnumType) -> WeaveResult<TypeSlot> {
        let slot = TypeSlot::Enum(values.key());
        if !self.enums.contains_key(&values.key()) {
            self.claim(values.name(), slot)?;
            self.enums.insert(values.key(), values.clone());
        }
        Ok(slot)
    }

    pub(crate) fn enum_type(&self, key: TypeKey) -> Option<&EnumType> {
        self.enums.get(&key)
    }

    /// Get or create a scalar; built-in scalars never claim their name
    pub fn materialize_scalar(&mut self, scalar: &ScalarType) -> WeaveResult<TypeSlot> {
        let slot = TypeSlot::Scalar(scalar.key());
        if !self.scalars.contains_key(&scalar.key()) {
            if !scalar.is_builtin() {
                self.register_named_type(scalar.name(), slot)?;
            }
            self.scalars.insert(scalar.key(), scalar.clone());
        }
        Ok(slot)
    }

    pub(crate) fn scalar(&self, key: TypeKey) -> Option<&ScalarType> {
        self.scalars.get(&key)
    }

    /// Get or create the input object for an object or input object
    ///
    /// Inputs derived from named objects are named through the input naming
    /// hook. Inputs derived from anonymous objects wait for an alias taken
    /// from the argument path.
    pub fn ensure_input_object(&mut self, ty: &GraphQLType) -> WeaveResult<TypeSlot> {
        let (key, source) = match ty.named() {
            GraphQLType::InputObject(input) => (input.key(), InputSource::Declared(input.clone())),
            GraphQLType::Object(object) => (object.key(), InputSource::Derived(object.clone())),
            GraphQLType::Interface(interface) => {
                return Err(WeaveError::shape(format!(
                    "interface `{}` cannot be converted to an input object",
                    interface.name()
                )))
            }
            GraphQLType::Union(union) => {
                return Err(WeaveError::shape(format!(
                    "union `{}` cannot be converted to an input object",
                    union.name().unwrap_or("<anonymous>")
                )))
            }
            other => {
                return Err(WeaveError::shape(format!(
                    "`{other}` is not an object and cannot become an input object"
                )))
            }
        };

        let slot = TypeSlot::Input(key);
        if self.inputs.contains_key(&key) {
            return Ok(slot);
        }

        match &source {
            InputSource::Declared(input) => self.register_named_type(input.name(), slot)?,
            InputSource::Derived(object) => match object.name() {
                Some(name) => {
                    let name = self.core_config().input_name_for(name);
                    self.register_named_type(&name, slot)?;
                }
                None => self.aliases.register_pending(slot),
            },
        }
        self.inputs.insert(key, source);
        Ok(slot)
    }

    pub(crate) fn input(&self, key: TypeKey) -> Option<&InputSource> {
        self.inputs.get(&key)
    }
}

impl Default for WeaverContext {
    fn default() -> Self {
        Self::new()
    }
}

fn not_materialized(slot: TypeSlot) -> WeaveError {
    WeaveError::InvalidComposition(format!("{} was used before being materialized", slot.kind()))
}
