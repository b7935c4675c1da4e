//! Requested and selected field analysis
//!
//! Walks the selection of the field being resolved, following inline
//! fragments and fragment spreads and honouring `@skip`/`@include`, and
//! flattens it into dotted paths. Derived fields are then swapped for the raw
//! fields they declare, which is what a data source should actually fetch.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::convert::Infallible;
use std::sync::Arc;

use async_graphql::parser::types::{Directive, FragmentDefinition, Selection, SelectionSet};
use async_graphql::{Name, Positioned, Value, Variables};

use crate::context::ResolverPayload;

/// Raw dependencies of derived fields, keyed by field name
pub type DerivedTable = HashMap<String, Vec<String>>;

/// How far below the resolved field to look
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    /// Direct children only
    Shallow,
    /// Every level
    Deep,
}

/// Fragments and variables of the operation being executed
#[derive(Debug, Clone, Default)]
pub struct OperationDocument {
    pub fragments: HashMap<Name, Positioned<FragmentDefinition>>,
    pub variables: Variables,
}

impl OperationDocument {
    pub fn new(
        fragments: HashMap<Name, Positioned<FragmentDefinition>>,
        variables: Variables,
    ) -> Self {
        Self {
            fragments,
            variables,
        }
    }
}

/// Selection set of one field plus the document it came from
#[derive(Debug, Clone)]
pub struct FieldSelection {
    selection_set: Positioned<SelectionSet>,
    document: Arc<OperationDocument>,
}

impl FieldSelection {
    pub fn new(selection_set: Positioned<SelectionSet>, document: Arc<OperationDocument>) -> Self {
        Self {
            selection_set,
            document,
        }
    }

    /// Dotted paths of every requested field, by field name rather than alias
    pub fn requested_fields(&self, depth: Depth) -> BTreeSet<String> {
        let mut requested = BTreeSet::new();
        let mut active_fragments = HashSet::new();
        self.walk(
            &self.selection_set.node,
            "",
            depth,
            &mut active_fragments,
            &mut requested,
        );
        requested
    }

    fn walk<'a>(
        &'a self,
        set: &'a SelectionSet,
        prefix: &str,
        depth: Depth,
        active_fragments: &mut HashSet<&'a Name>,
        requested: &mut BTreeSet<String>,
    ) {
        for item in &set.items {
            match &item.node {
                Selection::Field(field) => {
                    let field = &field.node;
                    if !self.included(&field.directives) {
                        continue;
                    }
                    let name = field.name.node.as_str();
                    if name.starts_with("__") {
                        continue;
                    }

                    let path = if prefix.is_empty() {
                        name.to_string()
                    } else {
                        format!("{prefix}.{name}")
                    };
                    requested.insert(path.clone());

                    if depth == Depth::Deep && !field.selection_set.node.items.is_empty() {
                        self.walk(
                            &field.selection_set.node,
                            &path,
                            depth,
                            active_fragments,
                            requested,
                        );
                    }
                }
                Selection::InlineFragment(fragment) => {
                    let fragment = &fragment.node;
                    if self.included(&fragment.directives) {
                        self.walk(
                            &fragment.selection_set.node,
                            prefix,
                            depth,
                            active_fragments,
                            requested,
                        );
                    }
                }
                Selection::FragmentSpread(spread) => {
                    let spread = &spread.node;
                    if !self.included(&spread.directives) {
                        continue;
                    }
                    let Some((name, definition)) =
                        self.document.fragments.get_key_value(&spread.fragment_name.node)
                    else {
                        continue;
                    };
                    if !active_fragments.insert(name) {
                        continue;
                    }
                    self.walk(
                        &definition.node.selection_set.node,
                        prefix,
                        depth,
                        active_fragments,
                        requested,
                    );
                    active_fragments.remove(name);
                }
            }
        }
    }

    fn included(&self, directives: &[Positioned<Directive>]) -> bool {
        directives.iter().all(|directive| {
            let directive = &directive.node;
            match directive.name.node.as_str() {
                "skip" => !self.condition(directive).unwrap_or(false),
                "include" => self.condition(directive).unwrap_or(true),
                _ => true,
            }
        })
    }

    /// Value of the `if` argument; `None` when absent
    fn condition(&self, directive: &Directive) -> Option<bool> {
        let argument = directive.get_argument("if")?;
        let value = argument.node.clone().into_const_with(|name| {
            let value = self.document.variables.get(&name).cloned();
            Ok::<_, Infallible>(value.unwrap_or(Value::Null))
        });
        Some(matches!(value, Ok(Value::Boolean(true))))
    }
}

// ==================== Type index ====================

/// What the analyzer needs to know about one object type
#[derive(Debug, Clone, Default)]
pub struct TypeEntry {
    pub derived: DerivedTable,
    /// Named return type of every field
    pub fields: HashMap<String, String>,
}

/// Derived dependencies and field types of a schema's object types
#[derive(Debug, Clone, Default)]
pub struct TypeIndex {
    types: HashMap<String, TypeEntry>,
}

impl TypeIndex {
    pub fn insert(&mut self, type_name: impl Into<String>, entry: TypeEntry) {
        self.types.insert(type_name.into(), entry);
    }

    pub fn get(&self, type_name: &str) -> Option<&TypeEntry> {
        self.types.get(type_name)
    }
}

// ==================== Resolving fields ====================

/// Field sets of one selection level
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvingFields {
    /// Fields the client asked for
    pub requested_fields: BTreeSet<String>,
    /// Requested fields that are derived
    pub derived_fields: BTreeSet<String>,
    /// Raw fields the derived fields need
    pub derived_dependencies: BTreeSet<String>,
    /// Requested minus derived plus dependencies
    pub selected_fields: BTreeSet<String>,
}

impl ResolvingFields {
    pub fn compute(requested_fields: BTreeSet<String>, derived: &DerivedTable) -> Self {
        let mut derived_fields = BTreeSet::new();
        let mut derived_dependencies = BTreeSet::new();
        for field in &requested_fields {
            if let Some(dependencies) = derived.get(field) {
                derived_fields.insert(field.clone());
                derived_dependencies.extend(dependencies.iter().cloned());
            }
        }

        let selected_fields = requested_fields
            .difference(&derived_fields)
            .cloned()
            .chain(derived_dependencies.iter().cloned())
            .collect();

        Self {
            requested_fields,
            derived_fields,
            derived_dependencies,
            selected_fields,
        }
    }
}

/// Field sets of the direct children of the field being resolved
pub fn get_resolving_fields(payload: &ResolverPayload) -> ResolvingFields {
    let info = payload.info();
    let requested = info
        .selection
        .as_ref()
        .map(|selection| selection.requested_fields(Depth::Shallow))
        .unwrap_or_default();

    let empty = DerivedTable::new();
    let derived = info
        .types
        .get(&info.return_type)
        .map_or(&empty, |entry| &entry.derived);
    ResolvingFields::compute(requested, derived)
}

/// Field sets of every selection level, keyed by dotted path ("" is the field itself)
pub fn get_deep_resolving_fields(payload: &ResolverPayload) -> BTreeMap<String, ResolvingFields> {
    let info = payload.info();
    let requested = info
        .selection
        .as_ref()
        .map(|selection| selection.requested_fields(Depth::Deep))
        .unwrap_or_default();

    let mut levels: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    levels.insert(String::new(), BTreeSet::new());
    for path in requested {
        let (parent, leaf) = match path.rsplit_once('.') {
            Some((parent, leaf)) => (parent.to_string(), leaf.to_string()),
            None => (String::new(), path),
        };
        levels.entry(parent).or_default().insert(leaf);
    }

    let empty = DerivedTable::new();
    levels
        .into_iter()
        .map(|(path, fields)| {
            let derived = level_type(&info.types, &info.return_type, &path)
                .and_then(|type_name| info.types.get(type_name))
                .map_or(&empty, |entry| &entry.derived);
            let resolved = ResolvingFields::compute(fields, derived);
            (path, resolved)
        })
        .collect()
}

fn level_type<'a>(types: &'a TypeIndex, root: &'a str, path: &str) -> Option<&'a str> {
    if path.is_empty() {
        return Some(root);
    }
    path.split('.').try_fold(root, |type_name, field| {
        types
            .get(type_name)
            .and_then(|entry| entry.fields.get(field))
            .map(String::as_str)
    })
}
