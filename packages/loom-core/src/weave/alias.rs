use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::TypeSlot;
use crate::error::{WeaveError, WeaveResult};

/// One field path that reached a pending type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasOffer {
    /// Type the path starts from
    pub owner: TypeSlot,
    /// Field and argument names below the owner, outermost first
    pub path: Vec<String>,
}

/// Names anonymous types after the field path that reaches them
///
/// The first candidate seen names the type. A later candidate replaces it
/// only when strictly shorter, so equal-length candidates keep the first one.
/// Offers are kept relative to their owner so the owner's final name is used
/// once every alias is settled.
#[derive(Debug, Default)]
pub struct AliasAssigner {
    pending: IndexMap<TypeSlot, Option<String>>,
    offers: HashMap<TypeSlot, Vec<AliasOffer>>,
}

impl AliasAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track an anonymous type; registering twice keeps the current alias
    pub fn register_pending(&mut self, slot: TypeSlot) {
        self.pending.entry(slot).or_insert(None);
    }

    pub fn is_pending(&self, slot: TypeSlot) -> bool {
        self.pending.contains_key(&slot)
    }

    pub fn pending_slots(&self) -> Vec<TypeSlot> {
        self.pending.keys().copied().collect()
    }

    /// Record a field path reaching `slot`; ignored for named types
    pub fn offer(&mut self, slot: TypeSlot, owner: TypeSlot, path: &[&str]) {
        if !self.is_pending(slot) || path.is_empty() {
            return;
        }
        let offer = AliasOffer {
            owner,
            path: path.iter().map(|segment| segment.to_string()).collect(),
        };
        let offers = self.offers.entry(slot).or_default();
        if !offers.contains(&offer) {
            offers.push(offer);
        }
    }

    /// Offers for `slot` in the order they were made
    pub fn offers(&self, slot: TypeSlot) -> &[AliasOffer] {
        self.offers.get(&slot).map_or(&[], Vec::as_slice)
    }

    /// Offer a candidate name; returns whether the alias changed
    ///
    /// Types that were never registered as pending have a caller-chosen name
    /// and are left alone.
    pub fn set_alias(&mut self, slot: TypeSlot, candidate: &str) -> bool {
        if candidate.is_empty() {
            return false;
        }
        let Some(current) = self.pending.get_mut(&slot) else {
            return false;
        };

        let shorter = match current.as_deref() {
            None => true,
            Some(name) => candidate.len() < name.len(),
        };
        if !shorter {
            return false;
        }

        match current.replace(candidate.to_string()) {
            Some(previous) => {
                warn!(from = %previous, to = candidate, "renamed anonymous type to a shorter alias")
            }
            None => debug!(alias = candidate, "named anonymous type"),
        }
        true
    }

    pub fn alias(&self, slot: TypeSlot) -> Option<&str> {
        self.pending.get(&slot)?.as_deref()
    }

    /// Fail on the first pending type that never got a name
    pub fn check_all_named(&self) -> WeaveResult<()> {
        match self.pending.iter().find(|(_, alias)| alias.is_none()) {
            Some((slot, _)) => Err(WeaveError::UnnamedType(format!(
                "{} is never reached through a field",
                slot.kind()
            ))),
            None => Ok(()),
        }
    }
}

/// Candidate name for a type reached from `owner` through `path`
///
/// The owner's name is kept as written; a root type name contributes nothing.
/// Each path segment gets its first character uppercased.
pub fn alias_candidate<S: AsRef<str>>(
    owner: &str,
    path: &[S],
    is_root: impl Fn(&str) -> bool,
) -> String {
    let mut candidate = if is_root(owner) {
        String::new()
    } else {
        owner.to_string()
    };
    for segment in path {
        let mut chars = segment.as_ref().chars();
        if let Some(first) = chars.next() {
            candidate.extend(first.to_uppercase());
            candidate.push_str(chars.as_str());
        }
    }
    candidate
}
