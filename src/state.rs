//! Cross-frame storage for stateful elements.
//!
//! Elements are rebuilt every frame, so anything a control needs to remember (click
//! counts, press timers, scroll offsets) lives here, addressed by
//! `(scope path, element kind, caller key)`.
//!
//! - Keys are explicit. Elements generated in loops should derive them from a stable
//!   item identity (`StateKey::indexed("row", item.id)`), never from position.
//! - A key claimed by two different element dispatches in the same pass is reported
//!   as [`Error::DuplicateStateKey`] instead of silently sharing state.
//! - Records not touched during a pass are swept at the end of it under
//!   [`EvictionPolicy::Sweep`].

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

/// Caller-supplied stable identity for a stateful element.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct StateKey(Cow<'static, str>);

impl StateKey {
    pub fn new(key: impl Into<Cow<'static, str>>) -> Self {
        Self(key.into())
    }

    /// Key for the `index`-th item generated from a loop.
    pub fn indexed(base: &str, index: impl fmt::Display) -> Self {
        Self(Cow::Owned(format!("{base}[{index}]")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for StateKey {
    fn from(key: &'static str) -> Self {
        Self(Cow::Borrowed(key))
    }
}

impl From<String> for StateKey {
    fn from(key: String) -> Self {
        Self(Cow::Owned(key))
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What happens to records that were not re-declared during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Remove records untouched during the pass when it ends.
    #[default]
    Sweep,
    /// Keep every record until it is evicted explicitly.
    Retain,
}

/// The element dispatch accessing a record. Two different dispatches touching the
/// same record in one pass is a key collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claim {
    pub kind: TypeId,
    pub dispatch: u64,
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct RecordKey {
    path: String,
    kind: TypeId,
    key: StateKey,
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.key)
        } else {
            write!(f, "{}/{}", self.path, self.key)
        }
    }
}

struct Record {
    value: Box<dyn Any>,
    type_name: &'static str,
    last_pass: u64,
    claimed_by: u64,
}

#[derive(Default)]
pub struct StateStore {
    records: HashMap<RecordKey, Record>,
    scopes: Vec<Cow<'static, str>>,
    /// Current scope path, `scopes` joined with '/'.
    path: String,
    pass: u64,
    created: u64,
    evicted: u64,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_key(&self, kind: TypeId, key: &StateKey) -> RecordKey {
        RecordKey {
            path: self.path.clone(),
            kind,
            key: key.clone(),
        }
    }

    /// Fetch the record for `key`, creating it with `init` on first encounter.
    pub fn get_or_create<S: 'static>(
        &mut self,
        claim: Claim,
        key: &StateKey,
        init: impl FnOnce() -> S,
    ) -> Result<&mut S> {
        let record_key = self.record_key(claim.kind, key);
        let pass = self.pass;
        let record = match self.records.entry(record_key) {
            std::collections::hash_map::Entry::Occupied(entry) => {
                let record = entry.into_mut();
                if record.last_pass == pass && record.claimed_by != claim.dispatch {
                    return Err(Error::DuplicateStateKey(key.to_string()));
                }
                record
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                log::trace!("creating state `{}`", entry.key());
                self.created += 1;
                entry.insert(Record {
                    value: Box::new(init()),
                    type_name: std::any::type_name::<S>(),
                    last_pass: pass,
                    claimed_by: claim.dispatch,
                })
            }
        };
        record.last_pass = pass;
        record.claimed_by = claim.dispatch;
        let stored = record.type_name;
        record
            .value
            .downcast_mut::<S>()
            .ok_or_else(|| Error::StateTypeMismatch {
                key: key.to_string(),
                stored,
                requested: std::any::type_name::<S>(),
            })
    }

    /// Replace the value stored under `key`, creating the record if needed.
    pub fn update<S: 'static>(&mut self, claim: Claim, key: &StateKey, value: S) -> Result<()> {
        let mut value = Some(value);
        let slot = self.get_or_create(claim, key, || value.take().expect("init runs once"))?;
        if let Some(value) = value {
            *slot = value;
        }
        Ok(())
    }

    /// Read without creating or claiming. Used by measurement.
    pub fn peek<S: 'static>(&self, kind: TypeId, key: &StateKey) -> Result<Option<&S>> {
        let Some(record) = self.records.get(&self.record_key(kind, key)) else {
            return Ok(None);
        };
        record
            .value
            .downcast_ref::<S>()
            .map(Some)
            .ok_or_else(|| Error::StateTypeMismatch {
                key: key.to_string(),
                stored: record.type_name,
                requested: std::any::type_name::<S>(),
            })
    }

    /// Remove one record in the current scope. Returns whether it existed.
    pub fn evict(&mut self, kind: TypeId, key: &StateKey) -> bool {
        let removed = self.records.remove(&self.record_key(kind, key)).is_some();
        if removed {
            self.evicted += 1;
        }
        removed
    }

    /// Enter a nested namespace. Keys inside it never collide with outer keys.
    pub fn push_scope(&mut self, name: impl Into<Cow<'static, str>>) {
        let name = name.into();
        if !self.path.is_empty() {
            self.path.push('/');
        }
        self.path.push_str(&name);
        self.scopes.push(name);
    }

    pub fn pop_scope(&mut self) -> Result<()> {
        self.scopes.pop().ok_or(Error::StateScopeUnderflow)?;
        self.path = self.scopes.join("/");
        Ok(())
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn current_scope(&self) -> &str {
        &self.path
    }

    /// Unwind namespaces pushed past `depth`. Returns `false` if any were left over.
    pub(crate) fn restore_scopes(&mut self, depth: usize) -> bool {
        let balanced = self.scopes.len() == depth;
        if self.scopes.len() > depth {
            self.scopes.truncate(depth);
            self.path = self.scopes.join("/");
        }
        balanced
    }

    /// Drop every record under the namespace `path` (and its nested namespaces).
    pub fn clear_scope(&mut self, path: &str) -> usize {
        let before = self.records.len();
        self.records.retain(|key, _| !in_scope(&key.path, path));
        let removed = before - self.records.len();
        self.evicted += removed as u64;
        removed
    }

    pub fn begin_pass(&mut self) {
        self.pass += 1;
    }

    /// Apply `policy` to records not touched during the current pass.
    pub fn end_pass(&mut self, policy: EvictionPolicy) -> usize {
        if policy == EvictionPolicy::Retain {
            return 0;
        }
        let pass = self.pass;
        let before = self.records.len();
        self.records.retain(|key, record| {
            let keep = record.last_pass == pass;
            if !keep {
                log::trace!("sweeping state `{key}`");
            }
            keep
        });
        let removed = before - self.records.len();
        self.evicted += removed as u64;
        removed
    }

    pub fn pass(&self) -> u64 {
        self.pass
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.evicted += self.records.len() as u64;
        self.records.clear();
    }

    pub(crate) fn created_total(&self) -> u64 {
        self.created
    }

    pub(crate) fn evicted_total(&self) -> u64 {
        self.evicted
    }
}

fn in_scope(record_path: &str, scope: &str) -> bool {
    if scope.is_empty() {
        return true;
    }
    record_path == scope
        || (record_path.starts_with(scope) && record_path[scope.len()..].starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Button;
    struct Slider;

    fn claim<K: 'static>(dispatch: u64) -> Claim {
        Claim {
            kind: TypeId::of::<K>(),
            dispatch,
        }
    }

    #[test]
    fn test_get_or_create_initializes_once() {
        let mut store = StateStore::new();
        store.begin_pass();
        let key = StateKey::from("ok");
        *store.get_or_create(claim::<Button>(1), &key, || 0u32).unwrap() += 1;
        store.begin_pass();
        let count = store.get_or_create(claim::<Button>(7), &key, || 100u32).unwrap();
        assert_eq!(*count, 1);
        assert_eq!(store.created_total(), 1);
    }

    #[test]
    fn test_same_key_different_kind_is_independent() {
        let mut store = StateStore::new();
        store.begin_pass();
        let key = StateKey::from("volume");
        store.update(claim::<Button>(1), &key, 1u32).unwrap();
        store.update(claim::<Slider>(2), &key, 0.5f32).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(
            store.peek::<u32>(TypeId::of::<Button>(), &key).unwrap(),
            Some(&1)
        );
    }

    #[test]
    fn test_duplicate_claim_in_one_pass_is_detected() {
        let mut store = StateStore::new();
        store.begin_pass();
        let key = StateKey::from("row");
        store.get_or_create(claim::<Button>(1), &key, || 0u8).unwrap();
        // Same dispatch may come back for the same record.
        store.get_or_create(claim::<Button>(1), &key, || 0u8).unwrap();
        let err = store
            .get_or_create(claim::<Button>(2), &key, || 0u8)
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateStateKey(k) if k == "row"));
    }

    #[test]
    fn test_type_mismatch() {
        let mut store = StateStore::new();
        store.begin_pass();
        let key = StateKey::from("x");
        store.update(claim::<Button>(1), &key, 3u32).unwrap();
        store.begin_pass();
        let err = store
            .get_or_create(claim::<Button>(1), &key, String::new)
            .unwrap_err();
        assert!(matches!(err, Error::StateTypeMismatch { .. }));
    }

    #[test]
    fn test_peek_does_not_create() {
        let store = StateStore::new();
        let value = store
            .peek::<u32>(TypeId::of::<Button>(), &StateKey::from("missing"))
            .unwrap();
        assert_eq!(value, None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_scopes_namespace_keys() {
        let mut store = StateStore::new();
        store.begin_pass();
        let key = StateKey::from("ok");
        store.update(claim::<Button>(1), &key, 1u32).unwrap();
        store.push_scope("dialog");
        assert_eq!(store.current_scope(), "dialog");
        let inner = store.get_or_create(claim::<Button>(2), &key, || 10u32).unwrap();
        assert_eq!(*inner, 10);
        store.push_scope("page");
        assert_eq!(store.current_scope(), "dialog/page");
        store.update(claim::<Button>(3), &key, 20u32).unwrap();
        store.pop_scope().unwrap();
        store.pop_scope().unwrap();
        assert!(store.pop_scope().is_err());

        assert_eq!(store.clear_scope("dialog"), 2);
        assert_eq!(
            store.peek::<u32>(TypeId::of::<Button>(), &key).unwrap(),
            Some(&1)
        );
    }

    #[test]
    fn test_clear_scope_matches_whole_segments() {
        assert!(in_scope("dialog", "dialog"));
        assert!(in_scope("dialog/page", "dialog"));
        assert!(!in_scope("dialogs", "dialog"));
        assert!(in_scope("anything", ""));
    }

    #[test]
    fn test_sweep_evicts_untouched_records() {
        let mut store = StateStore::new();
        store.begin_pass();
        store
            .update(claim::<Button>(1), &StateKey::from("a"), 1u8)
            .unwrap();
        store
            .update(claim::<Button>(2), &StateKey::from("b"), 2u8)
            .unwrap();
        assert_eq!(store.end_pass(EvictionPolicy::Sweep), 0);

        store.begin_pass();
        store
            .get_or_create(claim::<Button>(3), &StateKey::from("a"), || 0u8)
            .unwrap();
        assert_eq!(store.end_pass(EvictionPolicy::Sweep), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.evicted_total(), 1);
    }

    #[test]
    fn test_retain_keeps_untouched_records() {
        let mut store = StateStore::new();
        store.begin_pass();
        store
            .update(claim::<Button>(1), &StateKey::from("a"), 1u8)
            .unwrap();
        store.begin_pass();
        assert_eq!(store.end_pass(EvictionPolicy::Retain), 0);
        assert_eq!(store.len(), 1);
        assert!(store.evict(TypeId::of::<Button>(), &StateKey::from("a")));
        assert!(store.is_empty());
    }

    #[test]
    fn test_indexed_key() {
        assert_eq!(StateKey::indexed("row", 3).as_str(), "row[3]");
    }
}
