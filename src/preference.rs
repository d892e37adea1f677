//! Values bubbled up from descendants to ancestors during layout.

use core::any::{Any, TypeId};
use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;

/// A typed preference key with its reduce rule.
pub trait PreferenceKey: 'static {
    type Value: Clone + fmt::Debug + Send + Sync + 'static;

    fn default_value() -> Self::Value;

    /// Folds a value reported later in tree order into the accumulated one.
    ///
    /// The default is last-write-wins.
    fn reduce(value: &mut Self::Value, next: Self::Value) {
        *value = next;
    }
}

/// Reduce rule that keeps the first value written (an ancestor overwrites its descendants).
pub fn keep_first<T>(_value: &mut T, next: T) {
    drop(next);
}

/// Reduce rule that combines values with an associative operation.
pub fn combine<T: Clone>(value: &mut T, next: T, op: impl FnOnce(T, T) -> T) {
    *value = op(value.clone(), next);
}

type Reducer = fn(&(dyn Any + Send + Sync), &(dyn Any + Send + Sync)) -> Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    reduce: Reducer,
    name: &'static str,
}

fn reduce_erased<K: PreferenceKey>(
    value: &(dyn Any + Send + Sync),
    next: &(dyn Any + Send + Sync),
) -> Arc<dyn Any + Send + Sync> {
    let mut value = match value.downcast_ref::<K::Value>() {
        Some(value) => value.clone(),
        None => K::default_value(),
    };
    if let Some(next) = next.downcast_ref::<K::Value>() {
        K::reduce(&mut value, next.clone());
    }
    Arc::new(value)
}

/// Preference values collected for one fiber and its descendants.
///
/// Stores are logically immutable once published to a fiber; merging builds a new store.
#[derive(Clone, Default)]
pub struct PreferenceStore {
    entries: HashMap<TypeId, Entry>,
}

impl PreferenceStore {
    pub fn new() -> PreferenceStore {
        PreferenceStore::default()
    }

    /// Returns the value for a key, or its default if nothing was reported.
    pub fn value<K: PreferenceKey>(&self) -> K::Value {
        self.entries
            .get(&TypeId::of::<K>())
            .and_then(|entry| entry.value.downcast_ref::<K::Value>())
            .cloned()
            .unwrap_or_else(K::default_value)
    }

    /// Returns true if some fiber reported a value for the key.
    pub fn contains<K: PreferenceKey>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<K>())
    }

    /// Reports a value, reducing it into an existing one.
    pub fn insert<K: PreferenceKey>(&mut self, value: K::Value) {
        let id = TypeId::of::<K>();
        match self.entries.get_mut(&id) {
            Some(entry) => entry.value = (entry.reduce)(&*entry.value, &value),
            None => {
                self.entries.insert(
                    id,
                    Entry {
                        value: Arc::new(value),
                        reduce: reduce_erased::<K>,
                        name: core::any::type_name::<K>(),
                    },
                );
            }
        }
    }

    /// Folds a descendant’s store into this one, using each key’s reduce rule.
    pub fn merge(&mut self, child: &PreferenceStore) {
        for (id, child_entry) in &child.entries {
            match self.entries.get_mut(id) {
                Some(entry) => entry.value = (entry.reduce)(&*entry.value, &*child_entry.value),
                None => {
                    self.entries.insert(*id, child_entry.clone());
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for PreferenceStore {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut keys: Vec<_> = self.entries.values().map(|entry| entry.name).collect();
        keys.sort_unstable();
        f.debug_struct("PreferenceStore").field("keys", &keys).finish()
    }
}
