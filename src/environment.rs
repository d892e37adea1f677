//! Ambient values inherited down the fiber tree.

use core::any::{Any, TypeId};
use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;

/// A typed key into [`EnvironmentValues`].
pub trait EnvironmentKey: 'static {
    type Value: Clone + fmt::Debug + Send + Sync + 'static;

    /// The value seen when no ancestor has set this key.
    fn default_value() -> Self::Value;
}

type Entry = Arc<dyn Any + Send + Sync>;

/// A read-only snapshot of environment values.
///
/// Cloning is a reference bump. Writing copies the map if another fiber still holds it, so a
/// snapshot published to a fiber is never mutated underneath it.
#[derive(Clone, Default)]
pub struct EnvironmentValues {
    values: Arc<HashMap<TypeId, (Entry, &'static str)>>,
}

impl EnvironmentValues {
    pub fn new() -> EnvironmentValues {
        EnvironmentValues::default()
    }

    /// Returns the value for a key, or its default.
    pub fn get<K: EnvironmentKey>(&self) -> K::Value {
        self.values
            .get(&TypeId::of::<K>())
            .and_then(|(value, _)| value.downcast_ref::<K::Value>())
            .cloned()
            .unwrap_or_else(K::default_value)
    }

    /// Sets a value.
    pub fn set<K: EnvironmentKey>(&mut self, value: K::Value) {
        Arc::make_mut(&mut self.values).insert(
            TypeId::of::<K>(),
            (Arc::new(value), core::any::type_name::<K>()),
        );
    }

    /// Returns a copy of this snapshot with one value replaced.
    pub fn with<K: EnvironmentKey>(&self, value: K::Value) -> EnvironmentValues {
        let mut env = self.clone();
        env.set::<K>(value);
        env
    }

    /// Returns true if both snapshots are the same shared object.
    pub fn ptr_eq(&self, other: &EnvironmentValues) -> bool {
        Arc::ptr_eq(&self.values, &other.values)
    }
}

impl fmt::Debug for EnvironmentValues {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut keys: Vec<_> = self.values.values().map(|(_, name)| *name).collect();
        keys.sort_unstable();
        f.debug_struct("EnvironmentValues")
            .field("keys", &keys)
            .finish()
    }
}

/// Light or dark appearance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ColorScheme {
    Light,
    Dark,
}

/// Environment key for the current [`ColorScheme`].
#[derive(Debug)]
pub struct ColorSchemeKey;

impl EnvironmentKey for ColorSchemeKey {
    type Value = ColorScheme;
    fn default_value() -> ColorScheme {
        ColorScheme::Light
    }
}
