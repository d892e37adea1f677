//! Reconciler configuration.

/// Siblings searched past a mismatch when looking for a moved fiber.
pub const DEFAULT_LOOKAHEAD_WINDOW: usize = 32;

/// Tuning parameters for a [`Reconciler`](crate::Reconciler).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ReconcilerConfig {
    /// How many old siblings past a mismatch are searched for a fiber the new view can reuse.
    ///
    /// Zero disables move detection; reordered siblings are then recreated.
    pub lookahead_window: usize,
}

impl ReconcilerConfig {
    pub fn lookahead_window(mut self, window: usize) -> ReconcilerConfig {
        self.lookahead_window = window;
        self
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        ReconcilerConfig {
            lookahead_window: DEFAULT_LOOKAHEAD_WINDOW,
        }
    }
}
