//! Errors that may occur when scheduling or running a render pass.

use thiserror::Error;

/// Recoverable render failures.
///
/// Contract violations between views and renderers are not represented here; they panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum RenderError {
    /// Another render pass holds this tree.
    #[error("another render pass is in flight on this tree")]
    Busy,

    /// The host that would perform the render is gone.
    #[error("render queue has been disconnected")]
    Disconnected,
}
