//! Declarative view reconciliation.
//!
//! # Conceptual overview
//! Weft keeps a retained tree of fibers in sync with a tree of immutable view values and turns
//! the differences into a minimal list of edits for a rendering backend.
//!
//! ## Views
//! There are two kinds of views: primitive views, which map to exactly one backend element (like
//! text or a stack), and composite views, which are made up of other views and own no element.
//! Which views are primitive is decided by the [`Renderer`]. Views are cheap to create: they only
//! store their properties, and the reconciler asks them for children and layout when needed.
//!
//! ## Fibers
//! Every position in the view tree gets a fiber that persists across renders. When a new view
//! tree is rendered, each view is matched against the fibers at the same level by type and key.
//! Matched fibers (and their elements) are reused; unmatched ones are created or torn down.
//! Composite fibers contribute their descendants’ elements to the nearest primitive ancestor.
//!
//! ## Layout
//! Layout is negotiated during the same pass: parents propose sizes, children request sizes, and
//! parents then position each child. See [`layout`].
//!
//! ## Environment and preferences
//! Environment values flow down the tree as shared, copy-on-write snapshots. Preferences flow up,
//! combined per key.
//!
//! ## Rendering
//! A render pass produces a [`MutationLog`] that is handed to the renderer only once the pass is
//! complete. A [`PreparedRender`] can be inspected before committing, or dropped to discard it.

mod config;
pub mod environment;
mod error;
pub mod fiber;
pub mod geometry;
mod host;
pub mod html;
pub mod layout;
pub mod modifier;
mod mutation;
pub mod preference;
mod reconciler;
mod renderer;
#[macro_use]
mod view;

#[cfg(test)]
mod testing;

pub use config::{ReconcilerConfig, DEFAULT_LOOKAHEAD_WINDOW};
pub use environment::{EnvironmentKey, EnvironmentValues};
pub use error::RenderError;
pub use fiber::{Fiber, FiberId, FiberTree};
pub use host::{Host, RenderHandle};
pub use modifier::{ModifiedContent, ViewExt, ViewModifier};
pub use mutation::{Element, ElementHandle, Mutation, MutationLog};
pub use preference::{PreferenceKey, PreferenceStore};
pub use reconciler::{PreparedRender, Reconciler};
pub use renderer::{ContentOf, Renderer};
pub use view::{
    view_type, AnyView, Children, Fragment, Primitive, Stack, Text, View, ViewInputs, ViewOutputs,
    DEFAULT_STACK_SPACING,
};
