//! Traits for renderers.

use crate::environment::EnvironmentValues;
use crate::geometry::ProposedSize;
use crate::mutation::{Element, ElementHandle, MutationLog};
use crate::reconciler::Reconciler;
use crate::view::{AnyView, View};

/// Shorthand for a renderer’s element content type.
pub type ContentOf<R> = <<R as Renderer>::Element as Element>::Content;

/// A renderer implementation.
///
/// This is the whole surface a backend exposes to the reconciler.
pub trait Renderer {
    /// The element type this renderer uses.
    type Element: Element;

    /// Returns true if the view maps to exactly one element for this renderer.
    fn is_primitive(&self, view: &dyn View) -> bool;

    /// Converts a primitive view to element content.
    ///
    /// # Panics
    /// Implementations panic if the view is not primitive for this renderer; the reconciler only
    /// calls this for views that passed [`is_primitive`](Self::is_primitive).
    fn element_content(&self, view: &dyn View) -> ContentOf<Self>;

    /// Applies the mutations to the elements, strictly in order.
    fn commit(&self, mutations: MutationLog<Self::Element>);

    /// The element all top level views are mounted on.
    fn root_element(&self) -> ElementHandle<Self::Element>;

    /// The smallest set of environment values needed for this renderer to function.
    fn default_environment(&self) -> EnvironmentValues {
        EnvironmentValues::new()
    }

    /// The size proposed to the root view.
    fn root_proposal(&self) -> ProposedSize {
        ProposedSize::UNSPECIFIED
    }

    /// Creates a reconciler and performs the first render.
    fn render(self, view: AnyView) -> Reconciler<Self>
    where
        Self: Sized,
    {
        Reconciler::new(self, view)
    }
}
