//! View modifiers: views that wrap one child and adjust its environment, layout, or identity.

use crate::environment::{EnvironmentKey, EnvironmentValues};
use crate::geometry::{EdgeInsets, Edges};
use crate::layout::{FrameLayout, LayoutComputer, PaddingLayout};
use crate::preference::{PreferenceKey, PreferenceStore};
use crate::view::{AnyView, Children, View, ViewInputs, ViewOutputs};
use core::any::Any;
use core::fmt;
use core::marker::PhantomData;
use std::sync::Arc;

/// Insets used by [`ViewExt::padding`].
pub const DEFAULT_PADDING: f64 = 10.;

/// Adjusts the view it is applied to.
pub trait ViewModifier: fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Computes the modified view’s child from the wrapped content.
    fn body(&self, content: AnyView) -> AnyView {
        content
    }

    /// Explicit identity among siblings.
    fn key(&self) -> Option<u64> {
        None
    }

    /// Returns a new environment for the content, or `None` to inherit the current one.
    fn environment(&self, _environment: &EnvironmentValues) -> Option<EnvironmentValues> {
        None
    }

    /// Returns a layout computer for the content.
    fn layout(&self) -> Option<Arc<dyn LayoutComputer>> {
        None
    }

    /// Reports preferences from this view.
    fn preferences(&self, _preferences: &mut PreferenceStore) {}
}

/// A view with a modifier applied.
///
/// The body is computed only when the reconciler pulls this view’s children.
#[derive(Debug, Clone)]
pub struct ModifiedContent<M> {
    pub content: AnyView,
    pub modifier: M,
}

impl<M: ViewModifier> ModifiedContent<M> {
    pub fn new(content: AnyView, modifier: M) -> ModifiedContent<M> {
        ModifiedContent { content, modifier }
    }
}

impl<M: ViewModifier> PartialEq for ModifiedContent<M> {
    fn eq(&self, other: &Self) -> bool {
        self.modifier == other.modifier && View::eq(&*self.content, &*other.content)
    }
}

impl<M: ViewModifier> View for ModifiedContent<M> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq(&self, other: &dyn View) -> bool {
        match other.as_any().downcast_ref::<Self>() {
            Some(other) => self == other,
            None => false,
        }
    }

    fn type_name(&self) -> &'static str {
        core::any::type_name::<Self>()
    }

    fn key(&self) -> Option<u64> {
        self.modifier.key()
    }

    fn children(&self) -> Children<'_> {
        Children::once_with(move || self.modifier.body(Arc::clone(&self.content)))
    }

    fn make_view(&self, inputs: &ViewInputs) -> ViewOutputs {
        let mut outputs = ViewOutputs::new(inputs);
        if let Some(environment) = self.modifier.environment(&inputs.environment) {
            outputs = outputs.with_environment(environment);
        }
        if let Some(layout) = self.modifier.layout() {
            outputs = outputs.with_layout(layout);
        }
        let mut preferences = PreferenceStore::new();
        self.modifier.preferences(&mut preferences);
        outputs.with_preferences(preferences)
    }
}

/// Insets the content on the selected edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Padding {
    pub edges: Edges,
    pub insets: EdgeInsets,
}

impl ViewModifier for Padding {
    fn layout(&self) -> Option<Arc<dyn LayoutComputer>> {
        Some(Arc::new(PaddingLayout {
            edges: self.edges,
            insets: self.insets,
        }))
    }
}

/// Fixes the content’s width and/or height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl ViewModifier for Frame {
    fn layout(&self) -> Option<Arc<dyn LayoutComputer>> {
        Some(Arc::new(FrameLayout {
            width: self.width,
            height: self.height,
        }))
    }
}

/// Gives the content an explicit identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Keyed(pub u64);

impl ViewModifier for Keyed {
    fn key(&self) -> Option<u64> {
        Some(self.0)
    }
}

/// Overrides one environment value for the content’s subtree.
pub struct EnvironmentWriter<K: EnvironmentKey> {
    pub value: K::Value,
    _key: PhantomData<fn() -> K>,
}

impl<K: EnvironmentKey> EnvironmentWriter<K> {
    pub fn new(value: K::Value) -> EnvironmentWriter<K> {
        EnvironmentWriter {
            value,
            _key: PhantomData,
        }
    }
}

impl<K: EnvironmentKey> fmt::Debug for EnvironmentWriter<K> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EnvironmentWriter")
            .field("key", &core::any::type_name::<K>())
            .field("value", &self.value)
            .finish()
    }
}

impl<K: EnvironmentKey> PartialEq for EnvironmentWriter<K>
where
    K::Value: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<K: EnvironmentKey> ViewModifier for EnvironmentWriter<K>
where
    K::Value: PartialEq,
{
    fn environment(&self, environment: &EnvironmentValues) -> Option<EnvironmentValues> {
        Some(environment.with::<K>(self.value.clone()))
    }
}

/// Reports one preference value from the content’s position.
pub struct PreferenceWriter<K: PreferenceKey> {
    pub value: K::Value,
    _key: PhantomData<fn() -> K>,
}

impl<K: PreferenceKey> PreferenceWriter<K> {
    pub fn new(value: K::Value) -> PreferenceWriter<K> {
        PreferenceWriter {
            value,
            _key: PhantomData,
        }
    }
}

impl<K: PreferenceKey> fmt::Debug for PreferenceWriter<K> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PreferenceWriter")
            .field("key", &core::any::type_name::<K>())
            .field("value", &self.value)
            .finish()
    }
}

impl<K: PreferenceKey> PartialEq for PreferenceWriter<K>
where
    K::Value: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<K: PreferenceKey> ViewModifier for PreferenceWriter<K>
where
    K::Value: PartialEq,
{
    fn preferences(&self, preferences: &mut PreferenceStore) {
        preferences.insert::<K>(self.value.clone());
    }
}

/// Builder methods for applying modifiers.
pub trait ViewExt: View + Sized {
    fn modifier<M: ViewModifier>(self, modifier: M) -> ModifiedContent<M> {
        ModifiedContent::new(Arc::new(self), modifier)
    }

    /// Pads every edge by [`DEFAULT_PADDING`].
    fn padding(self) -> ModifiedContent<Padding> {
        self.padding_edges(Edges::ALL, DEFAULT_PADDING)
    }

    fn padding_edges(self, edges: Edges, amount: f64) -> ModifiedContent<Padding> {
        self.modifier(Padding {
            edges,
            insets: EdgeInsets::all(amount),
        })
    }

    fn padding_insets(self, insets: EdgeInsets) -> ModifiedContent<Padding> {
        self.modifier(Padding {
            edges: Edges::ALL,
            insets,
        })
    }

    fn frame(self, width: Option<f64>, height: Option<f64>) -> ModifiedContent<Frame> {
        self.modifier(Frame { width, height })
    }

    /// Gives this view an explicit identity among its siblings.
    fn id(self, key: u64) -> ModifiedContent<Keyed> {
        self.modifier(Keyed(key))
    }

    fn environment<K: EnvironmentKey>(self, value: K::Value) -> ModifiedContent<EnvironmentWriter<K>>
    where
        K::Value: PartialEq,
    {
        self.modifier(EnvironmentWriter::new(value))
    }

    fn preference<K: PreferenceKey>(self, value: K::Value) -> ModifiedContent<PreferenceWriter<K>>
    where
        K::Value: PartialEq,
    {
        self.modifier(PreferenceWriter::new(value))
    }

    fn erase(self) -> AnyView {
        Arc::new(self)
    }
}

impl<V: View> ViewExt for V {}
