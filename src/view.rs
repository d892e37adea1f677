use crate::environment::EnvironmentValues;
use crate::geometry::ProposedSize;
use crate::layout::{Axis, LayoutComputer, StackLayout};
use crate::preference::PreferenceStore;
use core::any::{Any, TypeId};
use core::fmt;
use std::sync::Arc;

/// A shared, type-erased view value.
pub type AnyView = Arc<dyn View>;

/// Implements the `View` trait for a given struct.
///
/// Assumes that `PartialEq` is implemented. `Eq` would be preferred to avoid frequent updates.
///
/// Syntax:
///
/// ```text
/// impl_view! {
///     StructName;
///     (put extra items like key(), children() or make_view() here, using normal rust syntax)
/// }
/// ```
#[macro_export]
macro_rules! impl_view {
    (
        $(#[$attr:meta])*
        $struct:ty;
        $($extra:tt)*
    ) => {
        $(#[$attr])*
        impl $crate::View for $struct {
            fn as_any(&self) -> &dyn ::core::any::Any {
                self
            }

            fn eq(&self, other: &dyn $crate::View) -> bool {
                if let Some(other) = other.as_any().downcast_ref::<$struct>() {
                    self == other
                } else {
                    false
                }
            }

            fn type_name(&self) -> &'static str {
                ::core::any::type_name::<$struct>()
            }

            $($extra)*
        }
    };
}

/// Views are immutable descriptions of what should be shown.
///
/// `View` implementors should be cheap and fast to create, as they are not actual UI elements but
/// their virtual representation. The reconciler keeps one fiber per position in the tree and uses
/// views only to decide what that fiber should look like next.
///
/// This trait should probably be implemented using the [`impl_view`] macro.
pub trait View: Any + fmt::Debug + Send + Sync {
    /// For downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Compares this view to another; used for diffing.
    fn eq(&self, other: &dyn View) -> bool;

    /// Name of the concrete type, for diagnostics.
    fn type_name(&self) -> &'static str;

    /// A key used to identify this view among its siblings.
    fn key(&self) -> Option<u64> {
        None
    }

    /// Enumerates child views.
    ///
    /// Every call starts a fresh sequence. The reconciler pulls it exactly once per pass.
    fn children(&self) -> Children<'_> {
        Children::empty()
    }

    /// Evaluates this view for a fiber.
    ///
    /// By default the inputs are passed through: the environment is inherited unchanged and the
    /// children are laid out with [`ProposalLayout`](crate::layout::ProposalLayout).
    fn make_view(&self, inputs: &ViewInputs) -> ViewOutputs {
        ViewOutputs::new(inputs)
    }

    /// Returns the primitive kind if this view may map to a single backend element.
    ///
    /// Whether it actually does is up to the renderer.
    fn primitive(&self) -> Option<Primitive<'_>> {
        None
    }
}

/// Returns the type tag used to decide whether a fiber can be reused for a view.
pub fn view_type(view: &dyn View) -> TypeId {
    view.as_any().type_id()
}

/// Primitive view kinds that renderers may map to elements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive<'a> {
    Text(&'a str),
    Stack { axis: Axis, spacing: f64 },
}

/// A lazy sequence of child views.
pub struct Children<'a>(Box<dyn Iterator<Item = AnyView> + 'a>);

impl<'a> Children<'a> {
    pub fn new(iter: impl Iterator<Item = AnyView> + 'a) -> Children<'a> {
        Children(Box::new(iter))
    }

    pub fn empty() -> Children<'a> {
        Children::new(core::iter::empty())
    }

    /// A single child, computed only when pulled.
    pub fn once_with(f: impl FnOnce() -> AnyView + 'a) -> Children<'a> {
        Children::new(core::iter::once_with(f))
    }
}

impl<'a> Iterator for Children<'a> {
    type Item = AnyView;
    fn next(&mut self) -> Option<AnyView> {
        self.0.next()
    }
}

impl<'a> fmt::Debug for Children<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Children(..)")
    }
}

/// Data passed to [`View::make_view`].
#[derive(Debug, Clone)]
pub struct ViewInputs {
    /// The size proposed by this view’s parent.
    pub proposed_size: ProposedSize,
    pub environment: EnvironmentValues,
}

/// Result of evaluating a view for a fiber.
#[derive(Debug, Clone)]
pub struct ViewOutputs {
    pub(crate) environment: EnvironmentValues,
    pub(crate) preferences: PreferenceStore,
    pub(crate) layout: Option<Arc<dyn LayoutComputer>>,
}

impl ViewOutputs {
    /// Passes the inputs through.
    ///
    /// The environment snapshot is reused by reference.
    pub fn new(inputs: &ViewInputs) -> ViewOutputs {
        ViewOutputs {
            environment: inputs.environment.clone(),
            preferences: PreferenceStore::new(),
            layout: None,
        }
    }

    /// Replaces the environment seen by this view’s descendants.
    pub fn with_environment(mut self, environment: EnvironmentValues) -> ViewOutputs {
        self.environment = environment;
        self
    }

    /// Sets the preferences this view itself reports.
    pub fn with_preferences(mut self, preferences: PreferenceStore) -> ViewOutputs {
        self.preferences = preferences;
        self
    }

    /// Sets the strategy used to lay out this view’s children.
    pub fn with_layout(mut self, layout: Arc<dyn LayoutComputer>) -> ViewOutputs {
        self.layout = Some(layout);
        self
    }

    pub fn environment(&self) -> &EnvironmentValues {
        &self.environment
    }
}

impl_view! {
    /// An empty view type that does absolutely nothing.
    ();
}

pub type Fragment = Vec<AnyView>;

/// A fragment view that expands into its children.
impl View for Fragment {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn eq(&self, other: &dyn View) -> bool {
        if let Some(other) = other.as_any().downcast_ref::<Self>() {
            if self.len() != other.len() {
                return false;
            }
            for (i, j) in self.iter().zip(other.iter()) {
                if !View::eq(&**i, &**j) {
                    return false;
                }
            }
            true
        } else {
            false
        }
    }
    fn type_name(&self) -> &'static str {
        "Fragment"
    }
    fn children(&self) -> Children<'_> {
        Children::new(self.iter().cloned())
    }
}

/// A run of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    pub content: String,
}

impl Text {
    pub fn new(content: impl Into<String>) -> Text {
        Text {
            content: content.into(),
        }
    }
}

impl_view! {
    Text;
    fn primitive(&self) -> Option<Primitive<'_>> {
        Some(Primitive::Text(&self.content))
    }
}

/// Spacing used by stacks unless specified otherwise.
pub const DEFAULT_STACK_SPACING: f64 = 8.;

/// Children laid out one after another along an axis.
#[derive(Debug, Clone)]
pub struct Stack {
    pub axis: Axis,
    pub spacing: f64,
    pub children: Fragment,
}

impl Stack {
    pub fn vertical(children: Fragment) -> Stack {
        Stack {
            axis: Axis::Vertical,
            spacing: DEFAULT_STACK_SPACING,
            children,
        }
    }

    pub fn horizontal(children: Fragment) -> Stack {
        Stack {
            axis: Axis::Horizontal,
            spacing: DEFAULT_STACK_SPACING,
            children,
        }
    }

    pub fn spacing(mut self, spacing: f64) -> Stack {
        self.spacing = spacing;
        self
    }
}

impl PartialEq for Stack {
    fn eq(&self, other: &Stack) -> bool {
        self.axis == other.axis
            && self.spacing == other.spacing
            && View::eq(&self.children, &other.children)
    }
}

impl_view! {
    Stack;
    fn children(&self) -> Children<'_> {
        self.children.children()
    }
    fn make_view(&self, inputs: &ViewInputs) -> ViewOutputs {
        ViewOutputs::new(inputs).with_layout(Arc::new(StackLayout {
            axis: self.axis,
            spacing: self.spacing,
        }))
    }
    fn primitive(&self) -> Option<Primitive<'_>> {
        Some(Primitive::Stack {
            axis: self.axis,
            spacing: self.spacing,
        })
    }
}
