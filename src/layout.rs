//! The layout negotiation protocol.
//!
//! Layout runs during reconciliation. For every fiber, its layout computer proposes a size to
//! each child in order, each child reports back the size it wants, the computer folds those into
//! the size the fiber requests from its own parent, and finally places each child inside the
//! fiber’s bounds. Neither side knows the other’s concrete type.

use crate::geometry::{sanitize, EdgeInsets, Edges, Point, ProposedSize, Size};
use crate::view::View;
use cgmath::{Point2, Vector2};
use core::fmt;

/// Layout state of one child, as seen by its parent’s layout computer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutChild {
    /// Position among siblings.
    pub index: usize,
    /// Size requested by the child.
    pub dimensions: Size,
}

/// Running state of one fiber’s negotiation.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutContext {
    /// The size proposed to the fiber by its parent.
    pub proposed_size: ProposedSize,
    /// Children that have reported so far, in order.
    pub children: Vec<LayoutChild>,
    /// The fiber’s own size. Only meaningful once every child has reported.
    pub size: Size,
}

impl LayoutContext {
    pub fn new(proposed_size: ProposedSize) -> LayoutContext {
        LayoutContext {
            proposed_size,
            children: Vec::new(),
            size: Vector2::new(0., 0.),
        }
    }

    /// Componentwise maximum over all children, or zero when there are none.
    pub fn max_child_size(&self) -> Size {
        self.children.iter().fold(Vector2::new(0., 0.), |acc, child| {
            Vector2::new(acc.x.max(child.dimensions.x), acc.y.max(child.dimensions.y))
        })
    }
}

/// A strategy for laying out a view’s children.
///
/// Results are sanitized by the reconciler, so negative or NaN values never reach other
/// computers.
pub trait LayoutComputer: fmt::Debug + Send + Sync {
    /// Returns the size to offer the child at `index`.
    ///
    /// `context.children` holds only the siblings before `index`.
    fn propose_size(&self, child: &dyn View, index: usize, context: &LayoutContext)
        -> ProposedSize;

    /// Returns the size this view wants, given every child’s reported size.
    fn request_size(&self, context: &LayoutContext) -> Size;

    /// Returns the child’s offset from this view’s origin. `context.size` is final.
    fn position(&self, child: &LayoutChild, context: &LayoutContext) -> Point;
}

/// The default layout: children get the parent’s proposal and sit at the origin.
///
/// Leaves request the proposed size; containers request the largest child extent.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProposalLayout;

impl LayoutComputer for ProposalLayout {
    fn propose_size(&self, _: &dyn View, _: usize, context: &LayoutContext) -> ProposedSize {
        context.proposed_size
    }

    fn request_size(&self, context: &LayoutContext) -> Size {
        if context.children.is_empty() {
            context.proposed_size.resolve()
        } else {
            context.max_child_size()
        }
    }

    fn position(&self, _: &LayoutChild, _: &LayoutContext) -> Point {
        Point2::new(0., 0.)
    }
}

/// Insets its children on the selected edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaddingLayout {
    pub edges: Edges,
    pub insets: EdgeInsets,
}

impl LayoutComputer for PaddingLayout {
    fn propose_size(&self, _: &dyn View, _: usize, context: &LayoutContext) -> ProposedSize {
        context
            .proposed_size
            .shrink(self.insets.size(self.edges))
    }

    fn request_size(&self, context: &LayoutContext) -> Size {
        context.max_child_size() + self.insets.size(self.edges)
    }

    fn position(&self, _: &LayoutChild, _: &LayoutContext) -> Point {
        self.insets.origin(self.edges)
    }
}

/// Fixes the width and/or height and centers children within it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameLayout {
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl LayoutComputer for FrameLayout {
    fn propose_size(&self, _: &dyn View, _: usize, context: &LayoutContext) -> ProposedSize {
        ProposedSize {
            width: self.width.or(context.proposed_size.width),
            height: self.height.or(context.proposed_size.height),
        }
    }

    fn request_size(&self, context: &LayoutContext) -> Size {
        let content = if context.children.is_empty() {
            context.proposed_size.resolve()
        } else {
            context.max_child_size()
        };
        Vector2::new(
            self.width.unwrap_or(content.x),
            self.height.unwrap_or(content.y),
        )
    }

    fn position(&self, child: &LayoutChild, context: &LayoutContext) -> Point {
        Point2::new(
            sanitize((context.size.x - child.dimensions.x) / 2.),
            sanitize((context.size.y - child.dimensions.y) / 2.),
        )
    }
}

/// Layout axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// Places children one after another along an axis.
///
/// Children are offered the full cross-axis proposal and an unconstrained main axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StackLayout {
    pub axis: Axis,
    pub spacing: f64,
}

impl StackLayout {
    fn main(&self, size: Size) -> f64 {
        match self.axis {
            Axis::Horizontal => size.x,
            Axis::Vertical => size.y,
        }
    }

    fn cross(&self, size: Size) -> f64 {
        match self.axis {
            Axis::Horizontal => size.y,
            Axis::Vertical => size.x,
        }
    }

    fn size(&self, main: f64, cross: f64) -> Size {
        match self.axis {
            Axis::Horizontal => Vector2::new(main, cross),
            Axis::Vertical => Vector2::new(cross, main),
        }
    }
}

impl LayoutComputer for StackLayout {
    fn propose_size(&self, _: &dyn View, _: usize, context: &LayoutContext) -> ProposedSize {
        match self.axis {
            Axis::Horizontal => ProposedSize {
                width: None,
                height: context.proposed_size.height,
            },
            Axis::Vertical => ProposedSize {
                width: context.proposed_size.width,
                height: None,
            },
        }
    }

    fn request_size(&self, context: &LayoutContext) -> Size {
        let spacing = sanitize(self.spacing);
        let gaps = context.children.len().saturating_sub(1) as f64;
        let main = context
            .children
            .iter()
            .map(|child| self.main(child.dimensions))
            .sum::<f64>()
            + spacing * gaps;
        let cross = context
            .children
            .iter()
            .map(|child| self.cross(child.dimensions))
            .fold(0., f64::max);
        self.size(main, cross)
    }

    fn position(&self, child: &LayoutChild, context: &LayoutContext) -> Point {
        let spacing = sanitize(self.spacing);
        let offset = context
            .children
            .iter()
            .take_while(|sibling| sibling.index < child.index)
            .map(|sibling| self.main(sibling.dimensions) + spacing)
            .sum::<f64>();
        let offset = self.size(offset, 0.);
        Point2::new(offset.x, offset.y)
    }
}
