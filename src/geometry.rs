//! Sizes, points, rectangles, and edge insets.

use bitflags::bitflags;
use cgmath::{EuclideanSpace, Point2, Vector2, Zero};
use core::ops;

/// A size: `x` is the width and `y` is the height.
pub type Size = Vector2<f64>;

/// A position relative to a parent’s origin.
pub type Point = Point2<f64>;

/// Clamps a single magnitude to a usable value.
///
/// NaN and negative values become zero. Positive infinity is kept; it is meaningful as “no limit”.
pub fn sanitize(value: f64) -> f64 {
    if value.is_nan() || value < 0. {
        0.
    } else {
        value
    }
}

/// Clamps both components of a size with [`sanitize`].
pub fn sanitize_size(size: Size) -> Size {
    Vector2::new(sanitize(size.x), sanitize(size.y))
}

/// A size offered to a view by its parent.
///
/// An absent axis means “size to content” on that axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProposedSize {
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl ProposedSize {
    /// A proposal that leaves both axes unconstrained.
    pub const UNSPECIFIED: ProposedSize = ProposedSize {
        width: None,
        height: None,
    };

    pub fn new(width: f64, height: f64) -> ProposedSize {
        ProposedSize {
            width: Some(width),
            height: Some(height),
        }
    }

    /// Returns this proposal with every present axis clamped to a non-negative number.
    pub fn sanitized(self) -> ProposedSize {
        ProposedSize {
            width: self.width.map(sanitize),
            height: self.height.map(sanitize),
        }
    }

    /// Width for fitting checks; an absent axis counts as infinitely large.
    pub fn width_or_infinity(&self) -> f64 {
        self.width.unwrap_or(f64::INFINITY)
    }

    /// Height for fitting checks; an absent axis counts as infinitely large.
    pub fn height_or_infinity(&self) -> f64 {
        self.height.unwrap_or(f64::INFINITY)
    }

    /// Returns true if the given size fits inside this proposal.
    pub fn fits(&self, size: Size) -> bool {
        size.x <= self.width_or_infinity() && size.y <= self.height_or_infinity()
    }

    /// Resolves absent axes to zero.
    pub fn resolve(&self) -> Size {
        Vector2::new(
            self.width.map_or(0., sanitize),
            self.height.map_or(0., sanitize),
        )
    }

    /// Shrinks present axes by the given amount, never going below zero.
    pub fn shrink(self, by: Size) -> ProposedSize {
        ProposedSize {
            width: self.width.map(|w| sanitize(w - by.x)),
            height: self.height.map(|h| sanitize(h - by.y)),
        }
    }
}

impl From<Size> for ProposedSize {
    fn from(size: Size) -> ProposedSize {
        ProposedSize::new(size.x, size.y)
    }
}

/// A rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Rectangle origin.
    pub origin: Point,

    /// Rectangle size.
    pub size: Size,
}

impl Rect {
    /// Creates a new rectangle.
    pub fn new(origin: Point, size: Size) -> Rect {
        Rect { origin, size }
    }

    /// Returns a zero-sized rectangle at the origin.
    pub fn zero() -> Rect {
        Rect {
            origin: Point2::origin(),
            size: Vector2::zero(),
        }
    }
}

/// Offsets a rectangle by a point, keeping its size.
impl ops::Add<Point> for Rect {
    type Output = Rect;
    fn add(self, point: Point) -> Rect {
        Rect {
            origin: self.origin + point.to_vec(),
            size: self.size,
        }
    }
}

bitflags! {
    /// A set of rectangle edges.
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Edges: u8 {
        const TOP = 0b0001;
        const LEADING = 0b0010;
        const BOTTOM = 0b0100;
        const TRAILING = 0b1000;

        const HORIZONTAL = Self::LEADING.bits() | Self::TRAILING.bits();
        const VERTICAL = Self::TOP.bits() | Self::BOTTOM.bits();
        const ALL = Self::HORIZONTAL.bits() | Self::VERTICAL.bits();
    }
}

/// Inset amounts for each edge.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeInsets {
    pub top: f64,
    pub leading: f64,
    pub bottom: f64,
    pub trailing: f64,
}

impl EdgeInsets {
    pub fn new(top: f64, leading: f64, bottom: f64, trailing: f64) -> EdgeInsets {
        EdgeInsets {
            top,
            leading,
            bottom,
            trailing,
        }
    }

    /// The same inset on every edge.
    pub fn all(amount: f64) -> EdgeInsets {
        EdgeInsets::new(amount, amount, amount, amount)
    }

    /// Total inset along each axis, counting only the selected edges.
    pub fn size(&self, edges: Edges) -> Size {
        let pick = |edge, amount: f64| if edges.contains(edge) { sanitize(amount) } else { 0. };
        Vector2::new(
            pick(Edges::LEADING, self.leading) + pick(Edges::TRAILING, self.trailing),
            pick(Edges::TOP, self.top) + pick(Edges::BOTTOM, self.bottom),
        )
    }

    /// Offset of content from the top-leading corner, counting only the selected edges.
    pub fn origin(&self, edges: Edges) -> Point {
        Point2::new(
            if edges.contains(Edges::LEADING) {
                sanitize(self.leading)
            } else {
                0.
            },
            if edges.contains(Edges::TOP) {
                sanitize(self.top)
            } else {
                0.
            },
        )
    }
}
