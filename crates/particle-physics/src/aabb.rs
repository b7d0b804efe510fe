//! Axis-aligned bounding boxes

use crate::real::{ScalarOf, Vector};

/// Axis-aligned rectangle, valid when `top_left <= bottom_right` on both axes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb<V: Vector> {
    pub top_left: V,
    pub bottom_right: V,
}

impl<V: Vector> Aabb<V> {
    pub fn new(top_left: V, bottom_right: V) -> Self {
        Self {
            top_left,
            bottom_right,
        }
    }

    /// Tight box around a disc
    pub fn from_circle(center: V, radius: ScalarOf<V>) -> Self {
        let extent = V::splat(radius);
        Self {
            top_left: center - extent,
            bottom_right: center + extent,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.top_left.x() <= self.bottom_right.x() && self.top_left.y() <= self.bottom_right.y()
    }

    /// Smallest box containing both boxes
    pub fn union(&self, other: &Self) -> Self {
        Self {
            top_left: self.top_left.component_min(other.top_left),
            bottom_right: self.bottom_right.component_max(other.bottom_right),
        }
    }

    /// Closed-interval overlap; boxes that only touch count as intersecting
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        self.top_left.x() <= other.bottom_right.x()
            && self.bottom_right.x() >= other.top_left.x()
            && self.top_left.y() <= other.bottom_right.y()
            && self.bottom_right.y() >= other.top_left.y()
    }
}
