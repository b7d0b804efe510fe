//! Numeric width abstraction
//!
//! Every kernel is written once against [`Real`] / [`Vector`] and instantiated
//! for either `f32` + [`glam::Vec2`] or `f64` + [`glam::DVec2`].

use glam::{DVec2, Vec2};
use std::fmt::Debug;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// Scalar type of a simulation (`f32` or `f64`)
pub trait Real:
    Copy
    + Debug
    + PartialOrd
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + 'static
{
    const ZERO: Self;
    const ONE: Self;
    /// Smallest squared distance used in an inverse-square term
    ///
    /// Keeps `1/|r|²` and `1/|r|` far from overflow at this width.
    const MIN_DISTANCE_SQ: Self;

    /// Convert (and possibly truncate) an `f64` constant to this width
    fn from_f64(value: f64) -> Self;
    fn to_f64(self) -> f64;
    fn sqrt(self) -> Self;
    fn cbrt(self) -> Self;
    fn max(self, other: Self) -> Self;
    fn is_finite(self) -> bool;
}

impl Real for f32 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;
    const MIN_DISTANCE_SQ: Self = 1.0e-12;

    fn from_f64(value: f64) -> Self {
        value as f32
    }

    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    fn sqrt(self) -> Self {
        f32::sqrt(self)
    }

    fn cbrt(self) -> Self {
        f32::cbrt(self)
    }

    fn max(self, other: Self) -> Self {
        f32::max(self, other)
    }

    fn is_finite(self) -> bool {
        f32::is_finite(self)
    }
}

impl Real for f64 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;
    const MIN_DISTANCE_SQ: Self = 1.0e-100;

    fn from_f64(value: f64) -> Self {
        value
    }

    fn to_f64(self) -> f64 {
        self
    }

    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }

    fn cbrt(self) -> Self {
        f64::cbrt(self)
    }

    fn max(self, other: Self) -> Self {
        f64::max(self, other)
    }

    fn is_finite(self) -> bool {
        f64::is_finite(self)
    }
}

/// 2D vector matching a [`Real`] width
pub trait Vector: Copy + Debug + PartialEq + Send + Sync + 'static
where
    Self: Add<Self, Output = Self>,
    Self: Sub<Self, Output = Self>,
    Self: Mul<<Self as Vector>::Scalar, Output = Self>,
    Self: Neg<Output = Self>,
    Self: AddAssign + SubAssign,
{
    type Scalar: Real;

    const ZERO: Self;

    fn new(x: Self::Scalar, y: Self::Scalar) -> Self;
    fn splat(value: Self::Scalar) -> Self;
    fn x(self) -> Self::Scalar;
    fn y(self) -> Self::Scalar;
    fn dot(self, other: Self) -> Self::Scalar;
    fn component_min(self, other: Self) -> Self;
    fn component_max(self, other: Self) -> Self;

    fn length_squared(self) -> Self::Scalar {
        self.dot(self)
    }

    fn is_finite(self) -> bool {
        self.x().is_finite() && self.y().is_finite()
    }
}

impl Vector for Vec2 {
    type Scalar = f32;

    const ZERO: Self = Vec2::ZERO;

    fn new(x: f32, y: f32) -> Self {
        Vec2::new(x, y)
    }

    fn splat(value: f32) -> Self {
        Vec2::splat(value)
    }

    fn x(self) -> f32 {
        self.x
    }

    fn y(self) -> f32 {
        self.y
    }

    fn dot(self, other: Self) -> f32 {
        Vec2::dot(self, other)
    }

    fn component_min(self, other: Self) -> Self {
        Vec2::min(self, other)
    }

    fn component_max(self, other: Self) -> Self {
        Vec2::max(self, other)
    }
}

impl Vector for DVec2 {
    type Scalar = f64;

    const ZERO: Self = DVec2::ZERO;

    fn new(x: f64, y: f64) -> Self {
        DVec2::new(x, y)
    }

    fn splat(value: f64) -> Self {
        DVec2::splat(value)
    }

    fn x(self) -> f64 {
        self.x
    }

    fn y(self) -> f64 {
        self.y
    }

    fn dot(self, other: Self) -> f64 {
        DVec2::dot(self, other)
    }

    fn component_min(self, other: Self) -> Self {
        DVec2::min(self, other)
    }

    fn component_max(self, other: Self) -> Self {
        DVec2::max(self, other)
    }
}

/// Shorthand for the scalar type of a vector
pub type ScalarOf<V> = <V as Vector>::Scalar;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_helpers_agree_across_widths() {
        let a = Vec2::new(3.0, -4.0);
        let b = DVec2::new(3.0, -4.0);
        assert_eq!(Vector::length_squared(a), 25.0);
        assert_eq!(Vector::length_squared(b), 25.0);
        assert_eq!(
            Vector::component_min(a, Vec2::new(1.0, 1.0)),
            Vec2::new(1.0, -4.0)
        );
        assert!(!Vector::is_finite(DVec2::new(f64::NAN, 0.0)));
    }

    #[test]
    fn test_from_f64_truncates_for_single_precision() {
        let c = <f32 as Real>::from_f64(0.675603595979829);
        assert!((f64::from(c) - 0.675603595979829).abs() < 1e-7);
        assert_ne!(f64::from(c), 0.675603595979829);
    }
}
