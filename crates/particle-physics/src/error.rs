//! Boundary errors for the physics core
//!
//! Kernels themselves never fail: degenerate distances, stack overflow and
//! candidate overflow are absorbed into guards and counters. These errors are
//! returned only where a caller hands data or parameters to the core.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PhysicsError {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("array `{name}` has length {actual}, expected {expected}")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("planet added at index {index} after {particles} non-planet object(s)")]
    PlanetOrder { index: usize, particles: usize },

    #[error("malformed tree: {0}")]
    MalformedTree(String),

    #[error("precision mismatch: configured {configured}, requested {requested}")]
    PrecisionMismatch {
        configured: &'static str,
        requested: &'static str,
    },
}

impl PhysicsError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PhysicsError>;
