//! # Particle Physics Core
//!
//! CPU kernels for one simulation step of planets and particles:
//! a 4th-order symplectic integrator under a uniform field plus planet
//! attraction, and a BVH broad-phase reporting overlapping object pairs.
//!
//! Everything is generic over the numeric width ([`Real`] / [`Vector`]) and
//! runs one data-parallel lane per object.

pub mod aabb;
pub mod broad_phase;
pub mod bvh;
pub mod candidates;
pub mod config;
pub mod constants;
pub mod error;
pub mod forces;
pub mod integrator;
pub mod object;
pub mod real;

pub use aabb::*;
pub use broad_phase::*;
pub use bvh::*;
pub use candidates::*;
pub use config::*;
pub use constants::*;
pub use error::{PhysicsError, Result};
pub use forces::*;
pub use integrator::*;
pub use object::*;
pub use real::*;
