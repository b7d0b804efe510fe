//! # Particle Simulation Engine
//!
//! GPU rendition of the gravity step and the BVH broad-phase, using wgpu
//! compute shaders. Mirrors the CPU kernels of `particle-physics` at single
//! precision.

pub mod buffers;
pub mod context;
pub mod error;
pub mod params;
pub mod simulation;

pub use context::GpuContext;
pub use error::{Result, SimulationError};
pub use params::*;
pub use simulation::*;
