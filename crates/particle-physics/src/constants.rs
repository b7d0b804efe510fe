//! Numerical constants shared by the CPU and GPU kernels
//!
//! Coefficients are stored at full double precision and truncated to the
//! working width through [`crate::Real::from_f64`].

/// Yoshida position weight for the first and last drift (c1 = c4 = w1 / 2)
pub const YOSHIDA_C1: f64 = 0.675603595979829;
pub const YOSHIDA_C2: f64 = -0.1756035959798291;
pub const YOSHIDA_C3: f64 = YOSHIDA_C2;
pub const YOSHIDA_C4: f64 = YOSHIDA_C1;

/// Yoshida velocity weight for the outer kicks (d1 = d3 = w1)
pub const YOSHIDA_D1: f64 = 1.351207191959658;
/// Yoshida velocity weight for the middle kick (d2 = w0, negative)
pub const YOSHIDA_D2: f64 = -1.7024143839193162;
pub const YOSHIDA_D3: f64 = YOSHIDA_D1;

/// Default gravitational constant in simulation units
pub const DEFAULT_GRAVITATIONAL_CONSTANT: f64 = 1.0;

/// Default uniform field (points "down" the y axis)
pub const DEFAULT_GLOBAL_GRAVITY: [f64; 2] = [0.0, -9.81];

/// Default timestep (240 Hz)
pub const DEFAULT_DT: f64 = 1.0 / 240.0;

/// Minimum planet distance used to floor `|r|²` before dividing
pub const DEFAULT_SOFTENING: f64 = 1.0e-3;

/// Default per-object candidate capacity
pub const DEFAULT_MAX_CANDIDATES: u32 = 16;

/// Extra traversal stack slots on top of `2 * ceil(log2(n))`
pub const STACK_SLACK: u32 = 8;

/// Fixed private stack size of the GPU traversal kernel
pub const GPU_MAX_STACK: u32 = 64;

/// Default compute workgroup size
pub const DEFAULT_WORKGROUP_SIZE: u32 = 64;

/// Index value marking an unused candidate slot
pub const INVALID_INDEX: u32 = u32::MAX;
