//! Runtime configuration handed to the core by the driver

use crate::broad_phase::BroadPhaseParams;
use crate::constants::*;
use crate::error::{PhysicsError, Result};
use crate::integrator::IntegratorParams;
use crate::real::{Real, Vector};

/// Floating-point width of a simulation instance
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    #[default]
    Single = 0,
    Double = 1,
}

impl Precision {
    /// Precision matching the scalar type `R`
    pub fn of<R: Real>() -> Self {
        if std::mem::size_of::<R>() == std::mem::size_of::<f64>() {
            Precision::Double
        } else {
            Precision::Single
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Precision::Single => "single",
            Precision::Double => "double",
        }
    }
}

/// Parameters of one simulation, stored at double precision and narrowed on use
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Timestep of one integrator step
    pub dt: f64,
    /// Uniform acceleration applied to every object
    pub global_gravity: [f64; 2],
    /// G in `G * m / r²`
    pub gravitational_constant: f64,
    /// Planet distance floor (0 leaves only the per-width minimum, self-exclusion still applies)
    pub softening: f64,
    /// Candidate capacity per object (slab) or per object on average (shared list)
    pub max_candidates: u32,
    /// Traversal stack slots beyond `2 * ceil(log2(n))`
    pub stack_slack: u32,
    pub precision: Precision,
    /// Compute workgroup size for GPU dispatch
    pub workgroup_size: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt: DEFAULT_DT,
            global_gravity: DEFAULT_GLOBAL_GRAVITY,
            gravitational_constant: DEFAULT_GRAVITATIONAL_CONSTANT,
            softening: DEFAULT_SOFTENING,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            stack_slack: STACK_SLACK,
            precision: Precision::Single,
            workgroup_size: DEFAULT_WORKGROUP_SIZE,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        validate_positive(self.dt, "dt")?;
        validate_finite(self.global_gravity[0], "global_gravity.x")?;
        validate_finite(self.global_gravity[1], "global_gravity.y")?;
        validate_non_negative(self.gravitational_constant, "gravitational_constant")?;
        validate_non_negative(self.softening, "softening")?;
        if self.max_candidates == 0 {
            return Err(PhysicsError::invalid("max_candidates", "must be positive"));
        }
        if self.workgroup_size == 0 || self.workgroup_size > 256 {
            return Err(PhysicsError::invalid(
                "workgroup_size",
                format!("{} is out of range [1; 256]", self.workgroup_size),
            ));
        }
        Ok(())
    }

    /// Fail if this config was written for a different width than `R`
    pub fn check_precision<R: Real>(&self) -> Result<()> {
        let requested = Precision::of::<R>();
        if requested == self.precision {
            Ok(())
        } else {
            Err(PhysicsError::PrecisionMismatch {
                configured: self.precision.name(),
                requested: requested.name(),
            })
        }
    }

    /// Integrator parameters narrowed to the vector width `V`
    pub fn integrator_params<V: Vector>(&self) -> IntegratorParams<V> {
        let from = <V::Scalar as Real>::from_f64;
        IntegratorParams {
            dt: from(self.dt),
            global_gravity: V::new(from(self.global_gravity[0]), from(self.global_gravity[1])),
            gravitational_constant: from(self.gravitational_constant),
            softening: from(self.softening),
        }
    }

    /// Broad-phase capacities for `object_count` objects
    pub fn broad_phase_params(&self, object_count: usize) -> BroadPhaseParams {
        BroadPhaseParams::with_slack(object_count, self.max_candidates, self.stack_slack)
    }
}

fn validate_positive(value: f64, name: &'static str) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PhysicsError::invalid(name, format!("{value} must be positive")))
    }
}

fn validate_non_negative(value: f64, name: &'static str) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(PhysicsError::invalid(name, format!("{value} must not be negative")))
    }
}

fn validate_finite(value: f64, name: &'static str) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(PhysicsError::invalid(name, format!("{value} must be finite")))
    }
}
