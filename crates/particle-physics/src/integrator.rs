//! Fourth-order symplectic integrator (Yoshida / Forest–Ruth composition)
//!
//! One step is four drifts and three kicks with fixed weights:
//!
//! ```text
//! x1 = x0 + v0·c1·dt    v1 = v0 + a(x1)·d1·dt
//! x2 = x1 + v1·c2·dt    v2 = v1 + a(x2)·d2·dt
//! x3 = x2 + v2·c3·dt    v3 = v2 + a(x3)·d3·dt
//! x4 = x3 + v3·c4·dt
//! ```
//!
//! Each drift continues from the previous sub-step. The composition is
//! time-symmetric, so energy oscillates in a bounded band instead of drifting.

use rayon::prelude::*;

use crate::constants::*;
use crate::error::{PhysicsError, Result};
use crate::forces::acceleration;
use crate::object::{ObjectSoa, Planets};
use crate::real::{Real, ScalarOf, Vector};

/// Integrator inputs that stay fixed for one step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegratorParams<V: Vector> {
    pub dt: ScalarOf<V>,
    pub global_gravity: V,
    pub gravitational_constant: ScalarOf<V>,
    /// Floor on planet distance, see [`crate::forces::acceleration`]
    pub softening: ScalarOf<V>,
}

impl<V: Vector> IntegratorParams<V> {
    pub fn validate(&self) -> Result<()> {
        let zero = <ScalarOf<V> as Real>::ZERO;
        if !(self.dt.is_finite() && self.dt > zero) {
            return Err(PhysicsError::InvalidParameter {
                name: "dt",
                reason: format!("{:?} must be positive", self.dt),
            });
        }
        if !self.global_gravity.is_finite() {
            return Err(PhysicsError::InvalidParameter {
                name: "global_gravity",
                reason: format!("{:?} must be finite", self.global_gravity),
            });
        }
        if !(self.softening.is_finite() && self.softening >= zero) {
            return Err(PhysicsError::InvalidParameter {
                name: "softening",
                reason: format!("{:?} must not be negative", self.softening),
            });
        }
        Ok(())
    }
}

/// Drift (`c`) and kick (`d`) weights of one step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YoshidaCoefficients<S: Real> {
    pub c1: S,
    pub c2: S,
    pub c3: S,
    pub c4: S,
    pub d1: S,
    pub d2: S,
    pub d3: S,
}

impl<S: Real> Default for YoshidaCoefficients<S> {
    fn default() -> Self {
        Self {
            c1: S::from_f64(YOSHIDA_C1),
            c2: S::from_f64(YOSHIDA_C2),
            c3: S::from_f64(YOSHIDA_C3),
            c4: S::from_f64(YOSHIDA_C4),
            d1: S::from_f64(YOSHIDA_D1),
            d2: S::from_f64(YOSHIDA_D2),
            d3: S::from_f64(YOSHIDA_D3),
        }
    }
}

impl<S: Real> YoshidaCoefficients<S> {
    /// Weights computed from ∛2 instead of the tabulated constants
    pub fn derived() -> Self {
        let two = S::from_f64(2.0);
        let half = S::from_f64(0.5);
        let cbrt2 = two.cbrt();
        let w0 = -cbrt2 / (two - cbrt2);
        let w1 = S::ONE / (two - cbrt2);
        Self {
            c1: half * w1,
            c2: half * (w0 + w1),
            c3: half * (w0 + w1),
            c4: half * w1,
            d1: w1,
            d2: w0,
            d3: w1,
        }
    }
}

/// Advance one object by one step
///
/// Pure function of its inputs; `object_index` is only used to skip the
/// object's own planet term.
#[inline]
pub fn step_object<V: Vector>(
    x0: V,
    v0: V,
    object_index: usize,
    planets: &Planets<'_, V>,
    params: &IntegratorParams<V>,
    coefficients: &YoshidaCoefficients<ScalarOf<V>>,
) -> (V, V) {
    let dt = params.dt;
    let accel = |x: V| acceleration(x, object_index, planets, params);

    let x1 = x0 + v0 * (coefficients.c1 * dt);
    let v1 = v0 + accel(x1) * (coefficients.d1 * dt);
    let x2 = x1 + v1 * (coefficients.c2 * dt);
    let v2 = v1 + accel(x2) * (coefficients.d2 * dt);
    let x3 = x2 + v2 * (coefficients.c3 * dt);
    let v3 = v2 + accel(x3) * (coefficients.d3 * dt);
    let x4 = x3 + v3 * (coefficients.c4 * dt);
    (x4, v3)
}

/// Start-of-step copy of the planet arrays
fn snapshot_planets<V: Vector>(objects: &ObjectSoa<V>) -> Result<(Vec<V>, Vec<ScalarOf<V>>)> {
    objects.validate()?;
    let planets = objects.planets();
    Ok((planets.positions.to_vec(), planets.masses.to_vec()))
}

/// Advance every object by one step, one rayon task per object
///
/// Planet positions are read from a snapshot taken before the step, so the
/// result does not depend on the order in which lanes run. Fails without
/// touching any object when the arrays do not share one index space.
pub fn integrate<V: Vector>(
    objects: &mut ObjectSoa<V>,
    params: &IntegratorParams<V>,
) -> Result<()> {
    integrate_with(objects, params, &YoshidaCoefficients::default())
}

pub fn integrate_with<V: Vector>(
    objects: &mut ObjectSoa<V>,
    params: &IntegratorParams<V>,
    coefficients: &YoshidaCoefficients<ScalarOf<V>>,
) -> Result<()> {
    let (planet_positions, planet_masses) = snapshot_planets(objects)?;
    let planets = Planets {
        positions: &planet_positions,
        masses: &planet_masses,
    };

    objects
        .positions
        .par_iter_mut()
        .zip(objects.velocities.par_iter_mut())
        .enumerate()
        .for_each(|(object_index, (position, velocity))| {
            let (x, v) = step_object(
                *position,
                *velocity,
                object_index,
                &planets,
                params,
                coefficients,
            );
            *position = x;
            *velocity = v;
        });
    Ok(())
}

/// Same lanes as [`integrate`], run in index order on the calling thread
pub fn integrate_serial<V: Vector>(
    objects: &mut ObjectSoa<V>,
    params: &IntegratorParams<V>,
) -> Result<()> {
    let coefficients = YoshidaCoefficients::default();
    let (planet_positions, planet_masses) = snapshot_planets(objects)?;
    let planets = Planets {
        positions: &planet_positions,
        masses: &planet_masses,
    };

    for (object_index, (position, velocity)) in objects
        .positions
        .iter_mut()
        .zip(objects.velocities.iter_mut())
        .enumerate()
    {
        let (x, v) = step_object(
            *position,
            *velocity,
            object_index,
            &planets,
            params,
            &coefficients,
        );
        *position = x;
        *velocity = v;
    }
    Ok(())
}
