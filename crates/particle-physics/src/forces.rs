//! Gravity field and conserved-quantity diagnostics
//!
//! The acceleration here is the exact field sampled by every integrator
//! sub-step; the GPU kernel mirrors it in `integrate.wgsl`.

use crate::integrator::IntegratorParams;
use crate::object::{ObjectSoa, Planets};
use crate::real::{Real, ScalarOf, Vector};

/// Acceleration at `x` for the object with index `object_index`
///
/// `global_gravity + Σ G·m_p·(P_p − x)/|P_p − x|³` over all planets except the
/// object itself. Degenerate distances are handled in two ways:
/// - the self term is skipped by exact index comparison
/// - `|P_p − x|²` is floored at `softening²` and never below
///   [`Real::MIN_DISTANCE_SQ`], so a near-coincident planet gives a large but
///   finite term and a coincident one contributes nothing
#[inline]
pub fn acceleration<V: Vector>(
    x: V,
    object_index: usize,
    planets: &Planets<'_, V>,
    params: &IntegratorParams<V>,
) -> V {
    let one = <ScalarOf<V> as Real>::ONE;
    let floor =
        (params.softening * params.softening).max(<ScalarOf<V> as Real>::MIN_DISTANCE_SQ);

    let mut a = params.global_gravity;
    for (planet_index, (&planet_position, &planet_mass)) in
        planets.positions.iter().zip(planets.masses).enumerate()
    {
        if planet_index == object_index {
            continue;
        }
        let r = planet_position - x;
        let distance_sq = r.length_squared().max(floor);
        // |r| / distance <= 1, so the direction factor cannot blow up
        let inv_distance = one / distance_sq.sqrt();
        a += r * (params.gravitational_constant * planet_mass / distance_sq * inv_distance);
    }
    a
}

/// Σ ½·m·|v|² over every object, planets included
pub fn kinetic_energy<V: Vector>(objects: &ObjectSoa<V>) -> f64 {
    objects
        .velocities
        .iter()
        .zip(&objects.masses)
        .map(|(v, m)| 0.5 * m.to_f64() * v.length_squared().to_f64())
        .sum()
}

/// Potential energy of the configuration
///
/// Includes the uniform field (`−m·g·x`), every planet/object pair where the
/// object is not a planet, and every planet/planet pair once. Object/object
/// attraction does not exist in this model and is not counted.
///
/// Objects never pull on planets, so the total is only conserved while the
/// planets stay at rest (one planet without a uniform field, or planets the
/// caller pins). Once planets move, energy flows through the one-way force
/// and the total drifts by construction; it is a diagnostic, not an invariant.
pub fn potential_energy<V: Vector>(objects: &ObjectSoa<V>, params: &IntegratorParams<V>) -> f64 {
    let g = params.gravitational_constant.to_f64();
    let floor = params.softening.to_f64();
    let gx = params.global_gravity.x().to_f64();
    let gy = params.global_gravity.y().to_f64();

    let uniform: f64 = objects
        .positions
        .iter()
        .zip(&objects.masses)
        .map(|(x, m)| -m.to_f64() * (gx * x.x().to_f64() + gy * x.y().to_f64()))
        .sum();

    let mut pairwise = 0.0;
    for planet_index in objects.planet_range() {
        let planet_position = objects.positions[planet_index];
        let planet_mass = objects.masses[planet_index].to_f64();
        for other in (planet_index + 1)..objects.len() {
            let r = objects.positions[other] - planet_position;
            let distance = r.length_squared().to_f64().sqrt().max(floor);
            if distance > 0.0 {
                pairwise -= g * planet_mass * objects.masses[other].to_f64() / distance;
            }
        }
    }
    uniform + pairwise
}

pub fn total_energy<V: Vector>(objects: &ObjectSoa<V>, params: &IntegratorParams<V>) -> f64 {
    kinetic_energy(objects) + potential_energy(objects, params)
}

/// Σ m·v, accumulated at double precision
pub fn total_momentum<V: Vector>(objects: &ObjectSoa<V>) -> [f64; 2] {
    objects
        .velocities
        .iter()
        .zip(&objects.masses)
        .fold([0.0, 0.0], |[px, py], (v, m)| {
            let m = m.to_f64();
            [px + m * v.x().to_f64(), py + m * v.y().to_f64()]
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectPrototype;
    use approx::assert_relative_eq;
    use glam::{DVec2, Vec2};

    fn params(softening: f64) -> IntegratorParams<DVec2> {
        IntegratorParams {
            dt: 0.01,
            global_gravity: DVec2::ZERO,
            gravitational_constant: 2.0,
            softening,
        }
    }

    #[test]
    fn test_inverse_square_magnitude() {
        let positions = [DVec2::ZERO];
        let masses = [3.0];
        let planets = Planets::new(&positions, &masses).unwrap();
        let a = acceleration(DVec2::new(2.0, 0.0), usize::MAX, &planets, &params(0.0));
        // G·M/r² = 2·3/4, pointing at the planet
        assert_relative_eq!(a.x, -1.5, epsilon = 1e-12);
        assert_relative_eq!(a.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_self_term_is_skipped() {
        let positions = [DVec2::ZERO, DVec2::new(10.0, 0.0)];
        let masses = [1.0, 1.0];
        let planets = Planets::new(&positions, &masses).unwrap();
        let a = acceleration(DVec2::ZERO, 0, &planets, &params(0.0));
        assert!(a.is_finite());
        assert_relative_eq!(a.x, 2.0 / 100.0, epsilon = 1e-12);
    }

    #[test]
    fn test_coincident_planet_stays_finite() {
        let positions = [DVec2::new(1.0, 1.0)];
        let masses = [5.0];
        let planets = Planets::new(&positions, &masses).unwrap();
        for softening in [0.0, 1e-3] {
            let a = acceleration(DVec2::new(1.0, 1.0), usize::MAX, &planets, &params(softening));
            assert!(Vector::is_finite(a));
        }
    }

    #[test]
    fn test_near_coincident_planet_stays_finite() {
        let positions = [Vec2::ZERO];
        let masses = [1.0];
        let planets = Planets::new(&positions, &masses).unwrap();
        let single = IntegratorParams {
            dt: 0.01,
            global_gravity: Vec2::ZERO,
            gravitational_constant: 1.0,
            softening: 0.0,
        };
        single.validate().unwrap();
        let a = acceleration(Vec2::new(1e-15, 0.0), usize::MAX, &planets, &single);
        assert!(Vector::is_finite(a), "{a:?}");
        assert!(a.x < 0.0);

        let positions = [DVec2::ZERO];
        let masses = [1.0];
        let planets = Planets::new(&positions, &masses).unwrap();
        let double = IntegratorParams {
            gravitational_constant: 1.0,
            ..params(0.0)
        };
        let a = acceleration(DVec2::new(1e-160, 0.0), usize::MAX, &planets, &double);
        assert!(Vector::is_finite(a), "{a:?}");
        assert!(a.x < 0.0);
    }

    #[test]
    fn test_planet_pair_counted_once() {
        let mut objects = ObjectSoa::<DVec2>::new();
        objects.add(ObjectPrototype::planet(DVec2::ZERO, 3.0)).unwrap();
        objects.add(ObjectPrototype::planet(DVec2::new(4.0, 0.0), 5.0)).unwrap();
        assert_relative_eq!(potential_energy(&objects, &params(0.0)), -2.0 * 3.0 * 5.0 / 4.0);
    }

    #[test]
    fn test_global_gravity_is_added() {
        let p = IntegratorParams {
            global_gravity: DVec2::new(0.0, -9.81),
            ..params(0.0)
        };
        let a = acceleration(DVec2::new(3.0, 4.0), 0, &Planets::empty(), &p);
        assert_eq!(a, DVec2::new(0.0, -9.81));
    }

    #[test]
    fn test_energy_of_static_pair() {
        let mut objects = ObjectSoa::<DVec2>::new();
        objects.add(ObjectPrototype::planet(DVec2::ZERO, 4.0)).unwrap();
        objects
            .add(
                ObjectPrototype::new(DVec2::new(2.0, 0.0))
                    .with_velocity(DVec2::new(0.0, 1.0))
                    .with_mass(2.0),
            )
            .unwrap();
        let p = params(0.0);
        assert_relative_eq!(kinetic_energy(&objects), 1.0);
        assert_relative_eq!(potential_energy(&objects, &p), -2.0 * 4.0 * 2.0 / 2.0);
        assert_eq!(total_momentum(&objects), [0.0, 2.0]);
    }
}
