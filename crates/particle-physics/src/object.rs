//! Object storage shared by both kernels
//!
//! Objects live in parallel arrays indexed `0..N`. Planets are ordinary objects
//! that also act as gravity sources; they occupy the front of the arrays so that
//! planet index `p` and object index `p` name the same body.

use std::ops::Range;

use crate::error::{PhysicsError, Result};
use crate::real::{Real, ScalarOf, Vector};

/// Parallel object arrays
#[derive(Debug, Clone, Default)]
pub struct ObjectSoa<V: Vector> {
    pub positions: Vec<V>,
    pub velocities: Vec<V>,
    pub radii: Vec<ScalarOf<V>>,
    pub masses: Vec<ScalarOf<V>>,
    pub planet_count: usize,
}

impl<V: Vector> ObjectSoa<V> {
    pub fn new() -> Self {
        Self {
            positions: Vec::new(),
            velocities: Vec::new(),
            radii: Vec::new(),
            masses: Vec::new(),
            planet_count: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            positions: Vec::with_capacity(capacity),
            velocities: Vec::with_capacity(capacity),
            radii: Vec::with_capacity(capacity),
            masses: Vec::with_capacity(capacity),
            planet_count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Append an object and return its index
    ///
    /// Planets must be added before any other object.
    pub fn add(&mut self, object: ObjectPrototype<V>) -> Result<usize> {
        let object_index = self.len();
        if object.is_planet && object_index != self.planet_count {
            return Err(PhysicsError::PlanetOrder {
                index: object_index,
                particles: object_index - self.planet_count,
            });
        }
        self.positions.push(object.position);
        self.velocities.push(object.velocity);
        self.radii.push(object.radius);
        self.masses.push(object.mass);
        self.planet_count += usize::from(object.is_planet);
        Ok(object_index)
    }

    pub fn planet_range(&self) -> Range<usize> {
        0..self.planet_count
    }

    pub fn particle_range(&self) -> Range<usize> {
        self.planet_count..self.len()
    }

    /// Check the shared-index-space invariant
    pub fn validate(&self) -> Result<()> {
        let expected = self.positions.len();
        for (name, actual) in [
            ("velocities", self.velocities.len()),
            ("radii", self.radii.len()),
            ("masses", self.masses.len()),
        ] {
            if actual != expected {
                return Err(PhysicsError::LengthMismatch {
                    name,
                    expected,
                    actual,
                });
            }
        }
        if self.planet_count > expected {
            return Err(PhysicsError::LengthMismatch {
                name: "planet_count",
                expected,
                actual: self.planet_count,
            });
        }
        Ok(())
    }

    /// Planet view aliased onto the front of the object arrays
    pub fn planets(&self) -> Planets<'_, V> {
        Planets {
            positions: &self.positions[..self.planet_count],
            masses: &self.masses[..self.planet_count],
        }
    }
}

/// Read-only planet arrays
#[derive(Debug, Clone, Copy)]
pub struct Planets<'a, V: Vector> {
    pub positions: &'a [V],
    pub masses: &'a [ScalarOf<V>],
}

impl<'a, V: Vector> Planets<'a, V> {
    /// Planets stored apart from the object arrays
    ///
    /// With this layout no planet shares an index with an object, so the
    /// self-exclusion check never fires; pass objects that are not planets.
    pub fn new(positions: &'a [V], masses: &'a [ScalarOf<V>]) -> Result<Self> {
        if positions.len() != masses.len() {
            return Err(PhysicsError::LengthMismatch {
                name: "planet_masses",
                expected: positions.len(),
                actual: masses.len(),
            });
        }
        Ok(Self { positions, masses })
    }

    pub fn empty() -> Self {
        Self {
            positions: &[],
            masses: &[],
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Description of one object before it is added to an [`ObjectSoa`]
#[derive(Debug, Clone, Copy)]
pub struct ObjectPrototype<V: Vector> {
    pub position: V,
    pub velocity: V,
    pub radius: ScalarOf<V>,
    pub mass: ScalarOf<V>,
    pub is_planet: bool,
}

impl<V: Vector> ObjectPrototype<V> {
    /// Unit-radius, unit-mass object at rest
    pub fn new(position: V) -> Self {
        Self {
            position,
            velocity: V::ZERO,
            radius: <ScalarOf<V> as Real>::ONE,
            mass: <ScalarOf<V> as Real>::ONE,
            is_planet: false,
        }
    }

    /// Gravity source of mass `mass`
    pub fn planet(position: V, mass: ScalarOf<V>) -> Self {
        Self {
            mass,
            is_planet: true,
            ..Self::new(position)
        }
    }

    pub fn with_velocity(mut self, velocity: V) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_radius(mut self, radius: ScalarOf<V>) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_mass(mut self, mass: ScalarOf<V>) -> Self {
        self.mass = mass;
        self
    }

    pub fn momentum(&self) -> V {
        self.velocity * self.mass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec2;

    #[test]
    fn test_planets_must_come_first() {
        let mut objects = ObjectSoa::<DVec2>::new();
        objects
            .add(ObjectPrototype::planet(DVec2::ZERO, 10.0))
            .unwrap();
        objects
            .add(ObjectPrototype::new(DVec2::new(1.0, 0.0)))
            .unwrap();
        let err = objects
            .add(ObjectPrototype::planet(DVec2::new(5.0, 0.0), 1.0))
            .unwrap_err();
        assert_eq!(
            err,
            PhysicsError::PlanetOrder {
                index: 2,
                particles: 1
            }
        );
        assert_eq!(objects.planet_range(), 0..1);
        assert_eq!(objects.particle_range(), 1..2);
    }

    #[test]
    fn test_planet_view_aliases_object_front() {
        let mut objects = ObjectSoa::<DVec2>::new();
        objects
            .add(ObjectPrototype::planet(DVec2::new(2.0, 3.0), 7.0))
            .unwrap();
        objects
            .add(ObjectPrototype::new(DVec2::new(1.0, 0.0)))
            .unwrap();
        let planets = objects.planets();
        assert_eq!(planets.len(), 1);
        assert_eq!(planets.positions[0], objects.positions[0]);
        assert_eq!(planets.masses[0], 7.0);
    }

    #[test]
    fn test_validate_detects_length_mismatch() {
        let mut objects = ObjectSoa::<DVec2>::new();
        objects
            .add(ObjectPrototype::new(DVec2::new(1.0, 0.0)))
            .unwrap();
        objects.radii.push(2.0);
        assert!(matches!(
            objects.validate(),
            Err(PhysicsError::LengthMismatch { name: "radii", .. })
        ));
    }

    #[test]
    fn test_momentum() {
        let object = ObjectPrototype::new(DVec2::ZERO)
            .with_velocity(DVec2::new(2.0, -1.0))
            .with_mass(3.0);
        assert_eq!(object.momentum(), DVec2::new(6.0, -3.0));
    }
}
