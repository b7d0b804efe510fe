//! Initial scene: planets on a ring, particles orbiting in a disc around them

use particle_physics::{ObjectPrototype, ObjectSoa, PhysicsError, Real, ScalarOf, Vector};
use rand::Rng;

#[derive(Debug, Clone)]
pub struct SceneOptions {
    pub planets: usize,
    pub particles: usize,
    pub planet_mass: f64,
    /// Radius of the ring the planets sit on
    pub planet_ring: f64,
    /// Inner and outer radius of the particle disc
    pub disc: (f64, f64),
    /// Particle radius range
    pub particle_radius: (f64, f64),
    pub gravitational_constant: f64,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            planets: 2,
            particles: 2000,
            planet_mass: 5000.0,
            planet_ring: 8.0,
            disc: (30.0, 120.0),
            particle_radius: (0.2, 0.6),
            gravitational_constant: 1.0,
        }
    }
}

pub fn spawn_scene<V: Vector>(
    options: &SceneOptions,
    rng: &mut impl Rng,
) -> Result<ObjectSoa<V>, PhysicsError> {
    let real = <ScalarOf<V> as Real>::from_f64;
    let mut objects = ObjectSoa::with_capacity(options.planets + options.particles);

    // Planets must come first
    for i in 0..options.planets {
        let angle = std::f64::consts::TAU * i as f64 / options.planets as f64;
        let position = V::new(
            real(options.planet_ring * angle.cos()),
            real(options.planet_ring * angle.sin()),
        );
        objects.add(
            ObjectPrototype::planet(position, real(options.planet_mass)).with_radius(real(2.0)),
        )?;
    }

    // Circular speed around the total planet mass at the disc centre
    let central_mass = options.planet_mass * options.planets as f64;
    for _ in 0..options.particles {
        let r = rng.random_range(options.disc.0..options.disc.1);
        let angle = rng.random_range(0.0..std::f64::consts::TAU);
        let speed = (options.gravitational_constant * central_mass / r).sqrt();
        let (sin, cos) = angle.sin_cos();
        objects.add(
            ObjectPrototype::new(V::new(real(r * cos), real(r * sin)))
                .with_velocity(V::new(real(-speed * sin), real(speed * cos)))
                .with_radius(real(
                    rng.random_range(options.particle_radius.0..options.particle_radius.1),
                )),
        )?;
    }

    log::info!(
        "Spawned {} planets and {} particles",
        objects.planet_count,
        objects.particle_range().len()
    );
    Ok(objects)
}
