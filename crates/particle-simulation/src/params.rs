//! Uniform parameters shared by both compute kernels

use bytemuck::{Pod, Zeroable};
use particle_physics::{IntegratorParams, SimulationConfig, YoshidaCoefficients};

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SimulationParams {
    // Group 1: Integration
    // x: dt, y: G, z: softening, w: padding
    pub integration: [f32; 4],

    // Group 2: Uniform field
    // xy: global gravity, zw: padding
    pub gravity: [f32; 4],

    // Group 3: Sizes
    // x: object_count, y: planet_count, z: candidate_capacity, w: stack_capacity
    pub counts: [u32; 4],

    // Group 4: Tree
    // x: root, y: node_count (0 = empty tree), zw: padding
    pub tree: [u32; 4],

    // Group 5: Yoshida drift weights c1..c4
    pub drift: [f32; 4],

    // Group 6: Yoshida kick weights d1..d3, w: padding
    pub kick: [f32; 4],
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self::from_config(&SimulationConfig::default())
    }
}

impl SimulationParams {
    /// Narrow `config` to single precision; sizes are filled in by the caller
    pub fn from_config(config: &SimulationConfig) -> Self {
        let integrator: IntegratorParams<glam::Vec2> = config.integrator_params();
        let c = YoshidaCoefficients::<f32>::default();
        Self {
            integration: [
                integrator.dt,
                integrator.gravitational_constant,
                integrator.softening,
                0.0,
            ],
            gravity: [
                integrator.global_gravity.x,
                integrator.global_gravity.y,
                0.0,
                0.0,
            ],
            counts: [0; 4],
            tree: [0; 4],
            drift: [c.c1, c.c2, c.c3, c.c4],
            kick: [c.d1, c.d2, c.d3, 0.0],
        }
    }

    pub fn with_counts(
        mut self,
        object_count: u32,
        planet_count: u32,
        candidate_capacity: u32,
        stack_capacity: u32,
    ) -> Self {
        self.counts = [object_count, planet_count, candidate_capacity, stack_capacity];
        self
    }

    pub fn set_tree(&mut self, root: u32, node_count: u32) {
        self.tree = [root, node_count, 0, 0];
    }

    pub fn object_count(&self) -> u32 {
        self.counts[0]
    }

    pub fn candidate_capacity(&self) -> u32 {
        self.counts[2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_uniform_friendly() {
        // Six 16-byte groups
        assert_eq!(std::mem::size_of::<SimulationParams>(), 96);
    }

    #[test]
    fn test_from_config_narrows_values() {
        let config = SimulationConfig {
            dt: 0.5,
            global_gravity: [1.0, -2.0],
            ..Default::default()
        };
        let params = SimulationParams::from_config(&config).with_counts(10, 2, 160, 16);
        assert_eq!(params.integration[0], 0.5);
        assert_eq!(params.gravity[..2], [1.0, -2.0]);
        assert_eq!(params.counts, [10, 2, 160, 16]);
        approx::assert_relative_eq!(params.kick[1], -1.702_414_4, epsilon = 1e-6);
    }
}
