//! GPU kernels against the CPU reference
//!
//! Every test returns early when the machine has no usable adapter.

use std::collections::BTreeSet;

use approx::assert_relative_eq;
use glam::Vec2;
use particle_physics::*;
use particle_simulation::{GpuContext, GpuSimulation, SimulationError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn context() -> Option<GpuContext> {
    match GpuContext::new_blocking() {
        Ok(context) => Some(context),
        Err(err) => {
            eprintln!("skipping GPU test: {err}");
            None
        }
    }
}

fn scene(seed: u64, count: usize) -> ObjectSoa<Vec2> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut objects = ObjectSoa::with_capacity(count + 2);
    objects
        .add(ObjectPrototype::planet(Vec2::new(-10.0, 0.0), 500.0).with_radius(2.0))
        .unwrap();
    objects
        .add(ObjectPrototype::planet(Vec2::new(10.0, 0.0), 500.0).with_radius(2.0))
        .unwrap();
    while objects.len() < count + 2 {
        let position = Vec2::new(rng.random_range(-40.0..40.0), rng.random_range(-40.0..40.0));
        // Close planet passes amplify rounding differences between devices
        if objects.planets().positions.iter().any(|p| p.distance(position) < 6.0) {
            continue;
        }
        let velocity = Vec2::new(rng.random_range(-2.0..2.0), rng.random_range(-2.0..2.0));
        objects
            .add(
                ObjectPrototype::new(position)
                    .with_velocity(velocity)
                    .with_radius(rng.random_range(0.2..1.2)),
            )
            .unwrap();
    }
    objects
}

/// Median split over x then y, enough for a reference tree
fn build_tree(positions: &[Vec2], radii: &[f32]) -> Bvh<Vec2> {
    fn split(
        nodes: &mut Vec<Node<Vec2>>,
        positions: &[Vec2],
        radii: &[f32],
        order: &mut [u32],
        depth: usize,
    ) -> u32 {
        if let [object_index] = order {
            let i = *object_index as usize;
            nodes.push(Node::leaf(Aabb::from_circle(positions[i], radii[i]), *object_index));
            return (nodes.len() - 1) as u32;
        }
        let key = |index: u32| {
            let p = positions[index as usize];
            if depth % 2 == 0 {
                p.x
            } else {
                p.y
            }
        };
        order.sort_by(|&a, &b| key(a).total_cmp(&key(b)));
        let (left_half, right_half) = order.split_at_mut(order.len() / 2);
        let left = split(nodes, positions, radii, left_half, depth + 1);
        let right = split(nodes, positions, radii, right_half, depth + 1);
        let aabb = nodes[left as usize].aabb.union(&nodes[right as usize].aabb);
        nodes.push(Node::internal(aabb, left, right));
        (nodes.len() - 1) as u32
    }

    let mut nodes = Vec::new();
    let mut order: Vec<u32> = (0..positions.len() as u32).collect();
    let root = split(&mut nodes, positions, radii, &mut order, 0);
    Bvh::new(nodes, root)
}

#[test]
fn test_integration_matches_cpu() {
    let Some(context) = context() else {
        return;
    };
    let config = SimulationConfig::default();
    let objects = scene(5, 500);
    let gpu = GpuSimulation::new(context, &objects, &config).unwrap();

    let params = config.integrator_params::<Vec2>();
    let mut cpu = objects.clone();
    for _ in 0..20 {
        integrate(&mut cpu, &params).unwrap();
        gpu.integrate();
    }

    let mut readback = objects.clone();
    gpu.read_objects(&mut readback).unwrap();
    for (gpu_position, cpu_position) in readback.positions.iter().zip(&cpu.positions) {
        assert_relative_eq!(gpu_position.x, cpu_position.x, epsilon = 1e-3);
        assert_relative_eq!(gpu_position.y, cpu_position.y, epsilon = 1e-3);
    }
    for (gpu_velocity, cpu_velocity) in readback.velocities.iter().zip(&cpu.velocities) {
        assert_relative_eq!(gpu_velocity.x, cpu_velocity.x, epsilon = 1e-3);
        assert_relative_eq!(gpu_velocity.y, cpu_velocity.y, epsilon = 1e-3);
    }

    // Writing back what was read leaves the state unchanged
    gpu.write_objects(&readback).unwrap();
    let mut again = objects;
    gpu.read_objects(&mut again).unwrap();
    assert_eq!(again.positions, readback.positions);
}

#[test]
fn test_broad_phase_matches_cpu() {
    let Some(context) = context() else {
        return;
    };
    let config = SimulationConfig::default();
    let objects = scene(17, 800);
    let bvh = build_tree(&objects.positions, &objects.radii);
    let mut gpu = GpuSimulation::new(context, &objects, &config).unwrap();
    gpu.upload_bvh(&bvh);
    let output = gpu.find_candidates().unwrap();
    assert!(output.report.is_complete(), "{:?}", output.report);

    let params = config.broad_phase_params(objects.len());
    let mut slab = CandidateSlab::new(objects.len(), params.max_candidates);
    let report =
        find_candidates_slab(&bvh, &objects.positions, &objects.radii, &params, &mut slab)
            .unwrap();
    assert!(report.is_complete());

    let gpu_pairs: BTreeSet<_> = dedup_pairs(output.pairs.clone()).into_iter().collect();
    let cpu_pairs: BTreeSet<_> = dedup_pairs(slab.compact()).into_iter().collect();
    assert_eq!(gpu_pairs, cpu_pairs);
    assert_eq!(output.report.candidates, report.candidates);
    assert!(output.pairs.iter().all(|pair| pair.first < pair.second));
}

#[test]
fn test_candidate_overflow_is_counted() {
    let Some(context) = context() else {
        return;
    };
    // Ten coincident objects, two slots each: 90 pairs for 20 slots
    let mut objects = ObjectSoa::new();
    for _ in 0..10 {
        objects.add(ObjectPrototype::new(Vec2::ZERO)).unwrap();
    }
    let config = SimulationConfig {
        max_candidates: 2,
        ..Default::default()
    };
    let bvh = build_tree(&objects.positions, &objects.radii);
    let mut gpu = GpuSimulation::new(context, &objects, &config).unwrap();
    gpu.upload_bvh(&bvh);
    let output = gpu.find_candidates().unwrap();

    assert_eq!(output.pairs.len(), 20);
    assert_eq!(output.report.candidate_overflows, 70);
    assert_eq!(output.report.stack_overflows, 0);
    assert!(!output.report.is_complete());
    // The claim counter stops at the capacity instead of counting every attempt
    assert_eq!(output.reserved, 20);

    // Counters are cleared per dispatch, so a second query sees the same picture
    let again = gpu.find_candidates().unwrap();
    assert_eq!(again.reserved, 20);
    assert_eq!(again.report.candidate_overflows, 70);
    assert_eq!(again.pairs.len(), 20);
    assert!(again.pairs.iter().all(|pair| pair.first < pair.second));
}

#[test]
fn test_empty_tree_reports_nothing() {
    let Some(context) = context() else {
        return;
    };
    let objects = scene(1, 16);
    let mut gpu = GpuSimulation::new(context, &objects, &SimulationConfig::default()).unwrap();
    gpu.upload_bvh(&Bvh::empty());
    let output = gpu.find_candidates().unwrap();
    assert!(output.pairs.is_empty());
    assert!(output.report.is_complete());
}

#[test]
fn test_update_params_keeps_sizes() {
    let Some(context) = context() else {
        return;
    };
    let objects = scene(3, 32);
    let config = SimulationConfig::default();
    let mut gpu = GpuSimulation::new(context, &objects, &config).unwrap();
    let bvh = build_tree(&objects.positions, &objects.radii);
    gpu.upload_bvh(&bvh);
    let counts = gpu.params().counts;

    let slower = SimulationConfig {
        dt: config.dt / 2.0,
        global_gravity: [0.0, 0.0],
        ..config.clone()
    };
    gpu.update_params(&slower).unwrap();
    assert_relative_eq!(gpu.params().integration[0], (config.dt / 2.0) as f32);
    assert_eq!(gpu.params().gravity[..2], [0.0, 0.0]);
    assert_eq!(gpu.params().counts, counts);
    assert_eq!(gpu.params().tree[1], bvh.len() as u32);

    let resized = SimulationConfig {
        max_candidates: config.max_candidates * 2,
        ..config
    };
    assert!(matches!(
        gpu.update_params(&resized),
        Err(SimulationError::Unsupported(_))
    ));
}

#[test]
fn test_double_precision_is_rejected() {
    let Some(context) = context() else {
        return;
    };
    let config = SimulationConfig {
        precision: Precision::Double,
        ..Default::default()
    };
    let result = GpuSimulation::new(context, &scene(2, 4), &config);
    assert!(matches!(result, Err(SimulationError::Unsupported(_))));
}
