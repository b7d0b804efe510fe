//! Test scenes and a minimal tree builder

#![allow(dead_code)]

use std::cmp::Ordering;

use glam::DVec2;
use particle_physics::{Aabb, Bvh, Node, ObjectPrototype, ObjectSoa, ScalarOf, Vector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Median split, alternating axes
pub fn build_tree<V: Vector>(positions: &[V], radii: &[ScalarOf<V>]) -> Bvh<V> {
    if positions.is_empty() {
        return Bvh::empty();
    }
    let mut nodes = Vec::with_capacity(2 * positions.len() - 1);
    let mut order: Vec<u32> = (0..positions.len() as u32).collect();
    let root = split(&mut nodes, positions, radii, &mut order, 0);
    Bvh::new(nodes, root)
}

fn split<V: Vector>(
    nodes: &mut Vec<Node<V>>,
    positions: &[V],
    radii: &[ScalarOf<V>],
    order: &mut [u32],
    depth: usize,
) -> u32 {
    if let [object_index] = order {
        let i = *object_index as usize;
        nodes.push(Node::leaf(
            Aabb::from_circle(positions[i], radii[i]),
            *object_index,
        ));
        return (nodes.len() - 1) as u32;
    }

    let key = |index: u32| {
        let p = positions[index as usize];
        if depth % 2 == 0 {
            p.x()
        } else {
            p.y()
        }
    };
    order.sort_by(|&a, &b| key(a).partial_cmp(&key(b)).unwrap_or(Ordering::Equal));
    let (left_half, right_half) = order.split_at_mut(order.len() / 2);
    let left = split(nodes, positions, radii, left_half, depth + 1);
    let right = split(nodes, positions, radii, right_half, depth + 1);
    let aabb = nodes[left as usize]
        .aabb
        .union(&nodes[right as usize].aabb);
    nodes.push(Node::internal(aabb, left, right));
    (nodes.len() - 1) as u32
}

/// Chain whose right child is always a leaf, so a DFS stack grows by one
/// entry per level
pub fn right_leaning_chain<V: Vector>(positions: &[V], radii: &[ScalarOf<V>]) -> Bvh<V> {
    let mut nodes: Vec<Node<V>> = positions
        .iter()
        .zip(radii)
        .enumerate()
        .map(|(i, (&p, &r))| Node::leaf(Aabb::from_circle(p, r), i as u32))
        .collect();
    let mut current = (positions.len() - 1) as u32;
    for leaf in (0..positions.len() - 1).rev() {
        let aabb = nodes[current as usize].aabb.union(&nodes[leaf].aabb);
        nodes.push(Node::internal(aabb, current, leaf as u32));
        current = (nodes.len() - 1) as u32;
    }
    Bvh::new(nodes, current)
}

/// Every unordered pair whose discs overlap, by exhaustive search
pub fn brute_force_pairs<V: Vector>(positions: &[V], radii: &[ScalarOf<V>]) -> Vec<(u32, u32)> {
    let mut pairs = Vec::new();
    for i in 0..positions.len() {
        for j in (i + 1)..positions.len() {
            let reach = radii[i] + radii[j];
            if (positions[j] - positions[i]).length_squared() < reach * reach {
                pairs.push((i as u32, j as u32));
            }
        }
    }
    pairs
}

/// Random particles in a square, radii between 0.2 and 1.0
pub fn random_scene(seed: u64, count: usize, half_extent: f64) -> ObjectSoa<DVec2> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut objects = ObjectSoa::with_capacity(count);
    for _ in 0..count {
        let position = DVec2::new(
            rng.random_range(-half_extent..half_extent),
            rng.random_range(-half_extent..half_extent),
        );
        let velocity = DVec2::new(rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0));
        objects
            .add(
                ObjectPrototype::new(position)
                    .with_velocity(velocity)
                    .with_radius(rng.random_range(0.2..1.0)),
            )
            .unwrap();
    }
    objects
}
