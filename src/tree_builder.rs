//! Per-tick BVH construction
//!
//! Leaves are sorted along a Z-order (Morton) curve over the scene bounds,
//! then split at the median recursively. The result is balanced, so its
//! depth stays within the traversal stack sized from the object count.

use particle_physics::{Aabb, Bvh, Node, Real, ScalarOf, Vector};

/// Grid resolution per axis used for Morton codes
const MORTON_GRID: f64 = 65535.0;

/// Interleave the low 16 bits of `x` (even bits) and `y` (odd bits)
pub fn morton_code(x: u32, y: u32) -> u32 {
    expand_bits(x) | (expand_bits(y) << 1)
}

fn expand_bits(mut x: u32) -> u32 {
    x &= 0xFFFF;
    x = (x | (x << 8)) & 0x00FF_00FF;
    x = (x | (x << 4)) & 0x0F0F_0F0F;
    x = (x | (x << 2)) & 0x3333_3333;
    x = (x | (x << 1)) & 0x5555_5555;
    x
}

#[derive(Clone, Copy)]
struct Leaf<V: Vector> {
    object_index: u32,
    aabb: Aabb<V>,
    morton_code: u32,
}

pub fn build_bvh<V: Vector>(positions: &[V], radii: &[ScalarOf<V>]) -> Bvh<V> {
    if positions.is_empty() {
        return Bvh::empty();
    }

    let (min, max) = positions.iter().fold(
        (
            [f64::INFINITY, f64::INFINITY],
            [f64::NEG_INFINITY, f64::NEG_INFINITY],
        ),
        |(min, max), p| {
            let (x, y) = (p.x().to_f64(), p.y().to_f64());
            ([min[0].min(x), min[1].min(y)], [max[0].max(x), max[1].max(y)])
        },
    );
    let scale = [
        MORTON_GRID / (max[0] - min[0]).max(f64::MIN_POSITIVE),
        MORTON_GRID / (max[1] - min[1]).max(f64::MIN_POSITIVE),
    ];

    let mut leaves: Vec<Leaf<V>> = positions
        .iter()
        .zip(radii)
        .enumerate()
        .map(|(object_index, (&position, &radius))| {
            // Saturating casts keep non-finite positions on the grid edge
            let gx = ((position.x().to_f64() - min[0]) * scale[0]) as u32;
            let gy = ((position.y().to_f64() - min[1]) * scale[1]) as u32;
            Leaf {
                object_index: object_index as u32,
                aabb: Aabb::from_circle(position, radius),
                morton_code: morton_code(gx, gy),
            }
        })
        .collect();
    leaves.sort_unstable_by_key(|leaf| (leaf.morton_code, leaf.object_index));

    let mut nodes = Vec::with_capacity(2 * leaves.len() - 1);
    let root = build_subtree(&mut nodes, &leaves);
    Bvh::new(nodes, root)
}

fn build_subtree<V: Vector>(nodes: &mut Vec<Node<V>>, leaves: &[Leaf<V>]) -> u32 {
    if let [leaf] = leaves {
        nodes.push(Node::leaf(leaf.aabb, leaf.object_index));
        return (nodes.len() - 1) as u32;
    }
    let middle = leaves.len() / 2;
    let left = build_subtree(nodes, &leaves[..middle]);
    let right = build_subtree(nodes, &leaves[middle..]);
    let aabb = nodes[left as usize]
        .aabb
        .union(&nodes[right as usize].aabb);
    nodes.push(Node::internal(aabb, left, right));
    (nodes.len() - 1) as u32
}
