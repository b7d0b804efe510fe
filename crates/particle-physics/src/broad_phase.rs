//! BVH broad-phase: per-object candidate queries
//!
//! Each lane walks the tree with its own fixed-capacity stack and reports the
//! pairs `(i, j)`, `i != j`, whose boxes intersect and whose discs are strictly
//! closer than the sum of their radii. A lane never writes outside its stack
//! or its candidate storage; anything that does not fit is counted instead.
//!
//! The tree is trusted: see [`crate::bvh`] for the preconditions.

use rayon::prelude::*;

use crate::aabb::Aabb;
use crate::bvh::{Bvh, NodeKind};
use crate::candidates::{
    BroadPhaseReport, CandidatePair, CandidateSink, CandidateSlab, OverflowCounters,
    SharedCandidateList, SlabLane,
};
use crate::constants::STACK_SLACK;
use crate::error::{PhysicsError, Result};
use crate::real::{ScalarOf, Vector};

/// Capacities of one broad-phase invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadPhaseParams {
    /// Slots per object in a [`CandidateSlab`]
    pub max_candidates: u32,
    /// Entries of each lane's traversal stack
    pub stack_capacity: u32,
}

impl BroadPhaseParams {
    /// Capacities for a balanced tree over `object_count` objects
    pub fn for_object_count(object_count: usize, max_candidates: u32) -> Self {
        Self::with_slack(object_count, max_candidates, STACK_SLACK)
    }

    /// Stack of `2 * ceil(log2(object_count)) + slack` entries
    pub fn with_slack(object_count: usize, max_candidates: u32, slack: u32) -> Self {
        Self {
            max_candidates,
            stack_capacity: 2 * ceil_log2(object_count) + slack,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_candidates == 0 {
            return Err(PhysicsError::invalid("max_candidates", "must be positive"));
        }
        if self.stack_capacity == 0 {
            return Err(PhysicsError::invalid("stack_capacity", "must be positive"));
        }
        Ok(())
    }
}

fn ceil_log2(n: usize) -> u32 {
    if n <= 1 {
        0
    } else {
        usize::BITS - (n - 1).leading_zeros()
    }
}

/// Bounded LIFO of node indices owned by one lane
#[derive(Debug, Clone)]
pub struct TraversalStack {
    items: Vec<u32>,
    capacity: usize,
}

impl TraversalStack {
    pub fn with_capacity(capacity: u32) -> Self {
        let capacity = capacity as usize;
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Push `node`; `false` (and nothing stored) when the stack is full
    #[inline]
    pub fn push(&mut self, node: u32) -> bool {
        if self.items.len() == self.capacity {
            return false;
        }
        self.items.push(node);
        true
    }

    #[inline]
    pub fn pop(&mut self) -> Option<u32> {
        self.items.pop()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// Find every candidate of object `object_index`
///
/// A node that does not fit on the stack is abandoned along with its whole
/// subtree, and a pair the sink refuses is dropped; both are recorded in
/// `counters`. Every pair is emitted in canonical `(min, max)` order, so the
/// same pair usually shows up once from each of its two objects.
pub fn query_object<V: Vector, S: CandidateSink>(
    object_index: usize,
    bvh: &Bvh<V>,
    positions: &[V],
    radii: &[ScalarOf<V>],
    stack: &mut TraversalStack,
    sink: &mut S,
    counters: &OverflowCounters,
) {
    if bvh.is_empty() {
        return;
    }
    let position = positions[object_index];
    let radius = radii[object_index];
    let query = Aabb::from_circle(position, radius);

    stack.clear();
    if !stack.push(bvh.root()) {
        counters.record_stack_overflow();
        return;
    }

    while let Some(node_index) = stack.pop() {
        let node = bvh.node(node_index);
        if !query.intersects(&node.aabb) {
            continue;
        }
        match node.kind {
            NodeKind::Leaf(other) => {
                let other_index = other as usize;
                if other_index == object_index {
                    continue;
                }
                let reach = radius + radii[other_index];
                let distance_sq = (positions[other_index] - position).length_squared();
                if distance_sq < reach * reach
                    && !sink.emit(CandidatePair::ordered(object_index as u32, other))
                {
                    counters.record_candidate_overflow();
                }
            }
            NodeKind::Internal { left, right } => {
                // Right goes first so the left subtree is walked first
                for child in [right, left] {
                    if !stack.push(child) {
                        counters.record_stack_overflow();
                    }
                }
            }
        }
    }
}

fn check_inputs<V: Vector>(
    positions: &[V],
    radii: &[ScalarOf<V>],
    params: &BroadPhaseParams,
) -> Result<()> {
    params.validate()?;
    if radii.len() != positions.len() {
        return Err(PhysicsError::LengthMismatch {
            name: "radii",
            expected: positions.len(),
            actual: radii.len(),
        });
    }
    Ok(())
}

fn check_slab(slab: &CandidateSlab, object_count: usize, params: &BroadPhaseParams) -> Result<()> {
    if slab.object_count() != object_count {
        return Err(PhysicsError::LengthMismatch {
            name: "candidate_slab",
            expected: object_count,
            actual: slab.object_count(),
        });
    }
    if slab.max_candidates() != params.max_candidates as usize {
        return Err(PhysicsError::LengthMismatch {
            name: "max_candidates",
            expected: params.max_candidates as usize,
            actual: slab.max_candidates(),
        });
    }
    Ok(())
}

/// One rayon task per object, each writing its own slab slots
///
/// `slab` is reset first; it must have been created with
/// `(positions.len(), params.max_candidates)`.
pub fn find_candidates_slab<V: Vector>(
    bvh: &Bvh<V>,
    positions: &[V],
    radii: &[ScalarOf<V>],
    params: &BroadPhaseParams,
    slab: &mut CandidateSlab,
) -> Result<BroadPhaseReport> {
    check_inputs(positions, radii, params)?;
    check_slab(slab, positions.len(), params)?;
    slab.reset();

    let counters = OverflowCounters::new();
    let stack_capacity = params.stack_capacity;
    let (slots, counts, max_candidates) = slab.lanes_mut();
    slots
        .par_chunks_mut(max_candidates)
        .zip(counts.par_iter_mut())
        .enumerate()
        .for_each_init(
            || TraversalStack::with_capacity(stack_capacity),
            |stack, (object_index, (slots, count))| {
                let mut lane = SlabLane::new(slots, count);
                query_object(
                    object_index,
                    bvh,
                    positions,
                    radii,
                    stack,
                    &mut lane,
                    &counters,
                );
            },
        );

    let report = counters.report(slab.len());
    log::trace!("slab broad-phase: {report:?}");
    Ok(report)
}

/// One rayon task per object, all appending to one shared list
///
/// `list` is reset first. Its capacity bounds the total number of pairs.
pub fn find_candidates_shared<V: Vector>(
    bvh: &Bvh<V>,
    positions: &[V],
    radii: &[ScalarOf<V>],
    params: &BroadPhaseParams,
    list: &mut SharedCandidateList,
) -> Result<BroadPhaseReport> {
    check_inputs(positions, radii, params)?;
    list.reset();

    let counters = OverflowCounters::new();
    let stack_capacity = params.stack_capacity;
    let shared: &SharedCandidateList = list;
    (0..positions.len()).into_par_iter().for_each_init(
        || TraversalStack::with_capacity(stack_capacity),
        |stack, object_index| {
            let mut sink = shared;
            query_object(
                object_index,
                bvh,
                positions,
                radii,
                stack,
                &mut sink,
                &counters,
            );
        },
    );

    let report = counters.report(shared.len());
    log::trace!("shared-list broad-phase: {report:?}");
    Ok(report)
}

/// Slab strategy run in object order on the calling thread
pub fn find_candidates_serial<V: Vector>(
    bvh: &Bvh<V>,
    positions: &[V],
    radii: &[ScalarOf<V>],
    params: &BroadPhaseParams,
    slab: &mut CandidateSlab,
) -> Result<BroadPhaseReport> {
    check_inputs(positions, radii, params)?;
    check_slab(slab, positions.len(), params)?;
    slab.reset();

    let counters = OverflowCounters::new();
    let mut stack = TraversalStack::with_capacity(params.stack_capacity);
    let (slots, counts, max_candidates) = slab.lanes_mut();
    for (object_index, (slots, count)) in slots
        .chunks_mut(max_candidates)
        .zip(counts.iter_mut())
        .enumerate()
    {
        let mut lane = SlabLane::new(slots, count);
        query_object(
            object_index,
            bvh,
            positions,
            radii,
            &mut stack,
            &mut lane,
            &counters,
        );
    }
    Ok(counters.report(slab.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::Node;
    use glam::Vec2;

    fn pair_tree(a: Vec2, b: Vec2, radius: f32) -> Bvh<Vec2> {
        let left = Aabb::from_circle(a, radius);
        let right = Aabb::from_circle(b, radius);
        Bvh::new(
            vec![
                Node::leaf(left, 0),
                Node::leaf(right, 1),
                Node::internal(left.union(&right), 0, 1),
            ],
            2,
        )
    }

    #[test]
    fn test_stack_capacity_formula() {
        assert_eq!(BroadPhaseParams::with_slack(0, 4, 8).stack_capacity, 8);
        assert_eq!(BroadPhaseParams::with_slack(1, 4, 8).stack_capacity, 8);
        assert_eq!(BroadPhaseParams::with_slack(2, 4, 8).stack_capacity, 10);
        assert_eq!(BroadPhaseParams::with_slack(1000, 4, 8).stack_capacity, 28);
        assert_eq!(BroadPhaseParams::with_slack(1024, 4, 0).stack_capacity, 20);
    }

    #[test]
    fn test_traversal_stack_refuses_when_full() {
        let mut stack = TraversalStack::with_capacity(2);
        assert!(stack.push(1));
        assert!(stack.push(2));
        assert!(!stack.push(3));
        assert_eq!(stack.pop(), Some(2));
        assert!(stack.push(4));
        assert_eq!(stack.pop(), Some(4));
        assert_eq!(stack.pop(), Some(1));
        assert_eq!(stack.pop(), None);
    }

    #[test]
    fn test_overlapping_pair_is_reported_canonically() {
        let positions = [Vec2::new(0.0, 0.0), Vec2::new(0.5, 0.0)];
        let radii = [0.3, 0.3];
        let bvh = pair_tree(positions[0], positions[1], 0.3);
        let params = BroadPhaseParams::for_object_count(2, 4);
        let mut slab = CandidateSlab::new(2, 4);
        let report = find_candidates_slab(&bvh, &positions, &radii, &params, &mut slab).unwrap();

        assert!(report.is_complete());
        let expected = CandidatePair::ordered(0, 1);
        assert_eq!(slab.pairs_of(0), &[expected]);
        assert_eq!(slab.pairs_of(1), &[expected]);
    }

    #[test]
    fn test_distant_pair_is_not_reported() {
        let positions = [Vec2::new(0.0, 0.0), Vec2::new(5.0, 0.0)];
        let radii = [0.3, 0.3];
        let bvh = pair_tree(positions[0], positions[1], 0.3);
        let params = BroadPhaseParams::for_object_count(2, 4);
        let mut slab = CandidateSlab::new(2, 4);
        let report = find_candidates_slab(&bvh, &positions, &radii, &params, &mut slab).unwrap();
        assert!(report.is_complete());
        assert!(slab.is_empty());
    }

    #[test]
    fn test_touching_discs_are_not_reported() {
        // Distance equals the radius sum: boxes touch, discs do not overlap
        let positions = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0)];
        let radii = [0.5, 0.5];
        let bvh = pair_tree(positions[0], positions[1], 0.5);
        let params = BroadPhaseParams::for_object_count(2, 4);
        let mut slab = CandidateSlab::new(2, 4);
        find_candidates_serial(&bvh, &positions, &radii, &params, &mut slab).unwrap();
        assert!(slab.is_empty());
    }

    #[test]
    fn test_empty_tree_reports_nothing() {
        let positions = [Vec2::ZERO];
        let radii = [1.0];
        let params = BroadPhaseParams::for_object_count(1, 4);
        let mut list = SharedCandidateList::new(8);
        let report =
            find_candidates_shared(&Bvh::empty(), &positions, &radii, &params, &mut list).unwrap();
        assert!(report.is_complete());
        assert!(list.is_empty());
    }

    #[test]
    fn test_mismatched_slab_is_rejected() {
        let positions = [Vec2::ZERO, Vec2::ONE];
        let radii = [1.0, 1.0];
        let bvh = pair_tree(positions[0], positions[1], 1.0);
        let params = BroadPhaseParams::for_object_count(2, 4);
        let mut slab = CandidateSlab::new(3, 4);
        assert!(matches!(
            find_candidates_slab(&bvh, &positions, &radii, &params, &mut slab),
            Err(PhysicsError::LengthMismatch { .. })
        ));
    }
}
