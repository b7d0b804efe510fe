//! Candidate pair storage and overflow accounting
//!
//! Two interchangeable storage strategies:
//! - [`CandidateSlab`]: a private fixed-size slab per object, no contention
//! - [`SharedCandidateList`]: one global list, write slots reserved with an
//!   atomic length counter
//!
//! Neither ever writes outside its capacity. A pair that does not fit is
//! dropped and counted in [`OverflowCounters::candidate_overflows`].

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

use bytemuck::{Pod, Zeroable};

use crate::constants::INVALID_INDEX;

/// Unordered object pair stored as `(min, max)`
///
/// Layout matches the GPU candidate buffer (two `u32`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Pod, Zeroable)]
pub struct CandidatePair {
    pub first: u32,
    pub second: u32,
}

impl CandidatePair {
    /// Value of an unused slab slot
    pub const SENTINEL: Self = Self {
        first: INVALID_INDEX,
        second: INVALID_INDEX,
    };

    /// Canonical pair: the smaller index always comes first
    #[inline]
    pub fn ordered(a: u32, b: u32) -> Self {
        if a <= b {
            Self {
                first: a,
                second: b,
            }
        } else {
            Self {
                first: b,
                second: a,
            }
        }
    }

    pub fn is_sentinel(&self) -> bool {
        *self == Self::SENTINEL
    }

    fn pack(self) -> u64 {
        (u64::from(self.first) << 32) | u64::from(self.second)
    }

    fn unpack(packed: u64) -> Self {
        Self {
            first: (packed >> 32) as u32,
            second: packed as u32,
        }
    }
}

/// Destination of the pairs found by one query lane
pub trait CandidateSink {
    /// Store `pair`; `false` means it did not fit and was dropped
    fn emit(&mut self, pair: CandidatePair) -> bool;
}

/// Error counters of one broad-phase invocation
///
/// Shared by all lanes; the only cross-lane mutation besides the shared
/// list's length counter.
#[derive(Debug, Default)]
pub struct OverflowCounters {
    pub stack_overflows: AtomicU32,
    pub candidate_overflows: AtomicU32,
}

impl OverflowCounters {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_stack_overflow(&self) {
        self.stack_overflows.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_candidate_overflow(&self) {
        self.candidate_overflows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.stack_overflows.store(0, Ordering::Relaxed);
        self.candidate_overflows.store(0, Ordering::Relaxed);
    }

    pub fn report(&self, candidates: usize) -> BroadPhaseReport {
        BroadPhaseReport {
            candidates,
            stack_overflows: self.stack_overflows.load(Ordering::Relaxed),
            candidate_overflows: self.candidate_overflows.load(Ordering::Relaxed),
        }
    }
}

/// What the driver must check before trusting a candidate list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BroadPhaseReport {
    /// Pairs stored (before cross-query dedup)
    pub candidates: usize,
    /// Branches abandoned because a traversal stack was full
    pub stack_overflows: u32,
    /// Pairs dropped because the candidate storage was full
    pub candidate_overflows: u32,
}

impl BroadPhaseReport {
    /// `true` when no branch was abandoned and no pair was dropped
    pub fn is_complete(&self) -> bool {
        self.stack_overflows == 0 && self.candidate_overflows == 0
    }
}

/// Fixed-capacity candidate slots per object
///
/// Object `i` owns slots `i * max_candidates .. (i + 1) * max_candidates`.
/// Unused slots hold [`CandidatePair::SENTINEL`].
#[derive(Debug, Clone)]
pub struct CandidateSlab {
    slots: Vec<CandidatePair>,
    counts: Vec<u32>,
    max_candidates: usize,
}

impl CandidateSlab {
    pub fn new(object_count: usize, max_candidates: u32) -> Self {
        let max_candidates = max_candidates as usize;
        Self {
            slots: vec![CandidatePair::SENTINEL; object_count * max_candidates],
            counts: vec![0; object_count],
            max_candidates,
        }
    }

    pub fn object_count(&self) -> usize {
        self.counts.len()
    }

    pub fn max_candidates(&self) -> usize {
        self.max_candidates
    }

    /// Filled slots of one object
    pub fn pairs_of(&self, object_index: usize) -> &[CandidatePair] {
        let start = object_index * self.max_candidates;
        &self.slots[start..start + self.counts[object_index] as usize]
    }

    /// Number of filled slots over all objects
    pub fn len(&self) -> usize {
        self.counts.iter().map(|&count| count as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gather the filled slots of every object into one list
    pub fn compact(&self) -> Vec<CandidatePair> {
        let mut pairs = Vec::with_capacity(self.len());
        for object_index in 0..self.object_count() {
            pairs.extend_from_slice(self.pairs_of(object_index));
        }
        pairs
    }

    pub fn reset(&mut self) {
        self.slots.fill(CandidatePair::SENTINEL);
        self.counts.fill(0);
    }

    /// Per-object writers, in object order
    pub(crate) fn lanes_mut(&mut self) -> (&mut [CandidatePair], &mut [u32], usize) {
        (&mut self.slots, &mut self.counts, self.max_candidates)
    }
}

/// Writer over the slots of a single object
pub struct SlabLane<'a> {
    slots: &'a mut [CandidatePair],
    count: &'a mut u32,
}

impl<'a> SlabLane<'a> {
    pub fn new(slots: &'a mut [CandidatePair], count: &'a mut u32) -> Self {
        Self { slots, count }
    }
}

impl CandidateSink for SlabLane<'_> {
    #[inline]
    fn emit(&mut self, pair: CandidatePair) -> bool {
        match self.slots.get_mut(*self.count as usize) {
            Some(slot) => {
                *slot = pair;
                *self.count += 1;
                true
            }
            None => false,
        }
    }
}

/// Global candidate list with an atomic length counter
///
/// `fetch_add` on the length reserves a write slot; reservations past the
/// capacity are refused. Order across lanes is unspecified.
#[derive(Debug)]
pub struct SharedCandidateList {
    slots: Vec<AtomicU64>,
    reserved: AtomicUsize,
}

impl SharedCandidateList {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity)
                .map(|_| AtomicU64::new(CandidatePair::SENTINEL.pack()))
                .collect(),
            reserved: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of stored pairs (never more than the capacity)
    pub fn len(&self) -> usize {
        self.reserved.load(Ordering::Acquire).min(self.slots.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reserve a slot and store `pair`; `false` when the list is full
    #[inline]
    pub fn try_push(&self, pair: CandidatePair) -> bool {
        let index = self.reserved.fetch_add(1, Ordering::AcqRel);
        match self.slots.get(index) {
            Some(slot) => {
                slot.store(pair.pack(), Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Stored pairs, in reservation order
    pub fn pairs(&self) -> Vec<CandidatePair> {
        self.slots[..self.len()]
            .iter()
            .map(|slot| CandidatePair::unpack(slot.load(Ordering::Acquire)))
            .collect()
    }

    pub fn reset(&mut self) {
        *self.reserved.get_mut() = 0;
        for slot in &mut self.slots {
            *slot.get_mut() = CandidatePair::SENTINEL.pack();
        }
    }
}

impl CandidateSink for &SharedCandidateList {
    #[inline]
    fn emit(&mut self, pair: CandidatePair) -> bool {
        self.try_push(pair)
    }
}

/// Remove duplicates reported by the two queries of the same pair
pub fn dedup_pairs(mut pairs: Vec<CandidatePair>) -> Vec<CandidatePair> {
    pairs.sort_unstable();
    pairs.dedup();
    pairs
}
