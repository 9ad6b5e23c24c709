//! Bitmap containers: hypotheses grouped by identical coverage.
//!
//! The admitted set stays ordered by total score (highest first, ties by
//! arena id, i.e. creation order) so backwards edges can snapshot their
//! best-first prefix without sorting. The cube-pruning driver that pops
//! across a container's edges lives on the stack
//! ([`super::stack::HypothesisStack::find_k_best`]) because admissions
//! mutate stack-wide state.

use crate::coverage::Coverage;

use super::edge::BackwardsEdge;
use super::hypothesis::{HypId, HypothesisArena};

pub struct BitmapContainer {
    pub coverage: Coverage,
    hyps: Vec<HypId>,
    pub(super) edges: Vec<BackwardsEdge>,
}

impl BitmapContainer {
    pub fn new(coverage: Coverage) -> Self {
        Self {
            coverage,
            hyps: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Admitted hypotheses, total score descending.
    pub fn hypotheses(&self) -> &[HypId] {
        &self.hyps
    }

    pub fn best(&self) -> Option<HypId> {
        self.hyps.first().copied()
    }

    /// Register an edge feeding this container.
    pub fn add_backwards_edge(&mut self, edge: BackwardsEdge) {
        self.edges.push(edge);
    }

    pub(super) fn insert_ranked(&mut self, arena: &HypothesisArena, id: HypId) {
        debug_assert_eq!(arena.get(id).coverage, self.coverage);
        let total = arena.get(id).total;
        let at = self.hyps.partition_point(|&other| {
            match arena.get(other).total.total_cmp(&total) {
                std::cmp::Ordering::Greater => true,
                std::cmp::Ordering::Equal => other < id,
                std::cmp::Ordering::Less => false,
            }
        });
        self.hyps.insert(at, id);
    }

    pub(super) fn remove(&mut self, id: HypId) -> bool {
        match self.hyps.iter().position(|&h| h == id) {
            Some(at) => {
                self.hyps.remove(at);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.hyps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hyps.is_empty()
    }
}
