//! N-best extraction.
//!
//! The search keeps recombined losers as arcs on their winners. A path
//! through the hypothesis graph is the winner chain of some final
//! hypothesis with zero or more arc substitutions; enumerating paths
//! best-first with one new deviation per step yields the K best distinct
//! translations without materializing the whole graph.

use std::collections::{BinaryHeap, HashSet};

use super::hypothesis::{HypId, HypothesisArena};

/// One candidate path: hypothesis ids from the final hypothesis back
/// towards (but excluding) the seed.
pub(super) struct TrellisPath {
    pub nodes: Vec<HypId>,
    pub total: f32,
    /// Index into `nodes` from which this path may still deviate; earlier
    /// positions were fixed by the parent path's enumeration.
    deviate_from: usize,
}

impl TrellisPath {
    /// The pure winner chain ending at `last`.
    fn from_final(arena: &HypothesisArena, last: HypId) -> Self {
        Self {
            nodes: chain_of(arena, last),
            total: arena.get(last).total,
            deviate_from: 0,
        }
    }

    /// Substitute the arc `arc` for the node at `index`; the tail beyond
    /// `index` is rebuilt from the arc's own predecessor chain.
    fn deviate(&self, arena: &HypothesisArena, index: usize, arc: HypId) -> Self {
        let original = self.nodes[index];
        let mut nodes = self.nodes[..index].to_vec();
        nodes.extend(chain_of(arena, arc));
        Self {
            nodes,
            total: self.total + (arena.get(arc).total - arena.get(original).total),
            deviate_from: index + 1,
        }
    }
}

fn chain_of(arena: &HypothesisArena, last: HypId) -> Vec<HypId> {
    let mut nodes = Vec::new();
    let mut current = Some(last);
    while let Some(id) = current {
        let hyp = arena.get(id);
        if hyp.applied.is_empty() {
            break; // seed
        }
        nodes.push(id);
        current = hyp.prev;
    }
    nodes
}

struct QueueEntry {
    total: f32,
    seq: u64,
    path: TrellisPath,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.total
            .total_cmp(&other.total)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Enumerate up to `k` best paths from the given final hypotheses (sorted
/// or not), optionally keeping only the first path per surface key.
///
/// `surface_of` renders a path for deduplication; it sees nodes in
/// final-first order.
pub(super) fn extract<F>(
    arena: &HypothesisArena,
    finals: &[HypId],
    k: usize,
    distinct: bool,
    surface_of: F,
) -> Vec<TrellisPath>
where
    F: Fn(&TrellisPath) -> String,
{
    let mut queue = BinaryHeap::new();
    let mut seq = 0u64;
    for &id in finals {
        let path = TrellisPath::from_final(arena, id);
        queue.push(QueueEntry {
            total: path.total,
            seq,
            path,
        });
        seq += 1;
    }

    let mut results: Vec<TrellisPath> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    while results.len() < k {
        let Some(entry) = queue.pop() else {
            break;
        };
        // Enumerate children before the path is moved into the results.
        for index in entry.path.deviate_from..entry.path.nodes.len() {
            for &arc in &arena.get(entry.path.nodes[index]).arcs {
                let child = entry.path.deviate(arena, index, arc);
                queue.push(QueueEntry {
                    total: child.total,
                    seq,
                    path: child,
                });
                seq += 1;
            }
        }
        if !distinct || seen.insert(surface_of(&entry.path)) {
            results.push(entry.path);
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::Coverage;
    use crate::search::hypothesis::Hypothesis;
    use crate::span::Span;

    /// Build a tiny two-step graph by hand:
    /// seed → a (or arc a2) → b, where a2 recombined into a.
    fn graph() -> (HypothesisArena, HypId) {
        let mut arena = HypothesisArena::new();
        let seed = arena.push(hyp(None, &[], 0.0, 2, &[]));
        let a = arena.push(hyp(Some(seed), &[0], -1.0, 2, &[(0, 0)]));
        let a2 = arena.push(hyp(Some(seed), &[1], -1.5, 2, &[(0, 0)]));
        arena.get_mut(a).arcs.push(a2);
        let b = arena.push(hyp(Some(a), &[2], -2.0, 2, &[(0, 0), (1, 1)]));
        (arena, b)
    }

    fn hyp(
        prev: Option<HypId>,
        applied: &[usize],
        total: f32,
        n: usize,
        spans: &[(usize, usize)],
    ) -> Hypothesis {
        let mut coverage = Coverage::new(n);
        for &(s, e) in spans {
            coverage.set_span(Span::new(s, e));
        }
        Hypothesis {
            prev,
            applied: applied.to_vec(),
            coverage,
            last_span: None,
            last_end: -1,
            accumulated: total,
            future: 0.0,
            total,
            state: Box::default(),
            arcs: Vec::new(),
        }
    }

    #[test]
    fn test_best_path_first_then_deviation() {
        let (arena, b) = graph();
        let paths = extract(&arena, &[b], 5, false, |p| format!("{:?}", p.nodes));
        assert_eq!(paths.len(), 2);
        // Best path walks the winner chain b → a
        assert_eq!(paths[0].nodes, vec![b, 1]);
        assert_eq!(paths[0].total, -2.0);
        // The deviation substitutes the recombined arc a2
        assert_eq!(paths[1].nodes, vec![b, 2]);
        assert!((paths[1].total - (-2.5)).abs() < 1e-6);
    }

    #[test]
    fn test_k_limits_output() {
        let (arena, b) = graph();
        let paths = extract(&arena, &[b], 1, false, |p| format!("{:?}", p.nodes));
        assert_eq!(paths.len(), 1);
    }

    #[test]
    fn test_distinct_filter() {
        let (arena, b) = graph();
        // A surface function that cannot tell the two paths apart
        let paths = extract(&arena, &[b], 5, true, |_| "same".to_string());
        assert_eq!(paths.len(), 1);
    }
}
