//! Hypothesis stacks: one per number of covered source words.
//!
//! A stack owns the bitmap containers for its coverage count, the
//! recombination index across them, and the stack-wide pruning state
//! (best total, hypothesis count). Containers are keyed in a `BTreeMap`
//! so processing order is deterministic and input-independent.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug_span;

use crate::config::DecoderConfig;
use crate::coverage::Coverage;
use crate::error::DecodeError;

use super::container::BitmapContainer;
use super::hypothesis::{Expander, HypId, HypothesisArena};

/// What `add_prune` did with a hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Inserted as a new survivor.
    Admitted,
    /// Won a recombination against an existing hypothesis.
    Replaced,
    /// Lost a recombination; attached as an arc of the winner.
    Recombined,
    /// Below the beam threshold.
    Rejected,
}

/// Hypotheses extending identically score identically from here on; the
/// key captures everything future extensions can observe.
#[derive(PartialEq, Eq, Hash)]
struct RecombKey {
    coverage: Coverage,
    last_end: i32,
    state: Box<[u8]>,
}

fn recomb_key(arena: &HypothesisArena, id: HypId) -> RecombKey {
    let hyp = arena.get(id);
    RecombKey {
        coverage: hyp.coverage.clone(),
        last_end: hyp.last_end,
        state: hyp.state.clone(),
    }
}

fn tally(admission: Admission, stats: &mut StackStats) {
    match admission {
        Admission::Admitted | Admission::Replaced => stats.admitted += 1,
        Admission::Recombined => stats.recombined += 1,
        Admission::Rejected => stats.rejected += 1,
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StackStats {
    pub popped: usize,
    pub admitted: usize,
    pub recombined: usize,
    pub rejected: usize,
}

#[derive(Default)]
pub struct HypothesisStack {
    containers: Vec<BitmapContainer>,
    by_coverage: BTreeMap<Coverage, usize>,
    recomb: HashMap<RecombKey, HypId>,
    best_total: f32,
    hyp_count: usize,
}

impl HypothesisStack {
    pub fn new() -> Self {
        Self {
            containers: Vec::new(),
            by_coverage: BTreeMap::new(),
            recomb: HashMap::new(),
            best_total: f32::NEG_INFINITY,
            hyp_count: 0,
        }
    }

    /// Index of the container for `coverage`, creating it when absent.
    pub fn container_index(&mut self, coverage: &Coverage) -> usize {
        if let Some(&index) = self.by_coverage.get(coverage) {
            return index;
        }
        let index = self.containers.len();
        self.containers.push(BitmapContainer::new(coverage.clone()));
        self.by_coverage.insert(coverage.clone(), index);
        index
    }

    pub fn container(&self, index: usize) -> &BitmapContainer {
        &self.containers[index]
    }

    pub fn container_mut(&mut self, index: usize) -> &mut BitmapContainer {
        &mut self.containers[index]
    }

    /// Containers in deterministic processing order.
    pub fn ordered_containers(&self) -> impl Iterator<Item = &BitmapContainer> {
        self.by_coverage.values().map(|&index| &self.containers[index])
    }

    /// Current best total, if any hypothesis has been admitted.
    pub fn threshold(&self) -> Option<f32> {
        self.best_total.is_finite().then_some(self.best_total)
    }

    pub fn len(&self) -> usize {
        self.hyp_count
    }

    pub fn is_empty(&self) -> bool {
        self.hyp_count == 0
    }

    /// Best hypothesis across all containers.
    pub fn best_hypothesis(&self, arena: &HypothesisArena) -> Option<HypId> {
        self.ordered_containers()
            .filter_map(|container| container.best())
            .max_by(|&a, &b| {
                arena
                    .get(a)
                    .total
                    .total_cmp(&arena.get(b).total)
                    .then_with(|| b.cmp(&a))
            })
    }

    /// All surviving hypotheses, total score descending (ties by id).
    pub fn sorted_hypotheses(&self, arena: &HypothesisArena) -> Vec<HypId> {
        let mut all: Vec<HypId> = self
            .ordered_containers()
            .flat_map(|container| container.hypotheses().iter().copied())
            .collect();
        all.sort_by(|&a, &b| {
            arena
                .get(b)
                .total
                .total_cmp(&arena.get(a).total)
                .then_with(|| a.cmp(&b))
        });
        all
    }

    /// Admit a hypothesis: recombine against an equal-key survivor, apply
    /// the beam threshold, and histogram-prune when the stack overflows
    /// its slack.
    pub fn add_prune(
        &mut self,
        arena: &mut HypothesisArena,
        id: HypId,
        config: &DecoderConfig,
    ) -> Admission {
        let total = arena.get(id).total;
        if total < self.best_total - config.beam_width {
            return Admission::Rejected;
        }

        let key = recomb_key(arena, id);
        if let Some(&existing) = self.recomb.get(&key) {
            debug_assert_eq!(
                arena.get(existing).state.len(),
                arena.get(id).state.len(),
                "recombination key matched hypotheses with different state layouts"
            );
            let existing_total = arena.get(existing).total;
            if total > existing_total {
                // The newcomer wins: it inherits the loser's arc list and
                // takes its place in the container.
                let mut arcs = std::mem::take(&mut arena.get_mut(existing).arcs);
                arcs.push(existing);
                arena.get_mut(id).arcs = arcs;
                self.recomb.insert(key, id);
                let index = self.by_coverage[&arena.get(id).coverage];
                self.containers[index].remove(existing);
                self.containers[index].insert_ranked(arena, id);
                if total > self.best_total {
                    self.best_total = total;
                }
                Admission::Replaced
            } else {
                // Ties keep the earlier survivor.
                arena.get_mut(existing).arcs.push(id);
                Admission::Recombined
            }
        } else {
            self.recomb.insert(key, id);
            let coverage = arena.get(id).coverage.clone();
            let index = self.container_index(&coverage);
            self.containers[index].insert_ranked(arena, id);
            self.hyp_count += 1;
            if total > self.best_total {
                self.best_total = total;
            }
            if self.hyp_count > config.max_stack_size * 2 {
                self.prune_to_size(arena, config.max_stack_size, config.stack_diversity);
            }
            Admission::Admitted
        }
    }

    /// Run cube pruning for one container: repeatedly pop the best cell
    /// across its edges, admit the hypothesis, and push grid successors.
    /// Stops at the pop limit, when every edge is drained, or when no top
    /// clears the beam threshold. A diversity floor then forces extra
    /// pops from under-explored edges.
    pub fn find_k_best(
        &mut self,
        container_index: usize,
        arena: &mut HypothesisArena,
        exp: &Expander<'_>,
        stats: &mut StackStats,
    ) -> Result<(), DecodeError> {
        // The edges come out of the container while we pop so admissions
        // can mutate the rest of the stack.
        let mut edges = std::mem::take(&mut self.containers[container_index].edges);
        if edges.is_empty() {
            return Ok(());
        }

        let mut pops = 0;
        while pops < exp.config.cube_pruning_pop_limit {
            let mut best: Option<(usize, f32)> = None;
            for (index, edge) in edges.iter_mut().enumerate() {
                edge.ensure_initialized(exp, arena, self.threshold())?;
                if let Some(total) = edge.peek_total() {
                    // Strict comparison keeps the earliest edge on ties.
                    if best.map_or(true, |(_, best_total)| total > best_total) {
                        best = Some((index, total));
                    }
                }
            }
            let Some((edge_index, top)) = best else {
                break;
            };
            if top < self.best_total - exp.config.beam_width {
                break;
            }
            let position = edges[edge_index].pop().expect("peeked edge has a top");
            pops += 1;
            tally(self.add_prune(arena, position.hyp, exp.config), stats);
            edges[edge_index].push_successors(
                position.x,
                position.y,
                exp,
                arena,
                self.threshold(),
            )?;
        }

        if exp.config.cube_pruning_diversity > 0 {
            for edge in &mut edges {
                while edge.pops() < exp.config.cube_pruning_diversity {
                    edge.ensure_initialized(exp, arena, self.threshold())?;
                    let Some(position) = edge.pop() else {
                        break;
                    };
                    pops += 1;
                    tally(self.add_prune(arena, position.hyp, exp.config), stats);
                    edge.push_successors(position.x, position.y, exp, arena, self.threshold())?;
                }
            }
        }

        stats.popped += pops;
        self.containers[container_index].edges = edges;
        Ok(())
    }

    /// Materialize this stack: cube-prune every container in deterministic
    /// order, then apply the final beam and histogram prunes.
    pub fn process(
        &mut self,
        arena: &mut HypothesisArena,
        exp: &Expander<'_>,
    ) -> Result<StackStats, DecodeError> {
        let _span = debug_span!("process_stack", containers = self.containers.len()).entered();
        let mut stats = StackStats::default();
        let indices: Vec<usize> = self.by_coverage.values().copied().collect();
        for index in indices {
            self.find_k_best(index, arena, exp, &mut stats)?;
        }
        self.finalize(arena, exp.config);
        Ok(stats)
    }

    /// Final prune: enforce the beam width against the settled best, then
    /// the histogram bound with the per-coverage diversity floor.
    pub fn finalize(&mut self, arena: &HypothesisArena, config: &DecoderConfig) {
        if self.best_total.is_finite() {
            let cutoff = self.best_total - config.beam_width;
            let doomed: Vec<HypId> = self
                .containers
                .iter()
                .flat_map(|c| c.hypotheses().iter().copied())
                .filter(|&h| arena.get(h).total < cutoff)
                .collect();
            for id in doomed {
                self.evict(arena, id);
            }
        }
        self.prune_to_size(arena, config.max_stack_size, config.stack_diversity);
    }

    /// Histogram prune to `target` survivors. With a diversity floor, the
    /// top `diversity` hypotheses of every container are protected first;
    /// global pruning fills the remainder best-first.
    pub fn prune_to_size(&mut self, arena: &HypothesisArena, target: usize, diversity: usize) {
        if self.hyp_count <= target {
            return;
        }
        let mut keep: HashSet<HypId> = HashSet::new();
        if diversity > 0 {
            for container in &self.containers {
                keep.extend(container.hypotheses().iter().take(diversity).copied());
            }
        }
        let mut ranked: Vec<HypId> = self
            .containers
            .iter()
            .flat_map(|c| c.hypotheses().iter().copied())
            .collect();
        ranked.sort_by(|&a, &b| {
            arena
                .get(b)
                .total
                .total_cmp(&arena.get(a).total)
                .then_with(|| a.cmp(&b))
        });
        for id in ranked.iter().copied() {
            if keep.len() >= target {
                break;
            }
            keep.insert(id);
        }
        let doomed: Vec<HypId> = ranked.into_iter().filter(|id| !keep.contains(id)).collect();
        for id in doomed {
            self.evict(arena, id);
        }
    }

    fn evict(&mut self, arena: &HypothesisArena, id: HypId) {
        let coverage = &arena.get(id).coverage;
        let index = self.by_coverage[coverage];
        if self.containers[index].remove(id) {
            self.hyp_count -= 1;
            let key = recomb_key(arena, id);
            if self.recomb.get(&key) == Some(&id) {
                self.recomb.remove(&key);
            }
        }
    }
}
