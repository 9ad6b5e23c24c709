//! Backwards edges: the cube-pruning priority queues.
//!
//! One edge connects a predecessor bitmap container to a destination
//! container through one translation-option list. It lazily enumerates the
//! grid of (predecessor rank × option rank) combinations best-first,
//! materializing a hypothesis only when its cell is enqueued. Both axes
//! are pre-sorted by score, so the queue's top is the argmax over
//! unexpanded cells as long as no contextual feature perturbs the
//! ordering; the outer pop limit bounds the damage when one does.
//!
//! An edge moves through three states: unseeded (constructed), initialized
//! (corner cell expanded on first use), and drained (queue empty).

use std::collections::{BinaryHeap, VecDeque};

use crate::error::DecodeError;
use crate::options::OptId;

use super::hypothesis::{Expander, HypId, HypothesisArena};

/// One expanded cell of the grid: the materialized hypothesis plus its
/// coordinates (`x` = predecessor rank, `y` = option rank).
#[derive(Debug, Clone, Copy)]
pub struct SquarePosition {
    pub hyp: HypId,
    pub x: usize,
    pub y: usize,
}

struct QueueEntry {
    total: f32,
    /// Insertion sequence; breaks score ties deterministically.
    seq: u64,
    position: SquarePosition,
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
        // Max-heap: highest total first; earlier insertion wins ties.
        self.total
            .total_cmp(&other.total)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

pub struct BackwardsEdge {
    /// Up to K best predecessor hypotheses, best first.
    preds: Vec<HypId>,
    /// Up to K best translation options for this extension, best first.
    options: Vec<OptId>,
    queue: BinaryHeap<QueueEntry>,
    /// One flag per grid cell; set exactly once, whether or not the cell
    /// produced a hypothesis.
    seen: Vec<bool>,
    initialized: bool,
    next_seq: u64,
    pops: usize,
}

impl BackwardsEdge {
    /// Snapshot the best-first prefixes of both axes. Either axis may be
    /// shorter than `k`; the grid is sized by what was actually copied.
    pub fn new(pred_hyps: &[HypId], option_ids: &[OptId], k: usize) -> Self {
        let preds: Vec<HypId> = pred_hyps.iter().copied().take(k).collect();
        let options: Vec<OptId> = option_ids.iter().copied().take(k).collect();
        let seen = vec![false; preds.len() * options.len()];
        Self {
            preds,
            options,
            queue: BinaryHeap::new(),
            seen,
            initialized: false,
            next_seq: 0,
            pops: 0,
        }
    }

    fn cell(&self, x: usize, y: usize) -> usize {
        x * self.options.len() + y
    }

    /// Expand one cell: mark it seen, build its hypothesis, and enqueue
    /// when the extension applies. Returns whether a hypothesis was
    /// enqueued.
    fn expand_cell(
        &mut self,
        x: usize,
        y: usize,
        exp: &Expander<'_>,
        arena: &mut HypothesisArena,
        stack_best: Option<f32>,
    ) -> Result<bool, DecodeError> {
        let cell = self.cell(x, y);
        debug_assert!(!self.seen[cell]);
        self.seen[cell] = true;
        match exp.extend(arena, self.preds[x], self.options[y], stack_best)? {
            Some(hyp) => {
                let total = arena.get(hyp).total;
                self.queue.push(QueueEntry {
                    total,
                    seq: self.next_seq,
                    position: SquarePosition { hyp, x, y },
                });
                self.next_seq += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Expand the corner cell on first use. When the corner's extension
    /// does not apply, walk its successor frontier until one cell
    /// enqueues — otherwise a single inapplicable corner would silently
    /// drain the whole edge.
    pub fn ensure_initialized(
        &mut self,
        exp: &Expander<'_>,
        arena: &mut HypothesisArena,
        stack_best: Option<f32>,
    ) -> Result<(), DecodeError> {
        if self.initialized {
            return Ok(());
        }
        self.initialized = true;
        if self.preds.is_empty() || self.options.is_empty() {
            return Ok(());
        }
        let mut frontier = VecDeque::from([(0usize, 0usize)]);
        while let Some((x, y)) = frontier.pop_front() {
            if self.seen[self.cell(x, y)] {
                continue;
            }
            if self.expand_cell(x, y, exp, arena, stack_best)? {
                break;
            }
            if x + 1 < self.preds.len() {
                frontier.push_back((x + 1, y));
            }
            if y + 1 < self.options.len() {
                frontier.push_back((x, y + 1));
            }
        }
        Ok(())
    }

    /// Total score of the queue's top, without removing it.
    pub fn peek_total(&self) -> Option<f32> {
        self.queue.peek().map(|entry| entry.total)
    }

    /// Remove and return the best unexpanded cell.
    pub fn pop(&mut self) -> Option<SquarePosition> {
        self.queue.pop().map(|entry| {
            self.pops += 1;
            entry.position
        })
    }

    /// Enqueue the unseen in-bounds neighbours `(x+1, y)` and `(x, y+1)`.
    /// A neighbour whose extension fails is marked seen and dropped.
    pub fn push_successors(
        &mut self,
        x: usize,
        y: usize,
        exp: &Expander<'_>,
        arena: &mut HypothesisArena,
        stack_best: Option<f32>,
    ) -> Result<(), DecodeError> {
        if x + 1 < self.preds.len() && !self.seen[self.cell(x + 1, y)] {
            self.expand_cell(x + 1, y, exp, arena, stack_best)?;
        }
        if y + 1 < self.options.len() && !self.seen[self.cell(x, y + 1)] {
            self.expand_cell(x, y + 1, exp, arena, stack_best)?;
        }
        Ok(())
    }

    /// Pops taken from this edge so far (feeds the diversity floor).
    pub fn pops(&self) -> usize {
        self.pops
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DecoderConfig;
    use crate::input::Sentence;
    use crate::model::FeatureRegistry;
    use crate::options::{OptionCollection, TranslationOption};
    use crate::search::future_cost::FutureCostTable;
    use crate::span::Span;

    struct Fixture {
        sentence: Sentence,
        options: OptionCollection,
        registry: FeatureRegistry,
        future: FutureCostTable,
        config: DecoderConfig,
    }

    impl Fixture {
        /// One uncovered position with the given option pre-scores.
        fn single_position(scores: &[f32], config: DecoderConfig) -> Self {
            let sentence = Sentence::from_words(["w"]);
            let mut options = OptionCollection::empty(1);
            for &score in scores {
                options.add(TranslationOption::new(
                    Span::new(0, 0),
                    vec![format!("t{score}")],
                    vec![score],
                    score,
                ));
            }
            let future = FutureCostTable::build(&options, 1, 0.0);
            Self {
                sentence,
                options,
                registry: FeatureRegistry::new(),
                future,
                config,
            }
        }

        fn expander(&self) -> Expander<'_> {
            Expander {
                sentence: &self.sentence,
                options: &self.options,
                registry: &self.registry,
                future: &self.future,
                config: &self.config,
            }
        }
    }

    #[test]
    fn test_pops_monotone_non_increasing() {
        let fx = Fixture::single_position(&[-1.0, -2.0, -5.0], DecoderConfig::default());
        let exp = fx.expander();
        let mut arena = HypothesisArena::new();
        let seed = arena.seed(1, &fx.registry, &fx.future);

        let option_ids: Vec<_> = fx.options.for_span(Span::new(0, 0)).to_vec();
        let mut edge = BackwardsEdge::new(&[seed], &option_ids, 10);
        edge.ensure_initialized(&exp, &mut arena, None).unwrap();

        let mut totals = Vec::new();
        while let Some(position) = edge.pop() {
            totals.push(arena.get(position.hyp).total);
            edge.push_successors(position.x, position.y, &exp, &mut arena, None)
                .unwrap();
        }
        assert_eq!(totals.len(), 3);
        for pair in totals.windows(2) {
            assert!(pair[0] >= pair[1], "pop order not monotone: {totals:?}");
        }
    }

    #[test]
    fn test_each_cell_expanded_at_most_once() {
        let fx = Fixture::single_position(&[-1.0, -2.0], DecoderConfig::default());
        let exp = fx.expander();
        let mut arena = HypothesisArena::new();
        let seed = arena.seed(1, &fx.registry, &fx.future);

        let option_ids: Vec<_> = fx.options.for_span(Span::new(0, 0)).to_vec();
        let mut edge = BackwardsEdge::new(&[seed], &option_ids, 10);
        edge.ensure_initialized(&exp, &mut arena, None).unwrap();

        let mut seen_cells = std::collections::HashSet::new();
        while let Some(position) = edge.pop() {
            assert!(seen_cells.insert((position.x, position.y)));
            edge.push_successors(position.x, position.y, &exp, &mut arena, None)
                .unwrap();
        }
        // 1 predecessor × 2 options
        assert_eq!(seen_cells.len(), 2);
    }

    #[test]
    fn test_snapshot_clamps_to_available() {
        let fx = Fixture::single_position(&[-1.0], DecoderConfig::default());
        let mut arena = HypothesisArena::new();
        let seed = arena.seed(1, &fx.registry, &fx.future);

        // K far larger than either axis
        let option_ids: Vec<_> = fx.options.for_span(Span::new(0, 0)).to_vec();
        let edge = BackwardsEdge::new(&[seed], &option_ids, 50);
        assert_eq!(edge.preds.len(), 1);
        assert_eq!(edge.options.len(), 1);
        assert_eq!(edge.seen.len(), 1);
    }

    #[test]
    fn test_failed_corner_does_not_kill_edge() {
        // Distortion limit 0: from last_end=0, jumping to position 2 fails
        // but position 1 (option ranked second) succeeds.
        let sentence = Sentence::from_words(["a", "b", "c"]);
        let mut options = OptionCollection::empty(3);
        let jump = options.add(TranslationOption::new(
            Span::new(2, 2),
            vec!["C".into()],
            vec![],
            -0.5,
        ));
        let monotone = options.add(TranslationOption::new(
            Span::new(1, 1),
            vec!["B".into()],
            vec![],
            -1.0,
        ));
        let start = options.add(TranslationOption::new(
            Span::new(0, 0),
            vec!["A".into()],
            vec![],
            -1.0,
        ));
        let registry = FeatureRegistry::new();
        let config = DecoderConfig {
            distortion_limit: 0,
            ..Default::default()
        };
        let future = FutureCostTable::build(&options, 3, 0.0);
        let exp = Expander {
            sentence: &sentence,
            options: &options,
            registry: &registry,
            future: &future,
            config: &config,
        };
        let mut arena = HypothesisArena::new();
        let seed = arena.seed(3, &registry, &future);
        let covered_a = exp.extend(&mut arena, seed, start, None).unwrap().unwrap();

        // Option axis ordered best-first: the jump (better pre-score) is
        // the corner and fails; initialization must fall through to the
        // monotone option.
        let mut edge = BackwardsEdge::new(&[covered_a], &[jump, monotone], 10);
        edge.ensure_initialized(&exp, &mut arena, None).unwrap();
        let position = edge.pop().expect("edge must survive a failed corner");
        assert_eq!((position.x, position.y), (0, 1));
        assert_eq!(arena.get(position.hyp).last_end, 1);
    }

    #[test]
    fn test_tie_break_by_insertion_sequence() {
        let fx = Fixture::single_position(&[-1.0, -1.0, -1.0], DecoderConfig::default());
        let exp = fx.expander();
        let mut arena = HypothesisArena::new();
        let seed = arena.seed(1, &fx.registry, &fx.future);

        let option_ids: Vec<_> = fx.options.for_span(Span::new(0, 0)).to_vec();
        let mut edge = BackwardsEdge::new(&[seed], &option_ids, 10);
        edge.ensure_initialized(&exp, &mut arena, None).unwrap();

        let mut order = Vec::new();
        while let Some(position) = edge.pop() {
            order.push(position.y);
            edge.push_successors(position.x, position.y, &exp, &mut arena, None)
                .unwrap();
        }
        // Equal totals resolve in enqueue order: the corner first, then
        // its successors left to right.
        assert_eq!(order, vec![0, 1, 2]);
    }
}
