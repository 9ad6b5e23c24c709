//! Hypotheses and their extension.
//!
//! Hypotheses live in a per-sentence arena and refer to each other by
//! index, matching their lifetime (the whole arena is dropped when the
//! sentence is done) and keeping predecessor links cheap. Extension
//! applies a translation option — plus its linked group, atomically —
//! checks the distortion limit, and scores the transition through the
//! feature registry.

use crate::config::DecoderConfig;
use crate::coverage::Coverage;
use crate::error::DecodeError;
use crate::input::Sentence;
use crate::model::{FeatureRegistry, Transition};
use crate::options::{OptId, OptionCollection};
use crate::span::{distortion_distance, Span};

use super::future_cost::FutureCostTable;

/// Arena index of a hypothesis. Also the deterministic tie-break key:
/// ids increase in creation order.
pub type HypId = usize;

#[derive(Debug)]
pub struct Hypothesis {
    /// Predecessor in the arena; `None` for the seed.
    pub prev: Option<HypId>,
    /// Options applied by this extension, in application order (the
    /// primary option followed by its linked group). Empty for the seed.
    pub applied: Vec<OptId>,
    pub coverage: Coverage,
    /// Span of the last applied option.
    pub last_span: Option<Span>,
    /// End position of the last applied option; −1 for the seed.
    pub last_end: i32,
    /// Accumulated weighted score of everything applied so far.
    pub accumulated: f32,
    /// Admissible estimate for the uncovered remainder.
    pub future: f32,
    /// `accumulated + future`; the ranking key everywhere.
    pub total: f32,
    /// Packed per-feature state bytes (layout owned by the registry).
    pub state: Box<[u8]>,
    /// Recombined losers, kept for n-best recovery.
    pub arcs: Vec<HypId>,
}

/// Per-sentence hypothesis storage.
#[derive(Default)]
pub struct HypothesisArena {
    hyps: Vec<Hypothesis>,
}

impl HypothesisArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the empty seed hypothesis covering nothing.
    pub fn seed(
        &mut self,
        sentence_len: usize,
        registry: &FeatureRegistry,
        future: &FutureCostTable,
    ) -> HypId {
        let coverage = Coverage::new(sentence_len);
        let estimate = future.score(&coverage, -1);
        self.push(Hypothesis {
            prev: None,
            applied: Vec::new(),
            coverage,
            last_span: None,
            last_end: -1,
            accumulated: 0.0,
            future: estimate,
            total: estimate,
            state: registry.seed_state(),
            arcs: Vec::new(),
        })
    }

    pub fn push(&mut self, hyp: Hypothesis) -> HypId {
        self.hyps.push(hyp);
        self.hyps.len() - 1
    }

    pub fn get(&self, id: HypId) -> &Hypothesis {
        &self.hyps[id]
    }

    pub fn get_mut(&mut self, id: HypId) -> &mut Hypothesis {
        &mut self.hyps[id]
    }

    pub fn len(&self) -> usize {
        self.hyps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hyps.is_empty()
    }
}

/// Read-only context shared by every extension within one sentence.
pub struct Expander<'a> {
    pub sentence: &'a Sentence,
    pub options: &'a OptionCollection,
    pub registry: &'a FeatureRegistry,
    pub future: &'a FutureCostTable,
    pub config: &'a DecoderConfig,
}

impl Expander<'_> {
    /// Extend `prev_id` with `opt_id` (and its linked group, atomically).
    ///
    /// Returns `Ok(None)` when the extension does not apply: the jump
    /// violates the distortion limit, a linked option overlaps coverage
    /// accumulated along the chain, or the cheap partial estimate falls
    /// below the early-discarding threshold relative to `stack_best`.
    /// Overlap of the primary option itself is a programming error.
    pub fn extend(
        &self,
        arena: &mut HypothesisArena,
        prev_id: HypId,
        opt_id: OptId,
        stack_best: Option<f32>,
    ) -> Result<Option<HypId>, DecodeError> {
        let (prev_coverage, prev_state, prev_accumulated, prev_last_end) = {
            let prev = arena.get(prev_id);
            (
                prev.coverage.clone(),
                prev.state.clone(),
                prev.accumulated,
                prev.last_end,
            )
        };
        let primary = self.options.get(opt_id);

        if self.config.distortion_limit >= 0
            && distortion_distance(prev_last_end, primary.span.start)
                > self.config.distortion_limit as usize
        {
            return Ok(None);
        }

        // Apply the whole atomic group on a running coverage. A linked
        // option overlapping what the chain already covered rejects the
        // entire extension.
        let mut chain = Vec::with_capacity(1 + primary.linked.len());
        chain.push(opt_id);
        let mut coverage = prev_coverage.with_span(primary.span);
        for &linked_id in &primary.linked {
            let linked = self.options.get(linked_id);
            if coverage.overlaps(linked.span) {
                return Ok(None);
            }
            coverage.set_span(linked.span);
            chain.push(linked_id);
        }

        let chain_end = self.options.get(*chain.last().expect("chain is non-empty")).span.end;

        // Early discarding: the option pre-scores plus lookahead bound the
        // full score from above; if even that bound cannot reach the beam,
        // skip the feature pass entirely.
        if let Some(best) = stack_best {
            if self.config.early_discarding_threshold.is_finite() {
                let pre: f32 = chain
                    .iter()
                    .map(|&id| self.options.get(id).weighted_score)
                    .sum();
                let estimate =
                    prev_accumulated + pre + self.future.score(&coverage, chain_end as i32);
                if estimate < best - self.config.early_discarding_threshold {
                    return Ok(None);
                }
            }
        }

        let mut accumulated = prev_accumulated;
        let mut state = prev_state;
        let mut next_state = vec![0u8; self.registry.state_len()].into_boxed_slice();
        let mut prev_end = prev_last_end;
        let mut last_span = None;
        for &id in &chain {
            let option = self.options.get(id);
            accumulated += option.weighted_score;
            let transition = Transition {
                sentence: self.sentence,
                option,
                prev_end,
            };
            accumulated += self
                .registry
                .score_transition(&transition, &state, &mut next_state)?;
            std::mem::swap(&mut state, &mut next_state);
            prev_end = option.span.end as i32;
            last_span = Some(option.span);
        }
        if coverage.is_full() {
            accumulated += self.registry.score_final(&state);
        }

        let future = self.future.score(&coverage, prev_end);
        let total = accumulated + future;
        Ok(Some(arena.push(Hypothesis {
            prev: Some(prev_id),
            applied: chain,
            coverage,
            last_span,
            last_end: prev_end,
            accumulated,
            future,
            total,
            state,
            arcs: Vec::new(),
        })))
    }
}
