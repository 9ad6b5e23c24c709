//! The cube-pruning beam search.
//!
//! One [`Decoder`] serves many sentences; all search state (arena, stacks,
//! option collection, future-cost table) is built per call, so independent
//! sentences may be decoded concurrently as long as the shared models are
//! read-only. Stacks are processed in strict coverage-count order: a stack
//! is materialized from the backwards edges earlier stacks registered on
//! it, pruned, and then used to register edges further downstream.

mod container;
mod edge;
mod future_cost;
mod hypothesis;
mod nbest;
mod stack;

#[cfg(test)]
mod tests;

pub use container::BitmapContainer;
pub use edge::{BackwardsEdge, SquarePosition};
pub use future_cost::FutureCostTable;
pub use hypothesis::{Expander, HypId, Hypothesis, HypothesisArena};
pub use stack::{Admission, HypothesisStack, StackStats};

use std::time::{Duration, Instant};

use tracing::{debug, debug_span};

use crate::config::{ConfigError, DecoderConfig};
use crate::coverage::Coverage;
use crate::error::DecodeError;
use crate::input::Sentence;
use crate::model::{FeatureRegistry, PhraseTable, Weights};
use crate::options::OptionCollection;
use crate::span::Span;

/// One emitted phrase of a translation: the source span it covers and the
/// target words it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedSegment {
    pub span: Span,
    pub words: Vec<String>,
}

/// One complete (or best-effort partial) translation.
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    /// Segments in emission order.
    pub segments: Vec<TranslatedSegment>,
    pub score: f32,
}

impl Translation {
    /// Space-joined target surface.
    pub fn surface(&self) -> String {
        self.segments
            .iter()
            .flat_map(|segment| segment.words.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct DecodeResult {
    /// Highest-scoring translation, if any hypothesis survived.
    pub best: Option<Translation>,
    /// Up to `nbest_size` translations, best first; `nbest[0] == best`.
    pub nbest: Vec<Translation>,
    /// Whether the result covers the whole sentence.
    pub complete: bool,
    /// Whether the time budget aborted the search between stacks.
    pub aborted: bool,
}

/// The decoder: phrase table, feature registry, and weights are shared
/// read-only across sentences; configuration is fixed at construction.
pub struct Decoder<'a> {
    table: &'a dyn PhraseTable,
    registry: &'a FeatureRegistry,
    weights: &'a Weights,
    config: DecoderConfig,
}

impl<'a> Decoder<'a> {
    pub fn new(
        table: &'a dyn PhraseTable,
        registry: &'a FeatureRegistry,
        weights: &'a Weights,
        config: DecoderConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            table,
            registry,
            weights,
            config,
        })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Translate one sentence.
    pub fn decode(&self, sentence: &Sentence) -> Result<DecodeResult, DecodeError> {
        let n = sentence.len();
        let _span = debug_span!("decode", len = n).entered();

        let options = OptionCollection::collect(sentence, self.table, self.weights, &self.config);
        let edc_weight = if self.config.use_early_distortion_cost {
            self.registry.weight_of("distortion").unwrap_or(1.0)
        } else {
            0.0
        };
        let future = FutureCostTable::build(&options, n, edc_weight);
        let exp = Expander {
            sentence,
            options: &options,
            registry: self.registry,
            future: &future,
            config: &self.config,
        };

        let mut arena = HypothesisArena::new();
        let mut stacks: Vec<HypothesisStack> = (0..=n).map(|_| HypothesisStack::new()).collect();
        let seed = arena.seed(n, self.registry, &future);
        stacks[0].add_prune(&mut arena, seed, &self.config);

        let deadline = self
            .config
            .time_budget_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms));
        let mut aborted = false;
        let mut last_completed = 0;
        for index in 0..=n {
            if index > 0 {
                if let Some(deadline) = deadline {
                    if Instant::now() >= deadline {
                        aborted = true;
                        break;
                    }
                }
            }
            let stats = stacks[index].process(&mut arena, &exp)?;
            debug!(
                stack = index,
                survivors = stacks[index].len(),
                popped = stats.popped,
                admitted = stats.admitted,
                recombined = stats.recombined,
                rejected = stats.rejected,
                "stack processed"
            );
            last_completed = index;
            if index < n {
                self.create_forward_edges(&mut stacks, index, &exp);
            }
        }

        Ok(self.assemble(sentence, &options, &arena, &stacks, last_completed, aborted))
    }

    /// Register backwards edges from every container of stack `index`
    /// onto the containers its hypotheses can expand into.
    fn create_forward_edges(
        &self,
        stacks: &mut [HypothesisStack],
        index: usize,
        exp: &Expander<'_>,
    ) {
        let (head, tail) = stacks.split_at_mut(index + 1);
        let source = &head[index];
        let k = self.config.max_stack_size;

        for container in source.ordered_containers() {
            if container.is_empty() {
                continue;
            }
            let coverage = &container.coverage;
            let Some(first_gap) = coverage.first_gap() else {
                continue;
            };
            for gap in coverage.gaps() {
                for start in gap.start..=gap.end {
                    let max_end = gap.end.min(start + self.config.max_phrase_length - 1);
                    for end in start..=max_end {
                        let span = Span::new(start, end);
                        let option_ids = exp.options.for_span(span);
                        if option_ids.is_empty() {
                            continue;
                        }
                        if !self.reachable(first_gap, span) {
                            continue;
                        }
                        if self.config.monotone_at_punctuation
                            && jumps_punctuation(exp.sentence, coverage, first_gap, span)
                        {
                            continue;
                        }
                        let next_coverage = coverage.with_span(span);
                        let depth = next_coverage.covered_count();
                        let destination = &mut tail[depth - (index + 1)];
                        let container_index = destination.container_index(&next_coverage);
                        destination
                            .container_mut(container_index)
                            .add_backwards_edge(BackwardsEdge::new(
                                container.hypotheses(),
                                option_ids,
                                k,
                            ));
                    }
                }
            }
        }
    }

    /// Reordering window: a span is expandable when it continues
    /// monotonically from the first gap, or ends close enough that the
    /// search can still jump back within the distortion limit.
    fn reachable(&self, first_gap: usize, span: Span) -> bool {
        if self.config.distortion_limit < 0 || span.start == first_gap {
            return true;
        }
        span.end <= first_gap + self.config.distortion_limit as usize
    }

    fn assemble(
        &self,
        sentence: &Sentence,
        options: &OptionCollection,
        arena: &HypothesisArena,
        stacks: &[HypothesisStack],
        last_completed: usize,
        aborted: bool,
    ) -> DecodeResult {
        let n = sentence.len();
        let final_index = (0..=last_completed)
            .rev()
            .find(|&index| !stacks[index].is_empty());
        let Some(final_index) = final_index else {
            return DecodeResult {
                best: None,
                nbest: Vec::new(),
                complete: false,
                aborted,
            };
        };
        let complete = final_index == n;
        let finals = stacks[final_index].sorted_hypotheses(arena);

        let k = self.config.nbest_size.max(1);
        let paths = nbest::extract(arena, &finals, k, self.config.distinct_nbest, |path| {
            path.nodes
                .iter()
                .rev()
                .flat_map(|&id| arena.get(id).applied.iter())
                .flat_map(|&opt| options.get(opt).target.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(" ")
        });

        let nbest: Vec<Translation> = paths
            .iter()
            .map(|path| {
                let segments = path
                    .nodes
                    .iter()
                    .rev()
                    .flat_map(|&id| arena.get(id).applied.iter())
                    .map(|&opt| {
                        let option = options.get(opt);
                        TranslatedSegment {
                            span: option.span,
                            words: option.target.clone(),
                        }
                    })
                    .collect();
                Translation {
                    segments,
                    score: path.total,
                }
            })
            .collect();

        DecodeResult {
            best: nbest.first().cloned(),
            nbest,
            complete,
            aborted,
        }
    }
}

/// Whether applying `span` would reorder across an uncovered punctuation
/// token between the first gap and the span's start.
fn jumps_punctuation(
    sentence: &Sentence,
    coverage: &Coverage,
    first_gap: usize,
    span: Span,
) -> bool {
    (first_gap..span.start)
        .any(|pos| !coverage.is_covered(pos) && sentence.token(pos).is_punctuation)
}
