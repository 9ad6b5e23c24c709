//! Translation options: the per-span candidate phrases search composes.
//!
//! Collected once per sentence, before search, from the phrase table.
//! Per-span lists are ranked by pre-score and truncated, so backwards
//! edges can snapshot their best-first prefix directly.

use tracing::{debug, debug_span};

use crate::config::DecoderConfig;
use crate::input::Sentence;
use crate::model::{PhraseTable, Weights};
use crate::span::Span;

/// Index of a translation option within its sentence's collection.
pub type OptId = usize;

/// Pre-score assigned to the synthesized copy-through option for a source
/// word with no phrase-table entry (log domain).
const UNKNOWN_WORD_SCORE: f32 = -10.0;

#[derive(Debug, Clone)]
pub struct TranslationOption {
    pub span: Span,
    pub target: Vec<String>,
    /// Raw phrase-table feature scores.
    pub scores: Vec<f32>,
    /// Dot product of `scores` with the phrase weights; the pre-score used
    /// for ranking options and seeding the future-cost table.
    pub weighted_score: f32,
    /// Other members of this option's atomic group. Applying this option
    /// forces the whole group; partial application is rejected.
    pub linked: Vec<OptId>,
}

impl TranslationOption {
    pub fn new(span: Span, target: Vec<String>, scores: Vec<f32>, weighted_score: f32) -> Self {
        Self {
            span,
            target,
            scores,
            weighted_score,
            linked: Vec::new(),
        }
    }
}

/// All translation options for one sentence, indexed by source span.
pub struct OptionCollection {
    len: usize,
    options: Vec<TranslationOption>,
    /// `by_span[start * len + end]` = option ids sorted by pre-score
    /// (descending, ties by insertion).
    by_span: Vec<Vec<OptId>>,
}

impl OptionCollection {
    /// Enumerate candidate phrases for every span up to
    /// `max_phrase_length`, rank by weighted pre-score, truncate to
    /// `max_trans_opt_per_coverage`, and synthesize copy-through options
    /// for source words nothing covers.
    pub fn collect(
        sentence: &Sentence,
        table: &dyn PhraseTable,
        weights: &Weights,
        config: &DecoderConfig,
    ) -> Self {
        let len = sentence.len();
        let _span = debug_span!("collect_options", len).entered();
        let mut collection = Self {
            len,
            options: Vec::new(),
            by_span: vec![Vec::new(); len * len],
        };

        for start in 0..len {
            for end in start..len.min(start + config.max_phrase_length) {
                let span = Span::new(start, end);
                let mut ranked: Vec<(f32, OptId)> = Vec::new();
                for candidate in table.lookup(sentence, span) {
                    let weighted = weights.score_phrase(&candidate.scores);
                    let id = collection.options.len();
                    collection.options.push(TranslationOption::new(
                        span,
                        candidate.target,
                        candidate.scores,
                        weighted,
                    ));
                    ranked.push((weighted, id));
                }
                ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
                ranked.truncate(config.max_trans_opt_per_coverage);
                collection.by_span[start * len + end] = ranked.into_iter().map(|(_, id)| id).collect();
            }
        }

        // Copy-through fallback: every position must be coverable or the
        // search can never complete the sentence.
        for pos in 0..len {
            if !collection.position_covered(pos) {
                let span = Span::new(pos, pos);
                let id = collection.options.len();
                collection.options.push(TranslationOption::new(
                    span,
                    vec![sentence.token(pos).surface.clone()],
                    vec![UNKNOWN_WORD_SCORE],
                    UNKNOWN_WORD_SCORE,
                ));
                collection.by_span[pos * len + pos] = vec![id];
            }
        }

        debug!(options = collection.options.len(), "options collected");
        collection
    }

    /// Empty collection for direct population in tests and hosts that
    /// bypass phrase tables.
    pub fn empty(len: usize) -> Self {
        Self {
            len,
            options: Vec::new(),
            by_span: vec![Vec::new(); len * len],
        }
    }

    /// Add one option directly; returns its id. The per-span list keeps
    /// pre-score order.
    pub fn add(&mut self, option: TranslationOption) -> OptId {
        let id = self.options.len();
        let key = option.span.start * self.len + option.span.end;
        let weighted = option.weighted_score;
        self.options.push(option);
        let at = self.by_span[key].partition_point(|&other| {
            self.options[other].weighted_score.total_cmp(&weighted) != std::cmp::Ordering::Less
        });
        self.by_span[key].insert(at, id);
        id
    }

    /// Mark a set of options as one atomic group: applying any member
    /// forces all of them.
    pub fn link_group(&mut self, ids: &[OptId]) {
        for &id in ids {
            self.options[id].linked = ids.iter().copied().filter(|&o| o != id).collect();
        }
    }

    fn position_covered(&self, pos: usize) -> bool {
        (0..=pos).any(|start| {
            (pos..self.len).any(|end| !self.by_span[start * self.len + end].is_empty())
        })
    }

    pub fn get(&self, id: OptId) -> &TranslationOption {
        &self.options[id]
    }

    /// Option ids covering exactly `span`, best pre-score first.
    pub fn for_span(&self, span: Span) -> &[OptId] {
        &self.by_span[span.start * self.len + span.end]
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Sentence length this collection was built for.
    pub fn sentence_len(&self) -> usize {
        self.len
    }
}
