//! Feature models consumed by the search.
//!
//! The search ranks hypotheses by a single scalar: the dot product of
//! feature scores with a read-only weight vector. Phrase-table scores are
//! folded into each translation option before search; everything that
//! depends on the target context built so far is a [`FeatureFunction`]
//! evaluated at extension time.
//!
//! Feature functions may carry opaque per-hypothesis state (for example a
//! language-model right context). States are packed into one byte vector
//! per hypothesis, addressed by per-feature offsets, so extending a
//! hypothesis allocates a single buffer regardless of how many features
//! are registered.

mod bigram;
mod distortion;
mod phrase_table;
mod word_penalty;

pub use bigram::BigramContextModel;
pub use distortion::DistortionModel;
pub use phrase_table::{MemoryPhraseTable, PhraseCandidate, PhraseTable};
pub use word_penalty::WordPenalty;

use crate::error::DecodeError;
use crate::input::Sentence;
use crate::options::TranslationOption;

/// Weights for the pre-scored translation-option components (one per
/// phrase-table score column). Stateful/stateless feature functions carry
/// their weight at registration instead.
#[derive(Debug, Clone, Default)]
pub struct Weights {
    pub phrase: Vec<f32>,
}

impl Weights {
    pub fn new(phrase: Vec<f32>) -> Self {
        Self { phrase }
    }

    /// Dot product with a raw phrase score vector. Missing columns on
    /// either side contribute nothing.
    pub fn score_phrase(&self, scores: &[f32]) -> f32 {
        self.phrase
            .iter()
            .zip(scores.iter())
            .map(|(w, s)| w * s)
            .sum()
    }
}

/// Everything a feature function may inspect when scoring one transition:
/// the source sentence, the option being applied, and where the
/// predecessor hypothesis left off.
pub struct Transition<'a> {
    pub sentence: &'a Sentence,
    pub option: &'a TranslationOption,
    /// End position of the predecessor's last phrase, −1 for the seed.
    pub prev_end: i32,
}

/// A scoring model evaluated on every hypothesis extension.
///
/// Implementations must be safe to query concurrently from independent
/// sentence decodes; the core never mutates them.
pub trait FeatureFunction: Send + Sync {
    fn name(&self) -> &'static str;

    /// Size in bytes of the opaque state this feature keeps per
    /// hypothesis. Fixed at model-load time.
    fn state_len(&self) -> usize {
        0
    }

    /// Write the seed hypothesis's state.
    fn init_state(&self, _state: &mut [u8]) {}

    /// Score one transition, reading the predecessor's state slice and
    /// writing the successor's.
    fn evaluate(
        &self,
        transition: &Transition<'_>,
        prev_state: &[u8],
        next_state: &mut [u8],
    ) -> Result<f32, ModelError>;

    /// Extra score applied once, when a hypothesis reaches full coverage
    /// (e.g. an end-of-sentence transition).
    fn finalize(&self, _state: &[u8]) -> f32 {
        0.0
    }
}

/// A feature-function failure. Aborts the sentence being decoded.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ModelError(pub String);

struct Registered {
    function: Box<dyn FeatureFunction>,
    weight: f32,
    offset: usize,
}

/// The set of feature functions active for a decode, with the packed
/// state layout computed at registration time.
#[derive(Default)]
pub struct FeatureRegistry {
    entries: Vec<Registered>,
    state_len: usize,
}

impl FeatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, function: Box<dyn FeatureFunction>, weight: f32) {
        let offset = self.state_len;
        self.state_len += function.state_len();
        self.entries.push(Registered {
            function,
            weight,
            offset,
        });
    }

    /// Total packed state size per hypothesis.
    pub fn state_len(&self) -> usize {
        self.state_len
    }

    /// Weight of the first registered feature with this name.
    pub fn weight_of(&self, name: &str) -> Option<f32> {
        self.entries
            .iter()
            .find(|entry| entry.function.name() == name)
            .map(|entry| entry.weight)
    }

    /// The seed hypothesis's packed state.
    pub fn seed_state(&self) -> Box<[u8]> {
        let mut state = vec![0u8; self.state_len].into_boxed_slice();
        for entry in &self.entries {
            let end = entry.offset + entry.function.state_len();
            entry.function.init_state(&mut state[entry.offset..end]);
        }
        state
    }

    /// Weighted score of one transition across all registered features,
    /// filling in the successor's packed state.
    pub fn score_transition(
        &self,
        transition: &Transition<'_>,
        prev_state: &[u8],
        next_state: &mut [u8],
    ) -> Result<f32, DecodeError> {
        debug_assert_eq!(prev_state.len(), self.state_len);
        debug_assert_eq!(next_state.len(), self.state_len);
        let mut score = 0.0;
        for entry in &self.entries {
            let end = entry.offset + entry.function.state_len();
            let raw = entry
                .function
                .evaluate(
                    transition,
                    &prev_state[entry.offset..end],
                    &mut next_state[entry.offset..end],
                )
                .map_err(|e| DecodeError::Model {
                    feature: entry.function.name().to_string(),
                    message: e.0,
                })?;
            score += entry.weight * raw;
        }
        Ok(score)
    }

    /// Weighted end-of-sentence score for a full-coverage hypothesis.
    pub fn score_final(&self, state: &[u8]) -> f32 {
        self.entries
            .iter()
            .map(|entry| {
                let end = entry.offset + entry.function.state_len();
                entry.weight * entry.function.finalize(&state[entry.offset..end])
            })
            .sum()
    }
}
