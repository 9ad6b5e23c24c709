//! Cube-pruning beam-search core for phrase-based statistical machine
//! translation.
//!
//! The decoder composes partial translations over a source sentence:
//! hypotheses are bucketed into stacks by number of covered words,
//! grouped into bitmap containers by exact coverage, and materialized
//! lazily through backwards edges — priority queues over a grid of
//! (predecessor, translation option) combinations. Phrase tables and
//! feature models are external collaborators injected through traits;
//! the core owns only the per-sentence search state.

pub mod config;
pub mod coverage;
pub mod error;
pub mod input;
pub mod model;
pub mod options;
pub mod search;
pub mod span;
pub mod trace_init;

pub(crate) mod testutil;

pub use config::DecoderConfig;
pub use error::DecodeError;
pub use input::{Sentence, Token};
pub use model::{
    BigramContextModel, DistortionModel, FeatureFunction, FeatureRegistry, MemoryPhraseTable,
    PhraseTable, Weights, WordPenalty,
};
pub use options::{OptionCollection, TranslationOption};
pub use search::{DecodeResult, Decoder, TranslatedSegment, Translation};
pub use span::Span;
