#![cfg(test)]

//! Shared fixtures for decoder tests.

use crate::config::DecoderConfig;
use crate::input::Sentence;
use crate::model::{DistortionModel, FeatureRegistry, MemoryPhraseTable, Weights};
use crate::search::{DecodeResult, Decoder};

/// Phrase table from `(source, target, score)` rows with one score column.
pub fn table(rows: &[(&str, &str, f32)]) -> MemoryPhraseTable {
    MemoryPhraseTable::from_entries(
        rows.iter()
            .map(|&(source, target, score)| (source, target, vec![score]))
            .collect(),
    )
}

/// Registry carrying only the linear distortion model.
pub fn distortion_registry(weight: f32) -> FeatureRegistry {
    let mut registry = FeatureRegistry::new();
    registry.register(Box::new(DistortionModel), weight);
    registry
}

/// Decode `words` against `rows` with a distortion-only registry and unit
/// phrase weight.
pub fn decode(
    rows: &[(&str, &str, f32)],
    words: &[&str],
    distortion_weight: f32,
    config: DecoderConfig,
) -> DecodeResult {
    let table = table(rows);
    let registry = distortion_registry(distortion_weight);
    let weights = Weights::new(vec![1.0]);
    let decoder = Decoder::new(&table, &registry, &weights, config).unwrap();
    decoder
        .decode(&Sentence::from_words(words.iter().copied()))
        .unwrap()
}

/// N-best target surfaces, best first.
pub fn surfaces(result: &DecodeResult) -> Vec<String> {
    result.nbest.iter().map(|t| t.surface()).collect()
}
