use std::collections::HashMap;

use crate::input::Sentence;
use crate::span::Span;

/// One candidate translation for a source span, as delivered by a phrase
/// table: the target words plus the raw feature-score vector the table was
/// trained with (log domain).
#[derive(Debug, Clone)]
pub struct PhraseCandidate {
    pub target: Vec<String>,
    pub scores: Vec<f32>,
}

/// Read-only phrase-table lookup.
///
/// Loading and storage are a host concern; the core only queries. Lookups
/// must be safe from concurrent sentence decodes.
pub trait PhraseTable: Send + Sync {
    fn lookup(&self, sentence: &Sentence, span: Span) -> Vec<PhraseCandidate>;
}

/// In-memory phrase table keyed by the space-joined source surface.
pub struct MemoryPhraseTable {
    entries: HashMap<String, Vec<PhraseCandidate>>,
}

impl MemoryPhraseTable {
    /// Build from `(source, target, scores)` rows. Multiple rows may share
    /// a source phrase.
    pub fn from_entries<S: Into<String>, T: Into<String>>(
        rows: Vec<(S, T, Vec<f32>)>,
    ) -> Self {
        let mut entries: HashMap<String, Vec<PhraseCandidate>> = HashMap::new();
        for (source, target, scores) in rows {
            let target: String = target.into();
            let target = target.split_whitespace().map(str::to_string).collect();
            entries
                .entry(source.into())
                .or_default()
                .push(PhraseCandidate { target, scores });
        }
        Self { entries }
    }
}

impl PhraseTable for MemoryPhraseTable {
    fn lookup(&self, sentence: &Sentence, span: Span) -> Vec<PhraseCandidate> {
        let key = sentence.surface_range(span.start, span.end);
        self.entries.get(&key).cloned().unwrap_or_default()
    }
}
