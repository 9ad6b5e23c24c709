//! Bigram target-context model.
//!
//! A dense table of transition scores between adjacent target words, with
//! the last emitted word carried on each hypothesis as packed state. This
//! is the stateful feature that makes recombination keys meaningful: two
//! hypotheses with different right contexts score future extensions
//! differently and must not merge.

use std::collections::HashMap;

use super::{FeatureFunction, ModelError, Transition};

/// Word id 0 is the boundary marker (sentence start/end) and the bucket
/// for words outside the model's vocabulary.
const BOUNDARY: u32 = 0;

pub struct BigramContextModel {
    vocab: HashMap<String, u32>,
    /// Dense `num_ids × num_ids` table, indexed `prev * num_ids + next`.
    scores: Vec<f32>,
    num_ids: usize,
    /// Score for pairs absent from the table.
    default_score: f32,
}

impl BigramContextModel {
    /// Build from `(previous, next, score)` triples. `"<s>"` and `"</s>"`
    /// name the boundary on either side.
    pub fn from_pairs<S: AsRef<str>>(pairs: &[(S, S, f32)], default_score: f32) -> Self {
        let mut vocab: HashMap<String, u32> = HashMap::new();
        let intern = |word: &str, vocab: &mut HashMap<String, u32>| -> u32 {
            if word == "<s>" || word == "</s>" {
                return BOUNDARY;
            }
            let next_id = vocab.len() as u32 + 1;
            *vocab.entry(word.to_string()).or_insert(next_id)
        };
        // First pass assigns ids so the table can be sized up front.
        for (prev, next, _) in pairs {
            intern(prev.as_ref(), &mut vocab);
            intern(next.as_ref(), &mut vocab);
        }
        let num_ids = vocab.len() + 1;
        let mut scores = vec![default_score; num_ids * num_ids];
        for (prev, next, score) in pairs {
            let p = intern(prev.as_ref(), &mut vocab) as usize;
            let n = intern(next.as_ref(), &mut vocab) as usize;
            scores[p * num_ids + n] = *score;
        }
        Self {
            vocab,
            scores,
            num_ids,
            default_score,
        }
    }

    fn id(&self, word: &str) -> u32 {
        self.vocab.get(word).copied().unwrap_or(BOUNDARY)
    }

    fn pair_score(&self, prev: u32, next: u32) -> f32 {
        self.scores
            .get(prev as usize * self.num_ids + next as usize)
            .copied()
            .unwrap_or(self.default_score)
    }
}

impl FeatureFunction for BigramContextModel {
    fn name(&self) -> &'static str {
        "bigram_context"
    }

    fn state_len(&self) -> usize {
        4
    }

    fn init_state(&self, state: &mut [u8]) {
        state.copy_from_slice(&BOUNDARY.to_le_bytes());
    }

    fn evaluate(
        &self,
        transition: &Transition<'_>,
        prev_state: &[u8],
        next_state: &mut [u8],
    ) -> Result<f32, ModelError> {
        let mut context = u32::from_le_bytes(
            prev_state
                .try_into()
                .map_err(|_| ModelError("bigram state has wrong length".into()))?,
        );
        let mut score = 0.0;
        for word in &transition.option.target {
            let id = self.id(word);
            score += self.pair_score(context, id);
            context = id;
        }
        next_state.copy_from_slice(&context.to_le_bytes());
        Ok(score)
    }

    fn finalize(&self, state: &[u8]) -> f32 {
        let context = u32::from_le_bytes(state.try_into().unwrap_or_default());
        self.pair_score(context, BOUNDARY)
    }
}
