use super::{FeatureFunction, ModelError, Transition};

/// Word penalty: −1 per emitted target word, balancing models that prefer
/// longer or shorter output.
pub struct WordPenalty;

impl FeatureFunction for WordPenalty {
    fn name(&self) -> &'static str {
        "word_penalty"
    }

    fn evaluate(
        &self,
        transition: &Transition<'_>,
        _prev_state: &[u8],
        _next_state: &mut [u8],
    ) -> Result<f32, ModelError> {
        Ok(-(transition.option.target.len() as f32))
    }
}
