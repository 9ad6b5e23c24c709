use super::{FeatureFunction, ModelError, Transition};
use crate::span::distortion_distance;

/// Linear distortion model: each transition is penalized by the jump
/// distance between the previous phrase's end and the new phrase's start.
/// Returns the raw (unweighted) score; monotone continuation scores 0.
pub struct DistortionModel;

impl FeatureFunction for DistortionModel {
    fn name(&self) -> &'static str {
        "distortion"
    }

    fn evaluate(
        &self,
        transition: &Transition<'_>,
        _prev_state: &[u8],
        _next_state: &mut [u8],
    ) -> Result<f32, ModelError> {
        let distance = distortion_distance(transition.prev_end, transition.option.span.start);
        Ok(-(distance as f32))
    }
}
