//! Decoder configuration.
//!
//! All search parameters live in one plain value constructed at startup and
//! injected into the decoder; there is no process-wide state. The struct
//! deserializes from TOML so hosts can ship tuning files, and every field
//! has a default matching common phrase-based decoder settings.

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DecoderConfig {
    /// Maximum jump between consecutive source spans; −1 means unlimited.
    pub distortion_limit: i32,
    /// Histogram prune: maximum surviving hypotheses per stack. Also the K
    /// parameter for backwards-edge snapshots.
    pub max_stack_size: usize,
    /// Beam prune (log domain): drop hypotheses scoring more than this
    /// below the best hypothesis in their stack.
    pub beam_width: f32,
    /// Early discarding (log domain): reject an extension whose cheap
    /// partial estimate is already this far below the stack's best,
    /// before stateful features run. `INFINITY` disables.
    pub early_discarding_threshold: f32,
    /// Cube pruning: per-container pop budget.
    pub cube_pruning_pop_limit: usize,
    /// Cube pruning: minimum pops taken from every backwards edge of a
    /// container, reserving exploration for lower-ranked combinations.
    pub cube_pruning_diversity: usize,
    /// Maximum translation options kept per source span (top by pre-score).
    pub max_trans_opt_per_coverage: usize,
    /// Maximum source span length considered during option collection.
    pub max_phrase_length: usize,
    /// Minimum survivors per distinct coverage bitmap before histogram
    /// pruning applies globally. 0 disables the floor.
    pub stack_diversity: usize,
    /// Forbid reordering across punctuation tokens.
    pub monotone_at_punctuation: bool,
    /// Charge an anticipated distortion jump in the lookahead estimate so
    /// hypotheses with stranded gaps compare fairly against monotone ones.
    pub use_early_distortion_cost: bool,
    /// Size of the n-best list assembled from the final stack.
    pub nbest_size: usize,
    /// Deduplicate n-best entries by target surface string.
    pub distinct_nbest: bool,
    /// Per-sentence time budget in milliseconds; checked between stacks.
    pub time_budget_ms: Option<u64>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            distortion_limit: -1,
            max_stack_size: 200,
            beam_width: 10.0,
            early_discarding_threshold: f32::INFINITY,
            cube_pruning_pop_limit: 1000,
            cube_pruning_diversity: 0,
            max_trans_opt_per_coverage: 50,
            max_phrase_length: 20,
            stack_diversity: 0,
            monotone_at_punctuation: false,
            use_early_distortion_cost: false,
            nbest_size: 1,
            distinct_nbest: true,
            time_budget_ms: None,
        }
    }
}

impl DecoderConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: DecoderConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Cross-field validation, applied once at decoder construction.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_stack_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_stack_size".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.cube_pruning_pop_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cube_pruning_pop_limit".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.max_phrase_length == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_phrase_length".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.beam_width < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "beam_width".into(),
                reason: "must be non-negative (log-domain width)".into(),
            });
        }
        // Diversity floors interact badly with wide reordering windows;
        // the same restriction the reference decoder enforces.
        if self.stack_diversity > 0 && !(0..=15).contains(&self.distortion_limit) {
            return Err(ConfigError::InvalidValue {
                field: "stack_diversity".into(),
                reason: "requires a distortion limit between 0 and 15".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        DecoderConfig::default().validate().unwrap();
    }

    #[test]
    fn test_from_toml_overrides() {
        let config = DecoderConfig::from_toml(
            r#"
            distortion_limit = 6
            max_stack_size = 50
            cube_pruning_pop_limit = 500
            monotone_at_punctuation = true
            "#,
        )
        .unwrap();
        assert_eq!(config.distortion_limit, 6);
        assert_eq!(config.max_stack_size, 50);
        assert_eq!(config.cube_pruning_pop_limit, 500);
        assert!(config.monotone_at_punctuation);
        // Untouched fields keep defaults
        assert_eq!(config.max_phrase_length, 20);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(DecoderConfig::from_toml("no_such_option = 1").is_err());
    }

    #[test]
    fn test_stack_diversity_requires_bounded_distortion() {
        let mut config = DecoderConfig {
            stack_diversity: 2,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        config.distortion_limit = 6;
        config.validate().unwrap();
        config.distortion_limit = 16;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_stack_size_rejected() {
        let config = DecoderConfig {
            max_stack_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
