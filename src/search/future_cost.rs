//! Admissible lookahead: the future-cost table.
//!
//! For every source span the table holds an optimistic estimate of the
//! best score achievable translating that span in isolation, built by
//! dynamic programming over split points. During search the estimate for
//! a hypothesis's uncovered remainder is the sum over its coverage gaps.

use crate::coverage::Coverage;
use crate::options::OptionCollection;
use crate::span::{distortion_distance, Span};

pub struct FutureCostTable {
    n: usize,
    /// Full `n × n` matrix; only `i ≤ j` entries are meaningful.
    cells: Vec<f32>,
    /// Weighted early-distortion charge per unit of anticipated jump;
    /// 0 disables.
    edc_weight: f32,
}

impl FutureCostTable {
    /// Build by span-length dynamic programming: seed each span with its
    /// best single-option pre-score, then improve with every split into
    /// two sub-spans. Spans nothing covers stay at −∞ unless a split
    /// fills them.
    pub fn build(options: &OptionCollection, n: usize, edc_weight: f32) -> Self {
        let mut cells = vec![f32::NEG_INFINITY; n * n];
        for start in 0..n {
            for end in start..n {
                // Per-span lists are pre-sorted; the head is the best.
                if let Some(&best) = options.for_span(Span::new(start, end)).first() {
                    cells[start * n + end] = options.get(best).weighted_score;
                }
            }
        }
        for length in 2..=n {
            for start in 0..=(n - length) {
                let end = start + length - 1;
                for split in start..end {
                    let combined = cells[start * n + split] + cells[(split + 1) * n + end];
                    if combined > cells[start * n + end] {
                        cells[start * n + end] = combined;
                    }
                }
            }
        }
        Self {
            n,
            cells,
            edc_weight,
        }
    }

    /// Estimate for a single span.
    pub fn span_estimate(&self, span: Span) -> f32 {
        self.cells[span.start * self.n + span.end]
    }

    /// Estimate for the uncovered remainder of `coverage`: the sum over
    /// its maximal uncovered runs, plus (when early distortion cost is
    /// enabled) the anticipated jump from `last_end` back to the first
    /// gap.
    pub fn score(&self, coverage: &Coverage, last_end: i32) -> f32 {
        let mut score = 0.0;
        for gap in coverage.gaps() {
            score += self.span_estimate(gap);
        }
        if self.edc_weight != 0.0 {
            if let Some(first) = coverage.first_gap() {
                score -= self.edc_weight * distortion_distance(last_end, first) as f32;
            }
        }
        score
    }
}
