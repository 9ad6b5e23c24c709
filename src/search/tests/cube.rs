use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::DecoderConfig;
use crate::input::Sentence;
use crate::model::{
    FeatureFunction, FeatureRegistry, MemoryPhraseTable, ModelError, Transition, Weights,
};
use crate::search::Decoder;
use crate::testutil::{decode, surfaces};

/// Counts hypothesis extensions via feature evaluations.
#[derive(Default)]
struct ExtensionCounter {
    calls: AtomicUsize,
}

impl FeatureFunction for &'static ExtensionCounter {
    fn name(&self) -> &'static str {
        "extension_counter"
    }

    fn evaluate(
        &self,
        _transition: &Transition<'_>,
        _prev_state: &[u8],
        _next_state: &mut [u8],
    ) -> Result<f32, ModelError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(0.0)
    }
}

#[test]
fn test_pop_limit_bounds_extension_work() {
    // One edge of 50 options; a pop limit of 10 must keep extension calls
    // at or under 10 pops + 2 successors each + the corner.
    static COUNTER: ExtensionCounter = ExtensionCounter {
        calls: AtomicUsize::new(0),
    };

    let rows: Vec<(String, String, Vec<f32>)> = (0..50)
        .map(|i| ("w".to_string(), format!("t{i}"), vec![-(i as f32) * 0.1]))
        .collect();
    let table = MemoryPhraseTable::from_entries(rows);
    let mut registry = FeatureRegistry::new();
    registry.register(Box::new(&COUNTER), 1.0);
    let weights = Weights::new(vec![1.0]);
    let config = DecoderConfig {
        cube_pruning_pop_limit: 10,
        max_stack_size: 50,
        beam_width: f32::INFINITY,
        ..Default::default()
    };
    let decoder = Decoder::new(&table, &registry, &weights, config).unwrap();
    decoder.decode(&Sentence::from_words(["w"])).unwrap();

    let calls = COUNTER.calls.load(Ordering::Relaxed);
    assert!(calls <= 30, "extension calls not bounded by pop limit: {calls}");
    assert!(calls >= 10, "pop limit should still drive exploration: {calls}");
}

#[test]
fn test_pop_limit_caps_survivors() {
    let rows: Vec<(&str, &str, f32)> = vec![
        ("w", "t0", -0.1),
        ("w", "t1", -0.2),
        ("w", "t2", -0.3),
        ("w", "t3", -0.4),
        ("w", "t4", -0.5),
    ];
    let config = DecoderConfig {
        cube_pruning_pop_limit: 2,
        nbest_size: 10,
        beam_width: f32::INFINITY,
        ..Default::default()
    };
    let result = decode(&rows, &["w"], 1.0, config);
    // Only two cells were popped, so only two translations can exist.
    assert_eq!(result.nbest.len(), 2);
    assert_eq!(surfaces(&result), vec!["t0", "t1"]);
}

#[test]
fn test_beam_width_stops_expansion() {
    let rows: Vec<(&str, &str, f32)> = vec![
        ("w", "good", -0.1),
        ("w", "bad", -20.0),
    ];
    let config = DecoderConfig {
        beam_width: 5.0,
        nbest_size: 10,
        ..Default::default()
    };
    let result = decode(&rows, &["w"], 1.0, config);
    assert_eq!(surfaces(&result), vec!["good"]);
}

#[test]
fn test_diversity_explores_weak_edges() {
    // Two edges feed the full-coverage container: the monotone A-then-B
    // edge and the expensive B-then-A edge (distortion weight 10). With a
    // pop limit of 1 only the strong edge is popped; a diversity floor of
    // 2 forces the weak edge to surface its path as well.
    let rows = [("a", "A", -0.1), ("b", "B", -0.2)];
    let base = DecoderConfig {
        cube_pruning_pop_limit: 1,
        nbest_size: 10,
        beam_width: f32::INFINITY,
        ..Default::default()
    };

    let narrow = decode(&rows, &["a", "b"], 10.0, base.clone());
    assert_eq!(surfaces(&narrow), vec!["A B"]);

    let config = DecoderConfig {
        cube_pruning_diversity: 2,
        ..base
    };
    let diverse = decode(&rows, &["a", "b"], 10.0, config);
    assert!(
        surfaces(&diverse).contains(&"B A".to_string()),
        "diversity must pop the weak edge: {:?}",
        surfaces(&diverse)
    );
}

#[test]
fn test_search_matches_exhaustive_best() {
    // Small instance, generous limits: cube pruning must find the same
    // optimum as brute force over all emission orders.
    let rows = [
        ("x", "X", -1.3),
        ("y", "Y", -0.4),
        ("z", "Z", -2.1),
    ];
    let scores = [-1.3f32, -0.4, -2.1];
    let distortion_weight = 1.0;

    let config = DecoderConfig {
        nbest_size: 1,
        beam_width: f32::INFINITY,
        cube_pruning_pop_limit: 1000,
        ..Default::default()
    };
    let result = decode(&rows, &["x", "y", "z"], distortion_weight, config);
    let best = result.best.expect("must complete");

    let mut exhaustive = f32::NEG_INFINITY;
    let orders: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];
    for order in orders {
        let mut total = 0.0;
        let mut prev_end: i32 = -1;
        for &pos in &order {
            total += scores[pos];
            total -= distortion_weight * (pos as i32 - prev_end - 1).abs() as f32;
            prev_end = pos as i32;
        }
        exhaustive = exhaustive.max(total);
    }
    assert!(
        (best.score - exhaustive).abs() < 1e-4,
        "search best {} != exhaustive best {exhaustive}",
        best.score
    );
}
