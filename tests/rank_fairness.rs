//! Invariant 6 (spec §8): empirical draw frequency approaches `w_i / Σw`.

use rulesmith::rank::{ordered_indices, pick_index_by_weight, Rank};

#[test]
fn pick_index_by_weight_converges_to_weight_ratio() {
    struct W(i64);
    impl rulesmith::rank::Weighted for W {
        fn weight(&self) -> i64 {
            self.0
        }
    }

    let items = vec![W(10), W(30), W(60)];
    let total = 100;
    let trials = 50_000;
    let mut counts = [0u32; 3];

    for _ in 0..trials {
        let idx = pick_index_by_weight(&items, total);
        counts[idx] += 1;
    }

    let observed: Vec<f64> = counts.iter().map(|c| *c as f64 / trials as f64).collect();
    let expected = [0.10, 0.30, 0.60];

    for (o, e) in observed.iter().zip(expected.iter()) {
        assert!((o - e).abs() < 0.02, "observed {:?} vs expected {:?}", observed, expected);
    }
}

#[test]
fn ordered_indices_shuffles_within_a_priority_bucket_by_weight() {
    let ranks = vec![
        Rank { idx: 0, weight: 10, priority: 1 },
        Rank { idx: 1, weight: 90, priority: 1 },
    ];
    let boundaries = rulesmith::rank::boundaries_for(&ranks);

    let trials = 20_000;
    let mut first_is_zero = 0u32;
    for _ in 0..trials {
        let order = ordered_indices(&ranks, &boundaries);
        if order[0] == 0 {
            first_is_zero += 1;
        }
    }

    let ratio = first_is_zero as f64 / trials as f64;
    assert!((ratio - 0.10).abs() < 0.02, "ratio {ratio} should approach 0.10");
}
