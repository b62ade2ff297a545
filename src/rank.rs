//! Weighted-random rank scheduling (C10): stable priority-bucketed sort
//! plus an in-place weighted Fisher-Yates shuffle within each priority
//! bucket (spec §4.10, ported from `utils.go`'s `PickIndexByWeight` and
//! `filter.go`'s `FilterGroup.Add`/`Run`).

use rand::Rng;

/// Something that can be drawn from a weighted pool.
pub trait Weighted {
    fn weight(&self) -> i64;
}

/// Draw an index out of `items` proportional to weight. `total_weight`, if
/// non-zero, is used as-is (the caller already knows the sum); otherwise
/// it's recomputed from `items`. A zero total always returns index 0
/// (ported verbatim from `PickIndexByWeight`).
pub fn pick_index_by_weight<T: Weighted>(items: &[T], total_weight: i64) -> usize {
    let mut total = total_weight;
    if total == 0 {
        total = items.iter().map(Weighted::weight).sum();
    }

    if total == 0 {
        return 0;
    }

    let choose = rand::thread_rng().gen_range(1..=total);
    let mut line = 0i64;

    for (i, item) in items.iter().enumerate() {
        line += item.weight();
        if choose <= line {
            return i;
        }
    }

    0
}

/// A filter's scheduling weight/priority, keyed by its index in the
/// owning group's filter list.
#[derive(Clone, Copy)]
pub struct Rank {
    pub idx: usize,
    pub weight: i64,
    pub priority: i64,
}

impl Weighted for Rank {
    fn weight(&self) -> i64 {
        self.weight
    }
}

/// A contiguous run of `ranks` sharing one priority, with the run's total
/// weight precomputed for the probability draw.
pub struct RankBoundary {
    pub boundary: usize,
    pub total_weight: i64,
}

/// Recompute priority-bucket boundaries. `ranks` must already be sorted by
/// priority descending (spec §4.10, ported from `FilterGroup.Add`).
pub fn boundaries_for(ranks: &[Rank]) -> Vec<RankBoundary> {
    let mut out = Vec::new();
    let mut last_priority = i64::MIN;
    let mut total_weight = 0i64;

    for (i, rank) in ranks.iter().enumerate() {
        if i != 0 && rank.priority != last_priority {
            out.push(RankBoundary { boundary: i, total_weight });
            total_weight = 0;
        }
        total_weight += rank.weight;
        last_priority = rank.priority;
    }

    if !ranks.is_empty() {
        out.push(RankBoundary { boundary: ranks.len(), total_weight });
    }

    out
}

/// Produce the final run order: priority descending, with each priority
/// bucket internally shuffled by weighted draw (spec §4.10, ported from
/// `FilterGroup.Run`'s rank branch).
pub fn ordered_indices(ranks: &[Rank], boundaries: &[RankBoundary]) -> Vec<usize> {
    let mut idxes: Vec<usize> = ranks.iter().map(|r| r.idx).collect();

    let mut last_idx = 0;
    for boundary in boundaries {
        let item_count = boundary.boundary - last_idx;
        if item_count <= 1 {
            last_idx = boundary.boundary;
            continue;
        }

        let mut items: Vec<Rank> = ranks[last_idx..boundary.boundary].to_vec();
        let mut total_weight = boundary.total_weight;

        for i in 0..items.len() {
            let pick = i + pick_index_by_weight(&items[i..], total_weight);
            items.swap(i, pick);
            total_weight -= items[i].weight();
        }

        for (offset, item) in items.iter().enumerate() {
            idxes[last_idx + offset] = item.idx;
        }

        last_idx = boundary.boundary;
    }

    idxes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_total_weight_picks_first_index() {
        struct Z;
        impl Weighted for Z {
            fn weight(&self) -> i64 {
                0
            }
        }
        let items = [Z, Z, Z];
        assert_eq!(pick_index_by_weight(&items, 0), 0);
    }

    #[test]
    fn single_item_always_picked() {
        struct W(i64);
        impl Weighted for W {
            fn weight(&self) -> i64 {
                self.0
            }
        }
        let items = [W(5)];
        assert_eq!(pick_index_by_weight(&items, 0), 0);
    }

    #[test]
    fn boundaries_split_on_priority_change() {
        let ranks = vec![
            Rank { idx: 0, weight: 1, priority: 2 },
            Rank { idx: 1, weight: 1, priority: 2 },
            Rank { idx: 2, weight: 1, priority: 1 },
        ];
        let boundaries = boundaries_for(&ranks);
        assert_eq!(boundaries.len(), 2);
        assert_eq!(boundaries[0].boundary, 2);
        assert_eq!(boundaries[1].boundary, 3);
    }

    #[test]
    fn ordered_indices_preserves_priority_order_across_runs() {
        let ranks = vec![
            Rank { idx: 5, weight: 1, priority: 2 },
            Rank { idx: 6, weight: 1, priority: 2 },
            Rank { idx: 7, weight: 1, priority: 1 },
        ];
        let boundaries = boundaries_for(&ranks);
        for _ in 0..20 {
            let order = ordered_indices(&ranks, &boundaries);
            assert_eq!(order.len(), 3);
            assert_eq!(order[2], 7);
            assert!(order[0..2].contains(&5) && order[0..2].contains(&6));
        }
    }
}
