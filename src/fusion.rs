use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::models::{FusedResult, Provenance, ScoredPoint};

/// RRF constant. Higher values flatten the rank contribution curve.
pub const RRF_K: f64 = 60.0;

/// Merge the internal and external rankings with Reciprocal Rank Fusion.
///
/// Each list contributes `1/(k + rank)` per point, rank counted 1..n in the
/// caller-provided order (no resorting: list order is trusted as relevance
/// order). A point present in both lists sums both contributions and its
/// provenance is promoted to `Both`.
///
/// Provider similarity scores are ignored on purpose: they live on different
/// scales per collection, while RRF depends only on rank.
///
/// Output is sorted by descending fused score; ties break stably by
/// first-seen order (internal list first, then external).
///
/// Pure function: same inputs always produce the same fused list.
pub fn reciprocal_rank_fusion(
    internal: &[ScoredPoint],
    external: &[ScoredPoint],
    k: f64,
) -> Vec<FusedResult> {
    struct Slot {
        point: ScoredPoint,
        score: f64,
        source: Provenance,
        first_seen: usize,
    }

    let mut slots: HashMap<String, Slot> = HashMap::new();
    let mut seen = 0usize;

    for (rank, point) in internal.iter().enumerate() {
        let rrf_score = 1.0 / (k + rank as f64 + 1.0);
        let slot = slots.entry(point.id.clone()).or_insert_with(|| {
            seen += 1;
            Slot {
                point: point.clone(),
                score: 0.0,
                source: Provenance::Internal,
                first_seen: seen,
            }
        });
        slot.score += rrf_score;
    }

    for (rank, point) in external.iter().enumerate() {
        let rrf_score = 1.0 / (k + rank as f64 + 1.0);
        match slots.entry(point.id.clone()) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                // Seen in the other list too
                slot.source = Provenance::Both;
                slot.score += rrf_score;
            }
            Entry::Vacant(vacant) => {
                seen += 1;
                vacant.insert(Slot {
                    point: point.clone(),
                    score: rrf_score,
                    source: Provenance::External,
                    first_seen: seen,
                });
            }
        }
    }

    let mut ordered: Vec<Slot> = slots.into_values().collect();
    ordered.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.first_seen.cmp(&b.first_seen))
    });

    ordered
        .into_iter()
        .map(|s| FusedResult {
            point: s.point,
            score: s.score,
            source: s.source,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn make_point(id: &str, score: f32) -> ScoredPoint {
        let mut payload = HashMap::new();
        payload.insert(
            "text".to_string(),
            serde_json::Value::String(format!("text of {id}")),
        );
        ScoredPoint {
            id: id.to_string(),
            score,
            payload,
        }
    }

    #[test]
    fn test_empty_inputs() {
        let results = reciprocal_rank_fusion(&[], &[], RRF_K);
        assert!(results.is_empty());
    }

    #[test]
    fn test_disjoint_lists_union_count() {
        let internal = vec![make_point("a", 0.9), make_point("b", 0.8)];
        let external = vec![make_point("c", 12.0), make_point("d", 11.0)];

        let results = reciprocal_rank_fusion(&internal, &external, RRF_K);
        assert_eq!(results.len(), 4);

        let mut ids: Vec<&str> = results.iter().map(|r| r.point.id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_single_point_score_is_exact() {
        // Point at rank 2 in one list, absent from the other: 1/(k+2)
        let internal = vec![make_point("a", 0.9), make_point("b", 0.8)];
        let results = reciprocal_rank_fusion(&internal, &[], RRF_K);

        let b = results.iter().find(|r| r.point.id == "b").unwrap();
        assert!((b.score - 1.0 / (RRF_K + 2.0)).abs() < 1e-12);
        assert_eq!(b.source, Provenance::Internal);
    }

    #[test]
    fn test_overlap_promotes_to_both_and_sums() {
        // "b" at rank 2 internal and rank 1 external
        let internal = vec![make_point("a", 0.9), make_point("b", 0.8)];
        let external = vec![make_point("b", 12.0), make_point("c", 11.0)];

        let results = reciprocal_rank_fusion(&internal, &external, RRF_K);
        assert_eq!(results.len(), 3);

        let b = &results[0];
        assert_eq!(b.point.id, "b");
        assert_eq!(b.source, Provenance::Both);
        let expected = 1.0 / (RRF_K + 2.0) + 1.0 / (RRF_K + 1.0);
        assert!((b.score - expected).abs() < 1e-12);
    }

    #[test]
    fn test_sorted_non_increasing() {
        let internal = vec![
            make_point("a", 0.9),
            make_point("b", 0.8),
            make_point("c", 0.7),
        ];
        let external = vec![make_point("c", 12.0), make_point("d", 11.0)];

        let results = reciprocal_rank_fusion(&internal, &external, RRF_K);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_tie_break_is_first_seen_order() {
        // Same rank in each list, disjoint ids: equal scores, internal first
        let internal = vec![make_point("a", 0.9)];
        let external = vec![make_point("z", 12.0)];

        let results = reciprocal_rank_fusion(&internal, &external, RRF_K);
        assert_eq!(results.len(), 2);
        assert!((results[0].score - results[1].score).abs() < 1e-12);
        assert_eq!(results[0].point.id, "a");
        assert_eq!(results[1].point.id, "z");
    }

    #[test]
    fn test_overlap_scenario_ranks_both_first() {
        // Internal returns 2 points, external returns 1 overlapping point at
        // rank 1: fused list has 2 entries, the overlap ranks first as "both".
        let internal = vec![make_point("doc1", 0.91), make_point("doc2", 0.84)];
        let external = vec![make_point("doc1", 14.2)];

        let results = reciprocal_rank_fusion(&internal, &external, RRF_K);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].point.id, "doc1");
        assert_eq!(results[0].source, Provenance::Both);
        assert_eq!(results[1].source, Provenance::Internal);
    }

    #[test]
    fn test_deterministic_across_calls() {
        let internal = vec![make_point("a", 0.9), make_point("b", 0.8)];
        let external = vec![make_point("b", 12.0), make_point("c", 11.0)];

        let first = reciprocal_rank_fusion(&internal, &external, RRF_K);
        let second = reciprocal_rank_fusion(&internal, &external, RRF_K);

        let first_ids: Vec<&str> = first.iter().map(|r| r.point.id.as_str()).collect();
        let second_ids: Vec<&str> = second.iter().map(|r| r.point.id.as_str()).collect();
        assert_eq!(first_ids, second_ids);
    }
}
