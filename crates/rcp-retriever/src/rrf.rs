//! Reciprocal Rank Fusion of a dense and a sparse candidate list (§4.8).

/// `k_rrf` constant from the fusion formula `rrf(id) = Σ 1 / (k_rrf + rank_L(id))`.
pub const K_RRF: f64 = 60.0;

/// Fuses two ranked id lists (1-based rank implied by list order) by RRF.
///
/// Ids absent from a list contribute nothing from it; duplicates across the
/// two lists collapse into a single summed score. Ties are broken by the
/// id's first-seen order across `dense` then `sparse`, matching the spec's
/// "stable chunk_id order" tie-break.
pub fn fuse(dense: &[String], sparse: &[String]) -> Vec<(String, f64)> {
    use std::collections::HashMap;

    let mut scores: HashMap<&str, f64> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();

    for (rank, id) in dense.iter().enumerate() {
        let entry = scores.entry(id.as_str()).or_insert_with(|| {
            order.push(id.as_str());
            0.0
        });
        *entry += 1.0 / (K_RRF + (rank + 1) as f64);
    }
    for (rank, id) in sparse.iter().enumerate() {
        let entry = scores.entry(id.as_str()).or_insert_with(|| {
            order.push(id.as_str());
            0.0
        });
        *entry += 1.0 / (K_RRF + (rank + 1) as f64);
    }

    let mut ranked: Vec<(usize, &str, f64)> = order
        .iter()
        .enumerate()
        .map(|(i, id)| (i, *id, scores[*id]))
        .collect();
    ranked.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
    ranked.into_iter().map(|(_, id, score)| (id.to_string(), score)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_hybrid_fusion_scenario() {
        let dense = vec!["x1".to_string(), "x2".to_string(), "x3".to_string()];
        let sparse = vec!["x3".to_string(), "x4".to_string(), "x1".to_string()];
        let fused = fuse(&dense, &sparse);
        let ids: Vec<&str> = fused.iter().map(|(id, _)| id.as_str()).collect();

        assert_eq!(&ids[0..2].iter().collect::<std::collections::HashSet<_>>(), &["x1", "x3"].iter().collect());
        assert_eq!(&ids[2..4].iter().collect::<std::collections::HashSet<_>>(), &["x2", "x4"].iter().collect());
        assert_eq!(ids[0], "x1");
        assert_eq!(ids[2], "x2");

        let x1_score = fused.iter().find(|(id, _)| id == "x1").unwrap().1;
        let x3_score = fused.iter().find(|(id, _)| id == "x3").unwrap().1;
        assert!((x1_score - (1.0 / 61.0 + 1.0 / 63.0)).abs() < 1e-12);
        assert!((x3_score - (1.0 / 63.0 + 1.0 / 61.0)).abs() < 1e-12);
        assert!((x1_score - x3_score).abs() < 1e-12);
    }

    #[test]
    fn missing_list_contributes_nothing() {
        let dense = vec!["a".to_string(), "b".to_string()];
        let sparse = vec![];
        let fused = fuse(&dense, &sparse);
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].0, "a");
    }

    #[test]
    fn duplicates_collapse_into_one_entry() {
        let dense = vec!["a".to_string()];
        let sparse = vec!["a".to_string()];
        let fused = fuse(&dense, &sparse);
        assert_eq!(fused.len(), 1);
        assert!((fused[0].1 - (1.0 / 61.0 + 1.0 / 61.0)).abs() < 1e-12);
    }
}
