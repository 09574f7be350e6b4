//! Vector matching shared by the reference stores: cosine scoring, ranked
//! partition search, upsert by id and oldest-first eviction.

use recollect_core::vector_store::{VectorMatch, VectorRecord};

/// Cosine of the angle between `a` and `b`, clamped to [-1, 1].
///
/// Empty, mismatched or zero-norm inputs score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    ((dot / denom) as f32).clamp(-1.0, 1.0)
}

/// Rank the records of one partition by cosine similarity to a query.
///
/// Returns at most `top_n` matches scoring at least `min_score`, best first.
/// Ties keep insertion order.
pub fn rank_by_similarity(
    records: &[VectorRecord],
    partition_key: &str,
    query: &[f32],
    top_n: usize,
    min_score: f32,
) -> Vec<VectorMatch> {
    let mut scored: Vec<VectorMatch> = records
        .iter()
        .filter(|r| r.partition_key == partition_key)
        .filter_map(|r| {
            let score = cosine_similarity(&r.embedding, query);
            (score >= min_score).then(|| VectorMatch {
                id: r.id.clone(),
                metadata_json: r.metadata_json.clone(),
                score,
            })
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_n);
    scored
}

/// Insert or replace a record by ID. Returns `true` when a row was replaced.
pub fn upsert_record(records: &mut Vec<VectorRecord>, record: VectorRecord) -> bool {
    match records.iter_mut().find(|r| r.id == record.id) {
        Some(existing) => {
            *existing = record;
            true
        }
        None => {
            records.push(record);
            false
        }
    }
}

/// Drop the oldest rows of `partition_key` until at most `max_entries` remain.
///
/// The row `keep_id` (the one just written) is never a victim, whatever its
/// timestamp. Returns the number of rows evicted.
pub fn evict_oldest(
    records: &mut Vec<VectorRecord>,
    partition_key: &str,
    max_entries: usize,
    keep_id: &str,
) -> usize {
    let in_partition = records.iter().filter(|r| r.partition_key == partition_key).count();
    if in_partition <= max_entries {
        return 0;
    }

    let excess = in_partition - max_entries;
    let mut victims: Vec<(chrono::DateTime<chrono::Utc>, usize)> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.partition_key == partition_key && r.id != keep_id)
        .map(|(i, r)| (r.created_at, i))
        .collect();
    victims.sort();
    let mut doomed: Vec<usize> = victims.into_iter().take(excess).map(|(_, i)| i).collect();
    doomed.sort_unstable();

    let evicted = doomed.len();
    for index in doomed.into_iter().rev() {
        records.remove(index);
    }
    evicted
}
