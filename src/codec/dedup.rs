use std::collections::HashSet;

use crate::properties::SourceNode;

/// Keeps the first record for every source node id and drops the rest, preserving the order of
/// the survivors. Provisional component ids are assigned from this order, so it must not change.
pub fn dedup_by_node_id<T: SourceNode>(records: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::with_capacity(records.len());
    let before = records.len();
    let kept = records
        .into_iter()
        .filter(|record| seen.insert(record.source_node_id().to_string()))
        .collect::<Vec<T>>();
    if kept.len() != before {
        tracing::debug!(
            "[dedup_by_node_id] dropped {} duplicate record(s)",
            before - kept.len()
        );
    }
    kept
}
