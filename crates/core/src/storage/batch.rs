//! Pure helpers for chunked batch reads.

use std::collections::{HashMap, HashSet};

use crate::item::{record_id, record_string, Record};

/// Largest chunk accepted by a single multi-get or `IN (...)` filter.
pub const MAX_BATCH_SIZE: usize = 100;

/// Clamp a caller-supplied chunk size into `1..=MAX_BATCH_SIZE`.
pub fn clamp_chunk_size(chunk_size: usize) -> usize {
    chunk_size.clamp(1, MAX_BATCH_SIZE)
}

/// Split `values` into chunks of at most `chunk_size`, dropping repeats.
///
/// Multi-get requests reject duplicate keys, so each value is requested
/// once even if the caller listed it several times.
pub fn chunk_unique(values: &[String], chunk_size: usize) -> Vec<Vec<String>> {
    let mut seen = HashSet::new();
    let unique: Vec<String> = values
        .iter()
        .filter(|value| seen.insert(value.as_str()))
        .cloned()
        .collect();

    unique
        .chunks(clamp_chunk_size(chunk_size))
        .map(<[String]>::to_vec)
        .collect()
}

/// Order fetched records to match `ids`.
///
/// Missing ids are dropped rather than padded; an id listed twice yields
/// its record twice.
pub fn reorder_by_ids(ids: &[String], records: Vec<Record>) -> Vec<Record> {
    let by_id: HashMap<String, Record> = records
        .into_iter()
        .filter_map(|record| {
            let id = record_id(&record)?.to_string();
            Some((id, record))
        })
        .collect();

    ids.iter().filter_map(|id| by_id.get(id).cloned()).collect()
}

/// Group records by the value of `attribute`, one group per entry of
/// `values` in the same order. Values without matches get an empty group.
pub fn group_by_attribute(
    values: &[String],
    attribute: &str,
    records: Vec<Record>,
) -> Vec<Vec<Record>> {
    let mut groups: HashMap<String, Vec<Record>> = HashMap::new();
    for record in records {
        if let Some(value) = record_string(&record, attribute) {
            groups.entry(value.to_string()).or_default().push(record);
        }
    }

    values
        .iter()
        .map(|value| groups.get(value).cloned().unwrap_or_default())
        .collect()
}
