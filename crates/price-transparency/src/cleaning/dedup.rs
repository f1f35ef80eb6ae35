use super::schema::Record;
use std::collections::HashSet;

/// Keeps the first occurrence of each exact duplicate within one batch.
///
/// Returns the number of records removed. Duplicates spread across batches are
/// not detected.
pub fn drop_duplicates(records: &mut Vec<Record>) -> usize {
    let before = records.len();
    let mut seen: HashSet<Record> = HashSet::with_capacity(before);
    records.retain(|record| {
        if seen.contains(record) {
            false
        } else {
            seen.insert(record.clone());
            true
        }
    });
    before - records.len()
}
