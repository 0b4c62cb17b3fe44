use std::collections::HashMap;
use std::convert::Infallible;

use crate::engine::{check_cancel, CancelToken};
use crate::error::ReconError;
use crate::model::{CanonicalRecord, MatchResult};

/// Join two record sets by exact `url_key`.
///
/// Output order is part of the contract: Matched in left order, then
/// LeftOnly in left order, then RightOnly in right order. Each right record
/// is consumed at most once, so the partition is total and disjoint even
/// when a caller passes duplicate keys.
pub fn match_records(left: Vec<CanonicalRecord>, right: Vec<CanonicalRecord>) -> Vec<MatchResult> {
    match join(left, right, || Ok::<(), Infallible>(())) {
        Ok(results) => results,
        Err(never) => match never {},
    }
}

pub(crate) fn match_records_cancellable(
    left: Vec<CanonicalRecord>,
    right: Vec<CanonicalRecord>,
    cancel: Option<&CancelToken>,
) -> Result<Vec<MatchResult>, ReconError> {
    join(left, right, || check_cancel(cancel))
}

/// `checkpoint` runs before each left record; its first error aborts the
/// join with no partial results.
fn join<E>(
    left: Vec<CanonicalRecord>,
    right: Vec<CanonicalRecord>,
    mut checkpoint: impl FnMut() -> Result<(), E>,
) -> Result<Vec<MatchResult>, E> {
    // First occurrence wins; later duplicates stay unconsumed → RightOnly.
    let mut right_index: HashMap<String, usize> = HashMap::with_capacity(right.len());
    for (i, record) in right.iter().enumerate() {
        right_index.entry(record.url_key.clone()).or_insert(i);
    }

    let mut right_slots: Vec<Option<CanonicalRecord>> = right.into_iter().map(Some).collect();
    let mut matched = Vec::new();
    let mut left_only = Vec::new();

    for left_record in left {
        checkpoint()?;
        let partner = right_index
            .get(&left_record.url_key)
            .and_then(|&idx| right_slots[idx].take());
        match partner {
            Some(right_record) => matched.push(MatchResult::Matched {
                left: left_record,
                right: right_record,
            }),
            None => left_only.push(MatchResult::LeftOnly { record: left_record }),
        }
    }

    let right_only: Vec<MatchResult> = right_slots
        .into_iter()
        .flatten()
        .map(|record| MatchResult::RightOnly { record })
        .collect();

    log::debug!(
        "matched {} pair(s), {} left-only, {} right-only",
        matched.len(),
        left_only.len(),
        right_only.len(),
    );

    let mut results = matched;
    results.extend(left_only);
    results.extend(right_only);
    Ok(results)
}

/// The `(left, right)` pairs of all Matched results, in output order.
pub fn matched_pairs(
    results: &[MatchResult],
) -> impl Iterator<Item = (&CanonicalRecord, &CanonicalRecord)> {
    results.iter().filter_map(|r| match r {
        MatchResult::Matched { left, right } => Some((left, right)),
        _ => None,
    })
}
