use std::collections::BTreeSet;
use std::convert::Infallible;

use crate::config::{ReconConfig, ToleranceConfig};
use crate::engine::{check_cancel, CancelToken};
use crate::error::ReconError;
use crate::model::{CanonicalRecord, Classification, FieldComparison, FieldValue};

/// Compare every matched pair on `fields`.
///
/// Returns one list per pair, with one entry per field in `fields` order.
pub fn compare<'a, I>(
    pairs: I,
    fields: &BTreeSet<String>,
    tolerance: &ToleranceConfig,
) -> Vec<Vec<FieldComparison>>
where
    I: IntoIterator<Item = (&'a CanonicalRecord, &'a CanonicalRecord)>,
{
    match compare_each(pairs, fields, tolerance, || Ok::<(), Infallible>(())) {
        Ok(comparisons) => comparisons,
        Err(never) => match never {},
    }
}

pub(crate) fn compare_cancellable<'a, I>(
    pairs: I,
    fields: &BTreeSet<String>,
    tolerance: &ToleranceConfig,
    cancel: Option<&CancelToken>,
) -> Result<Vec<Vec<FieldComparison>>, ReconError>
where
    I: IntoIterator<Item = (&'a CanonicalRecord, &'a CanonicalRecord)>,
{
    compare_each(pairs, fields, tolerance, || check_cancel(cancel))
}

/// `checkpoint` runs before each pair; its first error aborts the whole
/// comparison.
fn compare_each<'a, I, E>(
    pairs: I,
    fields: &BTreeSet<String>,
    tolerance: &ToleranceConfig,
    mut checkpoint: impl FnMut() -> Result<(), E>,
) -> Result<Vec<Vec<FieldComparison>>, E>
where
    I: IntoIterator<Item = (&'a CanonicalRecord, &'a CanonicalRecord)>,
{
    let mut out = Vec::new();
    for (left, right) in pairs {
        checkpoint()?;
        out.push(compare_pair(left, right, fields, tolerance));
    }
    Ok(out)
}

pub fn compare_pair(
    left: &CanonicalRecord,
    right: &CanonicalRecord,
    fields: &BTreeSet<String>,
    tolerance: &ToleranceConfig,
) -> Vec<FieldComparison> {
    fields
        .iter()
        .map(|field| {
            compare_field(
                field,
                left.fields.get(field),
                right.fields.get(field),
                tolerance.for_field(field),
            )
        })
        .collect()
}

/// Compare one field. `None` means the side's schema lacks the field.
pub fn compare_field(
    field: &str,
    left: Option<&FieldValue>,
    right: Option<&FieldValue>,
    tolerance: f64,
) -> FieldComparison {
    let delta = match (left, right) {
        (Some(FieldValue::Number(l)), Some(FieldValue::Number(r))) => Some(r - l),
        _ => None,
    };
    FieldComparison {
        field: field.to_string(),
        left: left.cloned(),
        right: right.cloned(),
        classification: classify(left, right, tolerance),
        delta,
    }
}

/// Pure function of (schema presence, left value, right value, tolerance).
pub fn classify(left: Option<&FieldValue>, right: Option<&FieldValue>, tolerance: f64) -> Classification {
    let (l, r) = match (left, right) {
        (Some(l), Some(r)) => (l, r),
        _ => return Classification::Incomparable,
    };

    match (l, r) {
        (FieldValue::Null, FieldValue::Null) => Classification::Equal,
        (FieldValue::Null, _) => Classification::MissingLeft,
        (_, FieldValue::Null) => Classification::MissingRight,
        (FieldValue::Number(a), FieldValue::Number(b)) => {
            if numbers_equal(*a, *b, tolerance) {
                Classification::Equal
            } else {
                Classification::DifferentValue
            }
        }
        (FieldValue::Text(a), FieldValue::Text(b)) => {
            if a.trim() == b.trim() {
                Classification::Equal
            } else {
                Classification::DifferentValue
            }
        }
        (FieldValue::Bool(a), FieldValue::Bool(b)) => {
            if a == b {
                Classification::Equal
            } else {
                Classification::DifferentValue
            }
        }
        _ => Classification::DifferentValue,
    }
}

/// Zero tolerance is exact equality. A nonzero tolerance is inclusive at
/// its boundary: 10.1 vs 10.0 at 0.1 is equal even though the f64
/// difference lands a hair above 0.1.
fn numbers_equal(l: f64, r: f64, tolerance: f64) -> bool {
    if tolerance == 0.0 {
        return l == r;
    }
    let delta = (l - r).abs();
    let scale = 1.0_f64.max(l.abs()).max(r.abs()).max(tolerance);
    delta <= tolerance + f64::EPSILON * 16.0 * scale
}

/// Fields a run compares: `output.compare` if set, else the union of both
/// sources' canonical fields.
pub fn fields_to_compare(config: &ReconConfig) -> BTreeSet<String> {
    match &config.output.compare {
        Some(list) => list.iter().cloned().collect(),
        None => config
            .left
            .columns
            .field_names()
            .chain(config.right.columns.field_names())
            .map(str::to_string)
            .collect(),
    }
}
