use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::compare::{compare_cancellable, fields_to_compare};
use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::matcher::{match_records_cancellable, matched_pairs};
use crate::model::{RawDataset, RawValue, ReconOutput};
use crate::normalize::Normalizer;
use crate::summary::summarize;

/// Cooperative cancellation flag. Set it from any thread to stop a run.
pub type CancelToken = Arc<AtomicBool>;

pub(crate) fn check_cancel(cancel: Option<&CancelToken>) -> Result<(), ReconError> {
    match cancel {
        Some(token) if token.load(Ordering::Relaxed) => Err(ReconError::Cancelled),
        _ => Ok(()),
    }
}

/// Run one reconciliation: normalize both sides, match, compare, summarize.
pub fn run(left: RawDataset, right: RawDataset, config: &ReconConfig) -> Result<ReconOutput, ReconError> {
    run_inner(left, right, config, None)
}

/// Like [`run`], but returns `ReconError::Cancelled` once `cancel` is set.
pub fn run_cancellable(
    left: RawDataset,
    right: RawDataset,
    config: &ReconConfig,
    cancel: &CancelToken,
) -> Result<ReconOutput, ReconError> {
    run_inner(left, right, config, Some(cancel))
}

fn run_inner(
    left: RawDataset,
    right: RawDataset,
    config: &ReconConfig,
    cancel: Option<&CancelToken>,
) -> Result<ReconOutput, ReconError> {
    config.validate()?;
    if left.is_empty() && right.is_empty() {
        return Err(ReconError::EmptyInput);
    }

    let left_label = config.left.label_or("left");
    let right_label = config.right.label_or("right");
    log::info!(
        "reconciling '{}': {} {} row(s) vs {} {} row(s)",
        config.name,
        left.len(),
        left_label,
        right.len(),
        right_label,
    );

    let left_norm = normalize_side(left, config, left_label, true, cancel)?;
    let right_norm = normalize_side(right, config, right_label, false, cancel)?;

    let results = match_records_cancellable(left_norm.records, right_norm.records, cancel)?;

    let fields = fields_to_compare(config);
    let comparisons = compare_cancellable(matched_pairs(&results), &fields, &config.tolerance, cancel)?;
    let summary = summarize(&results, &comparisons, config);

    log::info!(
        "'{}': {} matched, {} {}-only, {} {}-only, match rate {}%",
        config.name,
        summary.matched,
        summary.left_only,
        left_label,
        summary.right_only,
        right_label,
        summary.match_rate_pct,
    );

    Ok(ReconOutput {
        left_warnings: left_norm.warnings,
        right_warnings: right_norm.warnings,
        fields: fields.into_iter().collect(),
        results,
        comparisons,
        summary,
    })
}

fn normalize_side(
    raw: RawDataset,
    config: &ReconConfig,
    label: &str,
    is_left: bool,
    cancel: Option<&CancelToken>,
) -> Result<crate::model::Normalized, ReconError> {
    let source = if is_left { &config.left } else { &config.right };
    let mut normalizer = Normalizer::new(&source.columns, &config.urls).source(label);
    if let Some(token) = cancel {
        normalizer = normalizer.cancel_on(token);
    }
    let out = normalizer.run(raw)?;
    if !out.warnings.is_empty() {
        log::warn!("{}: {} row warning(s)", label, out.warnings.len());
    }
    Ok(out)
}

/// Load a CSV export into a raw dataset. Every non-empty cell is kept as text;
/// typing happens in the normalizer.
pub fn load_csv(source: &str, csv_data: &str) -> Result<RawDataset, ReconError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ReconError::Io(format!("{source}: {e}")))?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            // Spreadsheet exports often start with a UTF-8 BOM.
            let h = if i == 0 { h.trim_start_matches('\u{feff}') } else { h };
            h.trim().to_string()
        })
        .collect();

    let mut dataset = RawDataset::new(headers);
    for record in reader.records() {
        let record = record.map_err(|e| ReconError::Io(format!("{source}: {e}")))?;
        dataset.push_row(record.iter().map(RawValue::from).collect())?;
    }

    Ok(dataset)
}
