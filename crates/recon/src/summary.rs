use std::collections::{BTreeMap, HashMap};

use crate::config::{ColumnMapping, ReconConfig};
use crate::model::{
    CanonicalRecord, Classification, ClassificationCounts, ComparisonSummary, DeltaStats,
    FieldComparison, FieldSummary, FieldValue, MatchResult, ValueCounts,
};

/// Aggregate match results and field comparisons.
///
/// `comparisons` holds one list per Matched entry of `results`. Counts are
/// exact; only the percentages are rounded, to `output.precision` decimals.
pub fn summarize(
    results: &[MatchResult],
    comparisons: &[Vec<FieldComparison>],
    config: &ReconConfig,
) -> ComparisonSummary {
    let precision = config.output.precision;
    let mut matched = 0;
    let mut left_only = 0;
    let mut right_only = 0;
    for result in results {
        match result {
            MatchResult::Matched { .. } => matched += 1,
            MatchResult::LeftOnly { .. } => left_only += 1,
            MatchResult::RightOnly { .. } => right_only += 1,
        }
    }
    let total_records = results.len();

    let mut counts: BTreeMap<&str, ClassificationCounts> = BTreeMap::new();
    let mut deltas: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    let mut fully_equal = 0;

    for pair in comparisons {
        if pair.iter().all(|c| c.classification == Classification::Equal) {
            fully_equal += 1;
        }
        for c in pair {
            counts.entry(c.field.as_str()).or_default().bump(c.classification);
            if let Some(d) = c.delta {
                deltas.entry(c.field.as_str()).or_default().push(d);
            }
        }
    }

    let fields = counts
        .into_iter()
        .map(|(field, counts)| {
            let total = counts.total();
            let percentages = Classification::ALL
                .iter()
                .map(|&c| (c, round_to(percent(counts.get(c), total), precision)))
                .collect();
            let delta = deltas.get(field).and_then(|d| delta_stats(d));
            (field.to_string(), FieldSummary { counts, percentages, delta })
        })
        .collect();

    ComparisonSummary {
        total_records,
        matched,
        left_only,
        right_only,
        match_rate_pct: round_to(percent(matched, total_records), precision),
        fully_equal,
        fields,
        values: value_counts(results, &config.left.columns, &config.right.columns),
    }
}

// ---------------------------------------------------------------------------
// Value distributions
// ---------------------------------------------------------------------------

/// Per-side counts of every text or boolean value, over all records.
/// Numbers and nulls are not counted. Fields mapped with `split` count
/// each trimmed, non-empty part separately.
pub fn value_counts(
    results: &[MatchResult],
    left: &ColumnMapping,
    right: &ColumnMapping,
) -> BTreeMap<String, ValueCounts> {
    let left_splits = split_rules(left);
    let right_splits = split_rules(right);
    let mut values = BTreeMap::new();

    for result in results {
        match result {
            MatchResult::Matched { left, right } => {
                tally(&mut values, left, &left_splits, true);
                tally(&mut values, right, &right_splits, false);
            }
            MatchResult::LeftOnly { record } => tally(&mut values, record, &left_splits, true),
            MatchResult::RightOnly { record } => tally(&mut values, record, &right_splits, false),
        }
    }
    values
}

fn split_rules(mapping: &ColumnMapping) -> HashMap<&str, &str> {
    mapping
        .fields
        .iter()
        .filter_map(|f| f.split.as_deref().map(|sep| (f.name.as_str(), sep)))
        .collect()
}

fn tally(
    values: &mut BTreeMap<String, ValueCounts>,
    record: &CanonicalRecord,
    splits: &HashMap<&str, &str>,
    is_left: bool,
) {
    for (field, value) in &record.fields {
        let text = match value {
            FieldValue::Text(s) => s.as_str(),
            FieldValue::Bool(true) => "true",
            FieldValue::Bool(false) => "false",
            FieldValue::Number(_) | FieldValue::Null => continue,
        };
        let entry = values.entry(field.clone()).or_default();
        let side = if is_left { &mut entry.left } else { &mut entry.right };

        let parts: Vec<&str> = match splits.get(field.as_str()) {
            Some(sep) => text.split(*sep).collect(),
            None => vec![text],
        };
        for part in parts.into_iter().map(str::trim).filter(|p| !p.is_empty()) {
            *side.entry(part.to_string()).or_insert(0) += 1;
        }
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

fn delta_stats(deltas: &[f64]) -> Option<DeltaStats> {
    if deltas.is_empty() {
        return None;
    }
    let n = deltas.len() as f64;
    let min = deltas.iter().copied().fold(f64::INFINITY, f64::min);
    let max = deltas.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = deltas.iter().sum::<f64>() / n;
    let mean_abs = deltas.iter().map(|d| d.abs()).sum::<f64>() / n;
    Some(DeltaStats { count: deltas.len(), min, max, mean, mean_abs })
}

/// Round half away from zero to `precision` decimals.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(key: &str) -> CanonicalRecord {
        CanonicalRecord { url_key: key.into(), row: 0, fields: BTreeMap::new() }
    }

    fn config(precision: u32) -> ReconConfig {
        let mut config = ReconConfig::new("summary", ColumnMapping::new("URL"), ColumnMapping::new("URL"));
        config.output.precision = precision;
        config
    }

    fn rec_with(key: &str, fields: &[(&str, FieldValue)]) -> CanonicalRecord {
        CanonicalRecord {
            url_key: key.into(),
            row: 0,
            fields: fields.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        }
    }

    fn cmp(field: &str, classification: Classification, delta: Option<f64>) -> FieldComparison {
        FieldComparison {
            field: field.into(),
            left: Some(FieldValue::Null),
            right: Some(FieldValue::Null),
            classification,
            delta,
        }
    }

    #[test]
    fn one_of_each_status() {
        let results = vec![
            MatchResult::Matched { left: rec("x"), right: rec("x") },
            MatchResult::LeftOnly { record: rec("y") },
            MatchResult::RightOnly { record: rec("z") },
        ];
        let comparisons = vec![vec![cmp("status_code", Classification::Equal, Some(0.0))]];
        let s = summarize(&results, &comparisons, &config(2));
        assert_eq!(s.total_records, 3);
        assert_eq!((s.matched, s.left_only, s.right_only), (1, 1, 1));
        assert_eq!(s.match_rate_pct, 33.33);
        assert_eq!(s.fully_equal, 1);
        assert_eq!(s.fields["status_code"].counts.equal, 1);
        assert_eq!(s.fields["status_code"].percentages[&Classification::Equal], 100.0);
    }

    #[test]
    fn empty_run_has_zero_rate() {
        let s = summarize(&[], &[], &config(2));
        assert_eq!(s.total_records, 0);
        assert_eq!(s.match_rate_pct, 0.0);
        assert!(s.fields.is_empty());
        assert!(s.values.is_empty());
    }

    #[test]
    fn per_field_counts_and_percentages() {
        let results = vec![
            MatchResult::Matched { left: rec("a"), right: rec("a") },
            MatchResult::Matched { left: rec("b"), right: rec("b") },
            MatchResult::Matched { left: rec("c"), right: rec("c") },
        ];
        let comparisons = vec![
            vec![cmp("traffic", Classification::Equal, Some(0.0)), cmp("title", Classification::Equal, None)],
            vec![cmp("traffic", Classification::DifferentValue, Some(89.0)), cmp("title", Classification::Equal, None)],
            vec![cmp("traffic", Classification::MissingLeft, None), cmp("title", Classification::Incomparable, None)],
        ];
        let s = summarize(&results, &comparisons, &config(1));
        assert_eq!(s.match_rate_pct, 100.0);
        assert_eq!(s.fully_equal, 1);

        let traffic = &s.fields["traffic"];
        assert_eq!(traffic.counts.total(), 3);
        assert_eq!(traffic.counts.different_value, 1);
        assert_eq!(traffic.percentages[&Classification::Equal], 33.3);
        assert_eq!(traffic.percentages[&Classification::MissingRight], 0.0);
        let delta = traffic.delta.as_ref().unwrap();
        assert_eq!(delta.count, 2);
        assert_eq!(delta.min, 0.0);
        assert_eq!(delta.max, 89.0);
        assert_eq!(delta.mean, 44.5);

        let title = &s.fields["title"];
        assert_eq!(title.percentages[&Classification::Equal], 66.7);
        assert!(title.delta.is_none());
    }

    #[test]
    fn mean_abs_ignores_sign() {
        let stats = delta_stats(&[-4.0, 2.0]).unwrap();
        assert_eq!(stats.mean, -1.0);
        assert_eq!(stats.mean_abs, 3.0);
        assert_eq!(stats.min, -4.0);
    }

    #[test]
    fn value_counts_cover_both_sides_and_unmatched_records() {
        let text = |s: &str| FieldValue::Text(s.into());
        let results = vec![
            MatchResult::Matched {
                left: rec_with("a", &[("indexability", text("Indexable")), ("status", FieldValue::Number(200.0))]),
                right: rec_with("a", &[("indexability", text("Indexable"))]),
            },
            MatchResult::LeftOnly {
                record: rec_with("b", &[("indexability", text("Non-Indexable")), ("status", FieldValue::Number(301.0))]),
            },
            MatchResult::LeftOnly { record: rec_with("c", &[("indexability", FieldValue::Null)]) },
            MatchResult::RightOnly { record: rec_with("d", &[("in_sitemap", FieldValue::Bool(false))]) },
        ];
        let values = value_counts(&results, &ColumnMapping::new("URL"), &ColumnMapping::new("URL"));

        assert_eq!(values.keys().collect::<Vec<_>>(), vec!["in_sitemap", "indexability"]);
        let idx = &values["indexability"];
        assert_eq!(idx.left, BTreeMap::from([("Indexable".to_string(), 1), ("Non-Indexable".to_string(), 1)]));
        assert_eq!(idx.right, BTreeMap::from([("Indexable".to_string(), 1)]));
        assert!(values["in_sitemap"].left.is_empty());
        assert_eq!(values["in_sitemap"].right["false"], 1);
    }

    #[test]
    fn split_fields_count_each_part() {
        let mut left = ColumnMapping::new("URL").field("category", "Issue category", None);
        left.fields[0].split = Some(",".into());
        let right = ColumnMapping::new("URL").field("category", "Issue category", None);

        let text = |s: &str| FieldValue::Text(s.into());
        let results = vec![
            MatchResult::Matched {
                left: rec_with("a", &[("category", text("Links, Meta tags"))]),
                right: rec_with("a", &[("category", text("Links, Meta tags"))]),
            },
            MatchResult::LeftOnly { record: rec_with("b", &[("category", text("Links,,"))]) },
        ];
        let values = value_counts(&results, &left, &right);
        let category = &values["category"];
        assert_eq!(category.left, BTreeMap::from([("Links".to_string(), 2), ("Meta tags".to_string(), 1)]));
        assert_eq!(category.right, BTreeMap::from([("Links, Meta tags".to_string(), 1)]));
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(33.3333, 2), 33.33);
        assert_eq!(round_to(66.6666, 2), 66.67);
        assert_eq!(round_to(12.5, 0), 13.0);
        assert_eq!(round_to(2.0 / 3.0 * 100.0, 0), 67.0);
    }
}
