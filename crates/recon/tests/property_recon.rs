// Property-based tests for the reconciliation pipeline.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::{BTreeMap, HashSet};

use proptest::prelude::*;
use seoaudit_recon::compare::classify;
use seoaudit_recon::config::{Coercion, ColumnMapping, ReconConfig};
use seoaudit_recon::matcher::match_records;
use seoaudit_recon::model::{
    CanonicalRecord, Classification, FieldValue, MatchResult, RawDataset, RawValue, WarningKind,
};
use seoaudit_recon::{normalize_url, run};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

const STRIP: &[&str] = &["utm_source", "utm_medium", "gclid"];

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// URLs in the shapes exports actually contain: mixed-case scheme and host,
/// optional port, trailing slashes, tracking parameters, fragments, and
/// scheme-less keys.
fn arb_url() -> impl Strategy<Value = String> {
    let scheme = prop_oneof![
        Just("http://".to_string()),
        Just("https://".to_string()),
        Just("HTTPS://".to_string()),
        Just(String::new()),
    ];
    let host = r"[a-zA-Z]{1,8}\.(com|org|COM)";
    let port = prop_oneof![
        3 => Just(String::new()),
        1 => Just(":80".to_string()),
        1 => Just(":443".to_string()),
        1 => Just(":8080".to_string()),
    ];
    let path = proptest::collection::vec(r"[a-zA-Z0-9_-]{0,6}", 0..4).prop_map(|segs| segs.join("/"));
    let trailing = prop_oneof![Just(""), Just("/"), Just("//")];
    let query = proptest::collection::vec(
        (prop_oneof![Just("a"), Just("b"), Just("q"), Just("utm_source"), Just("gclid")], r"[a-z0-9]{0,4}"),
        0..4,
    )
    .prop_map(|pairs| {
        if pairs.is_empty() {
            String::new()
        } else {
            let joined: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}={v}")).collect();
            format!("?{}", joined.join("&"))
        }
    });
    let fragment = prop_oneof![Just(String::new()), r"#[a-z]{1,5}"];

    (scheme, host, port, path, trailing, query, fragment).prop_map(
        |(scheme, host, port, path, trailing, query, fragment)| {
            format!("{scheme}{host}{port}/{path}{trailing}{query}{fragment}")
        },
    )
}

/// Cell value: mostly numeric, sometimes text, a null token, or empty.
fn arb_cell() -> impl Strategy<Value = RawValue> {
    prop_oneof![
        4 => r"-?[0-9]{1,5}(\.[0-9]{1,2})?".prop_map(|s| RawValue::Text(s)),
        1 => r"[a-z ]{1,8}".prop_map(|s| RawValue::Text(s)),
        1 => Just(RawValue::Text("NA".into())),
        1 => Just(RawValue::Empty),
    ]
}

fn arb_field_value() -> impl Strategy<Value = Option<FieldValue>> {
    prop_oneof![
        1 => Just(None),
        1 => Just(Some(FieldValue::Null)),
        3 => (-1000.0..1000.0f64).prop_map(|n| Some(FieldValue::Number(n))),
        2 => r" ?[a-c]{0,3} ?".prop_map(|s| Some(FieldValue::Text(s))),
        1 => prop::bool::ANY.prop_map(|b| Some(FieldValue::Bool(b))),
    ]
}

fn arb_tolerance() -> impl Strategy<Value = f64> {
    prop_oneof![
        3 => Just(0.0),
        1 => 0.001..100.0f64,
    ]
}

/// Records over a small key alphabet so duplicates are common.
fn arb_records(max: usize) -> impl Strategy<Value = Vec<CanonicalRecord>> {
    proptest::collection::vec(r"[a-d]{1,2}", 0..=max).prop_map(|keys| {
        keys.into_iter()
            .enumerate()
            .map(|(row, k)| CanonicalRecord {
                url_key: format!("a.com/{k}"),
                row,
                fields: BTreeMap::new(),
            })
            .collect()
    })
}

/// One raw export: `(url, traffic, title)` rows.
fn arb_rows(max: usize) -> impl Strategy<Value = Vec<(String, RawValue, RawValue)>> {
    proptest::collection::vec(
        (r"[a-e]{1,2}/?", arb_cell(), arb_cell()),
        0..=max,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .map(|(path, traffic, title)| (format!("https://a.com/{path}"), traffic, title))
            .collect()
    })
}

fn dataset(url_column: &str, rows: &[(String, RawValue, RawValue)]) -> RawDataset {
    let mut ds = RawDataset::new(vec![url_column.into(), "Traffic".into(), "Title".into()]);
    for (url, traffic, title) in rows {
        ds.push_row(vec![RawValue::Text(url.clone()), traffic.clone(), title.clone()])
            .unwrap();
    }
    ds
}

fn recon_config(precision: u32) -> ReconConfig {
    let mut config = ReconConfig::new(
        "prop",
        ColumnMapping::new("Address")
            .field("traffic", "Traffic", Some(Coercion::Number))
            .field("title", "Title", None),
        ColumnMapping::new("URL")
            .field("traffic", "Traffic", Some(Coercion::Number))
            .field("title", "Title", None),
    );
    config.output.precision = precision;
    config
}

fn mirror(c: Classification) -> Classification {
    match c {
        Classification::MissingLeft => Classification::MissingRight,
        Classification::MissingRight => Classification::MissingLeft,
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn url_normalization_is_idempotent(url in arb_url()) {
        if let Ok(once) = normalize_url(&url, STRIP) {
            let twice = normalize_url(&once, STRIP).unwrap();
            prop_assert_eq!(&once, &twice);
            prop_assert!(!once.contains('#'));
            prop_assert!(!once.contains("utm_source="));
            prop_assert!(!once.contains("gclid="));
        }
    }

    #[test]
    fn partition_is_total_and_disjoint(left in arb_records(8), right in arb_records(8)) {
        let left_rows: Vec<usize> = left.iter().map(|r| r.row).collect();
        let right_rows: Vec<usize> = right.iter().map(|r| r.row).collect();
        let results = match_records(left, right);

        let mut seen_left = Vec::new();
        let mut seen_right = Vec::new();
        let mut phase = 0;
        for r in &results {
            let rank = match r {
                MatchResult::Matched { left, right } => {
                    prop_assert_eq!(&left.url_key, &right.url_key);
                    seen_left.push(left.row);
                    seen_right.push(right.row);
                    0
                }
                MatchResult::LeftOnly { record } => {
                    seen_left.push(record.row);
                    1
                }
                MatchResult::RightOnly { record } => {
                    seen_right.push(record.row);
                    2
                }
            };
            prop_assert!(rank >= phase, "Matched, LeftOnly, RightOnly order violated");
            phase = rank;
        }

        seen_left.sort_unstable();
        seen_right.sort_unstable();
        prop_assert_eq!(seen_left, left_rows);
        prop_assert_eq!(seen_right, right_rows);

        let matched_keys: Vec<&str> = results.iter().filter(|r| r.is_matched()).map(|r| r.url_key()).collect();
        let distinct: HashSet<&str> = matched_keys.iter().copied().collect();
        prop_assert_eq!(matched_keys.len(), distinct.len());
    }

    #[test]
    fn classification_is_symmetric(
        l in arb_field_value(),
        r in arb_field_value(),
        tol in arb_tolerance(),
    ) {
        let forward = classify(l.as_ref(), r.as_ref(), tol);
        let backward = classify(r.as_ref(), l.as_ref(), tol);
        prop_assert_eq!(forward, mirror(backward));
        prop_assert_eq!(forward, classify(l.as_ref(), r.as_ref(), tol));
        if l.is_none() || r.is_none() {
            prop_assert_eq!(forward, Classification::Incomparable);
        }
    }

    #[test]
    fn run_is_deterministic(left in arb_rows(10), right in arb_rows(10)) {
        prop_assume!(!left.is_empty() || !right.is_empty());
        let config = recon_config(2);
        let a = run(dataset("Address", &left), dataset("URL", &right), &config).unwrap();
        let b = run(dataset("Address", &left), dataset("URL", &right), &config).unwrap();
        prop_assert_eq!(a.results, b.results);
        prop_assert_eq!(a.comparisons, b.comparisons);
        prop_assert_eq!(a.summary, b.summary);
        prop_assert_eq!(a.left_warnings, b.left_warnings);
    }

    #[test]
    fn summary_is_consistent(
        left in arb_rows(12),
        right in arb_rows(12),
        precision in 0u32..4,
    ) {
        prop_assume!(!left.is_empty() || !right.is_empty());
        let config = recon_config(precision);
        let out = run(dataset("Address", &left), dataset("URL", &right), &config).unwrap();
        let s = &out.summary;

        prop_assert_eq!(s.total_records, out.results.len());
        prop_assert_eq!(s.matched + s.left_only + s.right_only, s.total_records);
        prop_assert_eq!(out.comparisons.len(), s.matched);
        prop_assert!(s.fully_equal <= s.matched);
        prop_assert!((0.0..=100.0).contains(&s.match_rate_pct));

        // A dropped row always leaves a warning behind.
        let left_records = s.matched + s.left_only;
        let dropped = out
            .left_warnings
            .iter()
            .filter(|w| !matches!(w.kind, WarningKind::CoercionFailed { .. }))
            .count();
        prop_assert_eq!(left_records + dropped, left.len());

        let slack = 5.0 * 0.5 * 10f64.powi(-(precision as i32)) + 1e-9;
        for (field, fs) in &s.fields {
            prop_assert_eq!(fs.counts.total(), s.matched, "field {}", field);
            let pct_sum: f64 = fs.percentages.values().sum();
            prop_assert!((pct_sum - 100.0).abs() <= slack, "field {} sums to {}", field, pct_sum);
            if let Some(delta) = &fs.delta {
                prop_assert!(delta.min - 1e-9 <= delta.mean && delta.mean <= delta.max + 1e-9);
                prop_assert!(delta.mean_abs >= delta.mean.abs() - 1e-9);
            }
        }
    }
}
