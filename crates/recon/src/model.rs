use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One cell as handed over by the loading collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Number(f64),
    Empty,
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            RawValue::Empty
        } else {
            RawValue::Text(s.to_string())
        }
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        RawValue::Number(n)
    }
}

/// A source export: ordered headers plus rows with one cell per header.
#[derive(Debug, Clone, Default)]
pub struct RawDataset {
    columns: Vec<String>,
    rows: Vec<Vec<RawValue>>,
}

impl RawDataset {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    /// Append a row. Rows must have exactly one cell per header.
    pub fn push_row(&mut self, row: Vec<RawValue>) -> Result<(), ReconError> {
        if row.len() != self.columns.len() {
            return Err(ReconError::RaggedRow {
                row: self.rows.len(),
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<RawValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

// ---------------------------------------------------------------------------
// Canonical records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Null,
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Null => Ok(()),
        }
    }
}

/// A normalized row keyed by its canonical URL.
///
/// `fields` holds every canonical field configured for the source, so its
/// key set is the source's canonical schema. Nulls are present as
/// `FieldValue::Null`; a missing key means the schema lacks the field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRecord {
    pub url_key: String,
    /// Zero-based index of the source row.
    pub row: usize,
    pub fields: BTreeMap<String, FieldValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizationWarning {
    pub row: usize,
    #[serde(flatten)]
    pub kind: WarningKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WarningKind {
    /// A cell could not be coerced; the field was set to null.
    CoercionFailed { field: String, value: String, target: String },
    /// The row's key collides with an earlier row; this row was discarded.
    DuplicateKey { key: String, kept_row: usize },
    /// The URL cell could not be normalized; the row was discarded.
    InvalidUrl { value: String, reason: String },
    /// The URL cell is empty; the row was discarded.
    MissingUrl,
}

impl std::fmt::Display for NormalizationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            WarningKind::CoercionFailed { field, value, target } => write!(
                f,
                "row {}: field '{field}': cannot read '{value}' as {target}, set to null",
                self.row
            ),
            WarningKind::DuplicateKey { key, kept_row } => write!(
                f,
                "row {}: duplicate key '{key}' (first seen in row {kept_row}), row discarded",
                self.row
            ),
            WarningKind::InvalidUrl { value, reason } => {
                write!(f, "row {}: invalid URL '{value}' ({reason}), row discarded", self.row)
            }
            WarningKind::MissingUrl => write!(f, "row {}: empty URL, row discarded", self.row),
        }
    }
}

/// Normalizer output for one source.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub records: Vec<CanonicalRecord>,
    pub warnings: Vec<NormalizationWarning>,
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchResult {
    Matched {
        left: CanonicalRecord,
        right: CanonicalRecord,
    },
    LeftOnly {
        record: CanonicalRecord,
    },
    RightOnly {
        record: CanonicalRecord,
    },
}

impl MatchResult {
    pub fn url_key(&self) -> &str {
        match self {
            Self::Matched { left, .. } => &left.url_key,
            Self::LeftOnly { record } | Self::RightOnly { record } => &record.url_key,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Matched { .. } => "matched",
            Self::LeftOnly { .. } => "left_only",
            Self::RightOnly { .. } => "right_only",
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Equal,
    DifferentValue,
    MissingLeft,
    MissingRight,
    Incomparable,
}

impl Classification {
    pub const ALL: [Classification; 5] = [
        Classification::Equal,
        Classification::DifferentValue,
        Classification::MissingLeft,
        Classification::MissingRight,
        Classification::Incomparable,
    ];
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Equal => write!(f, "equal"),
            Self::DifferentValue => write!(f, "different_value"),
            Self::MissingLeft => write!(f, "missing_left"),
            Self::MissingRight => write!(f, "missing_right"),
            Self::Incomparable => write!(f, "incomparable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldComparison {
    pub field: String,
    /// `None` when the left schema lacks the field.
    pub left: Option<FieldValue>,
    /// `None` when the right schema lacks the field.
    pub right: Option<FieldValue>,
    pub classification: Classification,
    /// right - left, only when both sides are numbers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassificationCounts {
    pub equal: usize,
    pub different_value: usize,
    pub missing_left: usize,
    pub missing_right: usize,
    pub incomparable: usize,
}

impl ClassificationCounts {
    pub fn get(&self, c: Classification) -> usize {
        match c {
            Classification::Equal => self.equal,
            Classification::DifferentValue => self.different_value,
            Classification::MissingLeft => self.missing_left,
            Classification::MissingRight => self.missing_right,
            Classification::Incomparable => self.incomparable,
        }
    }

    pub fn bump(&mut self, c: Classification) {
        match c {
            Classification::Equal => self.equal += 1,
            Classification::DifferentValue => self.different_value += 1,
            Classification::MissingLeft => self.missing_left += 1,
            Classification::MissingRight => self.missing_right += 1,
            Classification::Incomparable => self.incomparable += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.equal + self.different_value + self.missing_left + self.missing_right + self.incomparable
    }
}

/// Distribution of numeric deltas for one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeltaStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub mean_abs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSummary {
    pub counts: ClassificationCounts,
    /// Share of this field's comparisons per classification, in percent.
    pub percentages: BTreeMap<Classification, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<DeltaStats>,
}

/// How often each text or boolean value occurs on each side of one field.
/// Counted over every record of that side, matched or not.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValueCounts {
    pub left: BTreeMap<String, usize>,
    pub right: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonSummary {
    pub total_records: usize,
    pub matched: usize,
    pub left_only: usize,
    pub right_only: usize,
    /// matched / total_records, in percent.
    pub match_rate_pct: f64,
    /// Matched pairs where every compared field is Equal.
    pub fully_equal: usize,
    pub fields: BTreeMap<String, FieldSummary>,
    /// Value distributions for fields holding text or booleans.
    pub values: BTreeMap<String, ValueCounts>,
}

/// Everything a reconciliation run produces.
#[derive(Debug, Clone, Serialize)]
pub struct ReconOutput {
    pub left_warnings: Vec<NormalizationWarning>,
    pub right_warnings: Vec<NormalizationWarning>,
    /// Compared fields, in the order used by each comparison list.
    pub fields: Vec<String>,
    pub results: Vec<MatchResult>,
    /// One list per `Matched` entry of `results`, in the same order.
    pub comparisons: Vec<Vec<FieldComparison>>,
    pub summary: ComparisonSummary,
}

impl ReconOutput {
    /// Matched results zipped with their field comparisons.
    pub fn matched_with_comparisons(
        &self,
    ) -> impl Iterator<Item = (&MatchResult, &[FieldComparison])> {
        self.results
            .iter()
            .filter(|r| r.is_matched())
            .zip(self.comparisons.iter().map(|c| c.as_slice()))
    }

    pub fn to_json_pretty(&self) -> Result<String, ReconError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ReconError::Io(format!("JSON serialization error: {e}")))
    }
}
