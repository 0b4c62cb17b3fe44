use std::collections::{BTreeMap, HashMap};

use crate::config::{Coercion, ColumnMapping, FieldMapping, UrlConfig};
use crate::engine::{check_cancel, CancelToken};
use crate::error::ReconError;
use crate::model::{
    CanonicalRecord, FieldValue, NormalizationWarning, Normalized, RawDataset, RawValue,
    WarningKind,
};
use crate::url::KeyNormalizer;

/// Normalize a raw dataset into canonical records.
pub fn normalize(
    raw: RawDataset,
    schema: &ColumnMapping,
    urls: &UrlConfig,
) -> Result<Normalized, ReconError> {
    Normalizer::new(schema, urls).run(raw)
}

/// Configured normalizer for one source.
pub struct Normalizer<'a> {
    source: &'a str,
    schema: &'a ColumnMapping,
    urls: &'a UrlConfig,
    cancel: Option<&'a CancelToken>,
}

impl<'a> Normalizer<'a> {
    pub fn new(schema: &'a ColumnMapping, urls: &'a UrlConfig) -> Self {
        Self { source: "dataset", schema, urls, cancel: None }
    }

    /// Label used in errors and log lines.
    pub fn source(mut self, label: &'a str) -> Self {
        self.source = label;
        self
    }

    /// Abort with `ReconError::Cancelled` once `token` is set. Checked per row.
    pub fn cancel_on(mut self, token: &'a CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn run(self, raw: RawDataset) -> Result<Normalized, ReconError> {
        let url_idx = self.column(&raw, &self.schema.url_column)?;
        let mapped: Vec<(&FieldMapping, usize)> = self
            .schema
            .fields
            .iter()
            .map(|m| self.column(&raw, &m.column).map(|idx| (m, idx)))
            .collect::<Result<_, _>>()?;

        let null_tokens = &self.urls.null_tokens;
        let mut keys = KeyNormalizer::new(&self.urls.strip_params);
        let mut first_seen: HashMap<String, usize> = HashMap::new();
        let mut out = Normalized::default();

        for (row_idx, row) in raw.rows().iter().enumerate() {
            check_cancel(self.cancel)?;

            let Some(url_raw) = cell_text(&row[url_idx], null_tokens) else {
                out.warnings.push(NormalizationWarning { row: row_idx, kind: WarningKind::MissingUrl });
                continue;
            };

            let key = match keys.normalize(&url_raw) {
                Ok(key) => key,
                Err(e) => {
                    out.warnings.push(NormalizationWarning {
                        row: row_idx,
                        kind: WarningKind::InvalidUrl { value: url_raw, reason: e.to_string() },
                    });
                    continue;
                }
            };

            if let Some(&kept_row) = first_seen.get(&key) {
                out.warnings.push(NormalizationWarning {
                    row: row_idx,
                    kind: WarningKind::DuplicateKey { key, kept_row },
                });
                continue;
            }

            let mut fields = BTreeMap::new();
            for (mapping, idx) in &mapped {
                let cell = &row[*idx];
                let value = match coerce_cell(cell, mapping.coerce, null_tokens) {
                    Some(value) => value,
                    None => {
                        out.warnings.push(NormalizationWarning {
                            row: row_idx,
                            kind: WarningKind::CoercionFailed {
                                field: mapping.name.clone(),
                                value: raw_display(cell),
                                target: mapping.coerce.map(|c| c.to_string()).unwrap_or_default(),
                            },
                        });
                        FieldValue::Null
                    }
                };
                fields.insert(mapping.name.clone(), value);
            }

            first_seen.insert(key.clone(), row_idx);
            out.records.push(CanonicalRecord { url_key: key, row: row_idx, fields });
        }

        log::debug!(
            "normalized '{}': {} row(s) -> {} record(s), {} warning(s), {} distinct raw URL(s)",
            self.source,
            raw.len(),
            out.records.len(),
            out.warnings.len(),
            keys.cached(),
        );

        Ok(out)
    }

    fn column(&self, raw: &RawDataset, name: &str) -> Result<usize, ReconError> {
        raw.column_index(name).ok_or_else(|| ReconError::MissingColumn {
            source: self.source.into(),
            column: name.into(),
        })
    }
}

// ---------------------------------------------------------------------------
// Cell conversion
// ---------------------------------------------------------------------------

fn is_null_text(s: &str, null_tokens: &[String]) -> bool {
    let t = s.trim();
    t.is_empty() || null_tokens.iter().any(|tok| tok.trim().eq_ignore_ascii_case(t))
}

/// Cell as text, or `None` when the cell counts as empty.
fn cell_text(cell: &RawValue, null_tokens: &[String]) -> Option<String> {
    match cell {
        RawValue::Empty => None,
        RawValue::Text(s) if is_null_text(s, null_tokens) => None,
        RawValue::Text(s) => Some(s.clone()),
        RawValue::Number(n) => Some(format_number(*n)),
    }
}

fn raw_display(cell: &RawValue) -> String {
    match cell {
        RawValue::Empty => String::new(),
        RawValue::Text(s) => s.clone(),
        RawValue::Number(n) => n.to_string(),
    }
}

/// Convert one cell. `None` means coercion failed.
pub(crate) fn coerce_cell(
    cell: &RawValue,
    target: Option<Coercion>,
    null_tokens: &[String],
) -> Option<FieldValue> {
    match cell {
        RawValue::Empty => Some(FieldValue::Null),
        RawValue::Text(s) if is_null_text(s, null_tokens) => Some(FieldValue::Null),
        RawValue::Text(s) => match target {
            None | Some(Coercion::String) => Some(FieldValue::Text(s.clone())),
            Some(Coercion::Number) => parse_number(s).map(FieldValue::Number),
            Some(Coercion::Percent) => parse_percent(s).map(FieldValue::Number),
            Some(Coercion::Boolean) => parse_bool(s).map(FieldValue::Bool),
        },
        RawValue::Number(n) if !n.is_finite() => None,
        RawValue::Number(n) => match target {
            None | Some(Coercion::Number) | Some(Coercion::Percent) => Some(FieldValue::Number(*n)),
            Some(Coercion::String) => Some(FieldValue::Text(format_number(*n))),
            Some(Coercion::Boolean) => {
                if *n == 0.0 {
                    Some(FieldValue::Bool(false))
                } else if *n == 1.0 {
                    Some(FieldValue::Bool(true))
                } else {
                    None
                }
            }
        },
    }
}

/// Parse a metric number: `1234`, `-5.5`, `1,234.5`, `$12`, accounting
/// `(12)`. Commas group thousands.
pub fn parse_number(s: &str) -> Option<f64> {
    parse_metric(s, false)
}

/// Parse a percentage: optional trailing `%`, and a lone comma with no dot
/// is a decimal comma (`12,5%` → 12.5).
pub fn parse_percent(s: &str) -> Option<f64> {
    let t = s.trim();
    parse_metric(t.strip_suffix('%').unwrap_or(t), true)
}

/// Number grammar shared by `parse_number` and `parse_percent`.
/// Anything that does not fit, or overflows to infinity, is `None`.
fn parse_metric(s: &str, decimal_comma: bool) -> Option<f64> {
    let t = s.trim();
    let (negate, body) = match t.strip_prefix('(').and_then(|b| b.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, t),
    };
    let comma_is_decimal = decimal_comma && body.matches(',').count() == 1 && !body.contains('.');

    let mut digits = String::with_capacity(body.len());
    for c in body.chars() {
        match c {
            '0'..='9' | '.' => digits.push(c),
            ',' if comma_is_decimal => digits.push('.'),
            ',' | '$' => {}
            c if c.is_whitespace() => {}
            '-' | '+' if digits.is_empty() && !negate => digits.push(c),
            _ => return None,
        }
    }

    let value: f64 = digits.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negate { -value } else { value })
}

pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// Integral values print without a fractional part (`200`, not `200.0`).
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
