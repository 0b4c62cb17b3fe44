use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    pub name: String,
    pub left: SourceConfig,
    pub right: SourceConfig,
    #[serde(default)]
    pub urls: UrlConfig,
    #[serde(default)]
    pub tolerance: ToleranceConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// One side of the reconciliation: where its export lives and how its
/// columns map onto canonical fields.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Display label, e.g. "crawl" or "semrush".
    #[serde(default)]
    pub label: Option<String>,
    /// CSV path, resolved by the loading collaborator. The engine never reads it.
    #[serde(default)]
    pub file: Option<String>,
    #[serde(flatten)]
    pub columns: ColumnMapping,
}

impl SourceConfig {
    pub fn new(columns: ColumnMapping) -> Self {
        Self { label: None, file: None, columns }
    }

    pub fn label_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.label.as_deref().unwrap_or(fallback)
    }
}

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnMapping {
    /// Raw column holding the page URL.
    pub url_column: String,
    #[serde(default)]
    pub fields: Vec<FieldMapping>,
}

impl ColumnMapping {
    pub fn new(url_column: impl Into<String>) -> Self {
        Self { url_column: url_column.into(), fields: Vec::new() }
    }

    /// Builder helper: map `column` onto canonical field `name`.
    pub fn field(mut self, name: &str, column: &str, coerce: Option<Coercion>) -> Self {
        self.fields.push(FieldMapping {
            name: name.into(),
            column: column.into(),
            coerce,
            split: None,
        });
        self
    }

    /// Canonical field names, in mapping order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldMapping {
    /// Canonical field name shared by both sources.
    pub name: String,
    /// Raw column name in this source's export.
    pub column: String,
    #[serde(default)]
    pub coerce: Option<Coercion>,
    /// Multi-valued text (`"Links, Meta"`): each `split`-separated part is
    /// counted on its own in the value distributions.
    #[serde(default)]
    pub split: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coercion {
    Number,
    String,
    Boolean,
    /// Number with an optional trailing `%` and an optional decimal comma.
    Percent,
}

impl std::fmt::Display for Coercion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number => write!(f, "number"),
            Self::String => write!(f, "string"),
            Self::Boolean => write!(f, "boolean"),
            Self::Percent => write!(f, "percent"),
        }
    }
}

// ---------------------------------------------------------------------------
// URL normalization
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct UrlConfig {
    /// Query parameters removed before keys are compared.
    #[serde(default = "default_strip_params")]
    pub strip_params: Vec<String>,
    /// Cell values treated as empty (compared case-insensitively after trimming).
    #[serde(default = "default_null_tokens")]
    pub null_tokens: Vec<String>,
}

impl Default for UrlConfig {
    fn default() -> Self {
        Self {
            strip_params: default_strip_params(),
            null_tokens: default_null_tokens(),
        }
    }
}

fn default_strip_params() -> Vec<String> {
    [
        "utm_source",
        "utm_medium",
        "utm_campaign",
        "utm_term",
        "utm_content",
        "gclid",
        "fbclid",
        "msclkid",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_null_tokens() -> Vec<String> {
    ["", "NA", "N/A", "null", "-"].iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Tolerance + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToleranceConfig {
    /// Absolute tolerance for numeric fields. 0 means exact.
    #[serde(default)]
    pub numeric: f64,
    /// Per-field overrides of `numeric`.
    #[serde(default)]
    pub fields: BTreeMap<String, f64>,
}

impl ToleranceConfig {
    pub fn for_field(&self, field: &str) -> f64 {
        self.fields.get(field).copied().unwrap_or(self.numeric)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Decimal places for percentages.
    #[serde(default = "default_precision")]
    pub precision: u32,
    /// Fields to compare. Defaults to the union of both schemas.
    #[serde(default)]
    pub compare: Option<Vec<String>>,
    #[serde(default)]
    pub json: Option<String>,
    #[serde(default)]
    pub csv: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            precision: default_precision(),
            compare: None,
            json: None,
            csv: None,
        }
    }
}

fn default_precision() -> u32 {
    2
}

const MAX_PRECISION: u32 = 10;

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    /// Config with default URL, tolerance and output settings.
    pub fn new(name: impl Into<String>, left: ColumnMapping, right: ColumnMapping) -> Self {
        Self {
            name: name.into(),
            left: SourceConfig::new(left),
            right: SourceConfig::new(right),
            urls: UrlConfig::default(),
            tolerance: ToleranceConfig::default(),
            output: OutputConfig::default(),
        }
    }

    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        validate_source("left", &self.left)?;
        validate_source("right", &self.right)?;

        check_tolerance("tolerance.numeric", self.tolerance.numeric)?;
        for (field, tol) in &self.tolerance.fields {
            check_tolerance(&format!("tolerance.fields.{field}"), *tol)?;
        }

        if self.output.precision > MAX_PRECISION {
            return Err(ReconError::ConfigValidation(format!(
                "output.precision must be at most {MAX_PRECISION}, got {}",
                self.output.precision
            )));
        }

        if let Some(compare) = &self.output.compare {
            let mut seen = HashSet::new();
            for field in compare {
                if !seen.insert(field.as_str()) {
                    return Err(ReconError::ConfigValidation(format!(
                        "output.compare lists '{field}' more than once"
                    )));
                }
            }
        }

        Ok(())
    }
}

fn validate_source(side: &str, source: &SourceConfig) -> Result<(), ReconError> {
    if source.columns.url_column.trim().is_empty() {
        return Err(ReconError::ConfigValidation(format!(
            "{side}: url_column must not be empty"
        )));
    }

    let mut seen = HashSet::new();
    for mapping in &source.columns.fields {
        if mapping.name.trim().is_empty() {
            return Err(ReconError::ConfigValidation(format!(
                "{side}: field mapped from column '{}' has an empty name",
                mapping.column
            )));
        }
        if !seen.insert(mapping.name.as_str()) {
            return Err(ReconError::ConfigValidation(format!(
                "{side}: field '{}' is mapped more than once",
                mapping.name
            )));
        }
        if let Some(sep) = &mapping.split {
            if sep.is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "{side}: field '{}' has an empty split separator",
                    mapping.name
                )));
            }
            if !matches!(mapping.coerce, None | Some(Coercion::String)) {
                return Err(ReconError::ConfigValidation(format!(
                    "{side}: field '{}' can only split text values",
                    mapping.name
                )));
            }
        }
    }
    Ok(())
}

fn check_tolerance(what: &str, value: f64) -> Result<(), ReconError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ReconError::ConfigValidation(format!(
            "{what} must be a finite non-negative number, got {value}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
