use std::fmt;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (duplicate field, bad tolerance, etc.).
    ConfigValidation(String),
    /// A column named in the mapping is not present in the dataset headers.
    MissingColumn { source: String, column: String },
    /// Both datasets contain no rows.
    EmptyInput,
    /// A raw row does not have one cell per header.
    RaggedRow { row: usize, expected: usize, found: usize },
    /// The run was cancelled through its cancel token.
    Cancelled,
    /// IO error (file read, etc.).
    Io(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingColumn { source, column } => {
                write!(f, "source '{source}': missing column '{column}'")
            }
            Self::EmptyInput => write!(f, "both datasets are empty"),
            Self::RaggedRow { row, expected, found } => {
                write!(f, "row {row}: expected {expected} cell(s), found {found}")
            }
            Self::Cancelled => write!(f, "reconciliation cancelled"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}

/// Why a raw URL could not be turned into a canonical key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlError {
    Empty,
    Parse(String),
    NoHost,
}

impl fmt::Display for UrlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty URL"),
            Self::Parse(msg) => write!(f, "cannot parse URL: {msg}"),
            Self::NoHost => write!(f, "URL has no host"),
        }
    }
}

impl std::error::Error for UrlError {}
