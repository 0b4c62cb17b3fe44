//! `seoaudit run|validate|normalize-url`: config-driven crawl vs metrics reconciliation.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use serde::Serialize;

use seoaudit_recon::config::{SourceConfig, UrlConfig};
use seoaudit_recon::model::{Classification, ComparisonSummary, NormalizationWarning, RawDataset, ReconOutput};
use seoaudit_recon::ReconConfig;

use crate::exit_codes::{
    recon_exit_code, EXIT_RECON_DISCREPANCIES, EXIT_RECON_INVALID_CONFIG, EXIT_RECON_RUNTIME,
};
use crate::export::export_csv;
use crate::CliError;

/// Warnings printed per source before the rest are summarized as a count.
const MAX_WARNINGS_SHOWN: usize = 10;

#[derive(Subcommand)]
pub enum ReconCommands {
    /// Run reconciliation from a TOML config file
    #[command(after_help = "\
Examples:
  seoaudit run audit.recon.toml
  seoaudit run audit.recon.toml --json
  seoaudit run audit.recon.toml --output result.json --export-csv result.csv
  seoaudit run audit.recon.toml --strict")]
    Run {
        /// Path to the .recon.toml config file
        config: PathBuf,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,

        /// Write JSON output to file (overrides output.json in the config)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write one CSV row per match result (overrides output.csv in the config)
        #[arg(long, value_name = "FILE")]
        export_csv: Option<PathBuf>,

        /// Exit 5 when any URL is unmatched or any compared value differs
        #[arg(long)]
        strict: bool,
    },

    /// Validate a recon config without running
    #[command(after_help = "\
Examples:
  seoaudit validate audit.recon.toml")]
    Validate {
        /// Path to the .recon.toml config file
        config: PathBuf,
    },

    /// Print the canonical key for each URL
    #[command(after_help = "\
Examples:
  seoaudit normalize-url 'HTTP://Example.com/Page/?utm_source=x&b=2&a=1'
  seoaudit normalize-url example.com/a?ref=nav --strip ref
  seoaudit normalize-url 'https://a.com/?utm_source=x' --no-default-strip")]
    NormalizeUrl {
        /// URLs to normalize
        #[arg(required = true)]
        urls: Vec<String>,

        /// Extra query parameter to strip. Repeatable.
        #[arg(long, value_name = "PARAM")]
        strip: Vec<String>,

        /// Do not strip the default tracking parameters (utm_*, gclid, ...)
        #[arg(long)]
        no_default_strip: bool,
    },
}

pub fn cmd_recon(cmd: ReconCommands) -> Result<(), CliError> {
    match cmd {
        ReconCommands::Run { config, json, output, export_csv, strict } => {
            cmd_recon_run(config, json, output, export_csv, strict)
        }
        ReconCommands::Validate { config } => cmd_recon_validate(config),
        ReconCommands::NormalizeUrl { urls, strip, no_default_strip } => {
            cmd_normalize_url(urls, strip, no_default_strip)
        }
    }
}

fn recon_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError::new(code, msg)
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RunMeta {
    config_name: String,
    engine_version: &'static str,
    run_at: String,
}

#[derive(Serialize)]
struct RunReport<'a> {
    meta: RunMeta,
    #[serde(flatten)]
    output: &'a ReconOutput,
}

fn load_config(config_path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path)
        .map_err(|e| recon_err(EXIT_RECON_RUNTIME, format!("cannot read config: {e}")))?;
    ReconConfig::from_toml(&config_str).map_err(|e| {
        recon_err(EXIT_RECON_INVALID_CONFIG, e.to_string())
            .with_hint(format!("check {}; `seoaudit validate` reports the same error", config_path.display()))
    })
}

/// Read one side's CSV, resolving its path relative to the config file.
fn load_source(base_dir: &Path, side: &str, source: &SourceConfig) -> Result<RawDataset, CliError> {
    let file = source.file.as_deref().ok_or_else(|| {
        recon_err(EXIT_RECON_INVALID_CONFIG, format!("{side}.file is required to run from the CLI"))
            .with_hint(format!("add `file = \"export.csv\"` under [{side}]"))
    })?;
    let csv_path = base_dir.join(file);
    let csv_data = std::fs::read_to_string(&csv_path)
        .map_err(|e| recon_err(EXIT_RECON_RUNTIME, format!("cannot read {}: {e}", csv_path.display())))?;

    let label = source.label_or(side);
    let dataset = seoaudit_recon::load_csv(label, &csv_data)
        .map_err(|e| recon_err(recon_exit_code(&e), format!("{}: {e}", csv_path.display())))?;
    tracing::debug!("loaded {} row(s) from {}", dataset.len(), csv_path.display());
    Ok(dataset)
}

fn cmd_recon_run(
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
    export_file: Option<PathBuf>,
    strict: bool,
) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    // Resolve file paths relative to config file's directory
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    let left = load_source(base_dir, "left", &config.left)?;
    let right = load_source(base_dir, "right", &config.right)?;

    let result = seoaudit_recon::run(left, right, &config).map_err(|e| {
        let err = recon_err(recon_exit_code(&e), e.to_string());
        match e {
            seoaudit_recon::ReconError::MissingColumn { .. } => {
                err.with_hint("column names must match the CSV header exactly (case and spacing)")
            }
            _ => err,
        }
    })?;

    // Output
    let report = RunReport {
        meta: RunMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION"),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        output: &result,
    };
    let json_str = serde_json::to_string_pretty(&report)
        .map_err(|e| recon_err(EXIT_RECON_RUNTIME, format!("JSON serialization error: {e}")))?;

    let json_path = output_file.or_else(|| config.output.json.as_ref().map(|p| base_dir.join(p)));
    if let Some(ref path) = json_path {
        std::fs::write(path, &json_str)
            .map_err(|e| recon_err(EXIT_RECON_RUNTIME, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    let csv_path = export_file.or_else(|| config.output.csv.as_ref().map(|p| base_dir.join(p)));
    if let Some(ref path) = csv_path {
        let rows = export_csv(&result, path)?;
        eprintln!("wrote {} ({} row(s))", path.display(), rows);
    }

    if json_output {
        println!("{json_str}");
    }

    // Human summary to stderr
    let left_label = config.left.label_or("left");
    let right_label = config.right.label_or("right");
    print_warnings(left_label, &result.left_warnings);
    print_warnings(right_label, &result.right_warnings);
    print_summary(&config.name, left_label, right_label, &result.summary);

    if strict && has_discrepancies(&result.summary) {
        return Err(recon_err(EXIT_RECON_DISCREPANCIES, "discrepancies found (--strict)"));
    }

    Ok(())
}

fn print_warnings(label: &str, warnings: &[NormalizationWarning]) {
    if warnings.is_empty() {
        return;
    }
    eprintln!("{label}: {} warning(s)", warnings.len());
    for w in warnings.iter().take(MAX_WARNINGS_SHOWN) {
        eprintln!("  {w}");
    }
    if warnings.len() > MAX_WARNINGS_SHOWN {
        eprintln!("  ... and {} more", warnings.len() - MAX_WARNINGS_SHOWN);
    }
}

fn print_summary(name: &str, left_label: &str, right_label: &str, s: &ComparisonSummary) {
    eprintln!(
        "recon '{}': {} URL(s): {} matched, {} {}-only, {} {}-only, match rate {}%",
        name,
        s.total_records,
        s.matched,
        s.left_only,
        left_label,
        s.right_only,
        right_label,
        s.match_rate_pct,
    );
    if s.matched > 0 {
        eprintln!("{} of {} matched URL(s) agree on every compared field", s.fully_equal, s.matched);
    }
    for (field, fs) in &s.fields {
        let c = &fs.counts;
        eprintln!(
            "  {field}: {} equal ({}%), {} different, {} missing in {left_label}, {} missing in {right_label}, {} incomparable",
            c.equal,
            fs.percentages.get(&Classification::Equal).copied().unwrap_or(0.0),
            c.different_value,
            c.missing_left,
            c.missing_right,
            c.incomparable,
        );
    }
}

/// Unmatched URLs or any value-level difference. Schema gaps
/// (`incomparable`) are configuration, not data, and do not count.
fn has_discrepancies(s: &ComparisonSummary) -> bool {
    s.left_only > 0
        || s.right_only > 0
        || s.fields.values().any(|fs| {
            fs.counts.different_value + fs.counts.missing_left + fs.counts.missing_right > 0
        })
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn cmd_recon_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let compare = match &config.output.compare {
        Some(fields) => fields.join(", "),
        None => "all mapped fields".to_string(),
    };
    eprintln!(
        "valid: recon '{}' with {} {} field(s), {} {} field(s), comparing {}",
        config.name,
        config.left.columns.fields.len(),
        config.left.label_or("left"),
        config.right.columns.fields.len(),
        config.right.label_or("right"),
        compare,
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// normalize-url
// ---------------------------------------------------------------------------

fn cmd_normalize_url(urls: Vec<String>, strip: Vec<String>, no_default_strip: bool) -> Result<(), CliError> {
    let mut params = if no_default_strip { Vec::new() } else { UrlConfig::default().strip_params };
    params.extend(strip);

    let mut failed = 0;
    for url in &urls {
        match seoaudit_recon::normalize_url(url, &params) {
            Ok(key) => println!("{key}"),
            Err(e) => {
                eprintln!("{url}: {e}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(CliError::general(format!("{failed} of {} URL(s) could not be normalized", urls.len())));
    }
    Ok(())
}
