//! Flat CSV view of a reconciliation run: one row per match result.
//!
//! Columns: `status, url_key, left_row, right_row`, then four per compared
//! field: `<field>:class`, `<field>:left`, `<field>:right`, `<field>:delta`.
//! Unmatched rows carry their own side's values and leave class/delta empty.

use std::io;
use std::path::Path;

use seoaudit_recon::model::{CanonicalRecord, FieldComparison, FieldValue, MatchResult, ReconOutput};

use crate::exit_codes::EXIT_RECON_RUNTIME;
use crate::CliError;

/// Write the export to `path`. Returns the number of data rows.
pub fn export_csv(output: &ReconOutput, path: &Path) -> Result<usize, CliError> {
    let file = std::fs::File::create(path).map_err(|e| {
        CliError::new(EXIT_RECON_RUNTIME, format!("cannot create {}: {e}", path.display()))
    })?;
    write_results_csv(output, io::BufWriter::new(file))
        .map_err(|e| CliError::new(EXIT_RECON_RUNTIME, format!("CSV write error: {e}")))
}

pub fn write_results_csv<W: io::Write>(output: &ReconOutput, writer: W) -> Result<usize, csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec![
        "status".to_string(),
        "url_key".to_string(),
        "left_row".to_string(),
        "right_row".to_string(),
    ];
    for field in &output.fields {
        for suffix in ["class", "left", "right", "delta"] {
            header.push(format!("{field}:{suffix}"));
        }
    }
    wtr.write_record(&header)?;

    let mut comparisons = output.comparisons.iter();
    let mut rows = 0;
    for result in &output.results {
        let mut record = vec![result.status().to_string(), result.url_key().to_string()];
        match result {
            MatchResult::Matched { left, right } => {
                record.push(left.row.to_string());
                record.push(right.row.to_string());
                let cmps = comparisons.next().map(|c| c.as_slice()).unwrap_or(&[]);
                for field in &output.fields {
                    push_comparison(&mut record, cmps.iter().find(|c| &c.field == field));
                }
            }
            MatchResult::LeftOnly { record: rec } => {
                record.push(rec.row.to_string());
                record.push(String::new());
                for field in &output.fields {
                    push_one_side(&mut record, rec, field, true);
                }
            }
            MatchResult::RightOnly { record: rec } => {
                record.push(String::new());
                record.push(rec.row.to_string());
                for field in &output.fields {
                    push_one_side(&mut record, rec, field, false);
                }
            }
        }
        wtr.write_record(&record)?;
        rows += 1;
    }

    wtr.flush()?;
    Ok(rows)
}

fn push_comparison(record: &mut Vec<String>, cmp: Option<&FieldComparison>) {
    match cmp {
        Some(c) => {
            record.push(c.classification.to_string());
            record.push(cell(c.left.as_ref()));
            record.push(cell(c.right.as_ref()));
            record.push(c.delta.map(|d| d.to_string()).unwrap_or_default());
        }
        None => record.extend(std::iter::repeat(String::new()).take(4)),
    }
}

fn push_one_side(record: &mut Vec<String>, rec: &CanonicalRecord, field: &str, is_left: bool) {
    let value = cell(rec.fields.get(field));
    record.push(String::new());
    if is_left {
        record.push(value);
        record.push(String::new());
    } else {
        record.push(String::new());
        record.push(value);
    }
    record.push(String::new());
}

fn cell(value: Option<&FieldValue>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use seoaudit_recon::config::{Coercion, ColumnMapping, ReconConfig};
    use seoaudit_recon::engine::{load_csv, run};

    fn sample_output() -> ReconOutput {
        let config = ReconConfig::new(
            "export",
            ColumnMapping::new("URL")
                .field("traffic", "Traffic", Some(Coercion::Number))
                .field("title", "Title", None),
            ColumnMapping::new("URL").field("traffic", "Traffic", Some(Coercion::Number)),
        );
        let left = load_csv("left", "URL,Traffic,Title\na.com/x,10,Home\na.com/y,20,Blog\n").unwrap();
        let right = load_csv("right", "URL,Traffic\na.com/x,12.5\na.com/z,99\n").unwrap();
        run(left, right, &config).unwrap()
    }

    fn export_lines(output: &ReconOutput) -> Vec<String> {
        let mut buf = Vec::new();
        let rows = write_results_csv(output, &mut buf).unwrap();
        assert_eq!(rows, output.results.len());
        String::from_utf8(buf).unwrap().lines().map(str::to_string).collect()
    }

    #[test]
    fn header_lists_four_columns_per_field() {
        let lines = export_lines(&sample_output());
        assert_eq!(
            lines[0],
            "status,url_key,left_row,right_row,\
             title:class,title:left,title:right,title:delta,\
             traffic:class,traffic:left,traffic:right,traffic:delta"
        );
    }

    #[test]
    fn one_row_per_result() {
        let lines = export_lines(&sample_output());
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "matched,a.com/x,0,0,incomparable,Home,,,different_value,10,12.5,2.5");
        assert_eq!(lines[2], "left_only,a.com/y,1,,,Blog,,,,20,,");
        assert_eq!(lines[3], "right_only,a.com/z,,1,,,,,,,99,");
    }
}
