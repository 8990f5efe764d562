use anyhow::{Context, Result};
use chrono::Local;
use csv::WriterBuilder;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::to_string_pretty;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use crate::analysis::Report;
use crate::columns::{output_name, ColumnKey};
use crate::table::{Column, Table};
use crate::types::Value;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

const SHEET_NAME_SUBS: &[(&str, &str)] = &[
    ("[", "("),
    ("]", ")"),
    (":", " - "),
    ("*", " "),
    ("?", " "),
    ("/", "_"),
    ("\\", "_"),
];

/// Row highlight per hit column, first match wins
const HIGHLIGHTS: &[(ColumnKey, &str, &str)] = &[
    (ColumnKey::Background, "background", "#808080"),
    (ColumnKey::CandPos, "cand-pos", "#FFFA91"),
    (ColumnKey::CandGene, "cand-gene", "#A9E894"),
];

/// Supported report formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Tsv,
    Csv,
    Json,
    Html,
    All,
}

/// Writes the sheets of a [`Report`] into one output directory
pub struct ReportGenerator {
    output_dir: PathBuf,
}

#[derive(Serialize)]
struct JsonSheet<'a> {
    name: &'a str,
    columns: Vec<&'a str>,
    rows: Vec<Vec<&'a Value>>,
}

impl ReportGenerator {
    pub fn new(output_dir: &Path) -> Result<Self> {
        fs::create_dir_all(output_dir).with_context(|| {
            format!("Failed to create output directory {}", output_dir.display())
        })?;

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Generate reports in specified format(s), returning the written files
    pub fn generate(&self, report: &Report, format: ReportFormat) -> Result<Vec<PathBuf>> {
        let start = Instant::now();
        let mut written = Vec::new();

        match format {
            ReportFormat::Tsv => written.extend(self.generate_delimited(report, b'\t', "tsv")?),
            ReportFormat::Csv => written.extend(self.generate_delimited(report, b',', "csv")?),
            ReportFormat::Json => written.push(self.generate_json_report(report)?),
            ReportFormat::Html => written.push(self.generate_html_report(report)?),
            ReportFormat::All => {
                written.extend(self.generate_delimited(report, b'\t', "tsv")?);
                written.extend(self.generate_delimited(report, b',', "csv")?);
                written.push(self.generate_json_report(report)?);
                written.push(self.generate_html_report(report)?);
            }
        }

        info!(
            "{:?} export of {} sheets took {}ms",
            format,
            report.len(),
            start.elapsed().as_millis()
        );
        Ok(written)
    }

    fn generate_delimited(&self, report: &Report, delimiter: u8, ext: &str) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(report.len());

        for (name, table) in report.iter() {
            let filename = self
                .output_dir
                .join(format!("{}.{}", clean_sheet_name(name), ext));

            let mut wtr = WriterBuilder::new()
                .delimiter(delimiter)
                .from_path(&filename)
                .with_context(|| format!("Failed to create writer for {}", filename.display()))?;

            wtr.write_record(headers(table))?;
            for row in 0..table.n_rows() {
                wtr.write_record(table.columns().iter().map(|c| render_cell(c, row)))?;
            }
            wtr.flush()?;

            debug!("wrote {} rows to {}", table.n_rows(), filename.display());
            written.push(filename);
        }

        Ok(written)
    }

    fn generate_json_report(&self, report: &Report) -> Result<PathBuf> {
        let filename = self.output_dir.join("report.json");

        let sheets: Vec<JsonSheet> = report
            .iter()
            .map(|(name, table)| JsonSheet {
                name,
                columns: headers(table),
                rows: (0..table.n_rows()).map(|row| table.row(row).collect()).collect(),
            })
            .collect();

        let json = to_string_pretty(&sheets)?;
        fs::write(&filename, json)
            .with_context(|| format!("Failed to write JSON report to {}", filename.display()))?;

        Ok(filename)
    }

    fn generate_html_report(&self, report: &Report) -> Result<PathBuf> {
        let filename = self.output_dir.join("report.html");

        fs::write(&filename, self.create_html_content(report))
            .with_context(|| format!("Failed to write HTML report to {}", filename.display()))?;

        Ok(filename)
    }

    fn create_html_content(&self, report: &Report) -> String {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

        let highlight_css: String = HIGHLIGHTS
            .iter()
            .map(|(_, class, color)| format!("        tr.{} {{ background-color: {}; }}\n", class, color))
            .collect();

        let sections: String = report
            .iter()
            .map(|(name, table)| self.generate_sheet_html(name, table))
            .collect();

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Gene Compare Report</title>
    <style>
        body {{
            font-family: Arial, sans-serif;
            margin: 40px;
        }}
        table {{
            border-collapse: collapse;
            margin: 20px 0;
        }}
        th, td {{
            border: 1px solid #ddd;
            padding: 6px 12px;
            text-align: left;
        }}
        th {{
            position: sticky;
            top: 0;
            background-color: #2c3e50;
            color: white;
        }}
{}    </style>
</head>
<body>
    <h1>Gene Compare Report</h1>
    <p>Generated on: {}</p>
{}</body>
</html>"#,
            highlight_css, timestamp, sections
        )
    }

    fn generate_sheet_html(&self, name: &str, table: &Table) -> String {
        let mut html = format!(
            "<div class=\"section\"><h2>{}</h2>\n",
            escape_html(&clean_sheet_name(name))
        );
        if table.is_empty() {
            html.push_str("<p>No rows.</p></div>\n");
            return html;
        }

        html.push_str("<table>\n<tr>");
        for header in headers(table) {
            html.push_str(&format!("<th>{}</th>", escape_html(header)));
        }
        html.push_str("</tr>\n");

        let hit_columns: Vec<(&Column, &str)> = HIGHLIGHTS
            .iter()
            .filter_map(|(key, class, _)| table.column(key.as_str()).map(|c| (c, *class)))
            .collect();

        for row in 0..table.n_rows() {
            let class = hit_columns
                .iter()
                .find(|(c, _)| c.get(row).as_i64().unwrap_or(0) > 0)
                .map(|(_, class)| format!(" class=\"{}\"", class))
                .unwrap_or_default();
            html.push_str(&format!("<tr{}>", class));
            for column in table.columns() {
                html.push_str(&format!("<td>{}</td>", escape_html(&render_cell(column, row))));
            }
            html.push_str("</tr>\n");
        }

        html.push_str("</table>\n</div>\n");
        html
    }
}

/// Output directory name `<basename>.<YYYY-mm-dd_HHMMSS>` inside `parent`
pub fn timestamped_dir(parent: &Path, basename: &str) -> PathBuf {
    let now = Local::now().format("%Y-%m-%d_%H%M%S");
    parent.join(format!("{}.{}", basename, now))
}

/// Make a sheet name safe for file names and spreadsheet tabs
pub fn clean_sheet_name(name: &str) -> String {
    let mut cleaned = name.to_string();
    for (from, to) in SHEET_NAME_SUBS {
        cleaned = cleaned.replace(from, to);
    }
    WHITESPACE.replace_all(&cleaned, " ").trim().to_string()
}

fn headers(table: &Table) -> Vec<&str> {
    table.columns().iter().map(|c| output_name(c.name())).collect()
}

/// Cell text, honouring the registry's `0%` format hint
fn render_cell(column: &Column, row: usize) -> String {
    let value = column.get(row);
    let percent = ColumnKey::from_key(column.name())
        .and_then(|k| k.meta().format)
        .is_some_and(|f| f == "0%");

    match value.as_f64() {
        Some(v) if percent && !value.is_null() => format!("{:.0}%", v * 100.0),
        _ => value.to_string(),
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DType;
    use tempfile::TempDir;

    fn summary() -> Table {
        Table::from_rows(
            &[
                ("chromo", DType::Category),
                ("pos", DType::UInt),
                ("background", DType::UInt),
                ("cand_pos", DType::UInt),
                ("cand_gene_hom_ratio", DType::Float),
            ],
            vec![
                vec![Value::from("chr1"), Value::Int(100), Value::Int(1), Value::Int(0), Value::Float(0.5)],
                vec![Value::from("chr2"), Value::Int(7), Value::Int(0), Value::Int(2), Value::Float(1.0)],
                vec![Value::from("chr3"), Value::Int(9), Value::Int(0), Value::Int(0), Value::Float(0.0)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_clean_sheet_name() {
        assert_eq!(clean_sheet_name("Candidate: Positional"), "Candidate - Positional");
        assert_eq!(clean_sheet_name("a/b\\c [x]*?"), "a_b_c (x)");
        assert_eq!(clean_sheet_name("  P1   pool "), "P1 pool");
    }

    #[test]
    fn test_tsv_export_uses_titles_and_percentages() {
        let dir = TempDir::new().unwrap();
        let mut report = Report::new();
        report.push("Candidate: Positional", summary());

        let generator = ReportGenerator::new(dir.path()).unwrap();
        let files = generator.generate(&report, ReportFormat::Tsv).unwrap();
        assert_eq!(files, vec![dir.path().join("Candidate - Positional.tsv")]);

        let content = fs::read_to_string(&files[0]).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "Chromo\tPosition\tBackground\tCandidate: Positional\tGene Hit Homozygosity"
        );
        assert_eq!(lines[1], "chr1\t100\t1\t0\t50%");
        assert_eq!(lines[2], "chr2\t7\t0\t2\t100%");
    }

    #[test]
    fn test_html_highlights_hit_rows() {
        let dir = TempDir::new().unwrap();
        let mut report = Report::new();
        report.push("Background", summary());

        let generator = ReportGenerator::new(dir.path()).unwrap();
        let files = generator.generate(&report, ReportFormat::Html).unwrap();
        let html = fs::read_to_string(&files[0]).unwrap();

        assert!(html.contains("<tr class=\"background\"><td>chr1</td>"));
        assert!(html.contains("<tr class=\"cand-pos\"><td>chr2</td>"));
        assert!(html.contains("<tr><td>chr3</td>"));
        assert!(html.contains("#FFFA91"));
    }

    #[test]
    fn test_all_formats() {
        let dir = TempDir::new().unwrap();
        let mut report = Report::new();
        report.push("P1", summary());
        report.push("Background", Table::new());

        let generator = ReportGenerator::new(&dir.path().join("out")).unwrap();
        let files = generator.generate(&report, ReportFormat::All).unwrap();
        assert_eq!(files.len(), 6);
        assert!(files.iter().all(|f| f.exists()));

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(generator.output_dir().join("report.json")).unwrap())
                .unwrap();
        assert_eq!(json[0]["name"], "P1");
        assert_eq!(json[0]["rows"][0][1], 100);
        assert_eq!(json[1]["rows"].as_array().unwrap().len(), 0);
    }
}
