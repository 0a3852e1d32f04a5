// src/report.rs
//! Render the narrative into a small HTML page and write it to
//! `<root>/YYYY/MM/DD/index.html`.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

/// Date-partitioned directory for one run.
pub fn report_dir(root: &Path, date: NaiveDate) -> PathBuf {
    root.join(date.format("%Y/%m/%d").to_string())
}

/// Paragraphs are separated by blank lines; single newlines become `<br>`.
pub fn render_html(date: NaiveDate, narrative: &str) -> String {
    let title = format!("Zeitgeist: {}", date.format("%B %-d, %Y"));
    let body: String = narrative
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            let lines: Vec<String> = p
                .lines()
                .map(|l| html_escape::encode_text(l.trim()).to_string())
                .collect();
            format!("    <p>{}</p>\n", lines.join("<br>\n"))
        })
        .collect();

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n  <meta charset=\"utf-8\">\n  \
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n  \
         <title>{title}</title>\n</head>\n<body>\n  <article>\n    <h1>{title}</h1>\n{body}  \
         </article>\n</body>\n</html>\n",
        title = html_escape::encode_text(&title),
    )
}

/// Write `index.html` for `date`; returns the page path.
pub fn write_report(root: &Path, date: NaiveDate, html: &str) -> Result<PathBuf> {
    write_sidecar(root, date, "index.html", html)
}

/// Write an auxiliary artifact (e.g. the metrics snapshot) next to the report.
pub fn write_sidecar(root: &Path, date: NaiveDate, name: &str, content: &str) -> Result<PathBuf> {
    let dir = report_dir(root, date);
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(name);
    fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 7).unwrap()
    }

    #[test]
    fn dir_is_date_partitioned() {
        assert_eq!(
            report_dir(Path::new(".reports"), day()),
            PathBuf::from(".reports/2026/03/07")
        );
    }

    #[test]
    fn narrative_is_escaped_and_split_into_paragraphs() {
        let html = render_html(day(), "Odds of a cut <50%\n& rising.\n\n\nSecond para.");
        assert!(html.contains("<title>Zeitgeist: March 7, 2026</title>"));
        assert!(html.contains("<p>Odds of a cut &lt;50%<br>\n&amp; rising.</p>"));
        assert!(html.contains("<p>Second para.</p>"));
        assert!(!html.contains("<50%"));
    }

    #[test]
    fn writes_index_under_date_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let p = write_report(tmp.path(), day(), "<html></html>").unwrap();
        assert_eq!(p, tmp.path().join("2026/03/07/index.html"));
        assert_eq!(fs::read_to_string(p).unwrap(), "<html></html>");
    }
}
