//! End-of-run summary table.

use console::style;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Ok,
    FailedCreate,
    FailedMasterExport,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Ok => "OK",
            JobStatus::FailedCreate => "FAILED_CREATE",
            JobStatus::FailedMasterExport => "FAILED_MASTER_EXPORT",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, JobStatus::Ok)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRow {
    /// 1-based job number.
    pub index: usize,
    pub title: String,
    pub status: JobStatus,
    pub message: String,
}

const TITLE_WIDTH: usize = 32;

fn clip(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(width.saturating_sub(3)).collect();
    clipped.push_str("...");
    clipped
}

/// Render rows as a fixed-width table.
pub fn render_table(rows: &[JobRow]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<4} {:<width$} {:<22} Message\n",
        "#",
        "Title",
        "Status",
        width = TITLE_WIDTH
    ));
    out.push_str(&format!(
        "{:<4} {:<width$} {:<22} -------\n",
        "----",
        "-".repeat(TITLE_WIDTH),
        "-".repeat(22),
        width = TITLE_WIDTH
    ));

    if rows.is_empty() {
        out.push_str("(no jobs finished)\n");
        return out;
    }

    for row in rows {
        let status = format!("{:<22}", row.status.as_str());
        let status = if row.status.is_ok() {
            style(status).green()
        } else {
            style(status).red()
        };
        out.push_str(&format!(
            "{:<4} {:<width$} {} {}\n",
            row.index,
            clip(&row.title, TITLE_WIDTH),
            status,
            row.message,
            width = TITLE_WIDTH
        ));
    }
    out
}

/// One-line tally, e.g. `2 ok, 1 failed`.
pub fn tally(rows: &[JobRow]) -> String {
    let ok = rows.iter().filter(|r| r.status.is_ok()).count();
    format!("{} ok, {} failed", ok, rows.len() - ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(index: usize, title: &str, status: JobStatus, message: &str) -> JobRow {
        JobRow {
            index,
            title: title.into(),
            status,
            message: message.into(),
        }
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(JobStatus::Ok.to_string(), "OK");
        assert_eq!(JobStatus::FailedCreate.to_string(), "FAILED_CREATE");
        assert_eq!(
            serde_json::to_value(JobStatus::FailedMasterExport).unwrap(),
            "FAILED_MASTER_EXPORT"
        );
    }

    #[test]
    fn test_table_lists_every_row() {
        console::set_colors_enabled(false);
        let table = render_table(&[
            row(1, "Night Drive", JobStatus::Ok, "exported"),
            row(2, "Neon Rain", JobStatus::FailedCreate, "create button missing"),
        ]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[2].starts_with("1 "));
        assert!(lines[2].contains("Night Drive"));
        assert!(lines[2].contains("OK"));
        assert!(lines[3].contains("FAILED_CREATE"));
        assert!(lines[3].ends_with("create button missing"));
    }

    #[test]
    fn test_long_titles_are_clipped() {
        let long = "x".repeat(80);
        let clipped = clip(&long, TITLE_WIDTH);
        assert_eq!(clipped.chars().count(), TITLE_WIDTH);
        assert!(clipped.ends_with("..."));
    }

    #[test]
    fn test_empty_table() {
        assert!(render_table(&[]).contains("no jobs finished"));
    }

    #[test]
    fn test_tally() {
        let rows = vec![
            row(1, "a", JobStatus::Ok, ""),
            row(2, "b", JobStatus::FailedMasterExport, ""),
            row(3, "c", JobStatus::Ok, ""),
        ];
        assert_eq!(tally(&rows), "2 ok, 1 failed");
    }
}
