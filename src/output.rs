//! Render a [`crate::scan::ScanReport`] for the scanner CLI (spec.md §6):
//! "CLI prints a per-file finding list with file, line, checkerId, level,
//! message, recommendation."

use colored::Colorize;

use crate::{checkers::RiskLevel, cli::OutputFormat, scan::ScanReport};

/// Render `report` per `format`. `OutputFormat::Html` is accepted by the
/// CLI contract but out of scope for actual HTML rendering (spec.md §1);
/// it falls through to the same structured text the console path produces.
pub fn render(report: &ScanReport, format: OutputFormat, colored: bool) -> String {
    match format {
        OutputFormat::Console | OutputFormat::Html => render_console(report, colored)
    }
}

fn render_console(report: &ScanReport, colored: bool) -> String {
    let mut out = String::new();
    for finding in &report.findings {
        let level = level_label(finding.level, colored);
        let location = match finding.line {
            Some(line) => format!("{}:{}", finding.file, line),
            None => finding.file.clone()
        };
        out.push_str(&format!("[{level}] {location} ({}): {}\n", finding.checker_id, finding.message));
        if let Some(recommendation) = &finding.recommendation {
            out.push_str(&format!("    -> {recommendation}\n"));
        }
    }

    let summary = format!(
        "{} file(s) scanned, {} finding(s), highest risk: {}\n",
        report.files_scanned,
        report.findings.len(),
        report.highest_level()
    );
    out.push_str(&if colored { summary.bold().to_string() } else { summary });
    out
}

fn level_label(level: RiskLevel, colored: bool) -> String {
    let label = level.to_string();
    if !colored {
        return label;
    }
    match level {
        RiskLevel::None => label.normal().to_string(),
        RiskLevel::Low => label.green().to_string(),
        RiskLevel::Medium => label.yellow().to_string(),
        RiskLevel::High => label.truecolor(255, 140, 0).to_string(),
        RiskLevel::Critical => label.red().bold().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::Finding;

    fn sample_report() -> ScanReport {
        ScanReport {
            files_scanned: 1,
            findings:      vec![Finding {
                file:           "orders.sql".to_string(),
                line:           Some(3),
                checker_id:      "NoWhereClause".to_string(),
                level:          RiskLevel::Critical,
                message:        "DELETE without WHERE".to_string(),
                recommendation: Some("add a WHERE clause".to_string())
            }]
        }
    }

    #[test]
    fn console_rendering_includes_file_line_and_recommendation() {
        let rendered = render(&sample_report(), OutputFormat::Console, false);
        assert!(rendered.contains("orders.sql:3"));
        assert!(rendered.contains("NoWhereClause"));
        assert!(rendered.contains("add a WHERE clause"));
    }

    #[test]
    fn empty_report_renders_clean_summary() {
        let rendered = render(&ScanReport::default(), OutputFormat::Console, false);
        assert!(rendered.contains("0 finding(s)"));
    }
}
