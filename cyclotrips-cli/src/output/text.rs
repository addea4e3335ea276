//! Text output formatting with stage markers and colors.

use crate::report::{CredentialsReport, ExportReport, GeojsonReport, StageReport};

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";

const OK_MARK: &str = "✓";
const FAIL_MARK: &str = "✗";

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Formats an export run: one line per stage, then a summary.
    pub fn format_export(&self, report: &ExportReport) -> String {
        let mut lines: Vec<String> = report.stages.iter().map(|s| self.format_stage(s)).collect();

        if let Some(failure) = &report.failure {
            let status = failure
                .status
                .map(|s| format!(" (HTTP {s})"))
                .unwrap_or_default();
            lines.push(format!(
                "{} {} failure{}",
                self.red("Export failed:"),
                failure.kind,
                status
            ));
            return lines.join("\n");
        }

        if let Some(stats) = &report.stats {
            let source = report.source.as_deref().unwrap_or("unknown source");
            lines.push(format!(
                "{} {} trips, {} total {}",
                self.bold("Done:"),
                stats.trips,
                stats.total_duration_display(),
                self.dim(&format!("via {source}"))
            ));
        }

        lines.join("\n")
    }

    /// Formats one stage line.
    pub fn format_stage(&self, stage: &StageReport) -> String {
        let mark = if stage.ok {
            self.green(OK_MARK)
        } else {
            self.red(FAIL_MARK)
        };
        let name = match &stage.source {
            Some(source) => format!("{} {}", stage.stage, self.cyan(source)),
            None => stage.stage.to_string(),
        };
        format!("{mark} {name}: {}", stage.detail)
    }

    /// Formats a credentials action.
    pub fn format_credentials(&self, report: &CredentialsReport) -> String {
        let user = self.bold(&report.username);
        match (report.action, report.stored) {
            ("set", true) => format!("{} Password stored for {user}", self.green(OK_MARK)),
            ("delete", false) => format!("{} Password removed for {user}", self.green(OK_MARK)),
            (_, true) => format!("{} Password stored for {user}", self.green(OK_MARK)),
            (_, false) => format!("{} No password stored for {user}", self.red(FAIL_MARK)),
        }
    }

    /// Formats a GeoJSON conversion.
    pub fn format_geojson(&self, report: &GeojsonReport) -> String {
        let skipped = report.skipped;
        let mut line = format!(
            "{} Wrote {} {} features to {}",
            self.green(OK_MARK),
            report.features,
            report.layout,
            report.output.display()
        );
        if skipped > 0 {
            line.push_str(&self.dim(&format!(" ({skipped} trips without coordinates)")));
        }
        line
    }

    // ========================================================================
    // Color/style helpers
    // ========================================================================

    fn paint(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    fn cyan(&self, text: &str) -> String {
        self.paint(CYAN, text)
    }
}
