//! Terminal rendering of analysis results

use crate::model::{AnalysisResult, QcStatus, RiskBucket};

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

pub const TITLE: &str = "Speech Risk Screening";

fn bucket_color(bucket: RiskBucket) -> &'static str {
    match bucket {
        RiskBucket::Low => "\x1b[32m",    // green
        RiskBucket::Medium => "\x1b[36m", // cyan
        RiskBucket::High => "\x1b[31m",   // red
    }
}

fn status_marker(status: QcStatus) -> (&'static str, &'static str) {
    match status {
        QcStatus::Good => ("\x1b[32m", "✓"),
        QcStatus::Warn => ("\x1b[33m", "!"),
    }
}

/// Placeholder shown before any clip is analysed
pub fn format_placeholder() -> String {
    format!(
        "{}{}{}\n  Select a clip to preview quality checks and model outputs.\n",
        BOLD, TITLE, RESET
    )
}

/// Format a result for terminal output. `source` names the clip and
/// `explanation` is the caveat printed under it.
pub fn format_result(result: &AnalysisResult, source: &str, explanation: Option<&str>) -> String {
    let mut output = String::new();

    output.push_str(&format!("{}{}{} {}[{}]{}\n", BOLD, TITLE, RESET, DIM, source, RESET));
    output.push_str(&format!(
        "  {}{}{} risk{}\n",
        bucket_color(result.bucket),
        BOLD,
        result.bucket.name(),
        RESET
    ));
    output.push_str(&format!("  Probability: {:.1}%\n", result.probability * 100.0));
    output.push_str(&format!("  {}\n", result.suggestion));

    if !result.qc.is_empty() {
        output.push_str("\n  Quality checks:\n");
        for metric in &result.qc {
            let (color, symbol) = status_marker(metric.status);
            output.push_str(&format!(
                "    {}{}{} {}: {}\n",
                color, symbol, RESET, metric.label, metric.value
            ));
            if let Some(hint) = &metric.hint {
                output.push_str(&format!("      {}{}{}\n", DIM, hint, RESET));
            }
        }
    }

    if !result.features.is_empty() {
        output.push_str("\n  Key features:\n");
        for feature in &result.features {
            output.push_str(&format!("    {}: {}\n", feature.name, feature.value));
        }
    }

    if let Some(text) = explanation {
        output.push_str(&format!("\n  {}{}{}\n", DIM, text, RESET));
    }

    output
}

/// One-line summary used by batch runs
pub fn format_line(result: &AnalysisResult, source: &str) -> String {
    format!(
        "{}{:<6}{} {:>5.1}%  {}",
        bucket_color(result.bucket),
        result.bucket.name(),
        RESET,
        result.probability * 100.0,
        source
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Analyzer, AudioClip};

    #[test]
    fn test_format_higher_risk() {
        let mut clip = vec![0u8; 10_000];
        clip[0] = 200;
        let result = Analyzer::default().analyze(&AudioClip::new(&clip, "demo_higherrisk.wav"));
        let text = format_result(&result, "Demo: higher risk", Some("caveat"));

        assert!(text.contains("High risk"));
        assert!(text.contains("Probability: 98.0%"));
        assert!(text.contains("Consider following up with a clinician."));
        assert!(text.contains("Duration: 5s"));
        assert!(text.contains("Pitch estimate: 350 Hz"));
        assert!(text.contains("caveat"));
    }

    #[test]
    fn test_format_line() {
        let result = AnalysisResult::from_probability(0.2, Vec::new(), Vec::new());
        let line = format_line(&result, "a.wav");
        assert!(line.contains("Low"));
        assert!(line.contains("20.0%"));
        assert!(line.ends_with("a.wav"));
    }

    #[test]
    fn test_placeholder() {
        assert!(format_placeholder().contains("Select a clip"));
    }
}
