//! Text Output
//!
//! Renders an [`AggregateReport`] as the plain-text `all_stats` layout:
//!
//! ```text
//! Experiment 1
//! paths_total = 120
//! execs_per_sec = 100.0
//!
//! Experiment 2
//! paths_total = 130
//! execs_per_sec = 200.0
//!
//! Averages
//!
//! paths_total [mean= 125.0, stdev= 7.0710678118654755]
//! execs_per_sec [mean= 150.0, stdev= 70.71067811865476]
//! ```
//!
//! The `mean=` label carries the median.

use crate::ReportError;
use crate::record::StatsRecord;
use crate::report::{AggregateReport, build_report};
use std::fmt::Write;

/// Heading that introduces the summary block
pub const SUMMARY_HEADING: &str = "Averages";

/// Render a report as text
pub fn format_text_report(report: &AggregateReport) -> String {
    let mut output = String::new();

    for section in &report.experiments {
        output.push_str(&section.label);
        output.push('\n');
        for (name, value) in &section.fields {
            let _ = writeln!(output, "{} = {}", name, value);
        }
        output.push('\n');
    }

    if let Some(summary) = &report.summary {
        output.push_str(SUMMARY_HEADING);
        output.push_str("\n\n");
        for stat in summary {
            let _ = writeln!(
                output,
                "{} [mean= {}, stdev= {}]",
                stat.field_name,
                format_stat(stat.median),
                format_stat(stat.stdev)
            );
        }
    }

    output
}

/// Round-trip float rendering that always shows a fractional part
pub fn format_stat(value: f64) -> String {
    format!("{:?}", value)
}

/// Build and render the report in one step
pub fn aggregate<S: AsRef<str>>(
    records: &[StatsRecord],
    selected: &[S],
    summarized: &[S],
) -> Result<String, ReportError> {
    let report = build_report(records, selected, summarized)?;
    Ok(format_text_report(&report))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> StatsRecord {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_full_layout() {
        let records = vec![
            record(&[("paths_total", "120"), ("execs_per_sec", "100.0")]),
            record(&[("paths_total", "130"), ("execs_per_sec", "200.0")]),
        ];
        let fields = ["paths_total", "execs_per_sec"];

        let text = aggregate(&records, &fields, &fields).unwrap();

        let expected = "Experiment 1\n\
                        paths_total = 120\n\
                        execs_per_sec = 100.0\n\
                        \n\
                        Experiment 2\n\
                        paths_total = 130\n\
                        execs_per_sec = 200.0\n\
                        \n\
                        Averages\n\
                        \n\
                        paths_total [mean= 125.0, stdev= 7.0710678118654755]\n\
                        execs_per_sec [mean= 150.0, stdev= 70.71067811865476]\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_single_run_has_no_summary_block() {
        let records = vec![record(&[("unique_crashes", "3")])];
        let text = aggregate(&records, &["unique_crashes"], &["unique_crashes"]).unwrap();

        assert_eq!(text, "Experiment 1\nunique_crashes = 3\n\n");
        assert!(!text.contains(SUMMARY_HEADING));
    }

    #[test]
    fn test_format_stat() {
        assert_eq!(format_stat(150.0), "150.0");
        assert_eq!(format_stat(0.5), "0.5");
    }

    #[test]
    fn test_error_yields_no_text() {
        let records = vec![record(&[("a", "1")]), record(&[("a", "x")])];
        assert!(aggregate(&records, &["a"], &["a"]).is_err());
    }
}
