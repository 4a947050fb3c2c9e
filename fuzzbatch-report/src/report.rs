//! Aggregate Report Data Structures

use crate::ReportError;
use crate::record::StatsRecord;
use fuzzbatch_stats::{StatsError, compute_field_summary};

/// Complete cross-run report
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateReport {
    /// One section per parsed run, in input order
    pub experiments: Vec<ExperimentSection>,
    /// Per-field summary; `None` unless more than one run was parsed
    pub summary: Option<Vec<AggregateStat>>,
}

/// Selected fields of a single run
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentSection {
    /// "Experiment 1", "Experiment 2", ...
    pub label: String,
    /// Selected fields present in the run, in selection order
    pub fields: Vec<(String, String)>,
}

/// Median and spread of one field across runs
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateStat {
    /// Summarized field
    pub field_name: String,
    /// Median across runs (printed under the `mean=` label)
    pub median: f64,
    /// Sample standard deviation across runs
    pub stdev: f64,
}

/// Build the aggregate report for a set of runs
///
/// Every record gets a section listing the `selected` fields it has; absent
/// fields are left out of that section. When there is more than one record,
/// each `summarized` field must be present and numeric in every record, and
/// any violation aborts the whole report.
pub fn build_report<S: AsRef<str>>(
    records: &[StatsRecord],
    selected: &[S],
    summarized: &[S],
) -> Result<AggregateReport, ReportError> {
    let experiments = records
        .iter()
        .enumerate()
        .map(|(index, record)| ExperimentSection {
            label: experiment_label(index),
            fields: selected
                .iter()
                .filter_map(|name| {
                    let name = name.as_ref();
                    record
                        .get(name)
                        .map(|value| (name.to_string(), value.to_string()))
                })
                .collect(),
        })
        .collect();

    let summary = if records.len() > 1 {
        let mut stats = Vec::with_capacity(summarized.len());
        for field in summarized {
            stats.push(summarize_field(records, field.as_ref())?);
        }
        Some(stats)
    } else {
        None
    };

    Ok(AggregateReport {
        experiments,
        summary,
    })
}

fn experiment_label(index: usize) -> String {
    format!("Experiment {}", index + 1)
}

fn summarize_field(records: &[StatsRecord], field: &str) -> Result<AggregateStat, ReportError> {
    let mut values = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let raw = record.get(field).ok_or_else(|| ReportError::MissingField {
            field: field.to_string(),
            experiment: experiment_label(index),
        })?;
        let value: f64 = raw.parse().map_err(|_| ReportError::NonNumeric {
            field: field.to_string(),
            experiment: experiment_label(index),
            value: raw.to_string(),
        })?;
        values.push(value);
    }

    let summary = compute_field_summary(&values).map_err(|source| match source {
        // "nan" and "inf" parse as floats but are not usable counters.
        StatsError::NonFinite { index, .. } => ReportError::NonNumeric {
            field: field.to_string(),
            experiment: experiment_label(index),
            value: records[index].get(field).unwrap_or_default().to_string(),
        },
        source => ReportError::Stats {
            field: field.to_string(),
            source,
        },
    })?;

    Ok(AggregateStat {
        field_name: field.to_string(),
        median: summary.median,
        stdev: summary.std_dev,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> StatsRecord {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_sections_omit_absent_fields() {
        let records = vec![
            record(&[("paths_total", "10"), ("unique_crashes", "1")]),
            record(&[("paths_total", "12")]),
        ];

        let report = build_report(&records, &["unique_crashes", "paths_total"], &[]).unwrap();

        assert_eq!(report.experiments.len(), 2);
        assert_eq!(report.experiments[0].label, "Experiment 1");
        assert_eq!(
            report.experiments[0].fields,
            vec![
                ("unique_crashes".to_string(), "1".to_string()),
                ("paths_total".to_string(), "10".to_string()),
            ]
        );
        assert_eq!(
            report.experiments[1].fields,
            vec![("paths_total".to_string(), "12".to_string())]
        );
    }

    #[test]
    fn test_summary_uses_median() {
        let records = vec![
            record(&[("execs_per_sec", "100.0")]),
            record(&[("execs_per_sec", "200.0")]),
        ];

        let report = build_report(&records, &["execs_per_sec"], &["execs_per_sec"]).unwrap();
        let summary = report.summary.unwrap();

        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].field_name, "execs_per_sec");
        assert!((summary[0].median - 150.0).abs() < f64::EPSILON);
        assert!((summary[0].stdev - 70.710_678_118_654_76).abs() < 1e-9);
    }

    #[test]
    fn test_single_record_has_no_summary() {
        let records = vec![record(&[("execs_per_sec", "100.0")])];
        let report = build_report(&records, &["execs_per_sec"], &["execs_per_sec"]).unwrap();
        assert!(report.summary.is_none());
    }

    #[test]
    fn test_missing_summarized_field_is_fatal() {
        let records = vec![
            record(&[("execs_per_sec", "100.0")]),
            record(&[("paths_total", "3")]),
        ];

        let err = build_report(&records, &["execs_per_sec"], &["execs_per_sec"]).unwrap_err();
        match err {
            ReportError::MissingField { field, experiment } => {
                assert_eq!(field, "execs_per_sec");
                assert_eq!(experiment, "Experiment 2");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_numeric_summarized_field_is_fatal() {
        let records = vec![
            record(&[("target_mode", "default")]),
            record(&[("target_mode", "qemu")]),
        ];

        let err = build_report(&records, &["target_mode"], &["target_mode"]).unwrap_err();
        assert!(matches!(err, ReportError::NonNumeric { ref value, .. } if value == "default"));

        let records = vec![record(&[("a", "1")]), record(&[("a", "nan")])];
        assert!(build_report(&records, &["a"], &["a"]).is_err());
    }

    #[test]
    fn test_infinite_value_reported_as_non_numeric() {
        let records = vec![
            record(&[("execs_per_sec", "100.0")]),
            record(&[("execs_per_sec", "200.0")]),
            record(&[("execs_per_sec", "inf")]),
        ];

        let err = build_report(&records, &["execs_per_sec"], &["execs_per_sec"]).unwrap_err();
        match err {
            ReportError::NonNumeric {
                field,
                experiment,
                value,
            } => {
                assert_eq!(field, "execs_per_sec");
                assert_eq!(experiment, "Experiment 3");
                assert_eq!(value, "inf");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_input() {
        let report = build_report::<&str>(&[], &[], &[]).unwrap();
        assert!(report.experiments.is_empty());
        assert!(report.summary.is_none());
    }
}
