//! Metrics for the navigator
//!
//! Every metric name lives in [`MetricName`]; each phase gets a small module of
//! recording helpers so call sites never spell metric names out.

use std::fmt;
use std::sync::{Once, OnceLock};
use tracing::{info, warn};

static INIT: Once = Once::new();
static HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// Enum representing all metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Ingestion metrics
    IngestionStarted,
    IngestionCompleted,
    IngestionFailed,
    IngestionBytesTransferred,
    IngestionRowsLoaded,
    IngestionDuration,

    // Query metrics
    QueryExecuted,
    QueryMatches,

    // Quality metrics
    QualityRuns,
    QualityOverallScore,
    QualityCheckScore,
    QualityIssuesDetected,

    // Report metrics
    ReportsGenerated,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::IngestionStarted => "corban_ingestion_started_total",
            MetricName::IngestionCompleted => "corban_ingestion_completed_total",
            MetricName::IngestionFailed => "corban_ingestion_failed_total",
            MetricName::IngestionBytesTransferred => "corban_ingestion_bytes_transferred",
            MetricName::IngestionRowsLoaded => "corban_ingestion_rows_loaded",
            MetricName::IngestionDuration => "corban_ingestion_duration_seconds",

            MetricName::QueryExecuted => "corban_query_executed_total",
            MetricName::QueryMatches => "corban_query_matches",

            MetricName::QualityRuns => "corban_quality_runs_total",
            MetricName::QualityOverallScore => "corban_quality_overall_score",
            MetricName::QualityCheckScore => "corban_quality_check_score",
            MetricName::QualityIssuesDetected => "corban_quality_issues_detected_total",

            MetricName::ReportsGenerated => "corban_reports_generated_total",
        }
    }
}

/// Install the in-process Prometheus recorder. Idempotent.
pub fn init_metrics() {
    INIT.call_once(|| {
        match metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                if HANDLE.set(handle).is_err() {
                    warn!("METRICS: handle already stored");
                }
                info!("Prometheus recorder installed");
            }
            Err(e) => {
                warn!("Failed to install Prometheus recorder: {}", e);
            }
        }
    });
}

/// Render the current metrics snapshot in Prometheus text format
pub fn render() -> Option<String> {
    HANDLE.get().map(|handle| handle.render())
}

pub mod ingestion {
    use super::MetricName;

    pub fn started() {
        ::metrics::counter!(MetricName::IngestionStarted.as_str()).increment(1);
    }

    pub fn completed(bytes: u64, rows: usize, duration_secs: f64) {
        ::metrics::counter!(MetricName::IngestionCompleted.as_str()).increment(1);
        ::metrics::histogram!(MetricName::IngestionBytesTransferred.as_str()).record(bytes as f64);
        ::metrics::histogram!(MetricName::IngestionRowsLoaded.as_str()).record(rows as f64);
        ::metrics::histogram!(MetricName::IngestionDuration.as_str()).record(duration_secs);
    }

    pub fn failed(reason: &'static str) {
        ::metrics::counter!(MetricName::IngestionFailed.as_str(), "reason" => reason).increment(1);
    }
}

pub mod query {
    use super::MetricName;

    pub fn executed(total_matching: usize) {
        ::metrics::counter!(MetricName::QueryExecuted.as_str()).increment(1);
        ::metrics::histogram!(MetricName::QueryMatches.as_str()).record(total_matching as f64);
    }
}

pub mod quality {
    use super::MetricName;

    pub fn run_completed(overall_score: f64) {
        ::metrics::counter!(MetricName::QualityRuns.as_str()).increment(1);
        ::metrics::gauge!(MetricName::QualityOverallScore.as_str()).set(overall_score);
    }

    pub fn check_scored(check: &'static str, score: f64, issues: usize) {
        ::metrics::gauge!(MetricName::QualityCheckScore.as_str(), "check" => check).set(score);
        ::metrics::counter!(MetricName::QualityIssuesDetected.as_str(), "check" => check)
            .increment(issues as u64);
    }
}

pub mod report {
    use super::MetricName;

    pub fn generated(template: &'static str) {
        ::metrics::counter!(MetricName::ReportsGenerated.as_str(), "template" => template)
            .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_share_prefix() {
        let names = [
            MetricName::IngestionStarted,
            MetricName::IngestionDuration,
            MetricName::QueryExecuted,
            MetricName::QualityCheckScore,
            MetricName::ReportsGenerated,
        ];
        for name in names {
            assert!(name.as_str().starts_with("corban_"), "{}", name);
        }
        assert_eq!(MetricName::QualityRuns.to_string(), "corban_quality_runs_total");
    }
}
