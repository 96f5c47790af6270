// Quality analyzer: a fixed battery of independent checks scored against configurable thresholds

pub mod checks;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::config::QualityConfig;
use crate::domain::Record;
use crate::observability::metrics;

pub use checks::{CheckCategory, CheckKind, IssueType};
use checks::{run_check, CheckContext, Finding};

/// Outcome band of a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Success,
    Warning,
    Error,
}

impl CheckStatus {
    /// Classify a score against the configured thresholds
    pub fn classify(score: f64, config: &QualityConfig) -> Self {
        if score >= config.success_threshold {
            CheckStatus::Success
        } else if score >= config.warning_threshold {
            CheckStatus::Warning
        } else {
            CheckStatus::Error
        }
    }

    /// Severity of the detail rows produced by a check in this band
    pub fn severity(&self) -> IssueSeverity {
        match self {
            CheckStatus::Success => IssueSeverity::Info,
            CheckStatus::Warning => IssueSeverity::Warning,
            CheckStatus::Error => IssueSeverity::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Info,
    Warning,
    Error,
}

/// Score and issue count of one check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityCheckResult {
    pub category: CheckCategory,
    pub check: CheckKind,
    pub check_name: String,
    pub status: CheckStatus,
    /// 0..=100
    pub score: f64,
    pub issue_count: usize,
    /// Units the check examined
    pub checked: usize,
}

/// One offending cell, for drill-down
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueDetail {
    pub check: CheckKind,
    pub issue_type: IssueType,
    pub column: String,
    pub row_index: usize,
    pub offending_value: String,
    pub description: String,
    pub severity: IssueSeverity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub checks: Vec<QualityCheckResult>,
    pub overall_score: f64,
    /// Every finding, including those past the detail cap
    pub total_issues: usize,
    pub issues: Vec<IssueDetail>,
    pub total_records: usize,
    /// Records with no finding in any check
    pub valid_records: usize,
    pub valid_ratio: f64,
    /// Distinct records with at least one error-severity finding
    pub critical_records: usize,
    pub as_of: NaiveDate,
    pub analyzed_at: DateTime<Utc>,
}

impl QualityReport {
    pub fn checks_in(&self, category: CheckCategory) -> impl Iterator<Item = &QualityCheckResult> {
        self.checks.iter().filter(move |c| c.category == category)
    }

    pub fn status_of(&self, check: CheckKind) -> Option<CheckStatus> {
        self.checks.iter().find(|c| c.check == check).map(|c| c.status)
    }
}

/// `100 * (1 - issues / checked)` clamped to 0..=100; nothing checked scores 100
pub fn check_score(issues: usize, checked: usize) -> f64 {
    if checked == 0 {
        return 100.0;
    }
    (100.0 * (1.0 - issues as f64 / checked as f64)).clamp(0.0, 100.0)
}

/// Unweighted mean; an empty battery scores 100
pub fn mean_score(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 100.0;
    }
    scores.iter().sum::<f64>() / scores.len() as f64
}

pub struct QualityAnalyzer {
    config: QualityConfig,
    checks: Vec<CheckKind>,
}

impl QualityAnalyzer {
    /// Analyzer running the full battery
    pub fn new(config: QualityConfig) -> Self {
        Self::with_checks(config, &CheckKind::ALL)
    }

    /// Analyzer running only the given checks, in the given order
    pub fn with_checks(config: QualityConfig, checks: &[CheckKind]) -> Self {
        let mut unique = Vec::with_capacity(checks.len());
        for check in checks {
            if !unique.contains(check) {
                unique.push(*check);
            }
        }
        Self { config, checks: unique }
    }

    pub fn checks(&self) -> &[CheckKind] {
        &self.checks
    }

    fn context(&self) -> CheckContext {
        CheckContext {
            as_of: self.config.as_of.unwrap_or_else(|| Utc::now().date_naive()),
            min_commission_rate: self.config.min_commission_rate,
            max_commission_rate: self.config.max_commission_rate,
        }
    }

    pub fn analyze(&self, records: &[Record]) -> QualityReport {
        let ctx = self.context();
        let mut results = Vec::with_capacity(self.checks.len());
        let mut issues = Vec::new();
        let mut total_issues = 0;
        let mut flagged: HashSet<usize> = HashSet::new();
        let mut critical: HashSet<usize> = HashSet::new();

        for &kind in &self.checks {
            let outcome = run_check(kind, records, &ctx);
            let issue_count = outcome.issues;
            let score = check_score(issue_count, outcome.checked);
            let status = CheckStatus::classify(score, &self.config);
            let severity = status.severity();
            debug!(
                "Check '{}' scored {:.1} ({} of {} units flagged)",
                kind.key(),
                score,
                issue_count,
                outcome.checked
            );

            total_issues += issue_count;
            for finding in outcome.findings {
                flagged.insert(finding.position);
                if severity == IssueSeverity::Error {
                    critical.insert(finding.position);
                }
                if issues.len() < self.config.max_issue_details {
                    issues.push(detail(kind, severity, finding));
                }
            }

            metrics::quality::check_scored(kind.key(), score, issue_count);
            results.push(QualityCheckResult {
                category: kind.category(),
                check: kind,
                check_name: kind.name().to_string(),
                status,
                score,
                issue_count,
                checked: outcome.checked,
            });
        }

        let scores: Vec<f64> = results.iter().map(|r| r.score).collect();
        let overall_score = mean_score(&scores);
        let total_records = records.len();
        let valid_records = total_records - flagged.len();
        let valid_ratio = if total_records == 0 {
            100.0
        } else {
            valid_records as f64 / total_records as f64 * 100.0
        };

        metrics::quality::run_completed(overall_score);
        info!(
            "Quality analysis: {} checks, overall {:.1}, {} issues across {} records",
            results.len(),
            overall_score,
            total_issues,
            total_records
        );

        QualityReport {
            checks: results,
            overall_score,
            total_issues,
            issues,
            total_records,
            valid_records,
            valid_ratio,
            critical_records: critical.len(),
            as_of: ctx.as_of,
            analyzed_at: Utc::now(),
        }
    }
}

fn detail(check: CheckKind, severity: IssueSeverity, finding: Finding) -> IssueDetail {
    IssueDetail {
        check,
        issue_type: finding.issue_type,
        column: finding.column,
        row_index: finding.row_index,
        offending_value: finding.value,
        description: finding.description,
        severity,
    }
}
