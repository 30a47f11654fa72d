//! Structured report of recoverable failures in a run.
//!
//! Components never raise these past their boundary; they accumulate here
//! and travel alongside the run's result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category of a recoverable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Page or asset unreachable or timed out; dropped from the graph
    FetchFailure,
    /// Crawl target returned a recognizable error page; skipped
    ErrorPageDetected,
    /// Storage network rejected or timed out a write after retries
    UploadFailure,
    /// A reference matched several stored paths with equal specificity
    CanonicalizationAmbiguity,
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IssueKind::FetchFailure => "fetch failure",
            IssueKind::ErrorPageDetected => "error page",
            IssueKind::UploadFailure => "upload failure",
            IssueKind::CanonicalizationAmbiguity => "ambiguous reference",
        };
        f.write_str(s)
    }
}

/// One recoverable failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    /// URL or path the failure concerns
    pub target: String,
    pub detail: String,
}

impl Issue {
    pub fn new(kind: IssueKind, target: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} ({})", self.kind, self.target, self.detail)
    }
}

/// Accumulated issues of one extraction or publish run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub issues: Vec<Issue>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::now_v7(),
            started_at: Utc::now(),
            finished_at: None,
            issues: Vec::new(),
        }
    }

    pub fn record(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    /// Record a failure by parts.
    pub fn push(&mut self, kind: IssueKind, target: impl Into<String>, detail: impl Into<String>) {
        self.record(Issue::new(kind, target, detail));
    }

    /// Fold another report's issues into this one.
    pub fn merge(&mut self, other: RunReport) {
        self.issues.extend(other.issues);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn count(&self, kind: IssueKind) -> usize {
        self.issues.iter().filter(|i| i.kind == kind).count()
    }

    pub fn of_kind(&self, kind: IssueKind) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.kind == kind)
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Whether any item was dropped (ambiguities alone do not count).
    pub fn has_failures(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.kind != IssueKind::CanonicalizationAmbiguity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_failures() {
        let mut report = RunReport::new();
        assert!(report.is_clean());

        report.push(IssueKind::CanonicalizationAmbiguity, "/x", "two matches");
        assert!(!report.has_failures());

        report.push(IssueKind::FetchFailure, "https://example.com/a", "timeout");
        report.push(IssueKind::FetchFailure, "https://example.com/b", "timeout");
        assert!(report.has_failures());
        assert_eq!(report.count(IssueKind::FetchFailure), 2);
        assert_eq!(report.of_kind(IssueKind::UploadFailure).count(), 0);
    }

    #[test]
    fn test_merge() {
        let mut a = RunReport::new();
        let mut b = RunReport::new();
        b.push(IssueKind::UploadFailure, "/a.png", "rejected");
        a.merge(b);
        assert_eq!(a.issues.len(), 1);
        assert_eq!(
            a.issues[0].to_string(),
            "upload failure: /a.png (rejected)"
        );
    }
}
