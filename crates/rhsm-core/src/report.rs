//! Report entries handed to the upgrade report
//!
//! Rendering reports is not this crate's job; it only builds [`Report`]
//! values and hands them to a [`ReportSink`].

use serde::{Deserialize, Serialize};
use std::cell::RefCell;

/// Report severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
}

/// Report topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    Repository,
}

/// Report flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flag {
    /// The upgrade must not continue while this report stands
    Inhibitor,
}

/// A single report entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// One-line headline
    pub title: String,
    /// Full description shown to the user
    pub summary: String,
    pub severity: Severity,
    /// Areas of the system the report concerns
    pub tags: Vec<Tag>,
    /// Effect on the upgrade; empty for informational reports
    pub flags: Vec<Flag>,
    /// What the user should do about it
    pub remediation_hint: Option<String>,
}

impl Report {
    /// Whether the report blocks the upgrade
    pub fn is_inhibitor(&self) -> bool {
        self.flags.contains(&Flag::Inhibitor)
    }
}

/// Consumer of report entries
pub trait ReportSink {
    /// Record a report entry
    fn create_report(&self, report: Report);
}

/// Sink that keeps reports in memory, in creation order
#[derive(Debug, Default)]
pub struct CollectedReports {
    reports: RefCell<Vec<Report>>,
}

impl CollectedReports {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the reports collected so far
    pub fn reports(&self) -> Vec<Report> {
        self.reports.borrow().clone()
    }

    /// Whether any collected report is an inhibitor
    pub fn has_inhibitor(&self) -> bool {
        self.reports.borrow().iter().any(Report::is_inhibitor)
    }
}

impl ReportSink for CollectedReports {
    fn create_report(&self, report: Report) {
        self.reports.borrow_mut().push(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(flags: Vec<Flag>) -> Report {
        Report {
            title: "title".into(),
            summary: "summary".into(),
            severity: Severity::Medium,
            tags: vec![Tag::Repository],
            flags,
            remediation_hint: None,
        }
    }

    #[test]
    fn test_collected_reports_keeps_order() {
        let sink = CollectedReports::new();
        assert!(!sink.has_inhibitor());

        sink.create_report(sample(vec![]));
        sink.create_report(sample(vec![Flag::Inhibitor]));

        let reports = sink.reports();
        assert_eq!(reports.len(), 2);
        assert!(!reports[0].is_inhibitor());
        assert!(reports[1].is_inhibitor());
        assert!(sink.has_inhibitor());
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        let json = serde_json::to_string(&sample(vec![Flag::Inhibitor])).unwrap();
        assert!(json.contains("\"medium\""));
        assert!(json.contains("\"inhibitor\""));
        assert!(json.contains("\"repository\""));
    }
}
