use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a candidate message, as handed out by the store listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageRef(pub String);

impl MessageRef {
    pub fn new(id: impl Into<String>) -> Self {
        MessageRef(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lightweight metadata projection of a message.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageMetadata {
    pub id: MessageRef,
    pub snippet: String,
    pub subject: Option<String>,
    /// Internal reception time in epoch milliseconds, `None` when missing or unparseable.
    pub received_at_millis: Option<i64>,
}

impl MessageMetadata {
    pub fn new(
        id: MessageRef,
        snippet: Option<String>,
        subject: Option<String>,
        received_at_millis: Option<i64>,
    ) -> Self {
        MessageMetadata {
            id,
            snippet: snippet.unwrap_or_default(),
            subject,
            received_at_millis,
        }
    }
}

/// Statistics computed over the classified messages of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub total_applications: usize,
    /// "YYYY-MM" -> count, only months with at least one application.
    pub monthly_count: BTreeMap<String, usize>,
    pub average_per_day: f64,
    pub todays_count: usize,
}

impl AnalysisResult {
    /// Equality ignoring `todays_count`, which depends on the reference clock.
    pub fn same_history(&self, other: &AnalysisResult) -> bool {
        self.total_applications == other.total_applications
            && self.monthly_count == other.monthly_count
            && self.average_per_day == other.average_per_day
    }
}

/// How a run ended. Keeps "nothing to analyse" apart from "something broke".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RunStatus {
    Completed,
    NoMessages,
    NoApplications,
    Failed { reason: String },
}

/// Top-level value returned by one pipeline execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub authorized_identity: String,
    pub analysis: Option<AnalysisResult>,
    pub status: RunStatus,
    /// Messages whose metadata was fetched successfully.
    pub scanned: usize,
    /// Messages skipped because their fetch failed.
    pub skipped: usize,
}

impl RunOutcome {
    /// Degraded outcome used whenever a run fails before producing data.
    pub fn failed(reason: impl Into<String>) -> Self {
        RunOutcome {
            authorized_identity: String::new(),
            analysis: None,
            status: RunStatus::Failed { reason: reason.into() },
            scanned: 0,
            skipped: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self.status, RunStatus::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_defaults_empty_snippet() {
        let meta = MessageMetadata::new(MessageRef::new("m1"), None, None, Some(1));
        assert_eq!(meta.snippet, "");
        assert!(meta.subject.is_none());
    }

    #[test]
    fn test_outcome_json_shape() {
        let mut monthly_count = BTreeMap::new();
        monthly_count.insert("2024-03".to_string(), 2);
        let outcome = RunOutcome {
            authorized_identity: "me@example.com".to_string(),
            analysis: Some(AnalysisResult {
                total_applications: 2,
                monthly_count,
                average_per_day: 1.0,
                todays_count: 0,
            }),
            status: RunStatus::Completed,
            scanned: 10,
            skipped: 1,
        };

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["authorizedIdentity"], "me@example.com");
        assert_eq!(json["analysis"]["totalApplications"], 2);
        assert_eq!(json["analysis"]["monthlyCount"]["2024-03"], 2);
        assert_eq!(json["status"]["kind"], "completed");
    }

    #[test]
    fn test_failed_outcome_is_degraded() {
        let outcome = RunOutcome::failed("token missing");
        assert_eq!(outcome.authorized_identity, "");
        assert!(outcome.analysis.is_none());
        assert!(!outcome.is_success());
        assert_eq!(
            outcome.status,
            RunStatus::Failed { reason: "token missing".to_string() }
        );
    }
}
