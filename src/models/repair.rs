use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStatus {
    NotStarted,
    InProgress,
    OnHold,
    Completed,
    PendingParts,
}

impl RepairStatus {
    pub const ALL: [RepairStatus; 5] = [
        RepairStatus::NotStarted,
        RepairStatus::InProgress,
        RepairStatus::OnHold,
        RepairStatus::Completed,
        RepairStatus::PendingParts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RepairStatus::NotStarted => "not started",
            RepairStatus::InProgress => "in progress",
            RepairStatus::OnHold => "on hold",
            RepairStatus::Completed => "completed",
            RepairStatus::PendingParts => "pending parts",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .find(|status| status.as_str() == normalized)
            .copied()
    }

    /// The status labels presented as clickable options.
    pub fn labels() -> Vec<String> {
        Self::ALL.iter().map(|s| s.as_str().to_string()).collect()
    }
}

/// One reported problem and how its repair is going.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RepairIssue {
    pub issue: String,
    pub status: RepairStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spare_parts: Option<Vec<String>>,
}

/// The repair order, built field by field as the conversation advances.
/// Fields are only written by the step that owns them and never rolled back.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RepairInfo {
    pub customer_name: String,
    pub customer_mobile: String,
    pub issue_priorities: HashMap<String, u32>,
    pub estimated_completion_time: String,
    pub repair_issues: Vec<RepairIssue>,
}

impl RepairInfo {
    pub fn issue_mut(&mut self, name: &str) -> Option<&mut RepairIssue> {
        self.repair_issues.iter_mut().find(|i| i.issue == name)
    }

    pub fn all_completed(&self) -> bool {
        !self.repair_issues.is_empty()
            && self
                .repair_issues
                .iter()
                .all(|i| i.status == RepairStatus::Completed)
    }

    /// The best (lowest) rank across all prioritized issues.
    pub fn min_priority(&self) -> Option<u32> {
        self.issue_priorities.values().min().copied()
    }

    /// Rank to assign to an issue reported after prioritization.
    pub fn next_priority(&self) -> u32 {
        self.issue_priorities.values().max().copied().unwrap_or(0) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!(RepairStatus::parse("Pending Parts"), Some(RepairStatus::PendingParts));
        assert_eq!(RepairStatus::parse("  completed "), Some(RepairStatus::Completed));
        assert_eq!(RepairStatus::parse("finished"), None);
    }

    #[test]
    fn test_all_completed_requires_issues() {
        let mut info = RepairInfo::default();
        assert!(!info.all_completed());

        info.repair_issues.push(RepairIssue {
            issue: "Brakes".to_string(),
            status: RepairStatus::Completed,
            spare_parts: None,
        });
        assert!(info.all_completed());

        info.repair_issues.push(RepairIssue {
            issue: "Engine".to_string(),
            status: RepairStatus::OnHold,
            spare_parts: None,
        });
        assert!(!info.all_completed());
    }
}
