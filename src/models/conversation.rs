use chrono::{Duration, NaiveDateTime, Utc};
use serde::Serialize;

use crate::models::message::Message;
use crate::models::repair::RepairInfo;

/// The engine's position in the conversation. Each variant carries exactly
/// the state that step needs, so nothing leaks across unrelated steps.
#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    Car,
    Issues { selected: Vec<String> },
    CustomerName { issues: Vec<String> },
    CustomerMobile { issues: Vec<String> },
    /// `ranks` is positionally aligned with `issues`; 0 means unset.
    Priorities { issues: Vec<String>, ranks: Vec<u32> },
    EstimatedTime,
    RepairStatus { issue: String },
    SpareParts { issue: String },
    SelectIssue,
    NewIssues { awaiting_description: bool },
    ContinueRepair,
    Complete,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Car => "car",
            Step::Issues { .. } => "issues",
            Step::CustomerName { .. } => "customer_name",
            Step::CustomerMobile { .. } => "customer_mobile",
            Step::Priorities { .. } => "priorities",
            Step::EstimatedTime => "estimated_time",
            Step::RepairStatus { .. } => "repair_status",
            Step::SpareParts { .. } => "spare_parts",
            Step::SelectIssue => "select_issue",
            Step::NewIssues { .. } => "new_issues",
            Step::ContinueRepair => "continue_repair",
            Step::Complete => "complete",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Conversation {
    pub id: String,
    pub messages: Vec<Message>,
    pub step: Step,
    pub current_car: Option<String>,
    pub repair: RepairInfo,
    pub last_activity: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

impl Conversation {
    pub fn touch(&mut self, ttl_minutes: i64) {
        let now = Utc::now().naive_utc();
        self.last_activity = now;
        self.expires_at = now + Duration::minutes(ttl_minutes);
    }

    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        now >= self.expires_at
    }

    /// Issues toggled so far, while the issue multi-select step is active.
    pub fn selected_issues(&self) -> &[String] {
        match &self.step {
            Step::Issues { selected } => selected,
            _ => &[],
        }
    }

    /// The click-cycled rank buffer as the comma-joined text a typed submit
    /// would produce; unset ranks render as empty positions.
    pub fn pending_ranks(&self) -> Option<String> {
        match &self.step {
            Step::Priorities { ranks, .. } => Some(
                ranks
                    .iter()
                    .map(|r| if *r == 0 { String::new() } else { r.to_string() })
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            _ => None,
        }
    }
}

/// Emitted once per transcript append so the surface can scroll to latest.
#[derive(Clone, Debug, Serialize)]
pub struct ChatEvent {
    pub session_id: String,
    pub message: Message,
}
