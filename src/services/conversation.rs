use crate::models::{Conversation, InputKind, Message, RepairInfo, RepairIssue, RepairStatus, Step};
use crate::services::events::record_chat_event;
use crate::state::AppState;

pub const WELCOME: &str = "Welcome! Please enter the car model for repair:";

/// Option presented alongside the issue labels on the re-selection prompt;
/// choosing it leaves the status cycle.
pub const DONE_OPTION: &str = "done";

pub fn new_conversation(id: String, ttl_minutes: i64) -> Conversation {
    let now = chrono::Utc::now().naive_utc();
    Conversation {
        id,
        messages: vec![Message::bot(WELCOME)],
        step: Step::Car,
        current_car: None,
        repair: RepairInfo::default(),
        last_activity: now,
        expires_at: now + chrono::Duration::minutes(ttl_minutes),
    }
}

/// Run one submit through the step the conversation is currently on. All
/// validation failures are transcript messages; nothing here returns an error
/// or aborts the conversation.
pub fn process_submit(state: &AppState, conv: &mut Conversation, input: &str) {
    let input = input.trim();

    // Empty submits are ignored, except where the step keeps its own buffer
    // (toggled issues, click-cycled ranks) that an empty submit should flush.
    if input.is_empty() && !matches!(conv.step, Step::Issues { .. } | Step::Priorities { .. }) {
        return;
    }

    tracing::info!(session = %conv.id, step = conv.step.name(), "processing submit");

    match conv.step.clone() {
        Step::Car => handle_car(state, conv, input),
        Step::Issues { selected } => handle_issues_submit(state, conv, selected),
        Step::CustomerName { issues } => handle_customer_name(state, conv, input, issues),
        Step::CustomerMobile { issues } => handle_customer_mobile(state, conv, input, issues),
        Step::Priorities { issues, ranks } => {
            handle_priorities_submit(state, conv, input, issues, ranks)
        }
        Step::EstimatedTime => handle_estimated_time(state, conv, input),
        Step::RepairStatus { issue } => handle_repair_status(state, conv, input, &issue),
        Step::SpareParts { issue } => handle_spare_parts(state, conv, input, &issue),
        Step::SelectIssue => handle_select_issue(state, conv, input),
        Step::NewIssues { awaiting_description } => {
            handle_new_issues(state, conv, input, awaiting_description)
        }
        Step::ContinueRepair => handle_continue_repair(state, conv, input),
        Step::Complete => {
            push(
                state,
                conv,
                Message::bot("This repair order is already logged. Start a new session for another car."),
            );
        }
    }

    conv.touch(state.config.session_ttl_minutes);
}

/// A clicked option. Single-select steps treat the click exactly like typing
/// the value; the issue multi-select toggles membership and the priority step
/// cycles that issue's rank instead.
pub fn process_option(state: &AppState, conv: &mut Conversation, option: &str) {
    match conv.step.clone() {
        Step::Issues { mut selected } => {
            if let Some(pos) = selected.iter().position(|i| i == option) {
                selected.remove(pos);
            } else {
                selected.push(option.to_string());
            }
            conv.step = Step::Issues { selected };
            conv.touch(state.config.session_ttl_minutes);
        }
        Step::Priorities { issues, mut ranks } => {
            if let Some(index) = issues.iter().position(|i| i == option) {
                // Wraps modulo the issue count; duplicate ranks are not
                // checked for.
                ranks[index] = (ranks[index] % issues.len() as u32) + 1;
            }
            conv.step = Step::Priorities { issues, ranks };
            conv.touch(state.config.session_ttl_minutes);
        }
        _ => process_submit(state, conv, option),
    }
}

fn push(state: &AppState, conv: &mut Conversation, message: Message) {
    record_chat_event(state, &conv.id, &message);
    conv.messages.push(message);
}

// ── Step handlers ──

fn handle_car(state: &AppState, conv: &mut Conversation, input: &str) {
    push(state, conv, Message::user(input));

    match state.catalog.find_exact(input) {
        Some(car) => {
            let car = car.to_string();
            conv.current_car = Some(car.clone());
            push(
                state,
                conv,
                Message::bot(format!(
                    "Identified: {car}. What issues need to be addressed? (Select all that apply)"
                ))
                .with_options(state.catalog.issues.clone())
                .multi_select(),
            );
            conv.step = Step::Issues { selected: Vec::new() };
        }
        None => {
            let similar = state.catalog.find_similar(input);
            if similar.is_empty() {
                push(
                    state,
                    conv,
                    Message::bot("No matching car models found. Please check the model and try again."),
                );
            } else {
                push(
                    state,
                    conv,
                    Message::bot("No exact match found. Did you mean one of these models?")
                        .with_options(similar),
                );
            }
        }
    }
}

fn handle_issues_submit(state: &AppState, conv: &mut Conversation, selected: Vec<String>) {
    if selected.is_empty() {
        push(
            state,
            conv,
            Message::bot("Please select at least one issue before proceeding."),
        );
        return;
    }

    let car = conv.current_car.clone().unwrap_or_default();
    push(state, conv, Message::user(selected.join(", ")));
    push(
        state,
        conv,
        Message::bot(format!(
            "Noted issues for {car}:\n{}.\nPlease enter the customer's name:",
            selected.join("\n")
        ))
        .with_input(InputKind::Text, "Enter customer's name"),
    );
    conv.step = Step::CustomerName { issues: selected };
}

fn handle_customer_name(state: &AppState, conv: &mut Conversation, input: &str, issues: Vec<String>) {
    conv.repair.customer_name = input.to_string();
    push(state, conv, Message::user(input));
    push(
        state,
        conv,
        Message::bot("Customer name recorded. Please enter the customer's contact number:")
            .with_input(InputKind::Phone, "Enter customer's contact number"),
    );
    conv.step = Step::CustomerMobile { issues };
}

fn handle_customer_mobile(
    state: &AppState,
    conv: &mut Conversation,
    input: &str,
    issues: Vec<String>,
) {
    conv.repair.customer_mobile = input.to_string();
    push(state, conv, Message::user(input));
    push(
        state,
        conv,
        Message::bot("Contact number recorded. Please prioritize the repair issues (1 being highest priority):")
            .with_options(issues.clone()),
    );
    let ranks = vec![0; issues.len()];
    conv.step = Step::Priorities { issues, ranks };
}

fn handle_priorities_submit(
    state: &AppState,
    conv: &mut Conversation,
    input: &str,
    issues: Vec<String>,
    ranks: Vec<u32>,
) {
    // A typed comma list wins; an empty submit flushes the clicked ranks.
    let text = if input.is_empty() {
        if ranks.iter().all(|r| *r == 0) {
            return;
        }
        ranks
            .iter()
            .map(|r| if *r == 0 { String::new() } else { r.to_string() })
            .collect::<Vec<_>>()
            .join(",")
    } else {
        input.to_string()
    };

    push(state, conv, Message::user(text.clone()));

    let entries: Vec<&str> = text.split(',').collect();
    for (index, issue) in issues.iter().enumerate() {
        // Missing or non-numeric entries default to position + 1.
        let rank = entries
            .get(index)
            .and_then(|e| e.trim().parse::<u32>().ok())
            .unwrap_or(index as u32 + 1);
        conv.repair.issue_priorities.insert(issue.clone(), rank);
    }

    conv.repair.repair_issues = issues
        .iter()
        .map(|issue| RepairIssue {
            issue: issue.clone(),
            status: RepairStatus::NotStarted,
            spare_parts: None,
        })
        .collect();

    push(
        state,
        conv,
        Message::bot("Priorities set. What's the estimated completion time for the repairs?")
            .with_input(InputKind::Text, "Enter estimated completion time"),
    );
    conv.step = Step::EstimatedTime;
}

fn handle_estimated_time(state: &AppState, conv: &mut Conversation, input: &str) {
    conv.repair.estimated_completion_time = input.to_string();
    push(state, conv, Message::user(input));

    // Work starts on the top-priority issue; ties go to the earlier position.
    let focused = top_priority_issue(&conv.repair);
    prompt_status(state, conv, &focused, None);
}

fn handle_repair_status(state: &AppState, conv: &mut Conversation, input: &str, issue: &str) {
    let Some(status) = RepairStatus::parse(input) else {
        push(state, conv, Message::user(input));
        push(
            state,
            conv,
            Message::bot("Please choose one of the listed repair statuses."),
        );
        return;
    };

    push(state, conv, Message::user(input));
    if let Some(repair_issue) = conv.repair.issue_mut(issue) {
        repair_issue.status = status;
    }

    if status == RepairStatus::PendingParts {
        push(
            state,
            conv,
            Message::bot(format!("Which spare parts are needed for {issue}? (comma-separated)"))
                .with_input(InputKind::Text, "e.g. brake pads, rotors"),
        );
        conv.step = Step::SpareParts {
            issue: issue.to_string(),
        };
    } else {
        prompt_select_issue(state, conv);
    }
}

fn handle_spare_parts(state: &AppState, conv: &mut Conversation, input: &str, issue: &str) {
    push(state, conv, Message::user(input));

    let parts: Vec<String> = input
        .split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();

    if let Some(repair_issue) = conv.repair.issue_mut(issue) {
        repair_issue.spare_parts = Some(parts);
    }

    prompt_select_issue(state, conv);
}

fn handle_select_issue(state: &AppState, conv: &mut Conversation, input: &str) {
    if input.eq_ignore_ascii_case(DONE_OPTION) {
        push(state, conv, Message::user(input));
        push(
            state,
            conv,
            Message::bot("Were any new issues discovered during the repair?")
                .with_options(vec!["yes".to_string(), "no".to_string()]),
        );
        conv.step = Step::NewIssues {
            awaiting_description: false,
        };
        return;
    }

    let known = conv.repair.repair_issues.iter().any(|i| i.issue == input);
    if !known {
        push(state, conv, Message::user(input));
        push(
            state,
            conv,
            Message::bot(format!(
                "{input} is not one of the reported issues. Please pick one from the list."
            )),
        );
        return;
    }

    push(state, conv, Message::user(input));

    let rank = conv.repair.issue_priorities.get(input).copied();
    let min = conv.repair.min_priority();
    let warning = match (rank, min) {
        (Some(rank), Some(min)) if rank > min => {
            Some(format!("Note: {input} is not the highest priority issue."))
        }
        _ => None,
    };
    prompt_status(state, conv, input, warning);
}

fn handle_new_issues(
    state: &AppState,
    conv: &mut Conversation,
    input: &str,
    awaiting_description: bool,
) {
    if input.eq_ignore_ascii_case("yes") {
        push(state, conv, Message::user(input));
        push(
            state,
            conv,
            Message::bot("Please describe the new issue:")
                .with_input(InputKind::Text, "Describe the issue"),
        );
        conv.step = Step::NewIssues {
            awaiting_description: true,
        };
        return;
    }

    push(state, conv, Message::user(input));

    if awaiting_description {
        let rank = conv.repair.next_priority();
        conv.repair
            .issue_priorities
            .insert(input.to_string(), rank);
        conv.repair.repair_issues.push(RepairIssue {
            issue: input.to_string(),
            status: RepairStatus::NotStarted,
            spare_parts: None,
        });
        push(
            state,
            conv,
            Message::bot(format!("Added {input} to the repair order.")),
        );
    }

    finalize(state, conv);
}

fn handle_continue_repair(state: &AppState, conv: &mut Conversation, input: &str) {
    push(state, conv, Message::user(input));

    if input.eq_ignore_ascii_case("yes") {
        prompt_select_issue(state, conv);
    } else {
        // The operator's explicit stop: log the order as it stands.
        let summary = render_summary(conv);
        push(state, conv, Message::bot(summary));
        conv.step = Step::Complete;
        tracing::info!(session = %conv.id, "repair order logged with open issues");
    }
}

// ── Shared prompts and finalization ──

fn prompt_status(state: &AppState, conv: &mut Conversation, issue: &str, warning: Option<String>) {
    let mut text = format!("Set the repair status for {issue}:");
    if let Some(warning) = warning {
        text = format!("{warning}\n{text}");
    }
    push(
        state,
        conv,
        Message::bot(text).with_options(RepairStatus::labels()),
    );
    conv.step = Step::RepairStatus {
        issue: issue.to_string(),
    };
}

fn prompt_select_issue(state: &AppState, conv: &mut Conversation) {
    let mut options: Vec<String> = conv
        .repair
        .repair_issues
        .iter()
        .map(|i| i.issue.clone())
        .collect();
    options.push(DONE_OPTION.to_string());

    push(
        state,
        conv,
        Message::bot("Which issue would you like to update next?").with_options(options),
    );
    conv.step = Step::SelectIssue;
}

/// All issues completed: log the order and finish. Otherwise ask whether to
/// keep working on the remaining issues.
fn finalize(state: &AppState, conv: &mut Conversation) {
    if conv.repair.all_completed() {
        let summary = render_summary(conv);
        push(state, conv, Message::bot(summary));
        conv.step = Step::Complete;
        tracing::info!(session = %conv.id, "repair order complete");
    } else {
        push(
            state,
            conv,
            Message::bot("Not every issue is completed yet. Continue working on the remaining issues?")
                .with_options(vec!["yes".to_string(), "no".to_string()]),
        );
        conv.step = Step::ContinueRepair;
    }
}

fn top_priority_issue(repair: &RepairInfo) -> String {
    repair
        .repair_issues
        .iter()
        .min_by_key(|i| repair.issue_priorities.get(&i.issue).copied().unwrap_or(u32::MAX))
        .map(|i| i.issue.clone())
        .unwrap_or_default()
}

pub fn render_summary(conv: &Conversation) -> String {
    let repair = &conv.repair;
    let mut out = String::from("Repair order summary:\n\n");
    out.push_str(&format!(
        "Car model: {}\n",
        conv.current_car.as_deref().unwrap_or("unknown")
    ));
    out.push_str(&format!("Customer name: {}\n", repair.customer_name));
    out.push_str(&format!("Customer contact: {}\n", repair.customer_mobile));
    out.push_str(&format!(
        "Estimated completion time: {}\n\n",
        repair.estimated_completion_time
    ));
    out.push_str("Issues:\n");
    for issue in &repair.repair_issues {
        let rank = repair.issue_priorities.get(&issue.issue).copied().unwrap_or(0);
        out.push_str(&format!(
            "- {} (priority {}): {}\n",
            issue.issue,
            rank,
            issue.status.as_str()
        ));
        if let Some(parts) = &issue.spare_parts {
            if !parts.is_empty() {
                out.push_str(&format!("  parts: {}\n", parts.join(", ")));
            }
        }
    }
    out.push_str("\nRepair order logged. Proceed with the repairs as prioritized.");
    out
}
