//! Plain-text rendering of workflow views

use std::fmt::Write;

use chrono::{DateTime, Utc};

use approval::models::{Actor, LetterStatus, StepStatus};
use approval::workflow::{HistoryEntry, LetterSummary, LetterView, PendingStep, Role};

fn timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

fn marker(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Approved => "[approved]",
        StepStatus::Rejected => "[rejected]",
        StepStatus::Pending => "[pending] ",
    }
}

pub fn route(roles: &[Role]) -> String {
    let mut out = String::from("Approval route:");
    for (i, role) in roles.iter().enumerate() {
        let _ = write!(out, "\n  {}. {}", i + 1, role);
    }
    out
}

pub fn roles(route_roles: &[Role]) -> String {
    let names: Vec<_> = Role::ALL.iter().map(Role::as_str).collect();
    format!("Valid roles: {}\n\n{}", names.join(", "), route(route_roles))
}

pub fn init(database_url: &str, route_roles: &[Role]) -> String {
    format!("Database initialized: {}\n{}", database_url, roles(route_roles))
}

pub fn actors(actors: &[Actor]) -> String {
    if actors.is_empty() {
        return "No actors found".to_string();
    }
    let mut out = String::from("Actors:");
    for actor in actors {
        let _ = write!(out, "\n  ID: {}, Name: {}, Role: {}", actor.id, actor.name, actor.role);
    }
    out
}

pub fn pending(role: &str, steps: &[PendingStep]) -> String {
    if steps.is_empty() {
        return format!("No pending letters for role: {}", role);
    }
    let mut out = format!("Pending letters for {}:", role);
    for step in steps {
        let _ = write!(
            out,
            "\n\nID: {}\nTitle: {}\nFrom: {}\nSent: {}\nStep: {} of {}",
            step.letter_id,
            step.title,
            step.sender_name,
            timestamp(&step.created_at),
            step.step_index + 1,
            step.total_steps
        );
    }
    out
}

pub fn letters(letters: &[LetterSummary]) -> String {
    if letters.is_empty() {
        return "No letters found".to_string();
    }
    let mut out = String::from("Letters:");
    for letter in letters {
        let _ = write!(
            out,
            "\n\nID: {}\nTitle: {}\nFrom: {}\nStatus: {}\nSent: {}",
            letter.id,
            letter.title,
            letter.sender_name,
            letter.status,
            timestamp(&letter.created_at)
        );
    }
    out
}

pub fn act_outcome(view: &LetterView) -> String {
    let mut out = format!("Action recorded\n\nLetter status: {}", view.letter.status);
    if let Some(current) = &view.current_step {
        let _ = write!(out, "\nNext approver: {}", current.role);
    }
    out
}

pub fn letter(view: &LetterView) -> String {
    let l = &view.letter;
    let mut out = format!(
        "Letter ID: {}\nTitle: {}\nFrom: {} ({})\nBody: {}\nStatus: {}\nSent: {}\n\nApproval Steps:",
        l.id,
        l.title,
        l.sender_name,
        l.sender_role,
        l.body,
        l.status,
        timestamp(&l.created_at)
    );
    for step in &view.steps {
        let _ = write!(
            out,
            "\n  {} Step {}: {}",
            marker(step.status),
            step.step_index + 1,
            step.role
        );
        if let Some(name) = &step.actor_name {
            let _ = write!(out, " by {}", name);
        }
        if let Some(comments) = &step.comments {
            let _ = write!(out, "\n      Comments: {}", comments);
        }
    }
    if l.status == LetterStatus::Pending {
        if let Some(current) = &view.current_step {
            let _ = write!(out, "\n\nWaiting on: {}", current.role);
        }
    }
    out
}

pub fn history(letter_id: i64, entries: &[HistoryEntry]) -> String {
    let mut out = format!("History for letter ID: {}", letter_id);
    for entry in entries {
        let _ = write!(
            out,
            "\n\n  {} Step {}: {}",
            marker(entry.status),
            entry.step_index + 1,
            entry.role
        );
        if let Some(name) = &entry.actor_name {
            let _ = write!(out, " by {}", name);
        }
        if let Some(at) = &entry.acted_at {
            let _ = write!(out, " on {}", timestamp(at));
        }
        if let Some(comments) = &entry.comments {
            let _ = write!(out, "\n      Comments: {}", comments);
        }
    }
    out
}
