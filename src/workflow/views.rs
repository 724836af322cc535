//! Read views assembled from letters, steps and actors

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::role::Role;
use crate::models::{LetterStatus, StepStatus};

/// Letter with its sender's display data
#[derive(Debug, Clone, Serialize)]
pub struct LetterDetail {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub sender_id: i64,
    pub sender_name: String,
    pub sender_role: Role,
    pub status: LetterStatus,
    pub created_at: DateTime<Utc>,
    pub current_step: i64,
}

/// Step with the acting actor's display data, if any
#[derive(Debug, Clone, Serialize)]
pub struct StepDetail {
    pub id: i64,
    pub letter_id: i64,
    pub step_index: i64,
    pub role: Role,
    pub status: StepStatus,
    pub actor_id: Option<i64>,
    pub actor_name: Option<String>,
    pub actor_role: Option<Role>,
    pub comments: Option<String>,
    pub acted_at: Option<DateTime<Utc>>,
}

/// The step a pending letter is waiting on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentStepInfo {
    pub role: Role,
    pub status: StepStatus,
}

/// Full view of one letter
#[derive(Debug, Clone, Serialize)]
pub struct LetterView {
    pub letter: LetterDetail,
    pub steps: Vec<StepDetail>,
    /// Present only while the letter is pending
    pub current_step: Option<CurrentStepInfo>,
    pub total_steps: usize,
}

impl LetterView {
    pub fn new(letter: LetterDetail, steps: Vec<StepDetail>) -> Self {
        let current_step = if letter.status == LetterStatus::Pending {
            steps
                .iter()
                .find(|s| s.step_index == letter.current_step)
                .map(|s| CurrentStepInfo {
                    role: s.role,
                    status: s.status,
                })
        } else {
            None
        };
        let total_steps = steps.len();

        Self {
            letter,
            steps,
            current_step,
            total_steps,
        }
    }
}

/// A step waiting on a role, joined with its letter and sender
#[derive(Debug, Clone, Serialize)]
pub struct PendingStep {
    pub step_id: i64,
    pub letter_id: i64,
    pub step_index: i64,
    pub total_steps: i64,
    pub role: Role,
    pub title: String,
    pub body: String,
    pub sender_id: i64,
    pub sender_name: String,
    pub created_at: DateTime<Utc>,
}

/// One line of a letter's history
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub step_index: i64,
    pub role: Role,
    pub status: StepStatus,
    pub actor_name: Option<String>,
    pub actor_role: Option<Role>,
    pub comments: Option<String>,
    pub acted_at: Option<DateTime<Utc>>,
}

impl From<StepDetail> for HistoryEntry {
    fn from(step: StepDetail) -> Self {
        Self {
            step_index: step.step_index,
            role: step.role,
            status: step.status,
            actor_name: step.actor_name,
            actor_role: step.actor_role,
            comments: step.comments,
            acted_at: step.acted_at,
        }
    }
}

/// Row of a letter listing
#[derive(Debug, Clone, Serialize)]
pub struct LetterSummary {
    pub id: i64,
    pub title: String,
    pub sender_id: i64,
    pub sender_name: String,
    pub status: LetterStatus,
    pub created_at: DateTime<Utc>,
    pub current_step: i64,
}
