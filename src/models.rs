//! Data models for actors, letters and approval steps

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::workflow::Role;

/// An identity that can send letters or act on steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    pub name: String,
    pub role: Role,
}

/// A document routed through an ordered sequence of approval steps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Letter {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub sender_id: i64,
    pub status: LetterStatus,
    pub created_at: DateTime<Utc>,
    /// Zero-based index of the step due next while pending; once finalized,
    /// the index of the last step processed.
    pub current_step: i64,
}

/// One role-gated checkpoint in a letter's route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: i64,
    pub letter_id: i64,
    pub step_index: i64,
    pub role: Role,
    pub status: StepStatus,
    pub actor_id: Option<i64>,
    pub comments: Option<String>,
    pub acted_at: Option<DateTime<Utc>>,
}

/// Status of a letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LetterStatus {
    Pending,
    Approved,
    Rejected,
}

impl LetterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LetterStatus::Pending => "pending",
            LetterStatus::Approved => "approved",
            LetterStatus::Rejected => "rejected",
        }
    }

    /// Approved or rejected; no further decisions are accepted
    pub fn is_finalized(&self) -> bool {
        matches!(self, LetterStatus::Approved | LetterStatus::Rejected)
    }
}

impl std::fmt::Display for LetterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LetterStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(LetterStatus::Pending),
            "approved" => Ok(LetterStatus::Approved),
            "rejected" => Ok(LetterStatus::Rejected),
            _ => Err(format!("Invalid letter status: {}", s)),
        }
    }
}

/// Status of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Approved,
    Rejected,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Approved => "approved",
            StepStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(StepStatus::Pending),
            "approved" => Ok(StepStatus::Approved),
            "rejected" => Ok(StepStatus::Rejected),
            _ => Err(format!("Invalid step status: {}", s)),
        }
    }
}

/// What an actor does to the step at `current_step`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Approve,
    Reject,
    /// Appends to the step's comment log without deciding anything
    Comment,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Approve => "approve",
            Action::Reject => "reject",
            Action::Comment => "comment",
        }
    }

    /// Step status a decision moves to; `None` for comments
    pub fn decided_status(&self) -> Option<StepStatus> {
        match self {
            Action::Approve => Some(StepStatus::Approved),
            Action::Reject => Some(StepStatus::Rejected),
            Action::Comment => None,
        }
    }
}

impl std::str::FromStr for Action {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Action::Approve),
            "reject" => Ok(Action::Reject),
            "comment" => Ok(Action::Comment),
            other => Err(AppError::InvalidAction(other.to_string())),
        }
    }
}

/// Request to register an actor
#[derive(Debug, Deserialize)]
pub struct CreateActorRequest {
    pub name: String,
    pub role: String,
}

/// Request to send a new letter along the canonical route
#[derive(Debug, Deserialize)]
pub struct SendLetterRequest {
    pub sender_id: i64,
    pub title: String,
    pub body: String,
}

/// Request to approve, reject or comment on a letter.
///
/// The actor is identified either by `actor_id` or by `actor_name` plus
/// `actor_role`; an unknown name/role pair is registered on the fly.
#[derive(Debug, Deserialize)]
pub struct ActRequest {
    pub letter_id: i64,
    pub actor_id: Option<i64>,
    pub actor_name: Option<String>,
    pub actor_role: Option<String>,
    pub action: String,
    pub comments: Option<String>,
    pub recommendations: Option<String>,
}

/// Request to edit and resubmit a rejected letter
#[derive(Debug, Deserialize)]
pub struct ResendRequest {
    pub letter_id: i64,
    pub sender_id: i64,
    pub title: String,
    pub body: String,
}
