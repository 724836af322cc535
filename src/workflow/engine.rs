//! Workflow engine for routing letters through role-gated approval steps
//!
//! The engine handles:
//! - Actor registration against the closed role set
//! - Letter creation with a fixed, ordered route of steps
//! - Admitting only the role whose turn it is to approve or reject
//! - Non-blocking commentary on the current step
//! - Resending rejected letters with a full route restart
//! - Assembling read views

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};

use super::notify::{Notifier, RejectionNotice};
use super::role::{Role, Route};
use super::views::{HistoryEntry, LetterSummary, LetterView, PendingStep};
use crate::error::{AppError, Result};
use crate::models::{Action, Actor, LetterStatus, StepStatus};
use crate::store::{Decision, Store};

/// Handle to the approval workflow; cheap to clone
#[derive(Clone)]
pub struct Workflow {
    store: Store,
    route: Route,
    notifier: Arc<dyn Notifier>,
}

impl Workflow {
    /// Create an engine using the canonical route
    pub fn new(store: Store, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            route: Route::default(),
            notifier,
        }
    }

    /// Replace the route used when `send_letter` gets none
    pub fn with_default_route(mut self, route: Route) -> Self {
        self.route = route;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn default_route(&self) -> &Route {
        &self.route
    }

    // Identity

    /// Register an actor; the role must be recognized and (name, role) unused
    pub async fn create_actor(&self, name: &str, role: &str) -> Result<Actor> {
        let role: Role = role.parse()?;
        let actor = self.store.create_actor(name, role).await?;
        tracing::info!(actor_id = actor.id, role = %role, "Actor created");
        Ok(actor)
    }

    /// Look up an actor by exact (name, role), registering it if missing
    pub async fn find_or_create_actor(&self, name: &str, role: &str) -> Result<Actor> {
        let role: Role = role.parse()?;
        if let Some(actor) = self.store.find_actor(name, role).await? {
            return Ok(actor);
        }
        match self.store.create_actor(name, role).await {
            // Lost a race with a concurrent registration
            Err(AppError::DuplicateActor { .. }) => self
                .store
                .find_actor(name, role)
                .await?
                .ok_or_else(|| AppError::Internal(format!("Actor '{}' vanished", name))),
            other => other,
        }
    }

    // Route creation

    /// Create a letter routed along `route`, or the default route if `None`
    pub async fn send_letter(
        &self,
        sender_id: i64,
        title: &str,
        body: &str,
        route: Option<Route>,
    ) -> Result<i64> {
        let sender = self.store.get_actor(sender_id).await?;
        let route = route.unwrap_or_else(|| self.route.clone());

        let letter = self
            .store
            .insert_letter(sender.id, title, body, &route)
            .await?;

        tracing::info!(
            letter_id = letter.id,
            sender_id = sender.id,
            steps = route.len(),
            "Letter sent"
        );

        Ok(letter.id)
    }

    // Pending work

    /// Steps waiting on `role`, oldest letter first; empty for unknown roles
    pub async fn list_pending_for_role(&self, role: &str) -> Result<Vec<PendingStep>> {
        self.store.pending_for_role(role).await
    }

    // State machine

    /// Approve, reject or comment on the letter's current step
    pub async fn act_on_letter(
        &self,
        letter_id: i64,
        actor_id: i64,
        action: Action,
        comments: Option<&str>,
        recommendations: Option<&str>,
    ) -> Result<LetterView> {
        let letter = self.store.get_letter(letter_id).await?;
        let actor = self.store.get_actor(actor_id).await?;
        let text = compose_comments(comments, recommendations);

        let Some(status) = action.decided_status() else {
            return self.comment(letter.id, letter.current_step, &actor, &text).await;
        };

        if letter.status.is_finalized() {
            return Err(AppError::AlreadyFinalized(letter.status));
        }

        let step = self
            .store
            .get_step(letter.id, letter.current_step)
            .await?
            .ok_or(AppError::NoActiveStep(letter.id))?;

        if step.status != StepStatus::Pending {
            return Err(AppError::StepAlreadyActed {
                letter_id: letter.id,
                step_index: step.step_index,
            });
        }

        if actor.role != step.role {
            return Err(AppError::RoleMismatch {
                actor_role: actor.role.to_string(),
                step_role: step.role.to_string(),
            });
        }

        let total_steps = self.store.count_steps(letter.id).await?;
        let (letter_status, next_step) = match status {
            StepStatus::Rejected => (LetterStatus::Rejected, step.step_index),
            _ if step.step_index + 1 >= total_steps => (LetterStatus::Approved, step.step_index),
            _ => (LetterStatus::Pending, step.step_index + 1),
        };

        let acted_at = Utc::now();
        self.store
            .record_decision(&Decision {
                letter_id: letter.id,
                step_id: step.id,
                step_index: step.step_index,
                actor_id: actor.id,
                step_status: status,
                comments: &text,
                acted_at,
                letter_status,
                next_step,
            })
            .await?;

        tracing::info!(
            letter_id = letter.id,
            actor_id = actor.id,
            step_index = step.step_index,
            action = action.as_str(),
            letter_status = %letter_status,
            "Step decided"
        );

        if letter_status == LetterStatus::Rejected {
            self.notifier.on_reject(RejectionNotice {
                letter_id: letter.id,
                sender_id: letter.sender_id,
                reason: text,
                rejected_at: acted_at,
            });
        }

        self.get_letter(letter.id).await
    }

    async fn comment(
        &self,
        letter_id: i64,
        current_step: i64,
        actor: &Actor,
        text: &str,
    ) -> Result<LetterView> {
        if !actor.role.can_comment() {
            return Err(AppError::NotPermitted(format!(
                "{} actors may not comment",
                actor.role
            )));
        }

        let step = self
            .store
            .get_step(letter_id, current_step)
            .await?
            .ok_or(AppError::NoActiveStep(letter_id))?;

        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let entry = format!("[{}] {} ({}): {}", stamp, actor.name, actor.role, text);
        self.store.append_comment(step.id, &entry).await?;

        tracing::info!(
            letter_id,
            actor_id = actor.id,
            step_index = step.step_index,
            "Comment added"
        );

        self.get_letter(letter_id).await
    }

    // Resend

    /// Edit a rejected letter and restart its whole route
    pub async fn resend_letter(
        &self,
        letter_id: i64,
        sender_id: i64,
        title: &str,
        body: &str,
    ) -> Result<()> {
        let letter = self.store.get_letter(letter_id).await?;

        if letter.sender_id != sender_id {
            return Err(AppError::NotAuthorized(format!(
                "only the original sender may resend letter {}",
                letter_id
            )));
        }

        if letter.status != LetterStatus::Rejected {
            return Err(AppError::NotResendable(letter.status));
        }

        let reset = self
            .store
            .reset_for_resend(letter_id, sender_id, title, body)
            .await?;

        if !reset {
            let current = self.store.get_letter(letter_id).await?;
            return Err(AppError::NotResendable(current.status));
        }

        tracing::info!(letter_id, sender_id, "Letter resent");
        Ok(())
    }

    // Read views

    pub async fn get_letter(&self, letter_id: i64) -> Result<LetterView> {
        let letter = self.store.letter_detail(letter_id).await?;
        let steps = self.store.step_details(letter_id).await?;
        Ok(LetterView::new(letter, steps))
    }

    /// Every step in route order, regardless of letter status
    pub async fn get_letter_history(&self, letter_id: i64) -> Result<Vec<HistoryEntry>> {
        // Distinguish a missing letter from an empty history
        self.store.get_letter(letter_id).await?;
        let steps = self.store.step_details(letter_id).await?;
        Ok(steps.into_iter().map(HistoryEntry::from).collect())
    }

    pub async fn list_all_letters(&self, user_id: Option<i64>) -> Result<Vec<LetterSummary>> {
        self.store.list_letters(user_id).await
    }
}

/// `comments`, with a recommendations line when supplied
fn compose_comments(comments: Option<&str>, recommendations: Option<&str>) -> String {
    let mut text = comments.unwrap_or_default().to_string();
    if let Some(rec) = recommendations.filter(|r| !r.is_empty()) {
        text.push_str("\nRecommendations: ");
        text.push_str(rec);
    }
    text
}
