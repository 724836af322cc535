//! Error types for the application

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::models::LetterStatus;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Actor '{name}' with role '{role}' already exists")]
    DuplicateActor { name: String, role: String },

    #[error("Actor {0} not found")]
    ActorNotFound(i64),

    #[error("Actor {0} is referenced by letters or steps and cannot be deleted")]
    ActorInUse(i64),

    #[error("Letter {0} not found")]
    LetterNotFound(i64),

    #[error("No approval step found for letter {0}")]
    NoActiveStep(i64),

    #[error("Step {step_index} of letter {letter_id} has already been acted on")]
    StepAlreadyActed { letter_id: i64, step_index: i64 },

    #[error("Actor role '{actor_role}' cannot act on step role '{step_role}'")]
    RoleMismatch {
        actor_role: String,
        step_role: String,
    },

    #[error("Letter already {0}")]
    AlreadyFinalized(LetterStatus),

    #[error("Unknown action '{0}'. Use 'approve', 'reject' or 'comment'")]
    InvalidAction(String),

    #[error("Not permitted: {0}")]
    NotPermitted(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Only rejected letters can be resent (letter is {0})")]
    NotResendable(LetterStatus),

    #[error("A route needs at least one role")]
    EmptyRoute,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code for front ends
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidRole(_) => "invalid_role",
            AppError::DuplicateActor { .. } => "duplicate_actor",
            AppError::ActorNotFound(_) => "actor_not_found",
            AppError::ActorInUse(_) => "actor_in_use",
            AppError::LetterNotFound(_) => "letter_not_found",
            AppError::NoActiveStep(_) => "no_active_step",
            AppError::StepAlreadyActed { .. } => "step_already_acted",
            AppError::RoleMismatch { .. } => "role_mismatch",
            AppError::AlreadyFinalized(_) => "already_finalized",
            AppError::InvalidAction(_) => "invalid_action",
            AppError::NotPermitted(_) => "not_permitted",
            AppError::NotAuthorized(_) => "not_authorized",
            AppError::NotResendable(_) => "not_resendable",
            AppError::EmptyRoute => "empty_route",
            AppError::BadRequest(_) => "bad_request",
            AppError::Database(_) => "database",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ActorNotFound(_) | AppError::LetterNotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidRole(_)
            | AppError::InvalidAction(_)
            | AppError::EmptyRoute
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::RoleMismatch { .. }
            | AppError::NotPermitted(_)
            | AppError::NotAuthorized(_) => StatusCode::FORBIDDEN,
            AppError::DuplicateActor { .. }
            | AppError::ActorInUse(_)
            | AppError::NoActiveStep(_)
            | AppError::StepAlreadyActed { .. }
            | AppError::AlreadyFinalized(_)
            | AppError::NotResendable(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                "Database error".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                e.clone()
            }
            other => other.to_string(),
        };

        let body = serde_json::json!({
            "error": self.kind(),
            "message": message,
        });

        (self.status_code(), Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_app_error_display() {
        let err = AppError::LetterNotFound(7);
        assert_eq!(format!("{}", err), "Letter 7 not found");

        let err = AppError::AlreadyFinalized(LetterStatus::Approved);
        assert_eq!(format!("{}", err), "Letter already approved");

        let err = AppError::RoleMismatch {
            actor_role: "HOD".to_string(),
            step_role: "SRC".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "Actor role 'HOD' cannot act on step role 'SRC'"
        );

        let err = AppError::InvalidAction("escalate".to_string());
        assert!(format!("{}", err).contains("escalate"));
    }

    #[test]
    fn test_kinds_are_distinct() {
        let errors = [
            AppError::InvalidRole("x".into()),
            AppError::DuplicateActor {
                name: "a".into(),
                role: "SRC".into(),
            },
            AppError::ActorNotFound(1),
            AppError::ActorInUse(1),
            AppError::LetterNotFound(1),
            AppError::NoActiveStep(1),
            AppError::StepAlreadyActed {
                letter_id: 1,
                step_index: 0,
            },
            AppError::RoleMismatch {
                actor_role: "a".into(),
                step_role: "b".into(),
            },
            AppError::AlreadyFinalized(LetterStatus::Rejected),
            AppError::InvalidAction("x".into()),
            AppError::NotPermitted("x".into()),
            AppError::NotAuthorized("x".into()),
            AppError::NotResendable(LetterStatus::Pending),
            AppError::EmptyRoute,
            AppError::BadRequest("x".into()),
            AppError::Internal("x".into()),
        ];
        let kinds: std::collections::HashSet<_> = errors.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn test_not_found_into_response() {
        let response = AppError::LetterNotFound(3).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_wrong_turn_and_already_decided_differ() {
        let wrong_turn = AppError::RoleMismatch {
            actor_role: "Dean".into(),
            step_role: "SRC".into(),
        };
        let decided = AppError::AlreadyFinalized(LetterStatus::Approved);
        assert_eq!(wrong_turn.into_response().status(), StatusCode::FORBIDDEN);
        assert_eq!(decided.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_invalid_role_into_response() {
        let response = AppError::InvalidRole("Janitor".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_database_error_from_sqlx() {
        let sqlx_err = sqlx::Error::Configuration("test".into());
        let app_err: AppError = sqlx_err.into();
        assert!(matches!(app_err, AppError::Database(_)));
        assert_eq!(
            app_err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
