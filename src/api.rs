//! HTTP API over the approval workflow

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{Action, ActRequest, CreateActorRequest, ResendRequest, SendLetterRequest};
use crate::workflow::Role;
use crate::AppState;

/// Build the API router; tracing and CORS layers are added by the caller
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/roles", get(roles))
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/:id", delete(delete_user))
        .route("/api/send", post(send_letter))
        .route("/api/pending", get(pending))
        .route("/api/letters", get(list_letters))
        .route("/api/letters/:id", get(get_letter))
        .route("/api/letters/:id/history", get(letter_history))
        .route("/api/act", post(act))
        .route("/api/resend", post(resend))
        .route("/api/notifications", get(notifications))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserFilter {
    pub user_id: Option<i64>,
}

async fn health() -> &'static str {
    "ok"
}

async fn roles(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "roles": Role::ALL,
        "route": state.workflow.default_route().roles(),
    }))
}

async fn list_users(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let actors = state.workflow.store().list_actors().await?;
    Ok(Json(actors))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateActorRequest>,
) -> Result<impl IntoResponse> {
    let actor = state
        .workflow
        .create_actor(&payload.name, &payload.role)
        .await?;
    Ok((StatusCode::CREATED, Json(actor)))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.workflow.store().delete_actor(id).await?;
    tracing::info!(actor_id = id, "Actor deleted");
    Ok(Json(json!({ "status": "deleted", "user_id": id })))
}

async fn send_letter(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SendLetterRequest>,
) -> Result<impl IntoResponse> {
    let id = state
        .workflow
        .send_letter(payload.sender_id, &payload.title, &payload.body, None)
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

async fn pending(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PendingQuery>,
) -> Result<impl IntoResponse> {
    let role = query
        .role
        .ok_or_else(|| AppError::BadRequest("role query parameter is required".to_string()))?;
    let steps = state.workflow.list_pending_for_role(&role).await?;
    Ok(Json(steps))
}

async fn list_letters(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<UserFilter>,
) -> Result<impl IntoResponse> {
    let letters = state.workflow.list_all_letters(filter.user_id).await?;
    Ok(Json(letters))
}

async fn get_letter(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.workflow.get_letter(id).await?))
}

async fn letter_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.workflow.get_letter_history(id).await?))
}

async fn act(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ActRequest>,
) -> Result<impl IntoResponse> {
    let action: Action = payload.action.parse()?;

    let actor_id = match (payload.actor_id, &payload.actor_name, &payload.actor_role) {
        (Some(id), _, _) => id,
        (None, Some(name), Some(role)) => state.workflow.find_or_create_actor(name, role).await?.id,
        _ => {
            return Err(AppError::BadRequest(
                "either actor_id or actor_name and actor_role are required".to_string(),
            ))
        }
    };

    let view = state
        .workflow
        .act_on_letter(
            payload.letter_id,
            actor_id,
            action,
            payload.comments.as_deref(),
            payload.recommendations.as_deref(),
        )
        .await?;
    Ok(Json(view))
}

async fn resend(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ResendRequest>,
) -> Result<impl IntoResponse> {
    state
        .workflow
        .resend_letter(
            payload.letter_id,
            payload.sender_id,
            &payload.title,
            &payload.body,
        )
        .await?;
    Ok(Json(
        json!({ "status": "resent", "letter_id": payload.letter_id }),
    ))
}

async fn notifications(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<UserFilter>,
) -> impl IntoResponse {
    Json(state.notifications.recent(filter.user_id))
}
