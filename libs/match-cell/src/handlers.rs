use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    Json,
};
use serde_json::{json, Value};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::caller_id;

use crate::models::{MatchQuery, RecordDecisionRequest, SetMessagedRequest, ShownPractitionersRequest};
use crate::services::matching::MatchService;

pub type MatchState = Arc<MatchService>;

// ==============================================================================
// MATCH HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn record_decision(
    State(service): State<MatchState>,
    Extension(user): Extension<User>,
    Json(request): Json<RecordDecisionRequest>,
) -> Result<Json<Value>, AppError> {
    let record = service.record_decision(caller_id(&user)?, request).await?;

    Ok(Json(json!({
        "success": true,
        "match": record
    })))
}

#[axum::debug_handler]
pub async fn list_matches(
    State(service): State<MatchState>,
    Extension(user): Extension<User>,
    Query(query): Query<MatchQuery>,
) -> Result<Json<Value>, AppError> {
    let matches = service.list_matches(caller_id(&user)?, query.into()).await?;

    Ok(Json(json!({
        "matches": matches,
        "total": matches.len()
    })))
}

#[axum::debug_handler]
pub async fn set_messaged(
    State(service): State<MatchState>,
    Extension(user): Extension<User>,
    Json(request): Json<SetMessagedRequest>,
) -> Result<Json<Value>, AppError> {
    let record = service.set_messaged(caller_id(&user)?, request).await?;

    Ok(Json(json!({
        "success": true,
        "match": record
    })))
}

#[axum::debug_handler]
pub async fn remaining_practitioners(
    State(service): State<MatchState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let practitioners = service.remaining_practitioners(caller_id(&user)?).await?;

    Ok(Json(json!({
        "practitioners": practitioners,
        "total": practitioners.len()
    })))
}

// ==============================================================================
// SHOWN PRACTITIONER HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_shown(
    State(service): State<MatchState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let shown = service.shown_practitioners(caller_id(&user)?).await?;
    Ok(Json(json!({ "shown": shown, "total": shown.len() })))
}

#[axum::debug_handler]
pub async fn add_shown(
    State(service): State<MatchState>,
    Extension(user): Extension<User>,
    Json(request): Json<ShownPractitionersRequest>,
) -> Result<Json<Value>, AppError> {
    let shown = service
        .add_shown_practitioners(caller_id(&user)?, request.practitioner_ids)
        .await?;
    Ok(Json(json!({ "shown": shown, "total": shown.len() })))
}

#[axum::debug_handler]
pub async fn clear_shown(
    State(service): State<MatchState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let removed = service.clear_shown_practitioners(caller_id(&user)?).await?;
    Ok(Json(json!({ "success": true, "removed": removed })))
}
