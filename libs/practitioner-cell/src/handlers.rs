use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;

use crate::services::PractitionerStore;

pub type PractitionerState = Arc<dyn PractitionerStore>;

pub async fn list_practitioners(
    State(store): State<PractitionerState>,
) -> Result<Json<Value>, AppError> {
    let practitioners = store.list_active().await?;

    Ok(Json(json!({
        "practitioners": practitioners,
        "total": practitioners.len()
    })))
}

pub async fn get_practitioner(
    State(store): State<PractitionerState>,
    Path(practitioner_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let practitioner = store.require(practitioner_id).await?;

    Ok(Json(json!(practitioner)))
}
