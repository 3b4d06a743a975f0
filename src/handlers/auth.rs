use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::errors::AppError;
use crate::models::requests::{LoginRequest, RegisterRequest};
use crate::services::accounts::{self, LoginResponse};
use crate::services::validation;
use crate::state::AppState;

// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let Json(body) = payload?;
    let registration = validation::validate_registration(body)?;

    let user = accounts::register(&state, registration).await?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "user": user }))))
}

// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(body) = payload?;
    let credentials = validation::validate_login(body)?;

    let response = accounts::login(&state, credentials).await?;
    Ok(Json(response))
}
