use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::auth::AdminUser;
use crate::errors::AppError;
use crate::models::requests::{CreateWorkshopRequest, UpdateWorkshopRequest};
use crate::models::WorkshopWithSlots;
use crate::services::{validation, workshop};
use crate::state::AppState;

fn workshop_id(raw: &str) -> Result<i64, AppError> {
    validation::parse_path_id(raw)
        .ok_or_else(|| AppError::InvalidInput("Invalid workshop ID format".to_string()))
}

// GET /api/workshops
pub async fn list_workshops(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<WorkshopWithSlots>>, AppError> {
    let workshops = {
        let db = state.db()?;
        workshop::list_workshops(&db)?
    };
    Ok(Json(workshops))
}

// GET /api/workshops/:id
pub async fn get_workshop(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<WorkshopWithSlots>, AppError> {
    let id = workshop_id(&raw_id)?;
    let found = {
        let db = state.db()?;
        workshop::get_workshop(&db, id)?
    };
    Ok(Json(found))
}

// POST /api/workshops
pub async fn create_workshop(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    payload: Result<Json<CreateWorkshopRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<WorkshopWithSlots>), AppError> {
    let Json(body) = payload?;
    let new = validation::validate_new_workshop(body)?;

    let created = {
        let mut db = state.db()?;
        workshop::create_workshop(&mut db, new)?
    };

    tracing::debug!(admin_id = admin.id, workshop_id = created.workshop.id, "admin created workshop");
    Ok((StatusCode::CREATED, Json(created)))
}

// PUT /api/workshops/:id
pub async fn update_workshop(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Path(raw_id): Path<String>,
    payload: Result<Json<UpdateWorkshopRequest>, JsonRejection>,
) -> Result<Json<WorkshopWithSlots>, AppError> {
    let id = workshop_id(&raw_id)?;
    let Json(body) = payload?;
    let patch = validation::validate_workshop_patch(body)?;

    let updated = {
        let mut db = state.db()?;
        workshop::update_workshop(&mut db, id, patch)?
    };
    Ok(Json(updated))
}

// DELETE /api/workshops/:id
pub async fn delete_workshop(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Path(raw_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let id = workshop_id(&raw_id)?;
    {
        let db = state.db()?;
        workshop::delete_workshop(&db, id)?;
    }
    Ok(Json(serde_json::json!({ "message": "Workshop deleted successfully" })))
}
