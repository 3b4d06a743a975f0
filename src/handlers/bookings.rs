use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::auth::{AdminUser, AuthUser};
use crate::errors::AppError;
use crate::models::requests::{CreateBookingRequest, UpdateBookingStatusRequest};
use crate::models::{Booking, BookingDetails, BookingPage, Pagination};
use crate::services::{booking, validation};
use crate::state::AppState;

fn booking_id(raw: &str) -> Result<i64, AppError> {
    validation::parse_path_id(raw)
        .ok_or_else(|| AppError::InvalidInput("Invalid booking ID".to_string()))
}

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    payload: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let Json(body) = payload?;
    let (workshop_id, time_slot_id) = validation::validate_booking_request(&body)?;

    let created = {
        let mut db = state.db()?;
        booking::create_booking(&mut db, caller.id, workshop_id, time_slot_id)?
    };

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Booking created successfully",
            "booking": created,
        })),
    ))
}

// GET /api/bookings/my
pub async fn my_bookings(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
) -> Result<Json<Vec<BookingDetails>>, AppError> {
    let bookings = {
        let db = state.db()?;
        booking::get_user_bookings(&db, caller.id)?
    };
    Ok(Json(bookings))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(raw_id): Path<String>,
) -> Result<Json<BookingDetails>, AppError> {
    let id = booking_id(&raw_id)?;
    let found = {
        let db = state.db()?;
        booking::get_booking_by_id(&db, id, caller.id)?
    };
    Ok(Json(found))
}

// PATCH /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(raw_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let id = booking_id(&raw_id)?;
    {
        let mut db = state.db()?;
        booking::cancel_booking(&mut db, id, admin)?;
    }
    Ok(Json(serde_json::json!({ "message": "Booking cancelled successfully" })))
}

// GET /api/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

pub async fn all_bookings(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<BookingPage>, AppError> {
    let page = Pagination::from_query(query.page.as_deref(), query.limit.as_deref());
    let result = {
        let db = state.db()?;
        booking::get_all_bookings(&db, page)?
    };
    Ok(Json(result))
}

// PATCH /api/bookings/:id/update
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Path(raw_id): Path<String>,
    payload: Result<Json<UpdateBookingStatusRequest>, JsonRejection>,
) -> Result<Json<Booking>, AppError> {
    let Json(body) = payload?;
    let status = validation::parse_status(body.status.as_deref())?;
    let id = booking_id(&raw_id)?;

    let updated = {
        let mut db = state.db()?;
        booking::update_booking_status(&mut db, id, status)?
    };
    Ok(Json(updated))
}
