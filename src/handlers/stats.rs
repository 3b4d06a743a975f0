use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::auth::AdminUser;
use crate::errors::AppError;
use crate::models::DashboardStats;
use crate::services::booking;
use crate::state::AppState;

// GET /api/stats/stats
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<DashboardStats>, AppError> {
    let stats = {
        let db = state.db()?;
        booking::get_dashboard_stats(&db)?
    };
    Ok(Json(stats))
}
