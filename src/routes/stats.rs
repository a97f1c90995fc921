use axum::extract::State;

use super::Json;
use crate::auth::AuthUser;
use crate::error::Result;
use crate::reports::{self, DashboardStats, DetailedStats};
use crate::state::AppState;

pub async fn summary(
    State(state): State<AppState>,
    _caller: AuthUser,
) -> Result<Json<DashboardStats>> {
    let stats = reports::dashboard(
        state.products.as_ref(),
        state.users.as_ref(),
        state.sales.as_ref(),
        state.low_stock_threshold,
    )
    .await?;
    Ok(Json(stats))
}

pub async fn detailed(
    State(state): State<AppState>,
    _caller: AuthUser,
) -> Result<Json<DetailedStats>> {
    let stats = reports::detailed(
        state.products.as_ref(),
        state.users.as_ref(),
        state.sales.as_ref(),
        state.low_stock_threshold,
    )
    .await?;
    Ok(Json(stats))
}
