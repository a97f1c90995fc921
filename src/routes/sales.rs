use axum::{extract::State, http::StatusCode};

use super::{Json, Path, Query};
use crate::auth::AuthUser;
use crate::dto::{positive_or, CreateSaleRequest, DateRangeQuery, DaysQuery, LimitQuery};
use crate::error::{Error, Result};
use crate::reports::{self, DaySummary, TopProduct};
use crate::state::AppState;
use crate::stores::Sale;

const DEFAULT_DAYS: i64 = 7;
const DEFAULT_LIMIT: i64 = 10;

pub async fn list(State(state): State<AppState>, _caller: AuthUser) -> Result<Json<Vec<Sale>>> {
    Ok(Json(state.sales.find_all().await?))
}

pub async fn get(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Sale>> {
    state
        .sales
        .find_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| Error::not_found("Venta no encontrada"))
}

pub async fn today(State(state): State<AppState>, _caller: AuthUser) -> Result<Json<Vec<Sale>>> {
    Ok(Json(reports::sales_today(state.sales.as_ref()).await?))
}

pub async fn filter(
    State(state): State<AppState>,
    _caller: AuthUser,
    Query(query): Query<DateRangeQuery>,
) -> Result<Json<Vec<Sale>>> {
    let (start, end) =
        reports::date_filter_range(query.start_date.as_deref(), query.end_date.as_deref())?;
    Ok(Json(state.sales.find_by_date_range(start, end).await?))
}

pub async fn by_seller(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path(seller_id): Path<String>,
) -> Result<Json<Vec<Sale>>> {
    Ok(Json(state.sales.find_by_seller(&seller_id).await?))
}

pub async fn by_day(
    State(state): State<AppState>,
    _caller: AuthUser,
    Query(query): Query<DaysQuery>,
) -> Result<Json<Vec<DaySummary>>> {
    let days = positive_or(query.days.as_deref(), DEFAULT_DAYS).min(reports::MAX_REPORT_DAYS);
    Ok(Json(reports::sales_by_day(state.sales.as_ref(), days).await?))
}

pub async fn top_products(
    State(state): State<AppState>,
    _caller: AuthUser,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<TopProduct>>> {
    let limit = positive_or(query.limit.as_deref(), DEFAULT_LIMIT) as usize;
    Ok(Json(reports::top_products(state.sales.as_ref(), limit).await?))
}

/// `POST /api/sales`: runs the sale workflow for the caller. The seller is
/// always the token's user, never something from the body.
pub async fn create(
    State(state): State<AppState>,
    AuthUser(seller): AuthUser,
    Json(request): Json<CreateSaleRequest>,
) -> Result<(StatusCode, Json<Sale>)> {
    let (cart, payment_method) = request.into_cart()?;
    let sale = state
        .engine
        .process_sale(&seller, &cart, payment_method)
        .await?;
    Ok((StatusCode::CREATED, Json(sale)))
}
