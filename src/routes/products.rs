use axum::{extract::State, http::StatusCode};
use tracing::info;

use super::{Json, Path, Query};
use crate::auth::{AdminUser, AuthUser};
use crate::dto::{
    positive_or, CreateCategoryRequest, CreateProductRequest, CreateUnitRequest, MessageResponse,
    ThresholdQuery, UpdateProductRequest,
};
use crate::error::{Error, Result};
use crate::state::AppState;
use crate::stores::{Category, Product, Unit};

const NOT_FOUND: &str = "Producto no encontrado";
const DEFAULT_THRESHOLD: i64 = 10;

pub async fn list(State(state): State<AppState>, _caller: AuthUser) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.products.find_all().await?))
}

pub async fn get(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Product>> {
    state
        .products
        .find_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| Error::not_found(NOT_FOUND))
}

/// Only active products can be looked up by barcode at the register.
pub async fn by_barcode(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path(barcode): Path<String>,
) -> Result<Json<Product>> {
    state
        .products
        .find_by_barcode(&barcode)
        .await?
        .filter(|p| p.active)
        .map(Json)
        .ok_or_else(|| Error::not_found(NOT_FOUND))
}

pub async fn by_category(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path(category_id): Path<i64>,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.products.find_by_category(category_id).await?))
}

pub async fn low_stock(
    State(state): State<AppState>,
    _caller: AuthUser,
    Query(query): Query<ThresholdQuery>,
) -> Result<Json<Vec<Product>>> {
    let threshold = positive_or(query.threshold.as_deref(), DEFAULT_THRESHOLD);
    Ok(Json(state.products.find_low_stock(threshold).await?))
}

pub async fn create(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(request): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = state.products.create(request.into_new_product()?).await?;
    info!(product_id = %product.id, by = %admin.id, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateProductRequest>,
) -> Result<Json<Product>> {
    let product = state
        .products
        .update(&id, request.into_changes()?)
        .await?
        .ok_or_else(|| Error::not_found(NOT_FOUND))?;
    info!(product_id = %product.id, by = %admin.id, "product updated");
    Ok(Json(product))
}

pub async fn delete(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    if !state.products.delete(&id).await? {
        return Err(Error::not_found(NOT_FOUND));
    }
    info!(product_id = %id, by = %admin.id, "product deleted");
    Ok(Json(MessageResponse::new("Producto eliminado correctamente")))
}

pub async fn categories(
    State(state): State<AppState>,
    _caller: AuthUser,
) -> Result<Json<Vec<Category>>> {
    Ok(Json(state.products.find_all_categories().await?))
}

pub async fn create_category(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(request): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>)> {
    let (name, description) = request.into_parts()?;
    if state.products.find_category_by_name(&name).await?.is_some() {
        return Err(Error::validation("La categoría ya existe"));
    }
    let category = state
        .products
        .create_category(&name, description.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn units(State(state): State<AppState>, _caller: AuthUser) -> Result<Json<Vec<Unit>>> {
    Ok(Json(state.products.find_all_units().await?))
}

pub async fn create_unit(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(request): Json<CreateUnitRequest>,
) -> Result<(StatusCode, Json<Unit>)> {
    let (name, abbreviation) = request.into_parts()?;
    if state.products.find_unit_by_name(&name).await?.is_some() {
        return Err(Error::validation("La unidad ya existe"));
    }
    let unit = state.products.create_unit(&name, &abbreviation).await?;
    Ok((StatusCode::CREATED, Json(unit)))
}
