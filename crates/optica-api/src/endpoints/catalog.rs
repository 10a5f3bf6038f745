//! Branch and catalog endpoints. Writes are admin-only.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use optica_core::models::{Branch, Material, Product};
use optica_core::Actor;

use crate::error::ApiError;
use crate::state::AppState;

pub const DEFAULT_PRODUCT_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct NewBranch {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct NewMaterial {
    pub description: String,
    #[serde(default)]
    pub brand: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub category: String,
}

#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub q: Option<String>,
    pub limit: Option<usize>,
}

pub async fn list_branches(State(state): State<AppState>) -> Result<Json<Vec<Branch>>, ApiError> {
    let branches = state.run(|core| core.list_branches()).await?;
    Ok(Json(branches))
}

pub async fn create_branch(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<NewBranch>,
) -> Result<(StatusCode, Json<Branch>), ApiError> {
    let branch = state
        .run(move |core| core.create_branch(&actor, &request.name))
        .await?;
    Ok((StatusCode::CREATED, Json(branch)))
}

pub async fn list_materials(State(state): State<AppState>) -> Result<Json<Vec<Material>>, ApiError> {
    let materials = state.run(|core| core.list_materials()).await?;
    Ok(Json(materials))
}

pub async fn create_material(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<NewMaterial>,
) -> Result<(StatusCode, Json<Material>), ApiError> {
    let material = Material::new(request.description, request.brand);
    let stored = material.clone();
    state.run(move |core| core.upsert_material(&actor, &stored)).await?;
    Ok((StatusCode::CREATED, Json(material)))
}

/// `GET /api/products?category=&q=&limit=`: full-text search over the catalog.
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_PRODUCT_LIMIT);
    let products = state
        .run(move |core| core.list_products(query.category.as_deref(), query.q.as_deref(), limit))
        .await?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let product = state.run(move |core| core.get_product(&id)).await?;
    Ok(Json(product))
}

pub async fn create_product(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let product = Product::new(request.sku, request.name, request.category);
    let stored = product.clone();
    state.run(move |core| core.upsert_product(&actor, &stored)).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn deactivate_product(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.run(move |core| core.deactivate_product(&actor, &id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
