//! Product stock endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use common::ProductId;
use domain::{Money, ProductStock};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::{AppState, Store};

#[derive(Deserialize)]
pub struct StockRequest {
    pub name: String,
    pub price_cents: i64,
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct StockResponse {
    pub id: i64,
    pub name: String,
    pub price_cents: i64,
    pub quantity: u32,
}

impl From<ProductStock> for StockResponse {
    fn from(product: ProductStock) -> Self {
        Self {
            id: product.id.as_i64(),
            name: product.name,
            price_cents: product.price.cents(),
            quantity: product.quantity,
        }
    }
}

/// PUT /products/{id}/stock: create or replace a product's stock record.
#[tracing::instrument(skip(state, payload))]
pub async fn put_stock<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
    payload: Result<Json<StockRequest>, JsonRejection>,
) -> Result<Json<StockResponse>, ApiError> {
    let Json(req) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    if req.price_cents < 0 {
        return Err(ApiError::BadRequest(
            "price_cents must not be negative".to_string(),
        ));
    }

    let product = ProductStock::new(
        ProductId::new(id),
        req.name,
        Money::from_cents(req.price_cents),
        req.quantity,
    );
    let stored = state.store.upsert_product(product).await?;
    tracing::info!(product_id = id, quantity = stored.quantity, "stock set");
    Ok(Json(stored.into()))
}

/// GET /products/{id}/stock: current stock of a product.
#[tracing::instrument(skip(state))]
pub async fn get_stock<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<Json<StockResponse>, ApiError> {
    let product = state
        .store
        .get_product(ProductId::new(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product {id} not found")))?;
    Ok(Json(product.into()))
}
