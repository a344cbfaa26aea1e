//! Order placement, lookup and status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{OrderId, ProductId};
use domain::{LineItem, Money, Order, OrderStatus, PlaceOrder, ShippingAddress};
use serde::{Deserialize, Serialize};

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::{AppState, Store};

// -- Request types --

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub order_id: String,
    #[serde(default)]
    pub items: Vec<LineItemRequest>,
    #[serde(default)]
    pub shipping_address: AddressRequest,
    #[serde(default)]
    pub payment_method: String,
    /// Total computed by the client. Defaults to the sum of the items.
    pub total_cents: Option<i64>,
    /// Unit count computed by the client. Defaults to the sum of quantities.
    pub item_count: Option<u32>,
}

#[derive(Deserialize)]
pub struct LineItemRequest {
    pub product_id: i64,
    pub name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct AddressRequest {
    pub street: String,
    pub city: String,
    pub postal_code: String,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub status: OrderStatus,
    pub items: Vec<LineItemResponse>,
    pub total_cents: i64,
    pub item_count: u32,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct LineItemResponse {
    pub product_id: i64,
    pub name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            user_id: order.user_id.to_string(),
            status: order.status,
            items: order
                .items
                .into_iter()
                .map(|item| LineItemResponse {
                    product_id: item.product_id.as_i64(),
                    name: item.name,
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price.cents(),
                })
                .collect(),
            total_cents: order.total.cents(),
            item_count: order.item_count,
            shipping_address: order.shipping_address,
            payment_method: order.payment_method,
            created_at: order.created_at.to_rfc3339(),
        }
    }
}

impl PlaceOrderRequest {
    fn into_command(self, user: CurrentUser) -> PlaceOrder {
        let items = self
            .items
            .into_iter()
            .map(|item| {
                LineItem::new(
                    ProductId::new(item.product_id),
                    item.name,
                    item.quantity,
                    Money::from_cents(item.unit_price_cents),
                )
            })
            .collect();
        let address = ShippingAddress::new(
            self.shipping_address.street,
            self.shipping_address.city,
            self.shipping_address.postal_code,
        );

        let cmd = PlaceOrder::new(self.order_id, user.0, items, address, self.payment_method);
        let total = self
            .total_cents
            .map(Money::from_cents)
            .unwrap_or(cmd.declared_total);
        let item_count = self.item_count.unwrap_or(cmd.declared_item_count);
        cmd.with_declared_totals(total, item_count)
    }
}

// -- Handlers --

/// POST /orders: reserve stock for every item and record the order.
#[tracing::instrument(skip(state, payload))]
pub async fn place<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    payload: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let Json(req) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let order = state.engine.place_order(req.into_command(user)).await?;

    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /orders: the caller's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let user_id = user.require()?;
    let orders = state.order_service.list_for_user(user_id).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// GET /orders/{id}: one of the caller's orders.
///
/// Orders owned by someone else are reported as missing.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let user_id = user.require()?;
    let order = state
        .order_service
        .get_order(&OrderId::new(id.as_str()))
        .await?
        .filter(|order| order.is_owned_by(user_id))
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;
    Ok(Json(order.into()))
}

/// PATCH /orders/{id}/status: move one of the caller's orders through its lifecycle.
///
/// Orders owned by someone else are reported as missing.
#[tracing::instrument(skip(state, payload))]
pub async fn update_status<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<OrderResponse>, ApiError> {
    let user_id = user.require()?;
    let Json(req) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let order_id = OrderId::new(id.as_str());
    state
        .order_service
        .get_order(&order_id)
        .await?
        .filter(|order| order.is_owned_by(user_id))
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    let order = state
        .order_service
        .update_status(&order_id, req.status)
        .await?;
    Ok(Json(order.into()))
}
