//! HTTP adapter over the inventory services.

mod error;

pub use error::ApiError;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
use crate::domain::aggregates::{MovementType, NewProduct, OrderLine, OrderStatus, Reference, StockRecord};
use crate::domain::value_objects::{Actor, OrderId, Page, PageRequest, ProductId};
use crate::services::{
    AdjustItem, AuditReport, InventoryQueryService, OrderEventHandler, OrderItemsPlaced, OrderStatusChanged,
    OrderStockOutcome, ProductSummary, StockChange, StockMutator,
};
use crate::store::{MovementFilter, MovementRow, StockFilter};

pub const ACTOR_HEADER: &str = "x-actor-id";

#[derive(Clone)]
pub struct AppState {
    pub mutator: Arc<StockMutator>,
    pub orders: OrderEventHandler,
    pub queries: InventoryQueryService,
}

impl AppState {
    pub fn new(mutator: Arc<StockMutator>) -> Self {
        Self {
            orders: OrderEventHandler::new(mutator.clone()),
            queries: InventoryQueryService::new(mutator.store()),
            mutator,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "opensase-inventory"})) }))
        .route("/api/v1/products", post(register_product))
        .route("/api/v1/inventory", get(list_inventory))
        .route("/api/v1/inventory/alerts", get(low_stock_alerts))
        .route("/api/v1/inventory/movements", get(movement_log))
        .route("/api/v1/inventory/bulk-adjust", post(bulk_adjust))
        .route("/api/v1/inventory/:product_id/summary", get(product_summary))
        .route("/api/v1/inventory/:product_id/audit", get(audit_product))
        .route("/api/v1/inventory/:product_id/adjust", post(adjust_stock))
        .route("/api/v1/inventory/:product_id/receive", post(receive_stock))
        .route("/api/v1/inventory/:product_id/threshold", post(set_threshold))
        .route("/api/v1/orders/:order_id/items", post(order_items_placed))
        .route("/api/v1/orders/:order_id/transitions", post(order_transition))
        .with_state(state)
}

/// Admin identity forwarded by the gateway after authentication.
pub struct AdminActor(pub Actor);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AdminActor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.headers.get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|id| AdminActor(Actor::admin(id)))
            .ok_or(ApiError::Unauthorized)
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct InventoryParams { pub page: Option<u32>, pub per_page: Option<u32>, pub low_stock_only: Option<bool>, pub search: Option<String> }

#[derive(Debug, Deserialize)]
pub struct MovementParams {
    pub product_id: Option<ProductId>,
    #[serde(rename = "type")]
    pub movement_type: Option<MovementType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdjustRequest {
    pub quantity: i64,
    #[validate(length(max = 500))]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveRequest { pub quantity: i64 }

#[derive(Debug, Deserialize, Validate)]
pub struct ThresholdRequest {
    #[validate(range(min = 0))]
    pub stock_alert_threshold: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BulkAdjustRequest {
    #[validate(length(min = 1, max = 500))]
    pub items: Vec<AdjustItem>,
}

#[derive(Debug, Serialize)]
pub struct BulkItemResponse {
    pub product_id: ProductId,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<StockChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ItemsPlacedRequest { pub status: OrderStatus, pub items: Vec<OrderLine> }

#[derive(Debug, Deserialize)]
pub struct TransitionRequest { pub from: OrderStatus, pub to: OrderStatus, pub items: Vec<OrderLine> }

async fn register_product(State(s): State<AppState>, AdminActor(_): AdminActor, Json(r): Json<NewProduct>) -> Result<(StatusCode, Json<StockRecord>), ApiError> {
    let record = s.mutator.register_product(r).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_inventory(State(s): State<AppState>, Query(p): Query<InventoryParams>) -> ApiResult<Page<StockRecord>> {
    let filter = StockFilter { low_stock_only: p.low_stock_only.unwrap_or(false), search: p.search };
    Ok(Json(s.queries.list_inventory(&filter, PageRequest::new(p.page, p.per_page)).await?))
}

async fn low_stock_alerts(State(s): State<AppState>) -> ApiResult<Vec<StockRecord>> {
    Ok(Json(s.queries.low_stock_alerts().await?))
}

async fn movement_log(State(s): State<AppState>, Query(p): Query<MovementParams>) -> ApiResult<Page<MovementRow>> {
    let filter = MovementFilter { product_id: p.product_id, movement_type: p.movement_type, from: p.from, to: p.to };
    Ok(Json(s.queries.movement_log(&filter, PageRequest::new(p.page, p.per_page)).await?))
}

async fn product_summary(State(s): State<AppState>, Path(id): Path<ProductId>) -> ApiResult<ProductSummary> {
    Ok(Json(s.queries.product_summary(id).await?))
}

async fn audit_product(State(s): State<AppState>, Path(id): Path<ProductId>) -> ApiResult<AuditReport> {
    Ok(Json(s.queries.audit_product(id).await?))
}

async fn adjust_stock(State(s): State<AppState>, Path(id): Path<ProductId>, AdminActor(actor): AdminActor, Json(r): Json<AdjustRequest>) -> ApiResult<StockChange> {
    r.validate()?;
    Ok(Json(s.mutator.adjust(id, r.quantity, &r.reason, actor).await?))
}

async fn receive_stock(State(s): State<AppState>, Path(id): Path<ProductId>, AdminActor(actor): AdminActor, Json(r): Json<ReceiveRequest>) -> ApiResult<StockChange> {
    Ok(Json(s.mutator.add(id, r.quantity, Reference::manual(), actor).await?))
}

async fn set_threshold(State(s): State<AppState>, Path(id): Path<ProductId>, AdminActor(_): AdminActor, Json(r): Json<ThresholdRequest>) -> ApiResult<StockRecord> {
    r.validate()?;
    Ok(Json(s.mutator.set_alert_threshold(id, r.stock_alert_threshold).await?))
}

async fn bulk_adjust(State(s): State<AppState>, AdminActor(actor): AdminActor, Json(r): Json<BulkAdjustRequest>) -> ApiResult<Vec<BulkItemResponse>> {
    r.validate()?;
    let results = s.mutator.bulk_adjust(r.items, actor).await;
    Ok(Json(results.into_iter().map(|r| match r.result {
        Ok(change) => BulkItemResponse { product_id: r.product_id, ok: true, change: Some(change), error: None },
        Err(err) => BulkItemResponse { product_id: r.product_id, ok: false, change: None, error: Some(err.to_string()) },
    }).collect()))
}

async fn order_items_placed(State(s): State<AppState>, Path(order_id): Path<String>, Json(r): Json<ItemsPlacedRequest>) -> ApiResult<OrderStockOutcome> {
    let event = OrderItemsPlaced { order_id: OrderId::new(order_id), status: r.status, items: r.items };
    Ok(Json(s.orders.on_items_placed(&event).await?))
}

async fn order_transition(State(s): State<AppState>, Path(order_id): Path<String>, Json(r): Json<TransitionRequest>) -> ApiResult<OrderStockOutcome> {
    let event = OrderStatusChanged { order_id: OrderId::new(order_id), from: r.from, to: r.to, items: r.items };
    Ok(Json(s.orders.on_status_changed(&event).await?))
}
