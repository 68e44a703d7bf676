//! Basket lifecycle endpoints.

use std::sync::Arc;

use audit_log::{AuditAction, AuditEntry, AuditQuery, AuditSink};
use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use common::{BasketId, Item, Money};
use domain::{
    AdjustQuantity, Basket, BasketError, BasketService, BasketStatus, BasketStore, QrEncoder,
    RecordDecision, SyncBasket,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: BasketStore, A: AuditSink> {
    pub service: Arc<BasketService<S, A>>,
    pub qr_encoder: Arc<dyn QrEncoder>,
}

// -- Request types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    #[serde(alias = "basket_id")]
    pub basket_id: Option<String>,
    pub identifiers: Option<Vec<String>>,
    pub items: Option<Vec<ItemRequest>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRequest {
    #[serde(alias = "itemId", alias = "item_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Whole cents.
    #[serde(alias = "unit_price", alias = "unitPriceCents", alias = "unit_price_cents")]
    pub unit_price: i64,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasketRequest {
    #[serde(alias = "basket_id")]
    pub basket_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    #[serde(alias = "basket_id")]
    pub basket_id: Option<String>,
    pub paid: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustQuantityRequest {
    #[serde(alias = "basket_id")]
    pub basket_id: Option<String>,
    #[serde(alias = "item_id")]
    pub item_id: Option<String>,
    pub delta: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ArchiveParams {
    /// Comma-separated action names; defaults to the session-closing ones.
    pub action: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BasketResponse {
    pub basket_id: String,
    pub status: BasketStatus,
    pub items: Vec<Item>,
    pub total: String,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Basket> for BasketResponse {
    fn from(basket: Basket) -> Self {
        let total = basket.total();
        Self {
            basket_id: basket.id().to_string(),
            status: basket.status(),
            total: total.to_string(),
            total_cents: total.cents(),
            created_at: basket.created_at(),
            updated_at: basket.updated_at(),
            items: basket.items().to_vec(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalResponse {
    pub basket_id: String,
    pub total: String,
    pub total_cents: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub checkout_payload: String,
    pub qr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionResponse {
    pub basket_id: String,
    pub status: BasketStatus,
}

// -- Handlers --

/// POST /sync: replace a basket's contents with a sensor snapshot.
///
/// Pre-built items carry `unitPrice` as an integer number of cents
/// (`199` for $1.99); fractional prices are rejected with 400.
#[tracing::instrument(skip(state, body))]
pub async fn sync<S: BasketStore + 'static, A: AuditSink + 'static>(
    State(state): State<Arc<AppState<S, A>>>,
    body: Result<Json<SyncRequest>, JsonRejection>,
) -> Result<Json<BasketResponse>, ApiError> {
    let Json(req) = body?;
    let basket_id = required(req.basket_id, "basketId")?;

    let cmd = match (req.identifiers, req.items) {
        (Some(identifiers), None) => SyncBasket::from_identifiers(basket_id, identifiers),
        (None, Some(items)) => SyncBasket::from_items(
            basket_id,
            items
                .into_iter()
                .map(|i| Item::new(i.id, i.name, Money::from_cents(i.unit_price), i.quantity))
                .collect(),
        ),
        _ => {
            return Err(invalid(
                "exactly one of identifiers or items must be given",
            ));
        }
    };

    let basket = state.service.sync(cmd).await?;
    Ok(Json(basket.into()))
}

/// GET /basket/{id}: current basket snapshot.
#[tracing::instrument(skip(state))]
pub async fn get<S: BasketStore + 'static, A: AuditSink + 'static>(
    State(state): State<Arc<AppState<S, A>>>,
    Path(id): Path<String>,
) -> Result<Json<BasketResponse>, ApiError> {
    let basket = state.service.get(&BasketId::new(id)).await?;
    Ok(Json(basket.into()))
}

/// GET /basket/{id}/total: basket total.
#[tracing::instrument(skip(state))]
pub async fn total<S: BasketStore + 'static, A: AuditSink + 'static>(
    State(state): State<Arc<AppState<S, A>>>,
    Path(id): Path<String>,
) -> Result<Json<TotalResponse>, ApiError> {
    let basket_id = BasketId::new(id);
    let total = state.service.get_total(&basket_id).await?;
    Ok(Json(TotalResponse {
        basket_id: basket_id.to_string(),
        total: total.to_string(),
        total_cents: total.cents(),
    }))
}

/// POST /checkout: start checkout and hand back the scannable payload.
#[tracing::instrument(skip(state, body))]
pub async fn checkout<S: BasketStore + 'static, A: AuditSink + 'static>(
    State(state): State<Arc<AppState<S, A>>>,
    body: Result<Json<BasketRequest>, JsonRejection>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let Json(req) = body?;
    let basket_id = BasketId::new(required(req.basket_id, "basketId")?);

    let payload = state.service.checkout(&basket_id).await?;
    Ok(Json(CheckoutResponse {
        qr: state.qr_encoder.encode(&payload),
        checkout_payload: payload.to_string(),
    }))
}

/// POST /decision: record the cashier's paid/cancelled verdict.
#[tracing::instrument(skip(state, body))]
pub async fn decision<S: BasketStore + 'static, A: AuditSink + 'static>(
    State(state): State<Arc<AppState<S, A>>>,
    body: Result<Json<DecisionRequest>, JsonRejection>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let Json(req) = body?;
    let basket_id = required(req.basket_id, "basketId")?;
    let paid = req.paid.ok_or_else(|| invalid("paid is required"))?;

    let basket = state
        .service
        .decide(RecordDecision::new(basket_id, paid))
        .await?;
    Ok(Json(DecisionResponse {
        basket_id: basket.id().to_string(),
        status: basket.status(),
    }))
}

/// POST /adjustQuantity: correct one item's quantity by a signed delta.
#[tracing::instrument(skip(state, body))]
pub async fn adjust_quantity<S: BasketStore + 'static, A: AuditSink + 'static>(
    State(state): State<Arc<AppState<S, A>>>,
    body: Result<Json<AdjustQuantityRequest>, JsonRejection>,
) -> Result<Json<Item>, ApiError> {
    let Json(req) = body?;
    let basket_id = required(req.basket_id, "basketId")?;
    let item_id = required(req.item_id, "itemId")?;
    let delta = req.delta.ok_or_else(|| invalid("delta is required"))?;

    let item = state
        .service
        .adjust_quantity(AdjustQuantity::new(basket_id, item_id, delta))
        .await?;
    Ok(Json(item))
}

/// GET /audit/{id}: ordered audit trail of a basket.
#[tracing::instrument(skip(state))]
pub async fn audit<S: BasketStore + 'static, A: AuditSink + 'static>(
    State(state): State<Arc<AppState<S, A>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<AuditEntry>>, ApiError> {
    let entries = state.service.audit_trail(&BasketId::new(id)).await?;
    Ok(Json(entries))
}

/// GET /archive: closed sessions across all baskets, oldest first.
///
/// Each entry carries the item snapshot and total at the moment the session
/// ended. `action=CHECKOUT_STARTED` lists the snapshots taken at checkout.
#[tracing::instrument(skip(state, params))]
pub async fn archive<S: BasketStore + 'static, A: AuditSink + 'static>(
    State(state): State<Arc<AppState<S, A>>>,
    params: Result<Query<ArchiveParams>, QueryRejection>,
) -> Result<Json<Vec<AuditEntry>>, ApiError> {
    let Query(params) = params?;

    let actions = match params.action.as_deref() {
        None => AuditAction::CLOSING.to_vec(),
        Some(raw) => raw
            .split(',')
            .map(|name| name.trim().parse::<AuditAction>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| ApiError::BadRequest(err.to_string()))?,
    };

    let mut query = AuditQuery::new().actions(actions);
    if let Some(limit) = params.limit {
        query = query.limit(limit);
    }
    if let Some(offset) = params.offset {
        query = query.offset(offset);
    }

    let entries = state.service.audit_query(query).await?;
    Ok(Json(entries))
}

// -- Helpers --

fn invalid(message: &str) -> ApiError {
    BasketError::InvalidPayload(message.to_string()).into()
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| invalid(&format!("{field} is required")))
}
