use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Path, Query, Request, State};
use axum::http::StatusCode;
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router, debug_handler};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::auth::Principal;
use crate::bid::Bid;
use crate::error::MarketError;
use crate::ids::Id;
use crate::item::{Item, ItemStatus, NewItem};
use crate::market::{Closure, HighestBid, ItemFilter};
use crate::order::Order;
use crate::state::AppState;

/// Page size applied when the client sends none.
const DEFAULT_PAGE_LIMIT: usize = 100;
/// Hard ceiling on page size; the applied value is echoed in
/// `x-effective-limit`.
const MAX_PAGE_LIMIT: usize = 1000;

/// Json extractor whose rejection is rendered as the API's `{"error": ...}`
/// envelope instead of axum's plain-text default.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => {
                tracing::debug!(error = %rejection, "request body rejected");
                Err((
                    rejection.status(),
                    Json(json!({ "error": rejection.body_text() })),
                )
                    .into_response())
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceBidRequest {
    pub item_id: Option<String>,
    pub amount: Option<Decimal>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub item_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct ItemQuery {
    pub auction: Option<bool>,
    pub status: Option<ItemStatus>,
    pub seller: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct PageQuery {
    pub limit: Option<usize>,
    pub after: Option<String>,
}

#[debug_handler]
pub async fn place_bid(
    State(state): State<AppState>,
    Principal(bidder): Principal,
    ApiJson(req): ApiJson<PlaceBidRequest>,
) -> Result<(StatusCode, Json<Bid>), MarketError> {
    let bid = state
        .market
        .place_bid(req.item_id.as_deref(), bidder, req.amount)?;
    Ok((StatusCode::CREATED, Json(bid)))
}

pub async fn list_bids(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> Result<Json<serde_json::Value>, MarketError> {
    let bids = state.market.bids_for_item(&item_id)?;
    Ok(Json(json!({
        "itemId": item_id,
        "totalBids": bids.len(),
        "bids": bids,
    })))
}

pub async fn highest_bid(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> Result<Json<HighestBid>, MarketError> {
    Ok(Json(state.market.highest_bid(&item_id)?))
}

pub async fn create_item(
    State(state): State<AppState>,
    Principal(seller): Principal,
    ApiJson(new): ApiJson<NewItem>,
) -> Result<(StatusCode, Json<Item>), MarketError> {
    let item = state.market.create_item(seller, new)?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Item>, MarketError> {
    Ok(Json(state.market.get_item(&id)?))
}

pub async fn list_items(
    State(state): State<AppState>,
    Query(q): Query<ItemQuery>,
) -> Result<Json<Vec<Item>>, MarketError> {
    let seller = q
        .seller
        .as_deref()
        .map(|raw| {
            raw.parse::<Id>()
                .map_err(|_| MarketError::InvalidId(raw.to_string()))
        })
        .transpose()?;
    let filter = ItemFilter {
        auction: q.auction,
        status: q.status,
        seller,
    };
    Ok(Json(state.market.list_items(&filter)))
}

pub async fn close_auction(
    State(state): State<AppState>,
    Principal(requester): Principal,
    Path(id): Path<String>,
) -> Result<Json<Closure>, MarketError> {
    Ok(Json(state.market.close_auction(&id, requester)?))
}

#[debug_handler]
pub async fn create_order(
    State(state): State<AppState>,
    Principal(buyer): Principal,
    ApiJson(req): ApiJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), MarketError> {
    let order = state
        .market
        .create_order(req.item_id.as_deref(), buyer, req.kind.as_deref())?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn my_orders(
    State(state): State<AppState>,
    Principal(buyer): Principal,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, MarketError> {
    let limit = page.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
    let (orders, next) = state
        .market
        .orders_for_buyer(buyer, page.after.as_deref(), limit)?;
    Ok((
        AppendHeaders([("x-effective-limit", limit.to_string())]),
        Json(json!({ "orders": orders, "next": next })),
    ))
}

pub async fn item_orders(
    State(state): State<AppState>,
    Principal(_caller): Principal,
    Path(item_id): Path<String>,
) -> Result<Json<serde_json::Value>, MarketError> {
    let orders = state.market.orders_for_item(&item_id)?;
    Ok(Json(json!({ "orders": orders })))
}

pub async fn seller_reputation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, MarketError> {
    let rating = state.market.reputation_of(&id)?;
    Ok(Json(json!({ "seller": id, "rating": rating })))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/items", post(create_item).get(list_items))
        .route("/items/{id}", get(get_item))
        .route("/items/{id}/close-auction", post(close_auction))
        .route("/bids", post(place_bid))
        .route("/bids/item/{item_id}", get(list_bids))
        .route("/bids/highest/{item_id}", get(highest_bid))
        .route("/orders", post(create_order))
        .route("/orders/user", get(my_orders))
        .route("/orders/item/{item_id}", get(item_orders))
        .route("/sellers/{id}/reputation", get(seller_reputation))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
