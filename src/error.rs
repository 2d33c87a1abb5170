use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Business and boundary failures for every marketplace operation.
///
/// Each variant carries its caller-facing message; the HTTP mapping lives in
/// [`MarketError::status`] so handlers can simply `?` engine results. Note
/// that a repeated closure ([`MarketError::AlreadyClosed`]) is a 403 conflict,
/// while bidding against an already-closed auction
/// ([`MarketError::AuctionClosed`]) is a plain 400 rejection.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("invalid id: `{0}`")]
    InvalidId(String),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("bid amount must be a positive number")]
    InvalidAmount,
    #[error("{0}")]
    InvalidItem(String),
    #[error("item not found")]
    ItemNotFound,
    #[error("bidding is not allowed on this item")]
    BiddingNotAllowed,
    #[error("auction is not active")]
    AuctionNotActive,
    #[error("auction is closed")]
    AuctionClosed,
    #[error("auction has ended")]
    AuctionEnded,
    #[error("seller cannot bid on their own item")]
    SellerCannotBid,
    #[error("bid must be greater than current highest ({min})")]
    BidTooLow { min: Decimal },
    #[error("auction already closed")]
    AlreadyClosed,
    #[error("only the seller can close this auction")]
    NotSeller,
    #[error("order already exists for this item and buyer")]
    DuplicateOrder,
    #[error("invalid order type: `{0}`")]
    InvalidOrderType(String),
    #[error("item is an auction, not a buy-now listing")]
    NotBuyNow,
    #[error("item is not available")]
    ItemUnavailable,
    #[error("auction is not closed or has no winner")]
    AuctionNotResolved,
    #[error("only the auction winner can place this order")]
    NotWinner,
    #[error("authentication required")]
    Unauthenticated,
    #[error("invalid cursor")]
    BadCursor,
    #[error("storage error: {0}")]
    Store(StoreError),
}

impl MarketError {
    pub fn status(&self) -> StatusCode {
        use MarketError::*;
        match self {
            ItemNotFound => StatusCode::NOT_FOUND,
            Unauthenticated => StatusCode::UNAUTHORIZED,
            SellerCannotBid | AlreadyClosed | NotSeller | NotWinner => StatusCode::FORBIDDEN,
            Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<StoreError> for MarketError {
    fn from(err: StoreError) -> Self {
        // Client-supplied cursors surface as a 400, not a storage fault.
        match err {
            StoreError::BadCursor => MarketError::BadCursor,
            other => MarketError::Store(other),
        }
    }
}

impl IntoResponse for MarketError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            return (status, Json(json!({ "error": "internal error" }))).into_response();
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
