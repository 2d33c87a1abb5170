//! Marketplace engine: bid placement with monotonic validation, seller-run
//! auction closure, and order creation for both closed auctions and buy-now
//! purchases, served over HTTP.
//!
//! Items and their bid ledgers live in memory behind per-item locks
//! ([`market::Marketplace`]); completed orders are archived durably in
//! parity-db ([`store::OrderStore`]). [`api::router`] exposes the whole
//! engine as an axum service.

pub mod api;
pub mod auth;
pub mod bid;
pub mod cli;
pub mod error;
pub mod ids;
pub mod item;
pub mod market;
pub mod order;
pub mod simulate;
pub mod state;
pub mod store;
pub mod utils;
