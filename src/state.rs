use std::path::Path;
use std::sync::Arc;

use crate::error::MarketError;
use crate::market::Marketplace;
use crate::store::OrderStore;

/// Shared handle threaded through every request handler.
#[derive(Clone)]
pub struct AppState {
    pub market: Arc<Marketplace>,
}

impl AppState {
    pub fn new(market: Marketplace) -> Self {
        Self {
            market: Arc::new(market),
        }
    }

    /// Build the full engine with its order archive rooted at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MarketError> {
        let store = OrderStore::open(path)?;
        Ok(Self::new(Marketplace::new(store)))
    }
}
