use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use bincode::{
    config::standard,
    error::{DecodeError, EncodeError},
};
use parity_db::{BTreeIterator, ColId, Db, Options};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::Id;
use crate::order::Order;

/// Orders keyed `item ++ buyer`: the one-order-per-pair rule becomes a point
/// lookup, and per-item listings a prefix walk.
const PAIR_COL: ColId = 0;
/// The same records re-keyed `buyer ++ created_at ++ item` for buyer history
/// scans and cursor pagination.
const BUYER_COL: ColId = 1;
const NUM_COLUMNS: u8 = 2;

/// Errors from the order archive.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("ParityDB error: {0}")]
    Db(#[from] parity_db::Error),
    #[error("serde_json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bincode encode error: {0}")]
    Encode(#[from] EncodeError),
    #[error("bincode decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("invalid cursor")]
    BadCursor,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Opaque resume point handed to clients as base64 JSON. A cursor names the
/// exact last-seen row; one that does not resolve to a real row for the same
/// buyer is rejected rather than silently re-anchored.
#[derive(Serialize, Deserialize)]
struct Cursor {
    ts_nanos: i64,
    item: Id,
}

/// parity-db-backed archive of completed orders.
///
/// Both columns carry the full encoded order, written in one atomic commit,
/// so either keying can serve reads without a join.
pub struct OrderStore {
    db: Db,
}

impl OrderStore {
    /// Open (or create) the archive at `path`, with B-tree indexes on both
    /// columns for prefix scans.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let mut opts = Options::with_columns(path.as_ref(), NUM_COLUMNS);
        opts.columns[PAIR_COL as usize].btree_index = true;
        opts.columns[BUYER_COL as usize].btree_index = true;
        let db = Db::open_or_create(&opts)?;
        Ok(OrderStore { db })
    }

    #[inline]
    fn ts_nanos(order: &Order) -> i64 {
        order.created_at.timestamp_nanos_opt().unwrap_or_default()
    }

    #[inline]
    fn pair_key(item: &Id, buyer: &Id) -> Vec<u8> {
        let mut k = Vec::with_capacity(24);
        k.extend_from_slice(item.as_bytes());
        k.extend_from_slice(buyer.as_bytes());
        k
    }

    #[inline]
    fn buyer_key(buyer: &Id, ts_nanos: i64, item: &Id) -> Vec<u8> {
        let mut k = Vec::with_capacity(32);
        k.extend_from_slice(buyer.as_bytes());
        k.extend_from_slice(&ts_nanos.to_be_bytes());
        k.extend_from_slice(item.as_bytes());
        k
    }

    #[inline]
    fn cursor_from_order(o: &Order) -> Cursor {
        Cursor {
            ts_nanos: Self::ts_nanos(o),
            item: o.item,
        }
    }

    #[inline]
    fn encode_cursor(c: &Cursor) -> String {
        B64.encode(serde_json::to_vec(c).unwrap())
    }

    #[inline]
    fn decode_cursor(s: &str) -> StoreResult<Cursor> {
        let bytes = B64.decode(s).map_err(|_| StoreError::BadCursor)?;
        serde_json::from_slice(&bytes).map_err(|_| StoreError::BadCursor)
    }

    /// Record a completed order under both keyings in one atomic commit.
    pub fn insert(&self, order: &Order) -> StoreResult<()> {
        let value = bincode::serde::encode_to_vec(order, standard())?;
        let ts = Self::ts_nanos(order);
        self.db.commit(vec![
            (
                PAIR_COL,
                Self::pair_key(&order.item, &order.buyer),
                Some(value.clone()),
            ),
            (
                BUYER_COL,
                Self::buyer_key(&order.buyer, ts, &order.item),
                Some(value),
            ),
        ])?;
        Ok(())
    }

    /// The order a buyer already holds for an item, if any.
    pub fn find(&self, item: &Id, buyer: &Id) -> StoreResult<Option<Order>> {
        match self.db.get(PAIR_COL, &Self::pair_key(item, buyer))? {
            Some(raw) => {
                let (order, _): (Order, usize) = bincode::serde::decode_from_slice(&raw, standard())?;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }

    /// Every order placed against one item.
    pub fn orders_for_item(&self, item: &Id) -> StoreResult<Vec<Order>> {
        let mut it: BTreeIterator<'_> = self.db.iter(PAIR_COL)?;
        let prefix = item.as_bytes().to_vec();
        it.seek(&prefix)?;
        let mut orders = Vec::new();
        while let Some((k, v)) = it.next()? {
            if !k.starts_with(&prefix) {
                break;
            }
            let (order, _): (Order, usize) = bincode::serde::decode_from_slice(&v, standard())?;
            orders.push(order);
        }
        Ok(orders)
    }

    /// One page of a buyer's order history, oldest first.
    ///
    /// Returns the page plus a cursor naming its last row; resuming with that
    /// cursor continues strictly after it. A cursor that does not match a
    /// persisted row of this buyer yields [`StoreError::BadCursor`].
    pub fn page_orders_for_buyer(
        &self,
        buyer: &Id,
        after: Option<&str>,
        limit: usize,
    ) -> StoreResult<(Vec<Order>, Option<String>)> {
        let mut it: BTreeIterator<'_> = self.db.iter(BUYER_COL)?;
        let prefix = buyer.as_bytes().to_vec();

        match after {
            Some(s) => {
                let cursor = Self::decode_cursor(s)?;
                let full = Self::buyer_key(buyer, cursor.ts_nanos, &cursor.item);
                it.seek(&full)?;
                // the cursor must name a row that still exists for this buyer;
                // consuming the equal key starts the page strictly after it
                match it.next()? {
                    Some((k, _)) if k == full => {}
                    _ => return Err(StoreError::BadCursor),
                }
            }
            None => it.seek(&prefix)?,
        }

        let mut orders = Vec::with_capacity(limit.min(256));
        let mut last_cursor: Option<String> = None;
        while orders.len() < limit {
            match it.next()? {
                Some((k, v)) if k.starts_with(&prefix) => {
                    let (order, _): (Order, usize) =
                        bincode::serde::decode_from_slice(&v, standard())?;
                    last_cursor = Some(Self::encode_cursor(&Self::cursor_from_order(&order)));
                    orders.push(order);
                }
                _ => break,
            }
        }

        Ok((orders, last_cursor))
    }
}
