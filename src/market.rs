use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use crate::bid::{Bid, BidLedger};
use crate::error::MarketError;
use crate::ids::Id;
use crate::item::{Item, ItemStatus, NewItem};
use crate::order::{Order, OrderKind};
use crate::store::OrderStore;

/// An item together with its bid history, guarded as one unit.
///
/// Every read-validate-write span over an item or its ledger runs while
/// holding the slot lock; that is what serializes concurrent bids, closures
/// and orders per item without blocking unrelated items.
struct ItemSlot {
    item: Item,
    bids: BidLedger,
}

/// Outcome of closing an auction. Both fields stay `None` for a winnerless
/// closure.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Closure {
    pub winner: Option<Id>,
    pub final_price: Option<Decimal>,
}

/// Current-price projection; falls back to the starting price when nobody
/// has bid yet.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighestBid {
    pub item_id: Id,
    pub highest_bid: Decimal,
    pub bidder: Option<Id>,
}

/// Listing filters accepted by the catalog query endpoint.
#[derive(Debug, Default, Clone)]
pub struct ItemFilter {
    pub auction: Option<bool>,
    pub status: Option<ItemStatus>,
    pub seller: Option<Id>,
}

impl ItemFilter {
    fn matches(&self, item: &Item) -> bool {
        self.auction.is_none_or(|a| item.auction == a)
            && self.status.is_none_or(|s| item.status == s)
            && self.seller.is_none_or(|s| item.seller == s)
    }
}

/// Order row as clients see it: the order itself plus a summary of the item
/// it was placed against (when the item is still listed).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub item_detail: Option<ItemSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    pub id: Id,
    pub title: String,
    pub price: Decimal,
    pub auction: bool,
}

/// The marketplace engine: catalog, bid ledgers, order service and seller
/// reputation counters.
///
/// Items and their ledgers live in memory behind per-item locks; completed
/// orders go to the durable [`OrderStore`]. Lock order is fixed: catalog map
/// before slot, slot before reputation map.
pub struct Marketplace {
    slots: RwLock<HashMap<Id, Arc<Mutex<ItemSlot>>>>,
    reputation: RwLock<HashMap<Id, Arc<AtomicU64>>>,
    orders: OrderStore,
}

impl Marketplace {
    pub fn new(orders: OrderStore) -> Self {
        Marketplace {
            slots: RwLock::new(HashMap::new()),
            reputation: RwLock::new(HashMap::new()),
            orders,
        }
    }

    fn slot(&self, id: &Id) -> Option<Arc<Mutex<ItemSlot>>> {
        self.slots.read().unwrap().get(id).cloned()
    }

    fn parse_id(raw: &str) -> Result<Id, MarketError> {
        raw.parse().map_err(|_| MarketError::InvalidId(raw.to_string()))
    }

    // --- catalog ---

    pub fn create_item(&self, seller: Id, new: NewItem) -> Result<Item, MarketError> {
        let item = Item::new(seller, new)?;
        let slot = ItemSlot {
            item: item.clone(),
            bids: BidLedger::default(),
        };
        self.slots
            .write()
            .unwrap()
            .insert(item.id, Arc::new(Mutex::new(slot)));
        debug!(item = %item.id, seller = %item.seller, auction = item.auction, "item listed");
        Ok(item)
    }

    pub fn get_item(&self, raw_id: &str) -> Result<Item, MarketError> {
        let id = Self::parse_id(raw_id)?;
        let slot = self.slot(&id).ok_or(MarketError::ItemNotFound)?;
        let slot = slot.lock().unwrap();
        Ok(slot.item.clone())
    }

    /// All matching items, newest listing first.
    pub fn list_items(&self, filter: &ItemFilter) -> Vec<Item> {
        let slots = self.slots.read().unwrap();
        let mut items: Vec<Item> = slots
            .values()
            .map(|s| s.lock().unwrap().item.clone())
            .filter(|i| filter.matches(i))
            .collect();
        items.sort_by_key(|i| std::cmp::Reverse(i.created_at));
        items
    }

    // --- bidding ---

    /// Validate and append a bid.
    ///
    /// Checks run in a fixed order so each failure mode maps to one stable
    /// error: reference shape, amount, existence, auction flag, status,
    /// closure, end time, seller self-bid, and finally the monotonic floor
    /// (strictly above the highest bid, or the starting price when the
    /// ledger is empty). The whole span runs under the item lock, so two
    /// bids racing the same floor admit exactly one.
    pub fn place_bid(
        &self,
        raw_item_id: Option<&str>,
        bidder: Id,
        amount: Option<Decimal>,
    ) -> Result<Bid, MarketError> {
        let raw_item_id = raw_item_id.ok_or(MarketError::MissingField("itemId"))?;
        let item_id = Self::parse_id(raw_item_id)?;
        let amount = match amount {
            Some(a) if a > Decimal::ZERO => a,
            _ => return Err(MarketError::InvalidAmount),
        };

        let slot = self.slot(&item_id).ok_or(MarketError::ItemNotFound)?;
        let mut slot = slot.lock().unwrap();

        let item = &slot.item;
        if !item.auction {
            return Err(MarketError::BiddingNotAllowed);
        }
        if item.status != ItemStatus::Active {
            return Err(MarketError::AuctionNotActive);
        }
        if item.is_auction_closed {
            return Err(MarketError::AuctionClosed);
        }
        match item.auction_end_time {
            Some(end) if Utc::now() <= end => {}
            _ => return Err(MarketError::AuctionEnded),
        }
        if bidder == item.seller {
            return Err(MarketError::SellerCannotBid);
        }
        let min = slot.bids.highest().map(|b| b.amount).unwrap_or(item.price);
        if amount <= min {
            return Err(MarketError::BidTooLow { min });
        }

        let bid = Bid::new(item_id, bidder, amount);
        slot.bids.append(bid.clone());
        debug!(item = %item_id, bidder = %bidder, %amount, "bid accepted");
        Ok(bid)
    }

    /// Full bid history for an item, highest first.
    pub fn bids_for_item(&self, raw_item_id: &str) -> Result<Vec<Bid>, MarketError> {
        let item_id = Self::parse_id(raw_item_id)?;
        let slot = self.slot(&item_id).ok_or(MarketError::ItemNotFound)?;
        let slot = slot.lock().unwrap();
        Ok(slot.bids.ranked())
    }

    pub fn highest_bid(&self, raw_item_id: &str) -> Result<HighestBid, MarketError> {
        let item_id = Self::parse_id(raw_item_id)?;
        let slot = self.slot(&item_id).ok_or(MarketError::ItemNotFound)?;
        let slot = slot.lock().unwrap();
        Ok(match slot.bids.highest() {
            Some(b) => HighestBid {
                item_id,
                highest_bid: b.amount,
                bidder: Some(b.bidder),
            },
            None => HighestBid {
                item_id,
                highest_bid: slot.item.price,
                bidder: None,
            },
        })
    }

    // --- closure ---

    /// Close an auction and freeze its outcome.
    ///
    /// The repeat-closure guard runs before the ownership check, so a second
    /// close reports the conflict to any caller, seller included. Closure is
    /// legal before the end time and on items without bids; the winner is
    /// the earliest of the highest-amount bids, or nobody.
    pub fn close_auction(&self, raw_item_id: &str, requester: Id) -> Result<Closure, MarketError> {
        let item_id = Self::parse_id(raw_item_id)?;
        let slot = self.slot(&item_id).ok_or(MarketError::ItemNotFound)?;
        let mut slot = slot.lock().unwrap();

        if slot.item.is_auction_closed {
            return Err(MarketError::AlreadyClosed);
        }
        if requester != slot.item.seller {
            return Err(MarketError::NotSeller);
        }

        let winning = slot.bids.highest().cloned();
        let item = &mut slot.item;
        item.is_auction_closed = true;
        if let Some(bid) = &winning {
            item.winning_bid = Some(bid.id);
            item.winner = Some(bid.bidder);
            item.final_price = Some(bid.amount);
        }
        let closure = Closure {
            winner: item.winner,
            final_price: item.final_price,
        };
        info!(item = %item_id, winner = ?closure.winner, "auction closed");
        Ok(closure)
    }

    // --- orders ---

    /// Create the order that completes a purchase.
    ///
    /// The duplicate check and the insert both run under the item lock, so
    /// at most one order per (item, buyer) pair ever lands. The durable
    /// insert happens before any state mutation: a storage failure leaves
    /// the item untouched and the seller's rating unchanged.
    pub fn create_order(
        &self,
        raw_item_id: Option<&str>,
        buyer: Id,
        kind: Option<&str>,
    ) -> Result<Order, MarketError> {
        let raw_item_id = raw_item_id.ok_or(MarketError::MissingField("itemId"))?;
        let kind_raw = kind.ok_or(MarketError::MissingField("type"))?;
        let item_id = Self::parse_id(raw_item_id)?;

        let slot = self.slot(&item_id).ok_or(MarketError::ItemNotFound)?;
        let mut slot = slot.lock().unwrap();

        if self.orders.find(&item_id, &buyer)?.is_some() {
            return Err(MarketError::DuplicateOrder);
        }
        let kind: OrderKind = kind_raw
            .parse()
            .map_err(|_| MarketError::InvalidOrderType(kind_raw.to_string()))?;

        let (order_buyer, price, sells_item) = match kind {
            OrderKind::Auction => {
                let item = &slot.item;
                let (winner, final_price) = match (
                    item.auction && item.is_auction_closed,
                    item.winner,
                    item.final_price,
                ) {
                    (true, Some(w), Some(p)) => (w, p),
                    _ => return Err(MarketError::AuctionNotResolved),
                };
                if buyer != winner {
                    return Err(MarketError::NotWinner);
                }
                (winner, final_price, false)
            }
            OrderKind::BuyNow => {
                let item = &slot.item;
                if item.auction {
                    return Err(MarketError::NotBuyNow);
                }
                if item.status != ItemStatus::Active {
                    return Err(MarketError::ItemUnavailable);
                }
                (buyer, item.price, true)
            }
        };

        let order = Order::new(item_id, order_buyer, slot.item.seller, price);
        self.orders.insert(&order)?;
        if sells_item {
            slot.item.status = ItemStatus::Sold;
        }
        self.bump_reputation(&order.seller);
        info!(order = %order.id, item = %item_id, buyer = %order.buyer, kind = %kind, "order completed");
        Ok(order)
    }

    /// One page of the buyer's own orders, oldest first, with a resume
    /// cursor.
    pub fn orders_for_buyer(
        &self,
        buyer: Id,
        after: Option<&str>,
        limit: usize,
    ) -> Result<(Vec<OrderView>, Option<String>), MarketError> {
        let (orders, next) = self.orders.page_orders_for_buyer(&buyer, after, limit)?;
        let views = orders.into_iter().map(|o| self.resolve(o)).collect();
        Ok((views, next))
    }

    pub fn orders_for_item(&self, raw_item_id: &str) -> Result<Vec<OrderView>, MarketError> {
        let item_id = Self::parse_id(raw_item_id)?;
        if self.slot(&item_id).is_none() {
            return Err(MarketError::ItemNotFound);
        }
        let orders = self.orders.orders_for_item(&item_id)?;
        Ok(orders.into_iter().map(|o| self.resolve(o)).collect())
    }

    fn resolve(&self, order: Order) -> OrderView {
        let item_detail = self.slot(&order.item).map(|slot| {
            let slot = slot.lock().unwrap();
            ItemSummary {
                id: slot.item.id,
                title: slot.item.title.clone(),
                price: slot.item.price,
                auction: slot.item.auction,
            }
        });
        OrderView { order, item_detail }
    }

    // --- reputation ---

    /// Atomically credit the seller with one completed sale.
    fn bump_reputation(&self, seller: &Id) {
        if let Some(counter) = self.reputation.read().unwrap().get(seller).cloned() {
            counter.fetch_add(1, Ordering::Relaxed);
            return;
        }
        let mut map = self.reputation.write().unwrap();
        map.entry(*seller).or_default().fetch_add(1, Ordering::Relaxed);
    }

    pub fn reputation_of(&self, raw_seller: &str) -> Result<u64, MarketError> {
        let seller = Self::parse_id(raw_seller)?;
        Ok(self
            .reputation
            .read()
            .unwrap()
            .get(&seller)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0))
    }
}
