use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::MarketError;
use crate::ids::Id;

/// Lifecycle of a listed item.
///
/// `Expired` is owned by the catalog boundary: nothing in this crate sets it,
/// but bid validation honors it since only `Active` items accept bids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Active,
    Sold,
    Expired,
}

/// A listed item: fixed-price by default, a timed auction when `auction` is
/// set. Closure results (`winner`, `winning_bid`, `final_price`) stay `None`
/// until the seller closes the auction, and never change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: Id,
    pub seller: Id,
    pub title: String,
    pub description: String,
    pub category: String,
    pub images: Vec<String>,
    /// Starting price for auctions, sale price for buy-now listings.
    pub price: Decimal,
    pub auction: bool,
    /// Required iff `auction`; never set on fixed-price items.
    #[serde(rename = "auction_end_time")]
    pub auction_end_time: Option<DateTime<Utc>>,
    pub status: ItemStatus,
    pub is_auction_closed: bool,
    pub winning_bid: Option<Id>,
    pub winner: Option<Id>,
    pub final_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

/// Creation payload accepted at the catalog boundary.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub price: Decimal,
    #[serde(default)]
    pub auction: bool,
    #[serde(rename = "auction_end_time", default)]
    pub auction_end_time: Option<DateTime<Utc>>,
}

impl Item {
    /// Validate a creation payload and mint the listing.
    ///
    /// Fixed-price listings silently drop any end time; auctions must carry
    /// one. The end time may already be in the past, which simply yields an
    /// auction nobody can bid on.
    pub fn new(seller: Id, new: NewItem) -> Result<Item, MarketError> {
        if new.title.trim().is_empty() {
            return Err(MarketError::InvalidItem("title is required".into()));
        }
        if new.price < Decimal::ZERO {
            return Err(MarketError::InvalidItem(
                "price must be non-negative".into(),
            ));
        }
        if new.auction && new.auction_end_time.is_none() {
            return Err(MarketError::InvalidItem(
                "auction items require auction_end_time".into(),
            ));
        }
        let auction_end_time = if new.auction { new.auction_end_time } else { None };
        Ok(Item {
            id: Id::generate(),
            seller,
            title: new.title,
            description: new.description,
            category: new.category,
            images: new.images,
            price: new.price,
            auction: new.auction,
            auction_end_time,
            status: ItemStatus::Active,
            is_auction_closed: false,
            winning_bid: None,
            winner: None,
            final_price: None,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn payload() -> NewItem {
        NewItem {
            title: "Vintage Lamp".into(),
            description: "Brass, 1960s".into(),
            category: "Home".into(),
            images: vec![],
            price: Decimal::from(100),
            auction: false,
            auction_end_time: None,
        }
    }

    #[test]
    fn buy_now_item_drops_end_time() {
        let mut new = payload();
        new.auction_end_time = Some(Utc::now() + Duration::hours(1));
        let item = Item::new(Id::generate(), new).unwrap();
        assert!(!item.auction);
        assert!(item.auction_end_time.is_none());
        assert_eq!(item.status, ItemStatus::Active);
        assert!(!item.is_auction_closed);
    }

    #[test]
    fn auction_item_requires_end_time() {
        let mut new = payload();
        new.auction = true;
        let err = Item::new(Id::generate(), new).unwrap_err();
        assert!(matches!(err, MarketError::InvalidItem(_)));
    }

    #[test]
    fn title_and_price_are_validated() {
        let mut new = payload();
        new.title = "   ".into();
        assert!(Item::new(Id::generate(), new).is_err());

        let mut new = payload();
        new.price = Decimal::from(-1);
        assert!(Item::new(Id::generate(), new).is_err());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ItemStatus::Active).unwrap(),
            "\"active\""
        );
        assert_eq!(serde_json::to_string(&ItemStatus::Sold).unwrap(), "\"sold\"");
    }
}
