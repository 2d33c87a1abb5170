use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::Id;

/// Fulfillment record minted from a closed auction or a direct purchase.
///
/// Orders are terminal: there is exactly one per (item, buyer) pair and no
/// state machine beyond `completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Id,
    pub item: Id,
    pub buyer: Id,
    pub seller: Id,
    pub price: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn new(item: Id, buyer: Id, seller: Id, price: Decimal) -> Self {
        Order {
            id: Id::generate(),
            item,
            buyer,
            seller,
            price,
            status: OrderStatus::Completed,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Completed,
}

/// Requested purchase path: `buy-now` against a fixed-price listing, or
/// `auction` to claim a won auction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    BuyNow,
    Auction,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::BuyNow => write!(f, "buy-now"),
            OrderKind::Auction => write!(f, "auction"),
        }
    }
}

impl FromStr for OrderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy-now" => Ok(OrderKind::BuyNow),
            "auction" => Ok(OrderKind::Auction),
            other => Err(format!("unsupported order type: `{other}`")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_kind_parses_wire_names() {
        assert_eq!("buy-now".parse::<OrderKind>().unwrap(), OrderKind::BuyNow);
        assert_eq!("auction".parse::<OrderKind>().unwrap(), OrderKind::Auction);
        assert!("swap".parse::<OrderKind>().is_err());
        assert!("BUY-NOW".parse::<OrderKind>().is_err());
    }

    #[test]
    fn order_kind_display_roundtrips() {
        for kind in [OrderKind::BuyNow, OrderKind::Auction] {
            assert_eq!(kind.to_string().parse::<OrderKind>().unwrap(), kind);
        }
    }
}
