use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::Id;

/// A single bid. Immutable once appended to its item's ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub id: Id,
    pub item: Id,
    pub bidder: Id,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Bid {
    pub fn new(item: Id, bidder: Id, amount: Decimal) -> Self {
        Bid {
            id: Id::generate(),
            item,
            bidder,
            amount,
            created_at: Utc::now(),
        }
    }
}

/// Append-only bid history for one item, kept in arrival order.
///
/// The ledger exposes no update or removal. Ranking queries derive from the
/// arrival sequence, so equal amounts always resolve to the earliest bid.
#[derive(Debug, Default)]
pub struct BidLedger {
    entries: Vec<Bid>,
}

impl BidLedger {
    pub fn append(&mut self, bid: Bid) {
        self.entries.push(bid);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Earliest bid holding the maximum amount, if any bids exist.
    pub fn highest(&self) -> Option<&Bid> {
        let mut best: Option<&Bid> = None;
        for bid in &self.entries {
            match best {
                Some(b) if bid.amount <= b.amount => {}
                _ => best = Some(bid),
            }
        }
        best
    }

    /// All bids, highest amount first; ties keep arrival order.
    pub fn ranked(&self) -> Vec<Bid> {
        let mut out = self.entries.clone();
        out.sort_by(|a, b| b.amount.cmp(&a.amount));
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bid> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bid(amount: i64) -> Bid {
        Bid::new(Id::generate(), Id::generate(), Decimal::from(amount))
    }

    #[test]
    fn highest_of_empty_ledger_is_none() {
        let ledger = BidLedger::default();
        assert!(ledger.highest().is_none());
        assert!(ledger.is_empty());
    }

    #[test]
    fn highest_picks_maximum_amount() {
        let mut ledger = BidLedger::default();
        ledger.append(bid(200));
        ledger.append(bid(150));
        ledger.append(bid(175));
        assert_eq!(ledger.highest().unwrap().amount, Decimal::from(200));
    }

    #[test]
    fn equal_amounts_resolve_to_first_submitted() {
        let mut ledger = BidLedger::default();
        let first = bid(300);
        let second = bid(300);
        ledger.append(first.clone());
        ledger.append(second);
        assert_eq!(ledger.highest().unwrap().id, first.id);
    }

    #[test]
    fn ranked_sorts_descending_and_keeps_arrival_order_on_ties() {
        let mut ledger = BidLedger::default();
        let a = bid(100);
        let b = bid(300);
        let c = bid(300);
        let d = bid(200);
        for x in [&a, &b, &c, &d] {
            ledger.append(x.clone());
        }
        let ranked = ledger.ranked();
        let ids: Vec<Id> = ranked.iter().map(|x| x.id).collect();
        assert_eq!(ids, vec![b.id, c.id, d.id, a.id]);
        assert_eq!(ledger.len(), 4);
    }
}
