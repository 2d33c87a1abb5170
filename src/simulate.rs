//! Randomized traffic harness for a running marketplace server.
//!
//! Continuously fires bids (and the occasional buy-now order) at the API to:
//! 1. Exercise the monotonic-bid validation under stochastic arrivals.
//! 2. Produce realistic auction histories to close and fulfill at the end.
//!
//! ## Components
//!
//! - [`SimConfig`] holds the simulation parameters:
//!   - `api_base`: base URL of the REST API (e.g. `http://127.0.0.1:3000`).
//!   - `run_secs`: optional total duration; `None` runs until cancelled.
//!   - `rate_hz`: Poisson arrival rate (λ) for bids (exponential inter-arrival).
//!   - `auctions` / `listings`: items seeded before traffic starts.
//!   - `bidders`: size of the rotating bidder pool.
//!   - `mean_increment`: on each bid an Exp(1) variate scaled by this value
//!     decides how far above the current highest the bid lands.
//! - [`run_simulation`]: seeds the catalog, runs the bid loop until the
//!   duration elapses or the token fires, then closes every auction and has
//!   each winner claim their order.
//!
//! A slice of the traffic is deliberately invalid (seller self-bids,
//! repeat buy-now attempts) so the rejection paths see load too.

use anyhow::Context;
use rand::Rng;
use rand_distr::{Distribution, Exp, Exp1};
use reqwest::Client;
use serde_json::{Value, json};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::ids::Id;

#[derive(Clone)]
pub struct SimConfig {
    pub api_base: String,
    pub run_secs: Option<u64>,
    pub rate_hz: f64,
    pub auctions: usize,
    pub listings: usize,
    pub bidders: usize,
    pub mean_increment: f64,
}

#[derive(Default)]
struct SimStats {
    bids_sent: u64,
    bids_accepted: u64,
    bids_rejected: u64,
    orders_created: u64,
    orders_rejected: u64,
    auctions_won: u64,
    auctions_unsold: u64,
}

fn bearer(id: &Id) -> String {
    format!("Bearer {id}")
}

fn cents(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

async fn seed_item(
    client: &Client,
    cfg: &SimConfig,
    seller: &Id,
    n: usize,
    auction: bool,
) -> anyhow::Result<String> {
    let price = cents(rand::rng().random_range(20.0..120.0));
    let mut body = json!({
        "title": format!("{} #{n}", if auction { "Sim Auction" } else { "Sim Listing" }),
        "description": "seeded by the traffic simulator",
        "category": "simulation",
        "price": price,
        "auction": auction,
    });
    if auction {
        let end = chrono::Utc::now() + chrono::Duration::minutes(15);
        body["auction_end_time"] = json!(end.to_rfc3339());
    }
    let resp = client
        .post(format!("{}/items", cfg.api_base))
        .header("authorization", bearer(seller))
        .json(&body)
        .send()
        .await?
        .error_for_status()?;
    let item = resp.json::<Value>().await?;
    let id = item["id"].as_str().context("item id missing from response")?;
    Ok(id.to_string())
}

async fn current_highest(client: &Client, cfg: &SimConfig, item: &str) -> f64 {
    let url = format!("{}/bids/highest/{}", cfg.api_base, item);
    match client.get(url).send().await {
        Ok(resp) => resp
            .json::<Value>()
            .await
            .ok()
            .and_then(|v| v["highestBid"].as_f64())
            .unwrap_or(0.0),
        Err(_) => 0.0,
    }
}

/// Drive a noisy bid stream against the marketplace.
///
/// 1. Seeds `cfg.auctions` auction items and `cfg.listings` fixed-price
///    items under a single seller principal.
/// 2. Draws inter-arrival delays from Exponential(rate = `cfg.rate_hz`) and
///    on each tick posts one bid: usually a pool bidder raising the current
///    highest by `Exp1 * mean_increment`, sometimes the seller (rejected) or
///    a deliberate under-bid (rejected).
/// 3. Occasionally fires a buy-now order at a fixed-price item; duplicates
///    and already-sold rejections are expected and counted.
/// 4. On exit (duration elapsed or `cancel_token` fired) closes every
///    auction as the seller and lets each winner claim their order.
///
/// Rejections are part of the exercise, so only transport failures abort the
/// run.
pub async fn run_simulation(cfg: SimConfig, cancel_token: CancellationToken) -> anyhow::Result<()> {
    let client = Client::new();
    let ia_dist = Exp::new(cfg.rate_hz).expect("rate_hz must be > 0");

    let seller = Id::generate();
    let bidders: Vec<Id> = (0..cfg.bidders.max(1)).map(|_| Id::generate()).collect();

    let mut auctions = Vec::with_capacity(cfg.auctions);
    for n in 0..cfg.auctions {
        auctions.push(seed_item(&client, &cfg, &seller, n, true).await?);
    }
    let mut listings = Vec::with_capacity(cfg.listings);
    for n in 0..cfg.listings {
        listings.push(seed_item(&client, &cfg, &seller, n, false).await?);
    }
    println!(
        "seeded {} auctions and {} listings under seller {}",
        auctions.len(),
        listings.len(),
        seller
    );

    let mut stats = SimStats::default();
    let start = Instant::now();

    loop {
        if let Some(max_secs) = cfg.run_secs {
            if start.elapsed().as_secs() >= max_secs {
                break;
            }
        }
        if auctions.is_empty() {
            break;
        }
        let wait_secs = ia_dist.sample(&mut rand::rng());
        let sleep_fut = sleep(Duration::from_secs_f64(wait_secs));
        tokio::select! {
            _ = cancel_token.cancelled() => {
                tracing::info!("received shutdown, winding the simulation down");
                break;
            }
            _ = sleep_fut => {
                // draw everything before the awaits; ThreadRng is not Send
                let (target, principal, self_bid, under_bid, raw_inc, try_order, listing_pick) = {
                    let mut rng = rand::rng();
                    let target = auctions[rng.random_range(0..auctions.len())].clone();
                    let self_bid = rng.random_bool(0.08);
                    let under_bid = rng.random_bool(0.1);
                    let principal = if self_bid {
                        seller
                    } else {
                        bidders[rng.random_range(0..bidders.len())]
                    };
                    let raw_inc: f64 = <Exp1 as Distribution<f64>>::sample(&Exp1, &mut rng);
                    let try_order = !listings.is_empty() && rng.random_bool(0.15);
                    let listing_pick = if listings.is_empty() {
                        0
                    } else {
                        rng.random_range(0..listings.len())
                    };
                    (target, principal, self_bid, under_bid, raw_inc, try_order, listing_pick)
                };

                let highest = current_highest(&client, &cfg, &target).await;
                let amount = if under_bid {
                    cents((highest - 1.0).max(0.01))
                } else {
                    cents(highest + (raw_inc * cfg.mean_increment).max(0.01))
                };

                let resp = client
                    .post(format!("{}/bids", cfg.api_base))
                    .header("authorization", bearer(&principal))
                    .json(&json!({ "itemId": target, "amount": amount }))
                    .send()
                    .await?;
                stats.bids_sent += 1;
                if resp.status().is_success() {
                    stats.bids_accepted += 1;
                } else {
                    stats.bids_rejected += 1;
                }
                println!(
                    "[{:.1}s] bid item={} amount={:.2} self={} -> {}",
                    start.elapsed().as_secs_f64(),
                    &target[..8],
                    amount,
                    self_bid,
                    resp.status()
                );

                if try_order {
                    let buyer = principal;
                    let listing = &listings[listing_pick];
                    let resp = client
                        .post(format!("{}/orders", cfg.api_base))
                        .header("authorization", bearer(&buyer))
                        .json(&json!({ "itemId": listing, "type": "buy-now" }))
                        .send()
                        .await?;
                    if resp.status().is_success() {
                        stats.orders_created += 1;
                    } else {
                        stats.orders_rejected += 1;
                    }
                }
            }
        }
    }

    // wind-down: close every auction and let the winners collect
    for item in &auctions {
        let resp = client
            .post(format!("{}/items/{}/close-auction", cfg.api_base, item))
            .header("authorization", bearer(&seller))
            .send()
            .await?;
        if !resp.status().is_success() {
            tracing::warn!(item = %item, status = %resp.status(), "closure refused");
            continue;
        }
        let closure = resp.json::<Value>().await?;
        match closure["winner"].as_str() {
            Some(winner) => {
                stats.auctions_won += 1;
                let resp = client
                    .post(format!("{}/orders", cfg.api_base))
                    .header("authorization", format!("Bearer {winner}"))
                    .json(&json!({ "itemId": item, "type": "auction" }))
                    .send()
                    .await?;
                if resp.status().is_success() {
                    stats.orders_created += 1;
                } else {
                    stats.orders_rejected += 1;
                }
                println!(
                    "closed {} winner={} finalPrice={}",
                    &item[..8],
                    &winner[..8],
                    closure["finalPrice"]
                );
            }
            None => {
                stats.auctions_unsold += 1;
                println!("closed {} with no bids", &item[..8]);
            }
        }
    }

    println!(
        "--- done --- bids {}/{} accepted ({} rejected), orders created={} rejected={}, auctions won={} unsold={}",
        stats.bids_accepted,
        stats.bids_sent,
        stats.bids_rejected,
        stats.orders_created,
        stats.orders_rejected,
        stats.auctions_won,
        stats.auctions_unsold
    );
    Ok(())
}
