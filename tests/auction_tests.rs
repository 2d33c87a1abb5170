use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
    response::Response,
};
use http_body_util::BodyExt;
use marketplace_engine::{api::router, ids::Id, state::AppState};
use serde_json::{Value, json};
use tempfile::tempdir;
use tower::ServiceExt;

fn test_app() -> (Router, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let state = AppState::open(dir.path()).unwrap();
    (router(state), dir)
}

async fn body_json(res: Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn bearer(id: &Id) -> String {
    format!("Bearer {id}")
}

async fn post_json(app: &Router, uri: &str, principal: Option<&Id>, body: Value) -> Response {
    let mut req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(id) = principal {
        req = req.header("authorization", bearer(id));
    }
    app.clone()
        .oneshot(req.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

async fn get(app: &Router, uri: &str, principal: Option<&Id>) -> Response {
    let mut req = Request::builder().uri(uri);
    if let Some(id) = principal {
        req = req.header("authorization", bearer(id));
    }
    app.clone()
        .oneshot(req.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

fn auction_body(price: f64, end: chrono::DateTime<chrono::Utc>) -> Value {
    json!({
        "title": "Auction Test Item",
        "description": "Test auction item",
        "category": "Test",
        "price": price,
        "auction": true,
        "auction_end_time": end.to_rfc3339(),
    })
}

async fn create_auction(app: &Router, seller: &Id, price: f64) -> String {
    let end = chrono::Utc::now() + chrono::Duration::hours(1);
    let res = post_json(app, "/items", Some(seller), auction_body(price, end)).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    body_json(res).await["id"].as_str().unwrap().to_string()
}

async fn create_buy_now(app: &Router, seller: &Id, price: f64) -> String {
    let res = post_json(
        app,
        "/items",
        Some(seller),
        json!({
            "title": "Buy Now Test Item",
            "description": "fixed price",
            "category": "Test",
            "price": price,
            "auction": false,
        }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    body_json(res).await["id"].as_str().unwrap().to_string()
}

async fn place_bid(app: &Router, item: &str, bidder: &Id, amount: f64) -> Response {
    post_json(
        app,
        "/bids",
        Some(bidder),
        json!({ "itemId": item, "amount": amount }),
    )
    .await
}

#[tokio::test]
async fn bidding_requires_authentication() {
    let (app, _tmp) = test_app();
    let res = post_json(&app, "/bids", None, json!({ "itemId": "x", "amount": 1 })).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // garbage bearer tokens are rejected the same way
    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/bids")
                .header("content-type", "application/json")
                .header("authorization", "Bearer not-an-id")
                .body(Body::from(json!({ "itemId": "x", "amount": 1 }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_and_unknown_item_ids_are_distinguished() {
    let (app, _tmp) = test_app();
    let bidder = Id::generate();

    let res = place_bid(&app, "invalidid", &bidder, 100.0).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let v = body_json(res).await;
    assert!(v["error"].as_str().unwrap().contains("invalid id"));

    let res = place_bid(&app, &Id::generate().to_string(), &bidder, 100.0).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let v = body_json(res).await;
    assert!(v["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn bid_must_exceed_starting_price() {
    let (app, _tmp) = test_app();
    let seller = Id::generate();
    let item = create_auction(&app, &seller, 100.0).await;
    let bidder = Id::generate();

    // equal to the starting price is not enough
    let res = place_bid(&app, &item, &bidder, 100.0).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let v = body_json(res).await;
    assert!(v["error"].as_str().unwrap().contains("100"));

    // one cent above is
    let res = place_bid(&app, &item, &bidder, 100.01).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let bid = body_json(res).await;
    assert_eq!(bid["amount"].as_f64(), Some(100.01));
    assert_eq!(bid["item"].as_str(), Some(item.as_str()));
    assert_eq!(bid["bidder"].as_str(), Some(bidder.to_string().as_str()));
}

#[tokio::test]
async fn each_bid_must_beat_the_standing_highest() {
    let (app, _tmp) = test_app();
    let seller = Id::generate();
    let item = create_auction(&app, &seller, 100.0).await;

    let res = place_bid(&app, &item, &Id::generate(), 150.0).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    // a matching amount loses to the standing bid
    let res = place_bid(&app, &item, &Id::generate(), 150.0).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let v = body_json(res).await;
    assert!(v["error"].as_str().unwrap().contains("150"));

    let res = place_bid(&app, &item, &Id::generate(), 140.0).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = place_bid(&app, &item, &Id::generate(), 200.0).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = get(&app, &format!("/bids/highest/{item}"), None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let v = body_json(res).await;
    assert_eq!(v["highestBid"].as_f64(), Some(200.0));
}

#[tokio::test]
async fn bid_amount_must_be_positive() {
    let (app, _tmp) = test_app();
    let seller = Id::generate();
    let item = create_auction(&app, &seller, 100.0).await;
    let bidder = Id::generate();

    for body in [
        json!({ "itemId": item }),
        json!({ "itemId": item, "amount": 0 }),
        json!({ "itemId": item, "amount": -10 }),
    ] {
        let res = post_json(&app, "/bids", Some(&bidder), body).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn sellers_cannot_bid_on_their_own_items() {
    let (app, _tmp) = test_app();
    let seller = Id::generate();
    let item = create_auction(&app, &seller, 100.0).await;

    let res = place_bid(&app, &item, &seller, 150.0).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let v = body_json(res).await;
    assert!(v["error"].as_str().unwrap().contains("own item"));
}

#[tokio::test]
async fn ended_auctions_reject_bids() {
    let (app, _tmp) = test_app();
    let seller = Id::generate();
    let end = chrono::Utc::now() - chrono::Duration::minutes(5);
    let res = post_json(&app, "/items", Some(&seller), auction_body(100.0, end)).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let item = body_json(res).await["id"].as_str().unwrap().to_string();

    let res = place_bid(&app, &item, &Id::generate(), 150.0).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let v = body_json(res).await;
    assert!(v["error"].as_str().unwrap().contains("ended"));
}

#[tokio::test]
async fn buy_now_items_reject_bids() {
    let (app, _tmp) = test_app();
    let seller = Id::generate();
    let item = create_buy_now(&app, &seller, 100.0).await;

    let res = place_bid(&app, &item, &Id::generate(), 150.0).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let v = body_json(res).await;
    assert!(v["error"].as_str().unwrap().contains("not allowed"));
}

#[tokio::test]
async fn highest_bid_defaults_to_the_starting_price() {
    let (app, _tmp) = test_app();
    let seller = Id::generate();
    let item = create_auction(&app, &seller, 100.0).await;

    let res = get(&app, &format!("/bids/highest/{item}"), None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let v = body_json(res).await;
    assert_eq!(v["highestBid"].as_f64(), Some(100.0));
    assert!(v["bidder"].is_null());
    assert_eq!(v["itemId"].as_str(), Some(item.as_str()));
}

#[tokio::test]
async fn bid_listing_is_ranked_highest_first() {
    let (app, _tmp) = test_app();
    let seller = Id::generate();
    let item = create_auction(&app, &seller, 100.0).await;
    for amount in [150.0, 200.0, 300.0] {
        let res = place_bid(&app, &item, &Id::generate(), amount).await;
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let res = get(&app, &format!("/bids/item/{item}"), None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let v = body_json(res).await;
    assert_eq!(v["totalBids"].as_u64(), Some(3));
    let amounts: Vec<f64> = v["bids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["amount"].as_f64().unwrap())
        .collect();
    assert_eq!(amounts, vec![300.0, 200.0, 150.0]);
    assert!(v["bids"][0]["bidder"].is_string());
}

#[tokio::test]
async fn closing_requires_the_seller() {
    let (app, _tmp) = test_app();
    let seller = Id::generate();
    let item = create_auction(&app, &seller, 100.0).await;

    let res = post_json(
        &app,
        &format!("/items/{item}/close-auction"),
        Some(&Id::generate()),
        json!({}),
    )
    .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let v = body_json(res).await;
    assert!(v["error"].as_str().unwrap().contains("seller"));

    let res = post_json(&app, &format!("/items/{item}/close-auction"), None, json!({})).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn closure_selects_the_highest_bid_and_marks_the_item() {
    let (app, _tmp) = test_app();
    let seller = Id::generate();
    let item = create_auction(&app, &seller, 100.0).await;
    let loser = Id::generate();
    let winner = Id::generate();

    place_bid(&app, &item, &loser, 500.0).await;
    let res = place_bid(&app, &item, &winner, 700.0).await;
    let winning_bid = body_json(res).await["id"].as_str().unwrap().to_string();

    let res = post_json(&app, &format!("/items/{item}/close-auction"), Some(&seller), json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);
    let v = body_json(res).await;
    assert_eq!(v["winner"].as_str(), Some(winner.to_string().as_str()));
    assert_eq!(v["finalPrice"].as_f64(), Some(700.0));

    let res = get(&app, &format!("/items/{item}"), None).await;
    let v = body_json(res).await;
    assert_eq!(v["isAuctionClosed"].as_bool(), Some(true));
    assert_eq!(v["winner"].as_str(), Some(winner.to_string().as_str()));
    assert_eq!(v["winningBid"].as_str(), Some(winning_bid.as_str()));
    assert_eq!(v["finalPrice"].as_f64(), Some(700.0));
    // closure does not flip the catalog status by itself
    assert_eq!(v["status"].as_str(), Some("active"));
}

#[tokio::test]
async fn closure_without_bids_has_no_winner() {
    let (app, _tmp) = test_app();
    let seller = Id::generate();
    let item = create_auction(&app, &seller, 100.0).await;

    // closing early, before the end time, is the seller's call
    let res = post_json(&app, &format!("/items/{item}/close-auction"), Some(&seller), json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);
    let v = body_json(res).await;
    assert!(v["winner"].is_null());
    assert!(v["finalPrice"].is_null());
}

#[tokio::test]
async fn repeat_closure_is_a_conflict_for_everyone() {
    let (app, _tmp) = test_app();
    let seller = Id::generate();
    let item = create_auction(&app, &seller, 100.0).await;
    let uri = format!("/items/{item}/close-auction");

    let res = post_json(&app, &uri, Some(&seller), json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);

    // second attempt conflicts even for the seller...
    let res = post_json(&app, &uri, Some(&seller), json!({})).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let v = body_json(res).await;
    assert!(v["error"].as_str().unwrap().contains("already closed"));

    // ...and reports the same conflict to strangers
    let res = post_json(&app, &uri, Some(&Id::generate()), json!({})).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let v = body_json(res).await;
    assert!(v["error"].as_str().unwrap().contains("already closed"));
}

#[tokio::test]
async fn closed_auctions_reject_new_bids() {
    let (app, _tmp) = test_app();
    let seller = Id::generate();
    let item = create_auction(&app, &seller, 100.0).await;
    place_bid(&app, &item, &Id::generate(), 150.0).await;
    post_json(&app, &format!("/items/{item}/close-auction"), Some(&seller), json!({})).await;

    let res = place_bid(&app, &item, &Id::generate(), 200.0).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let v = body_json(res).await;
    assert!(v["error"].as_str().unwrap().contains("closed"));
}

#[tokio::test]
async fn item_listing_supports_filters() {
    let (app, _tmp) = test_app();
    let seller = Id::generate();
    create_auction(&app, &seller, 100.0).await;
    create_buy_now(&app, &seller, 50.0).await;
    create_buy_now(&app, &Id::generate(), 60.0).await;

    let res = get(&app, "/items", None).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await.as_array().unwrap().len(), 3);

    let res = get(&app, "/items?auction=true", None).await;
    assert_eq!(body_json(res).await.as_array().unwrap().len(), 1);

    let res = get(&app, &format!("/items?seller={seller}"), None).await;
    assert_eq!(body_json(res).await.as_array().unwrap().len(), 2);

    // filter ids are validated like any other id
    let res = get(&app, "/items?seller=zzz", None).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_bodies_get_the_error_envelope() {
    let (app, _tmp) = test_app();
    let bidder = Id::generate();

    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/bids")
                .header("content-type", "application/json")
                .header("authorization", bearer(&bidder))
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(res.status().is_client_error());
    let v = body_json(res).await;
    assert!(v["error"].is_string());
}
