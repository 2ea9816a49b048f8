use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures_ledger::api::{self, AppState};
use futures_ledger::config::{Config, PnlMode};
use futures_ledger::PositionController;
use std::sync::Arc;
use tower::util::ServiceExt;

fn test_config(pnl_mode: PnlMode) -> Config {
    Config {
        port: 0,
        fills_replay_path: None,
        pnl_mode,
        collateral_currency: None,
    }
}

fn setup_test_app(pnl_mode: PnlMode) -> axum::Router {
    let state = AppState::new(Arc::new(PositionController::new()), test_config(pnl_mode));
    api::create_router(state)
}

fn fill_json(order_id: &str, side: &str, amount: &str, price: &str, fee: &str, time_ns: i64) -> serde_json::Value {
    serde_json::json!({
        "exchange": "Binance",
        "asset": "perpetual_swap",
        "pair": "BTC-USDT",
        "side": side,
        "orderId": order_id,
        "price": price,
        "amount": amount,
        "fee": fee,
        "timeNs": time_ns,
    })
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

const KEY_QUERY: &str = "exchange=binance&asset=perpetual_swap&pair=BTC-USDT";

#[tokio::test]
async fn test_health_and_ready() {
    let app = setup_test_app(PnlMode::Net);
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_post_fill_returns_position_snapshot() {
    let app = setup_test_app(PnlMode::Net);
    let (status, body) = send(
        &app,
        "POST",
        "/v1/fills",
        Some(fill_json("1", "buy", "2", "100", "0", 1_000)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["exchange"], "binance");
    assert_eq!(body["status"], "open");
    assert_eq!(body["latestSize"], "2");
    assert_eq!(body["latestDirection"], "long");
    assert_eq!(body["orders"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_post_spot_fill_is_bad_request() {
    let app = setup_test_app(PnlMode::Net);
    let mut fill = fill_json("1", "buy", "1", "100", "0", 1_000);
    fill["asset"] = serde_json::json!("spot");
    let (status, body) = send(&app, "POST", "/v1/fills", Some(fill)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("not a futures asset"));
}

#[tokio::test]
async fn test_unknown_key_is_not_found() {
    let app = setup_test_app(PnlMode::Net);
    let (status, _) = send(&app, "GET", &format!("/v1/positions?{}", KEY_QUERY), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", &format!("/v1/pnl?{}", KEY_QUERY), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_key_query_is_bad_request() {
    let app = setup_test_app(PnlMode::Net);
    let (status, _) = send(
        &app,
        "GET",
        "/v1/positions?exchange=binance&asset=bonds&pair=BTC-USDT",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_pnl_net_and_gross_modes() {
    for (mode, expected) in [(PnlMode::Net, "8"), (PnlMode::Gross, "10")] {
        let app = setup_test_app(mode);
        send(&app, "POST", "/v1/fills", Some(fill_json("1", "buy", "1", "100", "1", 1_000))).await;
        send(&app, "POST", "/v1/fills", Some(fill_json("2", "sell", "1", "110", "1", 2_000))).await;

        let (status, body) = send(&app, "GET", &format!("/v1/pnl?{}", KEY_QUERY), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["realisedPnl"], expected);
        assert_eq!(body["unrealisedPnl"], "0");
        assert_eq!(body["fundingPnl"], "0");
        assert_eq!(body["latest"]["realisedPnl"], "8");
    }
}

#[tokio::test]
async fn test_mark_updates_unrealised_pnl() {
    let app = setup_test_app(PnlMode::Net);
    send(&app, "POST", "/v1/fills", Some(fill_json("1", "sell", "2", "100", "0", 1_000))).await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/marks",
        Some(serde_json::json!({
            "exchange": "binance",
            "asset": "perpetual_swap",
            "pair": "BTC-USDT",
            "price": "95",
            "timeNs": 2_000,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["unrealisedPnl"], "10");
    assert_eq!(body["timeNs"], 2_000);

    let (_, body) = send(&app, "GET", &format!("/v1/pnl?{}", KEY_QUERY), None).await;
    assert_eq!(body["unrealisedPnl"], "10");
    assert_eq!(body["latest"]["isOrder"], false);
}

#[tokio::test]
async fn test_mark_on_closed_position_conflicts() {
    let app = setup_test_app(PnlMode::Net);
    send(&app, "POST", "/v1/fills", Some(fill_json("1", "buy", "1", "100", "0", 1_000))).await;
    send(&app, "POST", "/v1/fills", Some(fill_json("2", "sell", "1", "100", "0", 2_000))).await;

    let (status, _) = send(
        &app,
        "POST",
        "/v1/marks",
        Some(serde_json::json!({
            "exchange": "binance",
            "asset": "perpetual_swap",
            "pair": "BTC-USDT",
            "price": "101",
            "timeNs": 3_000,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_open_positions_lists_only_open() {
    let app = setup_test_app(PnlMode::Net);
    let (status, body) = send(&app, "GET", "/v1/positions/open", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["positions"].as_array().unwrap().is_empty());

    send(&app, "POST", "/v1/fills", Some(fill_json("1", "buy", "1", "100", "0", 1_000))).await;
    send(&app, "POST", "/v1/fills", Some(fill_json("2", "sell", "1", "110", "0", 2_000))).await;
    send(&app, "POST", "/v1/fills", Some(fill_json("3", "sell", "4", "120", "0", 3_000))).await;

    let (_, body) = send(&app, "GET", "/v1/positions/open", None).await;
    let open = body["positions"].as_array().unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0]["latestDirection"], "short");
    assert_eq!(open[0]["latestSize"], "4");

    let (_, body) = send(&app, "GET", &format!("/v1/positions?{}", KEY_QUERY), None).await;
    let all = body["positions"].as_array().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0]["status"], "closed");
    assert_eq!(all[0]["realisedPnl"], "10");
}

#[tokio::test]
async fn test_post_funding_attaches_rates() {
    let app = setup_test_app(PnlMode::Net);
    let funding = serde_json::json!({
        "exchange": "binance",
        "asset": "perpetual_swap",
        "pair": "BTC-USDT",
        "startDate": 1_000,
        "endDate": 9_000,
        "rates": [{"timeNs": 9_000, "rate": "0.0001", "payment": "-0.01"}],
    });

    let (status, _) = send(&app, "POST", "/v1/funding", Some(funding.clone())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    send(&app, "POST", "/v1/fills", Some(fill_json("1", "buy", "1", "100", "0", 1_000))).await;
    let (status, body) = send(&app, "POST", "/v1/funding", Some(funding)).await;
    assert_eq!(status, StatusCode::OK);
    let rates = body["positions"][0]["fundingRates"].as_array().unwrap();
    assert_eq!(rates.len(), 1);
    assert_eq!(rates[0]["payment"], "-0.01");

    let (_, body) = send(&app, "GET", &format!("/v1/pnl?{}", KEY_QUERY), None).await;
    assert_eq!(body["fundingPnl"], "-0.01");

    let mut early = serde_json::json!({
        "exchange": "binance",
        "asset": "perpetual_swap",
        "pair": "BTC-USDT",
        "startDate": 500,
        "endDate": 1_500,
        "rates": [],
    });
    let (status, _) = send(&app, "POST", "/v1/funding", Some(early.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);

    early["startDate"] = serde_json::json!(2_000);
    early["endDate"] = serde_json::json!(1_500);
    let (status, _) = send(&app, "POST", "/v1/funding", Some(early)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
