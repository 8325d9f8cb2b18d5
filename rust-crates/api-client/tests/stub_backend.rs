#![allow(non_snake_case)]

use actix_web::{
    App,
    HttpResponse,
    HttpServer,
    web,
};
use lootcase_api::{
    ApiClient,
    ApiConfig,
    ApiError,
};
use lootcase_core::{
    RetryPolicy,
    Transient,
};
use std::{
    net::TcpListener,
    sync::atomic::{
        AtomicUsize,
        Ordering,
    },
    time::Duration,
};

#[derive(Default)]
struct Hits {
    case_details: AtomicUsize,
    missing: AtomicUsize,
    flaky: AtomicUsize,
    open: AtomicUsize,
    sell: AtomicUsize,
}

async fn handle_health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

async fn handle_case_details(
    hits: web::Data<Hits>,
    path: web::Path<String>,
) -> HttpResponse {
    let case_id = path.into_inner();
    match case_id.as_str() {
        "7" => {
            hits.case_details.fetch_add(1, Ordering::SeqCst);
            HttpResponse::Ok().json(serde_json::json!({
                "id": 7,
                "name": "Mystery Box",
                "description": "Crate of wonders",
                "price_stars": 100,
                "items": [
                    { "id": 1, "name": "Gold Coin", "value": 0.5, "stars": 50, "rarity": "common", "weight": 45, "image": "gold.png" },
                    { "id": 2, "name": "Golden Crown", "value": 10.0, "stars": 1000, "rarity": "legendary", "weight": 5, "image": "crown.png" }
                ]
            }))
        }
        "flaky" => {
            hits.flaky.fetch_add(1, Ordering::SeqCst);
            HttpResponse::ServiceUnavailable().finish()
        }
        _ => {
            hits.missing.fetch_add(1, Ordering::SeqCst);
            HttpResponse::NotFound().json(serde_json::json!({ "detail": "Case not found" }))
        }
    }
}

async fn handle_open_case(
    hits: web::Data<Hits>,
    path: web::Path<String>,
    body: web::Json<serde_json::Value>,
) -> HttpResponse {
    hits.open.fetch_add(1, Ordering::SeqCst);
    let user_id = body.get("user_id").and_then(|v| v.as_u64()).unwrap_or(0);
    if path.into_inner() == "7" && user_id == 42 {
        HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "item": { "id": 900, "item_name": "Golden Crown", "item_stars": 1000, "rarity": "legendary" },
            "new_balance": 400,
            "message": "ok"
        }))
    } else {
        HttpResponse::Ok().json(serde_json::json!({
            "success": false,
            "new_balance": 20,
            "message": "Insufficient balance"
        }))
    }
}

async fn handle_transaction(path: web::Path<String>) -> HttpResponse {
    match path.into_inner().as_str() {
        "5" => HttpResponse::Ok().json(serde_json::json!({
            "id": 5,
            "user_id": 42,
            "type": "deposit",
            "amount": "100.000000000",
            "currency": "STARS",
            "status": "completed",
            "created_at": "2025-01-01T10:00:00",
            "completed_at": "2025-01-01T10:01:00"
        })),
        _ => HttpResponse::NotFound().json(serde_json::json!({ "detail": "Transaction not found" })),
    }
}

async fn handle_inventory(path: web::Path<u64>) -> HttpResponse {
    let user_id = path.into_inner();
    HttpResponse::Ok().json(serde_json::json!([
        {
            "id": 900,
            "user_id": user_id,
            "item_name": "Golden Crown",
            "item_value": "10.00",
            "item_stars": 1000,
            "rarity": "legendary",
            "case_name": "Mystery Box",
            "created_at": "2025-01-01T10:00:00"
        }
    ]))
}

async fn handle_sell(
    hits: web::Data<Hits>,
    path: web::Path<String>,
    body: web::Json<serde_json::Value>,
) -> HttpResponse {
    hits.sell.fetch_add(1, Ordering::SeqCst);
    let user_id = body.get("user_id").and_then(|v| v.as_u64()).unwrap_or(0);
    if path.into_inner() == "900" && user_id == 42 {
        HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "stars_earned": 1000,
            "new_balance": 1400,
            "message": "sold"
        }))
    } else {
        HttpResponse::NotFound()
            .json(serde_json::json!({ "detail": "Item not found or already withdrawn" }))
    }
}

fn spawn_stub_backend() -> (String, web::Data<Hits>) {
    let hits = web::Data::new(Hits::default());
    let server_hits = hits.clone();
    let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let address = listener.local_addr().unwrap();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(server_hits.clone())
            .route("/api/health", web::get().to(handle_health))
            .route("/api/cases/{id}", web::get().to(handle_case_details))
            .route("/api/cases/{id}/open", web::post().to(handle_open_case))
            .route(
                "/api/payments/transaction/{id}",
                web::get().to(handle_transaction),
            )
            .route("/api/inventory/{user_id}", web::get().to(handle_inventory))
            .route("/api/inventory/{id}/sell", web::post().to(handle_sell))
    })
    .workers(1)
    .listen(listener)
    .unwrap()
    .run();
    std::thread::spawn(move || {
        let sys = actix_web::rt::System::new();
        let _ = sys.block_on(server);
    });
    (format!("http://{address}/api"), hits)
}

fn client(base_url: &str) -> ApiClient {
    let mut config = ApiConfig::new(base_url);
    config.request_timeout = Duration::from_secs(5);
    ApiClient::new(config).unwrap()
}

fn unused_local_url() -> String {
    let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{address}/api")
}

#[tokio::test]
async fn case_details__decodes_backend_payload() {
    // given
    let (url, _hits) = spawn_stub_backend();
    let client = client(&url);

    // when
    let case = client.case_details("7").await.unwrap();

    // then
    assert_eq!(case.id, "7");
    assert_eq!(case.price_stars, 100);
    assert_eq!(case.items.len(), 2);
    assert_eq!(case.items[1].name, "Golden Crown");
    assert_eq!(case.items[1].weight, Some(5.0));
}

#[tokio::test]
async fn case_details__second_call_is_served_from_cache() {
    // given
    let (url, hits) = spawn_stub_backend();
    let client = client(&url);

    // when
    client.case_details("7").await.unwrap();
    client.case_details("7").await.unwrap();

    // then
    assert_eq!(hits.case_details.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn case_details__not_found_is_not_retried() {
    // given
    let (url, hits) = spawn_stub_backend();
    let client = client(&url);
    let policy = RetryPolicy::new(3, Duration::from_millis(10));

    // when
    let err = policy
        .run(|| client.case_details("missing"))
        .await
        .unwrap_err();

    // then
    assert_eq!(err.status().map(|s| s.as_u16()), Some(404));
    assert!(err.to_string().contains("Case not found"));
    assert!(!err.is_transient());
    assert_eq!(hits.missing.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn case_details__unavailable_backend_is_retried_up_to_the_limit() {
    // given
    let (url, hits) = spawn_stub_backend();
    let client = client(&url);
    let policy = RetryPolicy::new(3, Duration::from_millis(10));

    // when
    let err = policy.run(|| client.case_details("flaky")).await.unwrap_err();

    // then
    assert_eq!(err.status().map(|s| s.as_u16()), Some(503));
    assert_eq!(hits.flaky.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn open_case__returns_won_item_and_balance() {
    let (url, hits) = spawn_stub_backend();
    let client = client(&url);

    let opened = client.open_case("7", 42).await.unwrap();

    assert_eq!(opened.new_balance, 400);
    assert_eq!(opened.item.unwrap().item_name, "Golden Crown");
    assert_eq!(hits.open.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn open_case__unsuccessful_response_is_rejected() {
    let (url, _hits) = spawn_stub_backend();
    let client = client(&url);

    let err = client.open_case("7", 1).await.unwrap_err();

    assert!(matches!(err, ApiError::Rejected(ref message) if message == "Insufficient balance"));
}

#[tokio::test]
async fn check_availability__reports_both_outcomes() {
    let (url, _hits) = spawn_stub_backend();

    assert!(client(&url).check_availability().await);
    assert!(!client(&unused_local_url()).check_availability().await);
}

#[tokio::test]
async fn list_cases__unreachable_backend_is_a_transient_connect_error() {
    let client = client(&unused_local_url());

    let err = client.list_cases().await.unwrap_err();

    assert!(err.is_connect(), "unexpected error: {err}");
    assert!(err.is_transient());
}

#[tokio::test]
async fn list_cases__malformed_base_url_fails_without_retry() {
    // given
    let client = client("not a url");
    let policy = RetryPolicy::new(3, Duration::from_millis(10));
    let attempts = AtomicUsize::new(0);

    // when
    let err = policy
        .run(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            client.list_cases()
        })
        .await
        .unwrap_err();

    // then
    assert!(matches!(err, ApiError::Request { .. }), "unexpected error: {err}");
    assert!(!err.is_transient());
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transaction_status__reports_settled_payment() {
    let (url, _hits) = spawn_stub_backend();
    let client = client(&url);

    let transaction = client.transaction_status("5").await.unwrap();

    assert_eq!(transaction.status, "completed");
    assert_eq!(transaction.amount, 100.0);
    let missing = client.transaction_status("6").await.unwrap_err();
    assert_eq!(missing.status().map(|s| s.as_u16()), Some(404));
}

#[tokio::test]
async fn inventory__decodes_backend_items() {
    let (url, _hits) = spawn_stub_backend();

    let items = client(&url).inventory(42).await.unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "900");
    assert_eq!(items[0].case_name.as_deref(), Some("Mystery Box"));
    assert_eq!(items[0].created_at.as_deref(), Some("2025-01-01T10:00:00"));
}

#[tokio::test]
async fn sell_item__clears_cached_user_data() {
    // given
    let (url, hits) = spawn_stub_backend();
    let client = client(&url);
    client
        .cache()
        .insert("user_42_balance", b"{}".to_vec(), Duration::from_secs(10));
    client
        .cache()
        .insert("case_details_7", b"{}".to_vec(), Duration::from_secs(10));

    // when
    let sold = client.sell_item("900", 42).await.unwrap();

    // then
    assert_eq!(sold.stars_earned, 1000);
    assert_eq!(sold.new_balance, 1400);
    assert_eq!(hits.sell.load(Ordering::SeqCst), 1);
    assert!(client.cache().get("user_42_balance").is_none());
    assert!(client.cache().get("case_details_7").is_some());
}
