use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::{TestRequest, TestServer};
use bookstore_order_lifecycle::adapter::driven::{
    EventBusConfig, InMemoryEventBus, InMemoryStore, LogEmailSender,
    ManualClock, TracingLogger,
};
use bookstore_order_lifecycle::adapter::driver::create_router;
use bookstore_order_lifecycle::application::service::{ApplicationServices, ServiceDependencies};
use bookstore_order_lifecycle::domain::port::Logger;
use bookstore_order_lifecycle::domain::pricing::PricingPolicy;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

fn test_server() -> TestServer {
    let store = InMemoryStore::new();
    let logger: Arc<dyn Logger> = Arc::new(TracingLogger::new());
    let dependencies = ServiceDependencies {
        catalog: Arc::new(store.clone()),
        discounts: Arc::new(store.clone()),
        carts: Arc::new(store.clone()),
        wishlists: Arc::new(store.clone()),
        orders: Arc::new(store.clone()),
        ledger: Arc::new(store.clone()),
        announcements: Arc::new(store.clone()),
        reviews: Arc::new(store),
        event_bus: Arc::new(InMemoryEventBus::new(EventBusConfig::default(), logger.clone())),
        email_sender: Arc::new(LogEmailSender::new(logger.clone())),
        clock: Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap(),
        )),
        logger,
        pricing_policy: PricingPolicy::default(),
    };

    let app = create_router().with_state(ApplicationServices::new(dependencies));
    TestServer::new(app).unwrap()
}

/// ゲートウェイが付与する認証ヘッダー
struct Identity {
    user_id: Uuid,
    name: &'static str,
    roles: &'static str,
}

impl Identity {
    fn new(name: &'static str, roles: &'static str) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            name,
            roles,
        }
    }

    fn apply(&self, request: TestRequest) -> TestRequest {
        request
            .add_header(
                HeaderName::from_static("x-user-id"),
                HeaderValue::from_str(&self.user_id.to_string()).unwrap(),
            )
            .add_header(
                HeaderName::from_static("x-user-email"),
                HeaderValue::from_static("reader@example.com"),
            )
            .add_header(
                HeaderName::from_static("x-user-name"),
                HeaderValue::from_static(self.name),
            )
            .add_header(
                HeaderName::from_static("x-user-roles"),
                HeaderValue::from_static(self.roles),
            )
    }
}

async fn create_book(server: &TestServer, admin: &Identity, title: &str, quantity: u32) -> String {
    let response = admin
        .apply(server.post("/admin/books"))
        .json(&json!({
            "title": title,
            "author": "Jane Austen",
            "price": "10.00",
            "quantity": quantity,
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    body["book_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_check() {
    let server = test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_browse_is_anonymous() {
    let server = test_server();
    let admin = Identity::new("Store Admin", "Admin");
    create_book(&server, &admin, "Emma", 3).await;
    create_book(&server, &admin, "Persuasion", 0).await;

    let response = server
        .get("/books")
        .add_query_param("availability", "available")
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["total"], 1);
    assert_eq!(body["entries"][0]["book"]["title"], "Emma");
}

#[tokio::test]
async fn test_missing_identity_is_unauthenticated() {
    let server = test_server();

    let response = server.get("/cart").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_admin_routes_require_admin_role() {
    let server = test_server();
    let customer = Identity::new("Ada Lovelace", "User");

    let response = customer
        .apply(server.post("/admin/books"))
        .json(&json!({
            "title": "Emma",
            "author": "Jane Austen",
            "price": "10.00",
            "quantity": 1,
        }))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_price_with_fractional_cents_is_rejected() {
    let server = test_server();
    let admin = Identity::new("Store Admin", "Admin");

    let response = admin
        .apply(server.post("/admin/books"))
        .json(&json!({
            "title": "Emma",
            "author": "Jane Austen",
            "price": "12.345",
            "quantity": 1,
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_unknown_book_is_not_found() {
    let server = test_server();

    let response = server.get(&format!("/books/{}", Uuid::new_v4())).await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"], "Book not found.");
}

#[tokio::test]
async fn test_adding_more_than_stock_is_conflict() {
    let server = test_server();
    let admin = Identity::new("Store Admin", "Admin");
    let customer = Identity::new("Ada Lovelace", "User");
    let book_id = create_book(&server, &admin, "Emma", 2).await;

    let response = customer
        .apply(server.post("/cart/items"))
        .json(&json!({ "book_id": book_id, "quantity": 3 }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error"], "Only 2 copies of 'Emma' are available.");
}

#[tokio::test]
async fn test_malformed_order_key_is_bad_request() {
    let server = test_server();
    let customer = Identity::new("Ada Lovelace", "User");

    let response = customer
        .apply(server.post("/orders/cancel"))
        .json(&json!({ "order_key": "not-an-order" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_order_lifecycle_over_http() {
    let server = test_server();
    let admin = Identity::new("Store Admin", "Admin");
    let customer = Identity::new("Ada Lovelace", "User");
    let clerk = Identity::new("Counter Staff", "Staff");
    let book_id = create_book(&server, &admin, "Emma", 5).await;

    let response = customer
        .apply(server.post("/cart/items"))
        .json(&json!({ "book_id": book_id, "quantity": 2 }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["quantity"], 2);
    assert_eq!(body["cart_count"], 1);

    let response = customer.apply(server.get("/checkout")).await;
    response.assert_status_ok();
    let preview: Value = response.json();
    assert_eq!(preview["can_confirm"], true);
    assert_eq!(preview["quote"]["final_total"], "20.00");

    let response = customer.apply(server.post("/checkout")).await;
    response.assert_status(StatusCode::CREATED);
    let receipt: Value = response.json();
    let order = &receipt["orders"][0];
    assert_eq!(order["status"], "Placed");
    assert_eq!(order["customer_name"], "Ada Lovelace");
    let claim_code = order["claim_code"].as_str().unwrap().to_string();
    let order_key = order["order_key"].as_str().unwrap().to_string();

    let response = server.get(&format!("/books/{}", book_id)).await;
    let details: Value = response.json();
    assert_eq!(details["book"]["quantity_on_hand"], 3);

    let response = customer.apply(server.get("/orders/outstanding-count")).await;
    let count: Value = response.json();
    assert_eq!(count["count"], 1);

    // 顧客は受け渡しを確定できない
    let response = customer
        .apply(server.post("/fulfillment"))
        .json(&json!({
            "claim_code": claim_code,
            "user_id": customer.user_id.to_string(),
        }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let response = clerk
        .apply(server.get("/fulfillment"))
        .add_query_param("claim_code", &claim_code)
        .add_query_param("user_id", customer.user_id.to_string())
        .await;
    response.assert_status_ok();
    let lookup: Value = response.json();
    assert_eq!(lookup["book_title"], "Emma");

    let response = clerk
        .apply(server.post("/fulfillment"))
        .json(&json!({
            "claim_code": claim_code,
            "user_id": Uuid::new_v4().to_string(),
        }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let response = clerk
        .apply(server.post("/fulfillment"))
        .json(&json!({
            "claim_code": claim_code,
            "user_id": customer.user_id.to_string(),
        }))
        .await;
    response.assert_status_ok();
    let fulfilled: Value = response.json();
    assert_eq!(fulfilled["status"], "Received");

    let response = clerk
        .apply(server.post("/fulfillment"))
        .json(&json!({
            "claim_code": claim_code,
            "user_id": customer.user_id.to_string(),
        }))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    let response = customer
        .apply(server.post("/orders/bulk-delete"))
        .json(&json!({ "orders": [order_key] }))
        .await;
    response.assert_status_ok();
    let outcome: Value = response.json();
    assert_eq!(outcome["processed"], 1);
    assert_eq!(outcome["deleted"], 1);

    let response = customer.apply(server.get("/orders")).await;
    let orders: Value = response.json();
    assert_eq!(orders.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_wishlist_toggle_over_http() {
    let server = test_server();
    let admin = Identity::new("Store Admin", "Admin");
    let customer = Identity::new("Ada Lovelace", "Member");
    let book_id = create_book(&server, &admin, "Emma", 1).await;

    let response = customer
        .apply(server.post(&format!("/wishlist/{}", book_id)))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["in_wishlist"], true);

    let response = customer.apply(server.get("/wishlist")).await;
    let wishlist: Value = response.json();
    assert_eq!(wishlist.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_announcements_over_http() {
    let server = test_server();
    let admin = Identity::new("Store Admin", "Admin");
    let customer = Identity::new("Ada Lovelace", "User");

    let response = customer
        .apply(server.post("/admin/announcements"))
        .json(&json!({ "title": "Sale", "message": "Half off" }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let response = admin
        .apply(server.post("/admin/announcements"))
        .json(&json!({ "title": "Sale", "message": "Half off" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let created: Value = response.json();
    assert_eq!(created["expires_at"], "2026-06-20T12:00:00Z");
    let id = created["announcement_id"].as_str().unwrap().to_string();

    let response = admin
        .apply(server.put(&format!("/admin/announcements/{}", id)))
        .json(&json!({
            "title": "Sale extended",
            "message": "Half off all week",
            "expires_at": "2026-06-22T12:00:00Z",
        }))
        .await;
    response.assert_status_ok();

    // 失効済みのお知らせは一覧に出ない
    let response = admin
        .apply(server.post("/admin/announcements"))
        .json(&json!({
            "title": "Old news",
            "message": "Already over",
            "starts_at": "2026-06-01T00:00:00Z",
            "expires_at": "2026-06-02T00:00:00Z",
        }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let response = customer.apply(server.get("/announcements")).await;
    response.assert_status_ok();
    let active: Value = response.json();
    assert_eq!(active.as_array().unwrap().len(), 1);
    assert_eq!(active[0]["title"], "Sale extended");

    let response = admin
        .apply(server.delete(&format!("/admin/announcements/{}", id)))
        .await;
    response.assert_status(StatusCode::NO_CONTENT);
    let response = admin
        .apply(server.delete(&format!("/admin/announcements/{}", id)))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reviews_over_http() {
    let server = test_server();
    let admin = Identity::new("Store Admin", "Admin");
    let buyer = Identity::new("Ada Lovelace", "User");
    let browser = Identity::new("Grace Hopper", "Member");
    let book_id = create_book(&server, &admin, "Emma", 5).await;

    let review_path = format!("/books/{}/reviews", book_id);
    let response = buyer
        .apply(server.post(&review_path))
        .json(&json!({ "rating": 5, "comment": "Delightful" }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    buyer
        .apply(server.post("/cart/items"))
        .json(&json!({ "book_id": book_id, "quantity": 1 }))
        .await
        .assert_status_ok();
    buyer
        .apply(server.post("/checkout"))
        .await
        .assert_status(StatusCode::CREATED);

    let response = buyer
        .apply(server.post(&review_path))
        .json(&json!({ "rating": 5, "comment": "Delightful" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let review: Value = response.json();
    let review_id = review["review_id"].as_str().unwrap().to_string();

    let response = buyer
        .apply(server.post(&review_path))
        .json(&json!({ "rating": 4, "comment": "Again" }))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    let reply_path = format!("/books/{}/reviews/{}/replies", book_id, review_id);
    let response = browser
        .apply(server.post(&reply_path))
        .json(&json!({ "comment": "Agreed" }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let response = buyer
        .apply(server.post(&reply_path))
        .json(&json!({ "comment": "Still thinking about it" }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let response = server.get(&review_path).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["review_count"], 1);
    let average: f64 = body["average_rating"].as_str().unwrap().parse().unwrap();
    assert_eq!(average, 5.0);
    assert_eq!(body["threads"][0]["review"]["author_name"], "Ada Lovelace");
    assert_eq!(
        body["threads"][0]["replies"][0]["comment"],
        "Still thinking about it"
    );
}
