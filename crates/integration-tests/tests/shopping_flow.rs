//! End-to-end shopping flow against a real database.
//!
//! These tests require:
//! - A scratch `PostgreSQL` database in `SOLEMATE_TEST_DATABASE_URL`
//!
//! Migrations are applied automatically. Every run uses fresh phone numbers
//! and slugs, so the database does not need to be emptied between runs.
//!
//! Run with: cargo test -p solemate-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use axum::Router;
use axum::http::StatusCode;
use serde_json::{Value, json};
use sqlx::PgPool;

use solemate_core::{Phone, Price, UserRole};
use solemate_integration_tests::{
    TestClient, TestResponse, database_app, unique_phone, unique_slug,
};
use solemate_storefront::db::UserRepository;

const PASSWORD: &str = "correct horse battery";

fn price(value: &Value) -> Price {
    serde_json::from_value(value.clone()).unwrap()
}

fn address(phone: &str) -> Value {
    json!({
        "full_name": "Sam Doe",
        "phone": phone,
        "street": "1 Main St",
        "city": "Springfield",
        "postal_code": "12345",
        "country": "US"
    })
}

/// Register a new shopper and keep the session.
async fn shopper(app: &Router, ip: &str) -> (TestClient, String) {
    let mut client = TestClient::new(app.clone(), ip);
    let phone = unique_phone();
    let resp = client
        .post(
            "/api/auth/register",
            json!({"name": "Sam Doe", "phone": phone, "password": PASSWORD}),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.body);
    assert!(client.has_session());
    (client, phone)
}

/// Register a user, promote it, and log in again to pick up the role.
async fn admin(app: &Router, pool: &PgPool, ip: &str) -> TestClient {
    let (mut client, phone) = shopper(app, ip).await;
    UserRepository::new(pool)
        .set_role(&Phone::parse(&phone).unwrap(), UserRole::Admin)
        .await
        .unwrap();

    let resp = client
        .post("/api/auth/login", json!({"phone": phone, "password": PASSWORD}))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["role"], json!("admin"));
    client
}

/// Create a running shoe priced 100.00 with 3 pairs in M and none in L.
async fn create_product(admin: &mut TestClient) -> Value {
    let resp = admin
        .post(
            "/api/admin/products",
            json!({
                "name": "Flow Runner",
                "slug": unique_slug("flow-runner"),
                "price": "100.00",
                "category": "running",
                "sizes": ["M", "L"],
                "stock": {"M": 3, "L": 0},
                "images": ["/img/flow-runner.jpg"]
            }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.body);
    resp.data().clone()
}

async fn add(client: &mut TestClient, product_id: &Value, size: &str, quantity: u32) -> TestResponse {
    client
        .post(
            "/api/cart/add",
            json!({"product_id": product_id, "size": size, "quantity": quantity}),
        )
        .await
}

#[tokio::test]
#[ignore = "Requires SOLEMATE_TEST_DATABASE_URL"]
async fn test_checkout_flow() {
    let (app, pool) = database_app().await;
    let mut admin = admin(&app, &pool, "198.51.100.1").await;
    let product = create_product(&mut admin).await;
    let product_id = product["id"].clone();
    let slug = product["slug"].as_str().unwrap().to_owned();

    let (mut customer, phone) = shopper(&app, "198.51.100.2").await;

    // Size L has no stock.
    let resp = add(&mut customer, &product_id, "L", 1).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    // Two adds of one pair each make one line of two.
    assert_eq!(add(&mut customer, &product_id, "M", 1).await.status, StatusCode::OK);
    let resp = add(&mut customer, &product_id, "M", 1).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["items"].as_array().unwrap().len(), 1);

    let resp = customer.get("/api/cart/count").await;
    assert_eq!(resp.data()["count"], json!(2));

    // Place the order: 200.00 items + 10.00 shipping + 20.00 tax.
    let resp = customer
        .post(
            "/api/orders",
            json!({"shipping_address": address(&phone), "note": "Leave at the door"}),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.body);
    let order = resp.data().clone();
    assert_eq!(order["status"], json!("pending"));
    assert_eq!(order["payment_status"], json!("pending"));
    assert_eq!(price(&order["pricing"]["items"]), Price::from_cents(200_00));
    assert_eq!(price(&order["pricing"]["total"]), Price::from_cents(230_00));
    assert!(order["order_number"].as_str().unwrap().starts_with("SM-"));

    // Cart is emptied and stock decremented.
    let resp = customer.get("/api/cart/count").await;
    assert_eq!(resp.data()["count"], json!(0));
    let resp = customer.get(&format!("/api/products/{slug}")).await;
    assert_eq!(resp.data()["product"]["stock"]["M"], json!(1));

    // Only one pair left.
    let resp = add(&mut customer, &product_id, "M", 2).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    // The order shows up for its owner only.
    let order_path = format!("/api/orders/{}", order["id"]);
    assert_eq!(customer.get(&order_path).await.status, StatusCode::OK);
    let resp = customer.get("/api/orders").await;
    assert_eq!(resp.data()["total"], json!(1));

    let resp = customer.get("/api/orders/abc").await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(!resp.message().is_empty());

    let (mut stranger, _) = shopper(&app, "198.51.100.3").await;
    assert_eq!(stranger.get(&order_path).await.status, StatusCode::NOT_FOUND);

    // Fulfilment.
    let admin_order = format!("/api/admin/orders/{}", order["id"]);
    let resp = admin.post(&format!("{admin_order}/advance"), json!({})).await;
    assert_eq!(resp.data()["status"], json!("processing"));

    let resp = admin
        .post(&format!("{admin_order}/status"), json!({"status": "delivered"}))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = admin.post(&format!("{admin_order}/mark-paid"), json!({})).await;
    assert_eq!(resp.data()["payment_status"], json!("paid"));
    let resp = admin.post(&format!("{admin_order}/mark-paid"), json!({})).await;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    let resp = admin
        .post(&format!("{admin_order}/status"), json!({"status": "shipped"}))
        .await;
    assert_eq!(resp.data()["status"], json!("shipped"));
    let resp = admin.post(&format!("{admin_order}/advance"), json!({})).await;
    assert_eq!(resp.data()["status"], json!("delivered"));
    assert!(!resp.data()["delivered_at"].is_null());

    let resp = admin.post(&format!("{admin_order}/advance"), json!({})).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires SOLEMATE_TEST_DATABASE_URL"]
async fn test_checkout_rejections() {
    let (app, pool) = database_app().await;
    let (mut customer, phone) = shopper(&app, "198.51.100.10").await;

    let resp = customer
        .post("/api/orders", json!({"shipping_address": address(&phone)}))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.message(), "Your cart is empty");

    let mut admin = admin(&app, &pool, "198.51.100.11").await;
    let product = create_product(&mut admin).await;
    assert_eq!(
        add(&mut customer, &product["id"], "M", 1).await.status,
        StatusCode::OK
    );

    let mut bad_address = address(&phone);
    bad_address["city"] = json!("  ");
    let resp = customer
        .post("/api/orders", json!({"shipping_address": bad_address}))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    // Deactivated after it was added to the cart.
    let resp = admin
        .delete(&format!("/api/admin/products/{}", product["id"]))
        .await;
    assert_eq!(resp.data()["is_active"], json!(false));

    let resp = customer
        .post("/api/orders", json!({"shipping_address": address(&phone)}))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = customer.get("/api/cart").await;
    assert_eq!(resp.data()["items"][0]["purchasable"], json!(false));

    // Hidden from shoppers, still visible to admins.
    let product_path = format!("/api/products/{}", product["slug"].as_str().unwrap());
    assert_eq!(customer.get(&product_path).await.status, StatusCode::NOT_FOUND);
    let resp = admin.get(&product_path).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["product"]["is_active"], json!(false));

    let resp = admin.get("/api/admin/products/abc").await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.body["success"], json!(false));
}

#[tokio::test]
#[ignore = "Requires SOLEMATE_TEST_DATABASE_URL"]
async fn test_guest_cart_sync() {
    let (app, pool) = database_app().await;
    let mut admin = admin(&app, &pool, "198.51.100.20").await;
    let product = create_product(&mut admin).await;
    let id = product["id"].clone();

    let (mut customer, _) = shopper(&app, "198.51.100.21").await;
    assert_eq!(add(&mut customer, &id, "M", 1).await.status, StatusCode::OK);

    let resp = customer
        .post(
            "/api/cart/sync",
            json!({"items": [
                {"product_id": id, "size": "M", "quantity": 10},
                {"product_id": id, "size": "L", "quantity": 1},
                {"product_id": i32::MAX, "size": "M", "quantity": 1}
            ]}),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.body);

    let outcome = resp.data();
    // Quantity is clamped to the three pairs on hand.
    assert_eq!(outcome["cart"]["item_count"], json!(3));
    assert_eq!(outcome["skipped"].as_array().unwrap().len(), 2);
    // Server price, whatever the guest cart held.
    assert_eq!(
        price(&outcome["cart"]["items"][0]["unit_price"]),
        Price::from_cents(100_00)
    );
}

#[tokio::test]
#[ignore = "Requires SOLEMATE_TEST_DATABASE_URL"]
async fn test_sessions_and_roles() {
    let (app, pool) = database_app().await;
    let (mut customer, phone) = shopper(&app, "198.51.100.30").await;

    let resp = customer.get("/api/auth/me").await;
    assert_eq!(resp.data()["phone"], json!(phone));
    assert_eq!(
        customer.get("/api/admin/dashboard").await.status,
        StatusCode::FORBIDDEN
    );

    // Duplicate phone.
    let mut other = TestClient::new(app.clone(), "198.51.100.31");
    let resp = other
        .post(
            "/api/auth/register",
            json!({"name": "Copy Cat", "phone": phone, "password": PASSWORD}),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    let resp = other
        .post("/api/auth/login", json!({"phone": phone, "password": "wrong password!"}))
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = customer
        .patch("/api/account", json!({"name": "Samantha Doe"}))
        .await;
    assert_eq!(resp.data()["name"], json!("Samantha Doe"));

    assert_eq!(customer.post("/api/auth/logout", json!({})).await.status, StatusCode::OK);
    assert_eq!(customer.get("/api/auth/me").await.status, StatusCode::UNAUTHORIZED);

    let mut admin = admin(&app, &pool, "198.51.100.32").await;
    let resp = admin.get("/api/admin/dashboard").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.data()["orders_by_status"].is_array());
}
