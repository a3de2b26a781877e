//! End-to-end order flow through the HTTP router

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use order_server::directory::{InMemoryDirectory, MenuItem, Restaurant, Table};
use order_server::{Config, ServerState, api::health::BANNER, build_app};
use serde_json::{Value, json};
use shared::message::{RoomKey, ServerEvent};
use shared::order::{OrderStatus, OrderStatusPayload, PaymentStatus};
use std::sync::Arc;
use tower::ServiceExt;

const SECRET: &str = "order-flow-test-secret-long-enough-for-hs256";

fn state() -> ServerState {
    let directory = InMemoryDirectory::new();
    directory.upsert_restaurant(Restaurant {
        id: "r1".into(),
        name: "Bistro".into(),
        address: "1 Main St".into(),
        owner_id: "owner".into(),
        staff_ids: vec!["waiter".into()],
    });
    directory.upsert_table(Table {
        id: "t1".into(),
        restaurant_id: "r1".into(),
        table_number: 4,
    });
    directory.upsert_menu_item(MenuItem {
        id: "m1".into(),
        restaurant_id: "r1".into(),
        name: "Burger".into(),
        price: 100.0,
    });
    ServerState::in_memory(Config::for_tests(SECRET), Arc::new(directory)).unwrap()
}

fn token(state: &ServerState, user_id: &str) -> String {
    state
        .jwt_service()
        .generate_token(user_id, user_id, "staff")
        .unwrap()
}

async fn send(state: &ServerState, request: Request<Body>) -> Response {
    build_app(state.clone()).oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, bearer: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn place_order(state: &ServerState) -> Value {
    let response = send(
        state,
        json_request(
            "POST",
            "/api/orders",
            None,
            json!({
                "restaurantId": "r1",
                "tableId": "t1",
                "items": [{ "menuItemId": "m1", "quantity": 2, "price": 100.0 }],
                "total": 1.0
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await
}

#[tokio::test]
async fn test_order_lifecycle_over_http() {
    let state = state();
    let (dashboard, mut dashboard_rx) = state.bus.connect();
    state.bus.join(dashboard, RoomKey::restaurant("r1")).unwrap();

    // Diner places an order; total is recomputed server-side
    let order = place_order(&state).await;
    assert_eq!(order["total"], json!(200.0));
    assert_eq!(order["status"], "pending");
    assert_eq!(order["paymentStatus"], "pending");
    let order_id = order["id"].as_str().unwrap().to_string();

    match dashboard_rx.try_recv().unwrap().as_ref() {
        ServerEvent::NewOrder(resolved) => {
            assert_eq!(resolved.id, order_id);
            assert_eq!(resolved.total, 200.0);
            assert_eq!(resolved.table_number, Some(4));
            assert_eq!(resolved.items[0].name.as_deref(), Some("Burger"));
        }
        other => panic!("unexpected event: {other:?}"),
    }

    // Diner follows their order
    let (diner, mut diner_rx) = state.bus.connect();
    state.bus.join(diner, RoomKey::order(&order_id)).unwrap();

    let owner = token(&state, "owner");
    let response = send(
        &state,
        json_request(
            "PUT",
            &format!("/api/orders/{order_id}"),
            Some(&owner),
            json!({ "status": "preparing" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = json_body(response).await;
    assert_eq!(updated["status"], "preparing");

    assert_eq!(
        *diner_rx.try_recv().unwrap(),
        ServerEvent::OrderStatus(OrderStatusPayload {
            status: OrderStatus::Preparing,
            payment_status: PaymentStatus::Pending,
        })
    );
    // Status changes go to the order room only
    assert!(dashboard_rx.try_recv().is_err());

    // Staff sees the resolved order in the restaurant listing
    let response = send(&state, get("/api/orders/r1", Some(&owner))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let listed = json_body(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["tableNumber"], 4);

    // Bill
    let response = send(&state, get(&format!("/api/orders/{order_id}/bill"), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bill = json_body(response).await;
    assert_eq!(bill["id"], order_id.as_str());
    assert_eq!(bill["bill"]["subtotal"], json!(200.0));
    assert_eq!(bill["bill"]["tax"], json!(10.0));
    assert_eq!(bill["bill"]["grandTotal"], json!(210.0));

    // Bill PDF
    let response = send(
        &state,
        get(&format!("/api/orders/{order_id}/bill-pdf"), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/pdf"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        format!("attachment; filename=\"bill-{order_id}.pdf\"").as_str()
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.starts_with(b"%PDF-"));

    // Delete
    let response = send(
        &state,
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/orders/{order_id}"))
            .header(header::AUTHORIZATION, format!("Bearer {owner}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["message"], "Order deleted");

    let response = send(&state, get(&format!("/api/orders/{order_id}/bill"), None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_transition_requires_restaurant_staff() {
    let state = state();
    let order = place_order(&state).await;
    let order_id = order["id"].as_str().unwrap();
    let uri = format!("/api/orders/{order_id}");

    let response = send(
        &state,
        json_request("PUT", &uri, None, json!({ "status": "ready" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let stranger = token(&state, "stranger");
    let response = send(
        &state,
        json_request("PUT", &uri, Some(&stranger), json!({ "status": "ready" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &state,
        json_request("PUT", &uri, Some("not-a-jwt"), json!({ "status": "ready" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Listed staff member is allowed
    let waiter = token(&state, "waiter");
    let response = send(
        &state,
        json_request("PUT", &uri, Some(&waiter), json!({ "paymentStatus": "paid" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["paymentStatus"], "paid");

    // Paying twice is idempotent
    let response = send(
        &state,
        json_request("PUT", &uri, Some(&waiter), json!({ "paymentStatus": "paid" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["paymentStatus"], "paid");

    // Neither field named
    let response = send(&state, json_request("PUT", &uri, Some(&waiter), json!({}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Unknown status value
    let response = send(
        &state,
        json_request("PUT", &uri, Some(&waiter), json!({ "status": "eaten" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let state = state();

    let response = send(
        &state,
        json_request(
            "POST",
            "/api/orders",
            None,
            json!({ "restaurantId": "r1", "tableId": "t1", "items": [] }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &state,
        json_request(
            "POST",
            "/api/orders",
            None,
            json!({
                "restaurantId": "r1",
                "tableId": "t1",
                "items": [{ "menuItemId": "m1", "quantity": 0, "price": 100.0 }]
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &state,
        Request::builder()
            .method("POST")
            .uri("/api/orders")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&state, get("/api/orders/missing/bill", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let owner = token(&state, "owner");
    let response = send(&state, get("/api/orders/r1", Some(&owner))).await;
    assert_eq!(json_body(response).await, json!([]));
}

#[tokio::test]
async fn test_banner_and_health() {
    let state = state();

    let response = send(&state, get("/", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], BANNER.as_bytes());

    let (_conn, _rx) = state.bus.connect();
    let response = send(&state, get("/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let health = json_body(response).await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["connections"], 1);
    assert_eq!(health["rooms"], 0);
}
