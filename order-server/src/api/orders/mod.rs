//! Order API
//!
//! | Path | Method | Description | Auth |
//! |------|--------|-------------|------|
//! | /api/orders | POST | place an order | none |
//! | /api/orders/{restaurant_id} | GET | restaurant orders, newest first | staff |
//! | /api/orders/{id} | PUT | status / payment transition | staff |
//! | /api/orders/{id} | DELETE | remove an order | staff |
//! | /api/orders/{id}/bill | GET | order with bill projection | none |
//! | /api/orders/{id}/bill-pdf | GET | bill as PDF attachment | none |
//!
//! `GET /{id}` takes a restaurant id while `PUT`/`DELETE` on the same path
//! take an order id.

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::create))
        .route(
            "/{id}",
            get(handler::list_for_restaurant)
                .put(handler::update)
                .delete(handler::delete),
        )
        .route("/{id}/bill", get(handler::bill))
        .route("/{id}/bill-pdf", get(handler::bill_pdf))
}
