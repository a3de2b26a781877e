//! Order API Handlers

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use shared::order::{
    BillView, CreateOrderRequest, Order, ResolvedOrder, UpdateOrderRequest,
};

use crate::auth::MaybeUser;
use crate::bill::{BillHeader, project, render_with_timeout};
use crate::core::ServerState;
use crate::utils::validation::validate_id;
use crate::utils::{ApiResponse, AppError, AppResult};

/// Resolved order with its bill
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillResponse {
    #[serde(flatten)]
    pub order: ResolvedOrder,
    pub bill: BillView,
}

/// Map body rejections onto the unified validation error
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::validation(rejection.body_text()))
}

/// POST /api/orders
pub async fn create(
    State(state): State<ServerState>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Order>)> {
    let req = body(payload)?;
    validate_id(&req.restaurant_id, "restaurantId")?;
    validate_id(&req.table_id, "tableId")?;

    let order = state
        .orders
        .create_order(&req.restaurant_id, &req.table_id, req.items, req.total)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/orders/{restaurant_id}
pub async fn list_for_restaurant(
    State(state): State<ServerState>,
    MaybeUser(user): MaybeUser,
    Path(restaurant_id): Path<String>,
) -> AppResult<Json<Vec<ResolvedOrder>>> {
    validate_id(&restaurant_id, "restaurantId")?;

    let orders = state
        .orders
        .list_for_restaurant(user.as_ref(), &restaurant_id)
        .await?;
    Ok(Json(orders))
}

/// PUT /api/orders/{id}
pub async fn update(
    State(state): State<ServerState>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<String>,
    payload: Result<Json<UpdateOrderRequest>, JsonRejection>,
) -> AppResult<Json<Order>> {
    validate_id(&id, "id")?;
    let req = body(payload)?;

    let order = state
        .orders
        .apply_transition(
            user.as_ref(),
            &id,
            req.status.as_deref(),
            req.payment_status.as_deref(),
        )
        .await?;
    Ok(Json(order))
}

/// DELETE /api/orders/{id}
pub async fn delete(
    State(state): State<ServerState>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    validate_id(&id, "id")?;

    state.orders.delete_order(user.as_ref(), &id).await?;
    Ok(ApiResponse::ok_with_message("Order deleted"))
}

/// Load, resolve and project one order
async fn load_bill(state: &ServerState, id: &str) -> AppResult<BillResponse> {
    validate_id(id, "id")?;

    let order = state.orders.get_order(id).await?;
    let order = state.orders.resolve(order);
    let bill = project(&order, state.config.tax_rate_percent);
    Ok(BillResponse { order, bill })
}

/// GET /api/orders/{id}/bill
pub async fn bill(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<BillResponse>> {
    Ok(Json(load_bill(&state, &id).await?))
}

/// GET /api/orders/{id}/bill-pdf
pub async fn bill_pdf(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let BillResponse { order, bill } = load_bill(&state, &id).await?;

    let header = state
        .directory
        .restaurant(&order.restaurant_id)
        .map(|r| BillHeader {
            restaurant_name: r.name,
            restaurant_address: r.address,
        })
        .unwrap_or_else(|| BillHeader {
            restaurant_name: "Restaurant".to_string(),
            restaurant_address: String::new(),
        });

    let pdf = render_with_timeout(
        state.renderer.clone(),
        bill,
        header,
        state.config.render_timeout(),
    )
    .await?;

    tracing::debug!(order_id = %order.id, bytes = pdf.len(), "Bill PDF rendered");

    Ok((
        [
            (header::CONTENT_TYPE, state.renderer.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"bill-{}.pdf\"", order.id),
            ),
        ],
        pdf,
    )
        .into_response())
}
