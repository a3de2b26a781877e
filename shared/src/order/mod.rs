//! Order types shared between the server and clients

pub mod bill;
pub mod types;

pub use bill::{BillLine, BillView};
pub use types::{
    CreateOrderRequest, LineItem, Order, OrderStatus, OrderStatusPayload, PaymentStatus,
    ResolvedLineItem, ResolvedOrder, UnknownStatus, UpdateOrderRequest,
};
