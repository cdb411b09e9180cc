//! Order Models

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::{
    auth::UserId,
    domain::{catalog::models::ProductId, orders::status::OrderStatus},
    uuids::TypedUuid,
};

/// Order id
pub type OrderId = TypedUuid<Order>;

/// One purchased line, snapshotted with the price at time of purchase. Later
/// catalog edits never touch it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: ProductId,
    pub name: String,
    pub price: u64,
    pub color: String,
    pub size: String,
    pub quantity: u32,
}

/// An order. Write-once except `status`.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    /// Human-facing reference, e.g. `#DPS-0482913`.
    pub reference: String,
    /// `None` for guest checkouts.
    pub user: Option<UserId>,
    pub payer: String,
    pub phone: String,
    pub memo: String,
    pub items: Vec<OrderItem>,
    pub subtotal: u64,
    pub discount: u64,
    /// Grand total including the shipping fee, net of the discount.
    pub total: u64,
    pub status: OrderStatus,
    pub created_at: Timestamp,
}

/// New Order Data, assembled by the checkout engine.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub reference: String,
    pub user: Option<UserId>,
    pub payer: String,
    pub phone: String,
    pub memo: String,
    pub items: Vec<OrderItem>,
    pub subtotal: u64,
    pub discount: u64,
    pub total: u64,
}
