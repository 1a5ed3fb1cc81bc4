//! uni-schemas
//!
//! Shared record types for the Unimart lifecycle core. Statuses are stored
//! as TEXT columns and round-trip through `as_str` / `parse`; the structs
//! here carry no behavior beyond that mapping. Transition rules live in
//! `uni-lifecycle`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ProductStatus
// ---------------------------------------------------------------------------

/// Listing status. Monotonic AVAILABLE → RESERVED → SOLD_OUT with a single
/// back-edge RESERVED → AVAILABLE (release on cancel). SOLD_OUT is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    Available,
    Reserved,
    SoldOut,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Available => "AVAILABLE",
            ProductStatus::Reserved => "RESERVED",
            ProductStatus::SoldOut => "SOLD_OUT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AVAILABLE" => Some(ProductStatus::Available),
            "RESERVED" => Some(ProductStatus::Reserved),
            "SOLD_OUT" => Some(ProductStatus::SoldOut),
            _ => None,
        }
    }

    /// Returns `true` if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProductStatus::SoldOut)
    }
}

// ---------------------------------------------------------------------------
// OrderStatus
// ---------------------------------------------------------------------------

/// Order status. PENDING → CONFIRMED → COMPLETED, with CANCELLED reachable
/// from both non-terminal states. COMPLETED and CANCELLED are terminal and
/// mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(OrderStatus::Pending),
            "CONFIRMED" => Some(OrderStatus::Confirmed),
            "COMPLETED" => Some(OrderStatus::Completed),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Returns `true` if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

// ---------------------------------------------------------------------------
// Product
// ---------------------------------------------------------------------------

/// A listing. Content fields (title, price) are owned by the seller and
/// mutated by the external CRUD surface; `status` / `sold_at` are owned by
/// the lifecycle engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub seller_id: String,
    pub title: String,
    /// Positive, currency-agnostic integer cents.
    pub price_cents: i64,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    /// Set exactly once, when the product reaches SOLD_OUT.
    pub sold_at: Option<DateTime<Utc>>,
}

/// Insert payload for a new listing (always starts AVAILABLE).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub seller_id: String,
    pub title: String,
    pub price_cents: i64,
}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// One reservation/purchase attempt against exactly one product. At most one
/// non-terminal order references a given product at a time; the product
/// status gate enforces this, not a DB constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub product_id: i64,
    pub buyer_id: String,
    /// Denormalized copy of the product's seller at order-creation time.
    pub seller_id: String,
    pub status: OrderStatus,
    /// One-time delivery code. Present only between generation and
    /// consumption; cleared whenever the order leaves CONFIRMED.
    pub delivery_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Returns `true` if `member_id` is the buyer or the seller.
    pub fn is_party(&self, member_id: &str) -> bool {
        self.buyer_id == member_id || self.seller_id == member_id
    }
}

// ---------------------------------------------------------------------------
// ChatMessage
// ---------------------------------------------------------------------------

/// Append-only message scoped to one order. Creatable only while the parent
/// order is CONFIRMED; immutable afterwards; deleted en masse by retention
/// once the order has been COMPLETED for the chat-retention window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub order_id: i64,
    pub sender_id: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// OrderView
// ---------------------------------------------------------------------------

/// Read-side composition of an order with its product and resolved party
/// names: one consistent read instead of per-request ad-hoc joins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderView {
    pub order: Order,
    pub product_title: String,
    pub product_price_cents: i64,
    pub product_status: ProductStatus,
    /// Display names resolved through the member directory; `None` when the
    /// directory has no entry (or is unavailable).
    pub buyer_name: Option<String>,
    pub seller_name: Option<String>,
}

// ---------------------------------------------------------------------------
// MemberProfile
// ---------------------------------------------------------------------------

/// Minimal member record resolved from the external master registry.
/// The lifecycle core never stores these; it only reads them for display
/// names and notification addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProfile {
    pub member_id: String,
    pub display_name: String,
    pub email: String,
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
