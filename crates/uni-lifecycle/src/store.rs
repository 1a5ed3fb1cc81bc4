//! Persistence port of the lifecycle engine.
//!
//! Implementations: `uni-db::PgStore` (Postgres) and
//! `uni-testkit::MemoryStore` (deterministic in-memory fake with the same
//! conditional-write semantics).
//!
//! # Contract
//!
//! The multi-field transition methods (`reserve_product`, `cancel_order`,
//! `complete_order`) are each a single atomic unit keyed on the expected
//! prior status: when the entity is no longer in a state the transition is
//! defined for, the method returns `Ok(None)` and has **no effect**. Two
//! concurrent callers can therefore never both take the same edge; the
//! loser observes `None` and the engine surfaces `Conflict`.
//!
//! Infrastructure failures (connection loss, constraint violations outside
//! the modeled races) are `Err` with an `anyhow` context chain.

use anyhow::Result;
use chrono::{DateTime, Utc};
use uni_schemas::{ChatMessage, NewProduct, Order, OrderStatus, Product};

#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // -- products -----------------------------------------------------------

    /// Insert a new AVAILABLE listing. Invoked by the external CRUD surface
    /// and by test fixtures; the engine itself only transitions status.
    async fn insert_product(&self, new: NewProduct) -> Result<Product>;

    async fn product(&self, product_id: i64) -> Result<Option<Product>>;

    // -- orders -------------------------------------------------------------

    async fn order(&self, order_id: i64) -> Result<Option<Order>>;

    /// One consistent read of an order together with its product.
    async fn order_with_product(&self, order_id: i64) -> Result<Option<(Order, Product)>>;

    /// All orders where `buyer_id` is the buyer, newest first.
    async fn orders_for_buyer(&self, buyer_id: &str) -> Result<Vec<Order>>;

    /// All orders where `seller_id` is the seller, newest first.
    async fn orders_for_seller(&self, seller_id: &str) -> Result<Vec<Order>>;

    // -- transitions (atomic, conditional) ----------------------------------

    /// Atomically flip the product AVAILABLE → RESERVED and insert a new
    /// PENDING order for `buyer_id` (seller denormalized from the product).
    ///
    /// `Ok(None)` when the product was not AVAILABLE at write time — the
    /// reservation race loser lands here.
    async fn reserve_product(&self, product_id: i64, buyer_id: &str) -> Result<Option<Order>>;

    /// Conditional single-status update keyed on the expected prior status
    /// (used for PENDING → CONFIRMED). `Ok(None)` when the order exists but
    /// was no longer in `expected`.
    async fn update_order_status(
        &self,
        order_id: i64,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Option<Order>>;

    /// Atomically cancel a live order: PENDING|CONFIRMED → CANCELLED, clear
    /// any pending delivery code, and release the referenced product
    /// RESERVED → AVAILABLE in the same unit. `Ok(None)` when the order was
    /// already terminal at write time.
    async fn cancel_order(&self, order_id: i64) -> Result<Option<Order>>;

    /// Store a fresh delivery code on a CONFIRMED order, overwriting any
    /// previous code. `Ok(None)` when the order was not CONFIRMED.
    async fn set_delivery_code(&self, order_id: i64, code: &str) -> Result<Option<Order>>;

    /// Atomically complete the handshake, conditional on the order still
    /// being CONFIRMED **and** still carrying exactly `code`:
    /// order → COMPLETED with `completed_at = now` and the code cleared;
    /// product → SOLD_OUT with `sold_at = now`. `Ok(None)` when a
    /// concurrent cancel (or re-generation) got there first.
    async fn complete_order(
        &self,
        order_id: i64,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<(Order, Product)>>;

    // -- chat ---------------------------------------------------------------

    /// Append a message, conditional on the order still being CONFIRMED at
    /// write time. `Ok(None)` when it is not (or no longer exists), so a
    /// cancel or completion landing between the engine's gate check and
    /// this write cannot grow a closed thread.
    async fn insert_message(
        &self,
        order_id: i64,
        sender_id: &str,
        body: &str,
    ) -> Result<Option<ChatMessage>>;

    /// All messages for an order, oldest first.
    async fn messages_for_order(&self, order_id: i64) -> Result<Vec<ChatMessage>>;

    // -- retention ----------------------------------------------------------

    /// Delete every SOLD_OUT product with `sold_at < cutoff`. The predicate
    /// is part of the delete itself, so a row that changed between scan and
    /// delete is untouched. Returns the number of rows deleted.
    async fn delete_sold_products_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Delete every chat message belonging to an order that is COMPLETED
    /// with `completed_at < cutoff`. Order rows themselves are retained.
    /// Returns the number of messages deleted.
    async fn delete_chat_for_orders_completed_before(&self, cutoff: DateTime<Utc>)
        -> Result<u64>;
}
