//! The lifecycle engine: every state transition and every access check for
//! products, orders and chat.
//!
//! The engine holds no mutable state of its own; all state lives behind the
//! [`Store`]. Permission and precondition checks run against a fresh read,
//! then the transition itself is a conditional write — so a stale read can
//! only ever downgrade a success into a clean `Conflict`, never corrupt.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uni_schemas::{ChatMessage, Order, OrderStatus, OrderView, Product, ProductStatus};

use crate::dispatch;
use crate::error::LifecycleError;
use crate::otp::generate_delivery_code;
use crate::ports::{Directory, Notifier};
use crate::store::Store;
use crate::transition::{order_can_transition, product_can_transition};

type Result<T> = std::result::Result<T, LifecycleError>;

pub struct LifecycleEngine<S> {
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
    directory: Arc<dyn Directory>,
}

impl<S: Store> LifecycleEngine<S> {
    pub fn new(store: Arc<S>, notifier: Arc<dyn Notifier>, directory: Arc<dyn Directory>) -> Self {
        Self {
            store,
            notifier,
            directory,
        }
    }

    /// The shared persistence adapter (the retention scheduler runs against
    /// the same instance).
    pub fn store(&self) -> Arc<S> {
        Arc::clone(&self.store)
    }

    // -- reservations -------------------------------------------------------

    /// Reserve an AVAILABLE product for `buyer_id`, creating a PENDING order.
    ///
    /// Two concurrent reserves on the same product: exactly one succeeds,
    /// the loser fails with `Conflict`.
    pub async fn reserve(&self, product_id: i64, buyer_id: &str) -> Result<Order> {
        let product = self
            .store
            .product(product_id)
            .await?
            .ok_or(LifecycleError::NotFound("product"))?;

        if product.seller_id == buyer_id {
            return Err(LifecycleError::InvalidOperation(
                "you cannot buy your own listing",
            ));
        }
        if !product_can_transition(product.status, ProductStatus::Reserved) {
            return Err(LifecycleError::Conflict("product is no longer available"));
        }

        let order = self
            .store
            .reserve_product(product_id, buyer_id)
            .await?
            .ok_or(LifecycleError::Conflict("product is no longer available"))?;

        info!(order_id = order.id, product_id, buyer_id, "product reserved");
        Ok(order)
    }

    /// Seller accepts a PENDING order: PENDING → CONFIRMED.
    pub async fn confirm(&self, order_id: i64, actor_id: &str) -> Result<Order> {
        let order = self.fetch_order(order_id).await?;

        if order.seller_id != actor_id {
            return Err(LifecycleError::Forbidden(
                "only the seller can confirm an order",
            ));
        }
        if !order_can_transition(order.status, OrderStatus::Confirmed) {
            return Err(invalid_order_transition(&order, "confirm"));
        }

        let order = self
            .store
            .update_order_status(order_id, OrderStatus::Pending, OrderStatus::Confirmed)
            .await?
            .ok_or(LifecycleError::Conflict("order left PENDING concurrently"))?;

        info!(order_id, "order confirmed");
        Ok(order)
    }

    /// Either party voids a live order: PENDING|CONFIRMED → CANCELLED,
    /// releasing the product back to AVAILABLE if it was RESERVED.
    /// Re-cancelling a terminal order fails with `InvalidTransition`.
    pub async fn cancel(&self, order_id: i64, actor_id: &str) -> Result<Order> {
        let order = self.fetch_order(order_id).await?;

        if !order.is_party(actor_id) {
            return Err(LifecycleError::Forbidden(
                "only the buyer or seller can cancel an order",
            ));
        }
        if !order_can_transition(order.status, OrderStatus::Cancelled) {
            return Err(invalid_order_transition(&order, "cancel"));
        }

        let order = self
            .store
            .cancel_order(order_id)
            .await?
            .ok_or(LifecycleError::Conflict("order reached a terminal state concurrently"))?;

        info!(order_id, actor_id, "order cancelled, product released");
        Ok(order)
    }

    // -- delivery handshake -------------------------------------------------

    /// Seller starts the handoff: generates a fresh delivery code on a
    /// CONFIRMED order and returns it for manual or emailed transmission to
    /// the buyer. Re-invocation overwrites (invalidates) the previous code.
    pub async fn initiate_delivery(&self, order_id: i64, actor_id: &str) -> Result<String> {
        let order = self.fetch_order(order_id).await?;

        if order.seller_id != actor_id {
            return Err(LifecycleError::Forbidden(
                "only the seller can initiate delivery",
            ));
        }
        // A code is only issuable while the completion edge exists.
        if !order_can_transition(order.status, OrderStatus::Completed) {
            return Err(invalid_order_transition(&order, "initiate_delivery"));
        }

        let code = generate_delivery_code();
        self.store
            .set_delivery_code(order_id, &code)
            .await?
            .ok_or(LifecycleError::Conflict("order left CONFIRMED concurrently"))?;

        info!(order_id, "delivery code issued");
        Ok(code)
    }

    /// Send the pending delivery code to `email` (the buyer's address as
    /// supplied by the seller). Dispatch is detached; this returns as soon
    /// as the notification is queued.
    pub async fn send_code(&self, order_id: i64, actor_id: &str, email: &str) -> Result<()> {
        let order = self.fetch_order(order_id).await?;

        if order.seller_id != actor_id {
            return Err(LifecycleError::Forbidden(
                "only the seller can send the delivery code",
            ));
        }
        let Some(code) = order.delivery_code.clone() else {
            return Err(LifecycleError::InvalidOperation(
                "no delivery code pending; initiate delivery first",
            ));
        };

        dispatch::spawn_code_issued(
            Arc::clone(&self.notifier),
            Arc::clone(&self.directory),
            email.to_string(),
            code,
            order_id,
            order.buyer_id,
        );
        Ok(())
    }

    /// Seller submits the code read back by the buyer at handoff. On an
    /// exact match the completion is applied atomically: order → COMPLETED
    /// (code cleared), product → SOLD_OUT. On a mismatch nothing changes and
    /// the stored code is retained, so retry remains possible.
    pub async fn verify_delivery(
        &self,
        order_id: i64,
        actor_id: &str,
        submitted: &str,
    ) -> Result<Order> {
        let order = self.fetch_order(order_id).await?;

        if order.seller_id != actor_id {
            return Err(LifecycleError::Forbidden(
                "only the seller can verify delivery",
            ));
        }
        let Some(code) = order.delivery_code.clone() else {
            return Err(invalid_order_transition(&order, "verify_delivery"));
        };
        // Exact string match, no normalization.
        if submitted != code {
            return Err(LifecycleError::InvalidCode);
        }

        let (order, product) = self
            .store
            .complete_order(order_id, &code, Utc::now())
            .await?
            .ok_or(LifecycleError::Conflict("order changed concurrently; completion aborted"))?;

        info!(order_id, product_id = product.id, "transaction completed");

        dispatch::spawn_transaction_complete(
            Arc::clone(&self.notifier),
            Arc::clone(&self.directory),
            order.seller_id.clone(),
            order_id,
            product.title,
        );
        Ok(order)
    }

    // -- chat ---------------------------------------------------------------

    /// Post a message in the order's private chat. The chat is a
    /// negotiation/handoff channel: writable only while the order is
    /// CONFIRMED, with a caller-visible distinction between "not open yet"
    /// and "closed".
    pub async fn post_message(
        &self,
        order_id: i64,
        sender_id: &str,
        text: &str,
    ) -> Result<ChatMessage> {
        let order = self.fetch_order(order_id).await?;

        if !order.is_party(sender_id) {
            return Err(LifecycleError::Forbidden(
                "only the buyer or seller can use this chat",
            ));
        }
        match order.status {
            OrderStatus::Confirmed => {}
            OrderStatus::Pending => {
                return Err(LifecycleError::InvalidOperation(
                    "chat opens once the seller confirms the order",
                ));
            }
            OrderStatus::Completed => {
                return Err(LifecycleError::InvalidOperation(
                    "chat is read-only; the transaction has been completed",
                ));
            }
            OrderStatus::Cancelled => {
                return Err(LifecycleError::InvalidOperation(
                    "chat is closed; the order was cancelled",
                ));
            }
        }

        // The insert re-checks the status, so a cancel or completion landing
        // after the gate above loses nothing.
        let msg = self
            .store
            .insert_message(order_id, sender_id, text)
            .await?
            .ok_or(LifecycleError::Conflict("order left CONFIRMED concurrently"))?;
        Ok(msg)
    }

    /// Read the chat thread. Party-only, but allowed in any order status:
    /// read access persists after completion until retention deletes the
    /// thread.
    pub async fn list_messages(
        &self,
        order_id: i64,
        requester_id: &str,
    ) -> Result<Vec<ChatMessage>> {
        let order = self.fetch_order(order_id).await?;

        if !order.is_party(requester_id) {
            return Err(LifecycleError::Forbidden(
                "only the buyer or seller can read this chat",
            ));
        }
        Ok(self.store.messages_for_order(order_id).await?)
    }

    // -- reads --------------------------------------------------------------

    pub async fn product(&self, product_id: i64) -> Result<Product> {
        self.store
            .product(product_id)
            .await?
            .ok_or(LifecycleError::NotFound("product"))
    }

    /// Party-only order read.
    pub async fn order(&self, order_id: i64, actor_id: &str) -> Result<Order> {
        let order = self.fetch_order(order_id).await?;
        if !order.is_party(actor_id) {
            return Err(LifecycleError::Forbidden(
                "you don't have access to this order",
            ));
        }
        Ok(order)
    }

    /// Party-only composed read: order + product in one store call, party
    /// display names resolved best-effort through the directory.
    pub async fn order_view(&self, order_id: i64, actor_id: &str) -> Result<OrderView> {
        let (order, product) = self
            .store
            .order_with_product(order_id)
            .await?
            .ok_or(LifecycleError::NotFound("order"))?;

        if !order.is_party(actor_id) {
            return Err(LifecycleError::Forbidden(
                "you don't have access to this order",
            ));
        }

        let buyer_name = self.display_name(&order.buyer_id).await;
        let seller_name = self.display_name(&order.seller_id).await;

        Ok(OrderView {
            buyer_name,
            seller_name,
            product_title: product.title,
            product_price_cents: product.price_cents,
            product_status: product.status,
            order,
        })
    }

    pub async fn orders_for_buyer(&self, buyer_id: &str) -> Result<Vec<Order>> {
        Ok(self.store.orders_for_buyer(buyer_id).await?)
    }

    pub async fn orders_for_seller(&self, seller_id: &str) -> Result<Vec<Order>> {
        Ok(self.store.orders_for_seller(seller_id).await?)
    }

    // -- helpers ------------------------------------------------------------

    async fn fetch_order(&self, order_id: i64) -> Result<Order> {
        self.store
            .order(order_id)
            .await?
            .ok_or(LifecycleError::NotFound("order"))
    }

    /// Directory lookup that never fails the read path: missing entries and
    /// registry errors both resolve to `None` (logged by the directory impl
    /// or dispatch layer where relevant).
    async fn display_name(&self, member_id: &str) -> Option<String> {
        match self.directory.lookup(member_id).await {
            Ok(Some(p)) => Some(p.display_name),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(member_id, error = %format!("{e:#}"), "directory lookup failed");
                None
            }
        }
    }
}

fn invalid_order_transition(order: &Order, op: &'static str) -> LifecycleError {
    LifecycleError::InvalidTransition {
        entity: "order",
        from: order.status.as_str(),
        op,
    }
}
