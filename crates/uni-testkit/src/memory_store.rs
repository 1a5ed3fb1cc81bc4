//! Deterministic in-memory [`Store`]: sequential IDs starting at 1, a
//! single mutex over all tables so every multi-field transition is as
//! atomic as the Postgres transactions it stands in for.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use uni_lifecycle::Store;
use uni_schemas::{ChatMessage, NewProduct, Order, OrderStatus, Product, ProductStatus};

#[derive(Default)]
struct Inner {
    next_product_id: i64,
    next_order_id: i64,
    next_message_id: i64,
    products: BTreeMap<i64, Product>,
    orders: BTreeMap<i64, Order>,
    messages: BTreeMap<i64, ChatMessage>,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Back-date a product's `sold_at` for retention tests.
    pub fn set_sold_at(&self, product_id: i64, sold_at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.lock();
        let product = inner
            .products
            .get_mut(&product_id)
            .ok_or_else(|| anyhow!("no product {product_id}"))?;
        product.sold_at = Some(sold_at);
        Ok(())
    }

    /// Back-date an order's `completed_at` for retention tests.
    pub fn set_completed_at(&self, order_id: i64, completed_at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.lock();
        let order = inner
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| anyhow!("no order {order_id}"))?;
        order.completed_at = Some(completed_at);
        Ok(())
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn insert_product(&self, new: NewProduct) -> Result<Product> {
        let mut inner = self.lock();
        inner.next_product_id += 1;
        let product = Product {
            id: inner.next_product_id,
            seller_id: new.seller_id,
            title: new.title,
            price_cents: new.price_cents,
            status: ProductStatus::Available,
            created_at: Utc::now(),
            sold_at: None,
        };
        inner.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn product(&self, product_id: i64) -> Result<Option<Product>> {
        Ok(self.lock().products.get(&product_id).cloned())
    }

    async fn order(&self, order_id: i64) -> Result<Option<Order>> {
        Ok(self.lock().orders.get(&order_id).cloned())
    }

    async fn order_with_product(&self, order_id: i64) -> Result<Option<(Order, Product)>> {
        let inner = self.lock();
        let Some(order) = inner.orders.get(&order_id).cloned() else {
            return Ok(None);
        };
        let Some(product) = inner.products.get(&order.product_id).cloned() else {
            return Ok(None);
        };
        Ok(Some((order, product)))
    }

    async fn orders_for_buyer(&self, buyer_id: &str) -> Result<Vec<Order>> {
        let inner = self.lock();
        let mut out: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| o.buyer_id == buyer_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(out)
    }

    async fn orders_for_seller(&self, seller_id: &str) -> Result<Vec<Order>> {
        let inner = self.lock();
        let mut out: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| o.seller_id == seller_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(out)
    }

    async fn reserve_product(&self, product_id: i64, buyer_id: &str) -> Result<Option<Order>> {
        let mut inner = self.lock();
        let seller_id = match inner.products.get_mut(&product_id) {
            Some(p) if p.status == ProductStatus::Available => {
                p.status = ProductStatus::Reserved;
                p.seller_id.clone()
            }
            _ => return Ok(None),
        };
        inner.next_order_id += 1;
        let order = Order {
            id: inner.next_order_id,
            product_id,
            buyer_id: buyer_id.to_string(),
            seller_id,
            status: OrderStatus::Pending,
            delivery_code: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        inner.orders.insert(order.id, order.clone());
        Ok(Some(order))
    }

    async fn update_order_status(
        &self,
        order_id: i64,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Option<Order>> {
        let mut inner = self.lock();
        match inner.orders.get_mut(&order_id) {
            Some(o) if o.status == expected => {
                o.status = next;
                Ok(Some(o.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn cancel_order(&self, order_id: i64) -> Result<Option<Order>> {
        let mut inner = self.lock();
        let order = match inner.orders.get_mut(&order_id) {
            Some(o) if !o.status.is_terminal() => {
                o.status = OrderStatus::Cancelled;
                o.delivery_code = None;
                o.clone()
            }
            _ => return Ok(None),
        };
        if let Some(p) = inner.products.get_mut(&order.product_id) {
            if p.status == ProductStatus::Reserved {
                p.status = ProductStatus::Available;
            }
        }
        Ok(Some(order))
    }

    async fn set_delivery_code(&self, order_id: i64, code: &str) -> Result<Option<Order>> {
        let mut inner = self.lock();
        match inner.orders.get_mut(&order_id) {
            Some(o) if o.status == OrderStatus::Confirmed => {
                o.delivery_code = Some(code.to_string());
                Ok(Some(o.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn complete_order(
        &self,
        order_id: i64,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<(Order, Product)>> {
        let mut inner = self.lock();
        let order = match inner.orders.get_mut(&order_id) {
            Some(o)
                if o.status == OrderStatus::Confirmed
                    && o.delivery_code.as_deref() == Some(code) =>
            {
                o.status = OrderStatus::Completed;
                o.completed_at = Some(now);
                o.delivery_code = None;
                o.clone()
            }
            _ => return Ok(None),
        };
        let product = match inner.products.get_mut(&order.product_id) {
            Some(p) if p.status == ProductStatus::Reserved => {
                p.status = ProductStatus::SoldOut;
                p.sold_at = Some(now);
                p.clone()
            }
            // A CONFIRMED order implies a RESERVED product; refuse to
            // complete against anything else.
            _ => {
                if let Some(o) = inner.orders.get_mut(&order_id) {
                    o.status = OrderStatus::Confirmed;
                    o.completed_at = None;
                    o.delivery_code = Some(code.to_string());
                }
                return Ok(None);
            }
        };
        Ok(Some((order, product)))
    }

    async fn insert_message(
        &self,
        order_id: i64,
        sender_id: &str,
        body: &str,
    ) -> Result<Option<ChatMessage>> {
        let mut inner = self.lock();
        match inner.orders.get(&order_id) {
            Some(o) if o.status == OrderStatus::Confirmed => {}
            _ => return Ok(None),
        }
        inner.next_message_id += 1;
        let msg = ChatMessage {
            id: inner.next_message_id,
            order_id,
            sender_id: sender_id.to_string(),
            body: body.to_string(),
            sent_at: Utc::now(),
        };
        inner.messages.insert(msg.id, msg.clone());
        Ok(Some(msg))
    }

    async fn messages_for_order(&self, order_id: i64) -> Result<Vec<ChatMessage>> {
        let inner = self.lock();
        let mut out: Vec<ChatMessage> = inner
            .messages
            .values()
            .filter(|m| m.order_id == order_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.sent_at, a.id).cmp(&(b.sent_at, b.id)));
        Ok(out)
    }

    async fn delete_sold_products_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.lock();
        let doomed: Vec<i64> = inner
            .products
            .values()
            .filter(|p| {
                p.status == ProductStatus::SoldOut
                    && p.sold_at.map(|t| t < cutoff).unwrap_or(false)
            })
            .map(|p| p.id)
            .collect();
        for id in &doomed {
            inner.products.remove(id);
        }
        Ok(doomed.len() as u64)
    }

    async fn delete_chat_for_orders_completed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64> {
        let mut inner = self.lock();
        let expired: BTreeSet<i64> = inner
            .orders
            .values()
            .filter(|o| {
                o.status == OrderStatus::Completed
                    && o.completed_at.map(|t| t < cutoff).unwrap_or(false)
            })
            .map(|o| o.id)
            .collect();
        let doomed: Vec<i64> = inner
            .messages
            .values()
            .filter(|m| expired.contains(&m.order_id))
            .map(|m| m.id)
            .collect();
        for id in &doomed {
            inner.messages.remove(id);
        }
        Ok(doomed.len() as u64)
    }
}
