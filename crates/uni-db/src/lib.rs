//! uni-db
//!
//! Postgres persistence adapter for the lifecycle core. [`PgStore`]
//! implements `uni_lifecycle::Store`; every conditional transition is a
//! single `UPDATE ... WHERE status = <expected>` (plus a transaction when a
//! product and an order move together), so the loser of any race observes
//! zero affected rows and the store reports `Ok(None)`.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uni_schemas::{ChatMessage, NewProduct, Order, OrderStatus, Product, ProductStatus};

pub const ENV_DB_URL: &str = "UNIMART_DATABASE_URL";

/// Connect to Postgres using UNIMART_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url =
        std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// PgStore
// ---------------------------------------------------------------------------

/// Postgres-backed implementation of the lifecycle `Store`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

const ORDER_COLUMNS: &str =
    "id, product_id, buyer_id, seller_id, status, delivery_code, created_at, completed_at";
const PRODUCT_COLUMNS: &str =
    "id, seller_id, title, price_cents, status, created_at, sold_at";

#[async_trait::async_trait]
impl uni_lifecycle::Store for PgStore {
    async fn insert_product(&self, new: NewProduct) -> Result<Product> {
        let row = sqlx::query(&format!(
            "insert into products (seller_id, title, price_cents) values ($1, $2, $3) \
             returning {PRODUCT_COLUMNS}"
        ))
        .bind(&new.seller_id)
        .bind(&new.title)
        .bind(new.price_cents)
        .fetch_one(&self.pool)
        .await
        .context("insert_product failed")?;

        product_from_row(&row)
    }

    async fn product(&self, product_id: i64) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "select {PRODUCT_COLUMNS} from products where id = $1"
        ))
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .context("fetch product failed")?;

        row.as_ref().map(product_from_row).transpose()
    }

    async fn order(&self, order_id: i64) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("select {ORDER_COLUMNS} from orders where id = $1"))
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await
            .context("fetch order failed")?;

        row.as_ref().map(order_from_row).transpose()
    }

    async fn order_with_product(&self, order_id: i64) -> Result<Option<(Order, Product)>> {
        // One statement, so the pair is a consistent snapshot.
        let row = sqlx::query(
            r#"
            select
              o.id           as o_id,
              o.product_id   as o_product_id,
              o.buyer_id     as o_buyer_id,
              o.seller_id    as o_seller_id,
              o.status       as o_status,
              o.delivery_code as o_delivery_code,
              o.created_at   as o_created_at,
              o.completed_at as o_completed_at,
              p.id           as p_id,
              p.seller_id    as p_seller_id,
              p.title        as p_title,
              p.price_cents  as p_price_cents,
              p.status       as p_status,
              p.created_at   as p_created_at,
              p.sold_at      as p_sold_at
            from orders o
            join products p on p.id = o.product_id
            where o.id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .context("order_with_product failed")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let order = Order {
            id: row.try_get("o_id")?,
            product_id: row.try_get("o_product_id")?,
            buyer_id: row.try_get("o_buyer_id")?,
            seller_id: row.try_get("o_seller_id")?,
            status: parse_order_status(&row.try_get::<String, _>("o_status")?)?,
            delivery_code: row.try_get("o_delivery_code")?,
            created_at: row.try_get("o_created_at")?,
            completed_at: row.try_get("o_completed_at")?,
        };
        let product = Product {
            id: row.try_get("p_id")?,
            seller_id: row.try_get("p_seller_id")?,
            title: row.try_get("p_title")?,
            price_cents: row.try_get("p_price_cents")?,
            status: parse_product_status(&row.try_get::<String, _>("p_status")?)?,
            created_at: row.try_get("p_created_at")?,
            sold_at: row.try_get("p_sold_at")?,
        };
        Ok(Some((order, product)))
    }

    async fn orders_for_buyer(&self, buyer_id: &str) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "select {ORDER_COLUMNS} from orders where buyer_id = $1 order by created_at desc, id desc"
        ))
        .bind(buyer_id)
        .fetch_all(&self.pool)
        .await
        .context("orders_for_buyer failed")?;

        rows.iter().map(order_from_row).collect()
    }

    async fn orders_for_seller(&self, seller_id: &str) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "select {ORDER_COLUMNS} from orders where seller_id = $1 order by created_at desc, id desc"
        ))
        .bind(seller_id)
        .fetch_all(&self.pool)
        .await
        .context("orders_for_seller failed")?;

        rows.iter().map(order_from_row).collect()
    }

    async fn reserve_product(&self, product_id: i64, buyer_id: &str) -> Result<Option<Order>> {
        let mut tx = self.pool.begin().await.context("reserve_product begin failed")?;

        // CAS on the product row: only one concurrent reserve can flip it.
        let flipped = sqlx::query(
            "update products set status = 'RESERVED' \
             where id = $1 and status = 'AVAILABLE' \
             returning seller_id",
        )
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await
        .context("reserve_product update failed")?;

        let Some(flipped) = flipped else {
            tx.rollback().await.ok();
            return Ok(None);
        };
        let seller_id: String = flipped.try_get("seller_id")?;

        let row = sqlx::query(&format!(
            "insert into orders (product_id, buyer_id, seller_id) values ($1, $2, $3) \
             returning {ORDER_COLUMNS}"
        ))
        .bind(product_id)
        .bind(buyer_id)
        .bind(&seller_id)
        .fetch_one(&mut *tx)
        .await
        .context("reserve_product insert failed")?;

        let order = order_from_row(&row)?;
        tx.commit().await.context("reserve_product commit failed")?;
        Ok(Some(order))
    }

    async fn update_order_status(
        &self,
        order_id: i64,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "update orders set status = $3 where id = $1 and status = $2 \
             returning {ORDER_COLUMNS}"
        ))
        .bind(order_id)
        .bind(expected.as_str())
        .bind(next.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("update_order_status failed")?;

        row.as_ref().map(order_from_row).transpose()
    }

    async fn cancel_order(&self, order_id: i64) -> Result<Option<Order>> {
        let mut tx = self.pool.begin().await.context("cancel_order begin failed")?;

        let row = sqlx::query(&format!(
            "update orders set status = 'CANCELLED', delivery_code = null \
             where id = $1 and status in ('PENDING', 'CONFIRMED') \
             returning {ORDER_COLUMNS}"
        ))
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await
        .context("cancel_order update failed")?;

        let Some(row) = row else {
            tx.rollback().await.ok();
            return Ok(None);
        };
        let order = order_from_row(&row)?;

        // Release the product only if this order still held it.
        sqlx::query(
            "update products set status = 'AVAILABLE' \
             where id = $1 and status = 'RESERVED'",
        )
        .bind(order.product_id)
        .execute(&mut *tx)
        .await
        .context("cancel_order release failed")?;

        tx.commit().await.context("cancel_order commit failed")?;
        Ok(Some(order))
    }

    async fn set_delivery_code(&self, order_id: i64, code: &str) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "update orders set delivery_code = $2 \
             where id = $1 and status = 'CONFIRMED' \
             returning {ORDER_COLUMNS}"
        ))
        .bind(order_id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .context("set_delivery_code failed")?;

        row.as_ref().map(order_from_row).transpose()
    }

    async fn complete_order(
        &self,
        order_id: i64,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<(Order, Product)>> {
        let mut tx = self.pool.begin().await.context("complete_order begin failed")?;

        // Conditional on status AND the exact stored code, so a concurrent
        // cancel or code re-generation makes this a clean no-op.
        let row = sqlx::query(&format!(
            "update orders set status = 'COMPLETED', completed_at = $2, delivery_code = null \
             where id = $1 and status = 'CONFIRMED' and delivery_code = $3 \
             returning {ORDER_COLUMNS}"
        ))
        .bind(order_id)
        .bind(now)
        .bind(code)
        .fetch_optional(&mut *tx)
        .await
        .context("complete_order order update failed")?;

        let Some(row) = row else {
            tx.rollback().await.ok();
            return Ok(None);
        };
        let order = order_from_row(&row)?;

        let prow = sqlx::query(&format!(
            "update products set status = 'SOLD_OUT', sold_at = $2 \
             where id = $1 and status = 'RESERVED' \
             returning {PRODUCT_COLUMNS}"
        ))
        .bind(order.product_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .context("complete_order product update failed")?;

        // A CONFIRMED order implies a RESERVED product; anything else means
        // a race we refuse to paper over.
        let Some(prow) = prow else {
            tx.rollback().await.ok();
            return Ok(None);
        };
        let product = product_from_row(&prow)?;

        tx.commit().await.context("complete_order commit failed")?;
        Ok(Some((order, product)))
    }

    async fn insert_message(
        &self,
        order_id: i64,
        sender_id: &str,
        body: &str,
    ) -> Result<Option<ChatMessage>> {
        // Conditional on the order still being CONFIRMED, in one statement.
        let row = sqlx::query(
            "insert into chat_messages (order_id, sender_id, body) \
             select $1, $2, $3 \
             where exists (select 1 from orders where id = $1 and status = 'CONFIRMED') \
             returning id, order_id, sender_id, body, sent_at",
        )
        .bind(order_id)
        .bind(sender_id)
        .bind(body)
        .fetch_optional(&self.pool)
        .await
        .context("insert_message failed")?;

        row.as_ref().map(message_from_row).transpose()
    }

    async fn messages_for_order(&self, order_id: i64) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query(
            "select id, order_id, sender_id, body, sent_at from chat_messages \
             where order_id = $1 order by sent_at asc, id asc",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .context("messages_for_order failed")?;

        rows.iter().map(message_from_row).collect()
    }

    async fn delete_sold_products_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let res = sqlx::query(
            "delete from products \
             where status = 'SOLD_OUT' and sold_at is not null and sold_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .context("delete_sold_products_before failed")?;

        Ok(res.rows_affected())
    }

    async fn delete_chat_for_orders_completed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64> {
        let res = sqlx::query(
            "delete from chat_messages cm \
             using orders o \
             where cm.order_id = o.id \
               and o.status = 'COMPLETED' \
               and o.completed_at is not null \
               and o.completed_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .context("delete_chat_for_orders_completed_before failed")?;

        Ok(res.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn parse_product_status(s: &str) -> Result<ProductStatus> {
    ProductStatus::parse(s).ok_or_else(|| anyhow!("invalid product status: {}", s))
}

fn parse_order_status(s: &str) -> Result<OrderStatus> {
    OrderStatus::parse(s).ok_or_else(|| anyhow!("invalid order status: {}", s))
}

fn product_from_row(row: &PgRow) -> Result<Product> {
    Ok(Product {
        id: row.try_get("id")?,
        seller_id: row.try_get("seller_id")?,
        title: row.try_get("title")?,
        price_cents: row.try_get("price_cents")?,
        status: parse_product_status(&row.try_get::<String, _>("status")?)?,
        created_at: row.try_get("created_at")?,
        sold_at: row.try_get("sold_at")?,
    })
}

fn order_from_row(row: &PgRow) -> Result<Order> {
    Ok(Order {
        id: row.try_get("id")?,
        product_id: row.try_get("product_id")?,
        buyer_id: row.try_get("buyer_id")?,
        seller_id: row.try_get("seller_id")?,
        status: parse_order_status(&row.try_get::<String, _>("status")?)?,
        delivery_code: row.try_get("delivery_code")?,
        created_at: row.try_get("created_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

fn message_from_row(row: &PgRow) -> Result<ChatMessage> {
    Ok(ChatMessage {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        sender_id: row.try_get("sender_id")?,
        body: row.try_get("body")?,
        sent_at: row.try_get("sent_at")?,
    })
}
