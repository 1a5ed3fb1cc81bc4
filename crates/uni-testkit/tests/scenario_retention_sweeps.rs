//! Scenario: retention deletes exactly what has aged out.
//!
//! # Invariant under test
//!
//! The sold-product sweep removes SOLD_OUT listings past the 7-day window
//! and nothing else; the chat sweep removes messages of orders completed
//! past the 24-hour window while retaining the order rows. Both sweeps are
//! idempotent: a second run on unchanged data deletes zero rows.

use chrono::{Duration, Utc};
use uni_lifecycle::Store;
use uni_retention::{sweep_expired_chats, sweep_sold_products, RetentionConfig};
use uni_schemas::OrderStatus;
use uni_testkit::{listed_product, rig, TestRig};

/// Drive one order to COMPLETED with a chat message, returning its IDs.
async fn completed_sale(t: &TestRig) -> anyhow::Result<(i64, i64)> {
    let product = listed_product(&t.store, "seller-1").await?;
    let order = t.engine.reserve(product.id, "buyer-1").await?;
    t.engine.confirm(order.id, "seller-1").await?;
    t.engine.post_message(order.id, "buyer-1", "on my way").await?;
    let code = t.engine.initiate_delivery(order.id, "seller-1").await?;
    t.engine.verify_delivery(order.id, "seller-1", &code).await?;
    Ok((order.id, product.id))
}

#[tokio::test]
async fn sold_product_sweep_honors_the_window() -> anyhow::Result<()> {
    let t = rig();
    let config = RetentionConfig::default();

    let (old_order, old_product) = completed_sale(&t).await?;
    let (_, fresh_product) = completed_sale(&t).await?;

    // Age one sale past the window, leave the other just inside it.
    t.store.set_sold_at(old_product, Utc::now() - Duration::days(8))?;
    t.store.set_sold_at(fresh_product, Utc::now() - Duration::days(6))?;

    let deleted = sweep_sold_products(t.store.as_ref(), &config).await?;
    assert_eq!(deleted, 1, "only the aged product is swept");
    assert!(t.store.product(old_product).await?.is_none());
    assert!(t.store.product(fresh_product).await?.is_some());

    // The completed order outlives its product.
    let order = t.store.order(old_order).await?.expect("order retained");
    assert_eq!(order.status, OrderStatus::Completed);

    let rerun = sweep_sold_products(t.store.as_ref(), &config).await?;
    assert_eq!(rerun, 0, "sweep is idempotent");
    Ok(())
}

#[tokio::test]
async fn chat_sweep_honors_the_window_and_keeps_orders() -> anyhow::Result<()> {
    let t = rig();
    let config = RetentionConfig::default();

    let (old_order, _) = completed_sale(&t).await?;
    let (fresh_order, _) = completed_sale(&t).await?;

    t.store.set_completed_at(old_order, Utc::now() - Duration::hours(25))?;
    t.store.set_completed_at(fresh_order, Utc::now() - Duration::hours(23))?;

    let deleted = sweep_expired_chats(t.store.as_ref(), &config).await?;
    assert_eq!(deleted, 1, "only the aged thread is swept");
    assert!(t.store.messages_for_order(old_order).await?.is_empty());
    assert_eq!(t.store.messages_for_order(fresh_order).await?.len(), 1);

    let order = t.store.order(old_order).await?.expect("order retained");
    assert_eq!(order.status, OrderStatus::Completed);

    let rerun = sweep_expired_chats(t.store.as_ref(), &config).await?;
    assert_eq!(rerun, 0, "sweep is idempotent");
    Ok(())
}

#[tokio::test]
async fn chat_sweep_clears_every_expired_thread_in_one_pass() -> anyhow::Result<()> {
    let t = rig();
    let config = RetentionConfig::default();

    let mut expired = Vec::new();
    for _ in 0..3 {
        let (order_id, _) = completed_sale(&t).await?;
        t.store.set_completed_at(order_id, Utc::now() - Duration::hours(30))?;
        expired.push(order_id);
    }
    let (live_order, _) = completed_sale(&t).await?;

    let deleted = sweep_expired_chats(t.store.as_ref(), &config).await?;
    assert_eq!(deleted, 3, "one message per expired thread");
    for order_id in expired {
        assert!(t.store.messages_for_order(order_id).await?.is_empty());
    }
    assert_eq!(t.store.messages_for_order(live_order).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn live_data_is_never_swept() -> anyhow::Result<()> {
    let t = rig();
    let config = RetentionConfig::default();

    // An AVAILABLE listing and a CONFIRMED order with chat, both ancient by
    // wall clock but not in a swept state.
    let product = listed_product(&t.store, "seller-1").await?;
    let order = t.engine.reserve(product.id, "buyer-1").await?;
    t.engine.confirm(order.id, "seller-1").await?;
    t.engine.post_message(order.id, "buyer-1", "negotiating").await?;

    assert_eq!(sweep_sold_products(t.store.as_ref(), &config).await?, 0);
    assert_eq!(sweep_expired_chats(t.store.as_ref(), &config).await?, 0);

    assert!(t.store.product(product.id).await?.is_some());
    assert_eq!(t.store.messages_for_order(order.id).await?.len(), 1);
    Ok(())
}
