//! Scenario: the delivery-code handshake, start to finish.
//!
//! # Invariant under test
//!
//! Completion happens only through an exact match of the one-time delivery
//! code. A wrong submission changes nothing and the stored code survives
//! for a retry; a right submission atomically completes the order, marks
//! the product SOLD_OUT, clears the code and notifies the seller.

use uni_lifecycle::{LifecycleError, Store, CODE_WIDTH};
use uni_schemas::{OrderStatus, ProductStatus};
use uni_testkit::{listed_product, rig, Notification};

#[tokio::test]
async fn handshake_completes_on_exact_code() -> anyhow::Result<()> {
    let t = rig();
    let product = listed_product(&t.store, "seller-1").await?;

    let order = t.engine.reserve(product.id, "buyer-1").await?;
    t.engine.confirm(order.id, "seller-1").await?;

    let code = t.engine.initiate_delivery(order.id, "seller-1").await?;
    assert_eq!(code.len(), CODE_WIDTH, "code is {CODE_WIDTH} digits");
    assert!(code.chars().all(|c| c.is_ascii_digit()));

    // Wrong code: refused, nothing moves, stored code retained.
    let wrong = if code == "1000" { "1001" } else { "1000" };
    let res = t.engine.verify_delivery(order.id, "seller-1", wrong).await;
    assert!(
        matches!(res, Err(LifecycleError::InvalidCode)),
        "mismatch must be InvalidCode; got {res:?}"
    );
    let mid = t.engine.order(order.id, "seller-1").await?;
    assert_eq!(mid.status, OrderStatus::Confirmed);
    assert_eq!(
        mid.delivery_code.as_deref(),
        Some(code.as_str()),
        "failed verification must retain the code for a retry"
    );

    // Exact code: completion applies everywhere at once.
    let done = t.engine.verify_delivery(order.id, "seller-1", &code).await?;
    assert_eq!(done.status, OrderStatus::Completed);
    assert!(done.completed_at.is_some());
    assert!(done.delivery_code.is_none(), "code is single-use");

    let product = t.engine.product(product.id).await?;
    assert_eq!(product.status, ProductStatus::SoldOut);
    assert!(product.sold_at.is_some());

    // Seller notification arrives on the detached path.
    let sent = t.notifier.wait_for(1).await;
    assert!(
        sent.iter().any(|n| matches!(
            n,
            Notification::TransactionComplete { recipient, order_id, .. }
                if recipient == "sam@example.edu" && *order_id == order.id
        )),
        "seller must be notified of completion; got {sent:?}"
    );

    // The spent code no longer verifies.
    let replay = t.engine.verify_delivery(order.id, "seller-1", &code).await;
    assert!(
        matches!(replay, Err(LifecycleError::InvalidTransition { .. })),
        "completed order must refuse re-verification; got {replay:?}"
    );
    Ok(())
}

#[tokio::test]
async fn only_seller_drives_the_handshake() -> anyhow::Result<()> {
    let t = rig();
    let product = listed_product(&t.store, "seller-1").await?;
    let order = t.engine.reserve(product.id, "buyer-1").await?;
    t.engine.confirm(order.id, "seller-1").await?;

    let res = t.engine.initiate_delivery(order.id, "buyer-1").await;
    assert!(matches!(res, Err(LifecycleError::Forbidden(_))));

    let code = t.engine.initiate_delivery(order.id, "seller-1").await?;
    let res = t.engine.verify_delivery(order.id, "buyer-1", &code).await;
    assert!(
        matches!(res, Err(LifecycleError::Forbidden(_))),
        "buyer must not verify; got {res:?}"
    );
    Ok(())
}

#[tokio::test]
async fn reissue_invalidates_previous_code() -> anyhow::Result<()> {
    let t = rig();
    let product = listed_product(&t.store, "seller-1").await?;
    let order = t.engine.reserve(product.id, "buyer-1").await?;
    t.engine.confirm(order.id, "seller-1").await?;

    let first = t.engine.initiate_delivery(order.id, "seller-1").await?;
    let stored = t.engine.order(order.id, "seller-1").await?;
    assert_eq!(stored.delivery_code.as_deref(), Some(first.as_str()));

    // Reissue until the code actually differs, then the old one is dead.
    let mut second = t.engine.initiate_delivery(order.id, "seller-1").await?;
    while second == first {
        second = t.engine.initiate_delivery(order.id, "seller-1").await?;
    }
    let res = t.engine.verify_delivery(order.id, "seller-1", &first).await;
    assert!(
        matches!(res, Err(LifecycleError::InvalidCode)),
        "overwritten code must not verify; got {res:?}"
    );

    let done = t.engine.verify_delivery(order.id, "seller-1", &second).await?;
    assert_eq!(done.status, OrderStatus::Completed);
    Ok(())
}

#[tokio::test]
async fn code_requires_confirmed_order() -> anyhow::Result<()> {
    let t = rig();
    let product = listed_product(&t.store, "seller-1").await?;
    let order = t.engine.reserve(product.id, "buyer-1").await?;

    // PENDING: no code yet.
    let res = t.engine.initiate_delivery(order.id, "seller-1").await;
    assert!(matches!(res, Err(LifecycleError::InvalidTransition { .. })));

    // CONFIRMED but no code issued: verification has nothing to match.
    t.engine.confirm(order.id, "seller-1").await?;
    let res = t.engine.verify_delivery(order.id, "seller-1", "1234").await;
    assert!(
        matches!(res, Err(LifecycleError::InvalidTransition { .. })),
        "verify without a pending code must be refused; got {res:?}"
    );
    Ok(())
}

#[tokio::test]
async fn send_code_mails_the_pending_code() -> anyhow::Result<()> {
    let t = rig();
    let product = listed_product(&t.store, "seller-1").await?;
    let order = t.engine.reserve(product.id, "buyer-1").await?;
    t.engine.confirm(order.id, "seller-1").await?;

    // Nothing pending yet.
    let res = t
        .engine
        .send_code(order.id, "seller-1", "riley@example.edu")
        .await;
    assert!(
        matches!(res, Err(LifecycleError::InvalidOperation(_))),
        "send before initiate must be refused; got {res:?}"
    );

    let code = t.engine.initiate_delivery(order.id, "seller-1").await?;
    t.engine
        .send_code(order.id, "seller-1", "riley@example.edu")
        .await?;

    let sent = t.notifier.wait_for(1).await;
    assert!(
        sent.iter().any(|n| matches!(
            n,
            Notification::CodeIssued { recipient, code: c, order_id, recipient_name }
                if recipient == "riley@example.edu"
                    && c == &code
                    && *order_id == order.id
                    && recipient_name == "Riley Buyer"
        )),
        "pending code must be mailed to the given address; got {sent:?}"
    );
    Ok(())
}

#[tokio::test]
async fn complete_order_is_conditional_at_the_store() -> anyhow::Result<()> {
    // The write itself re-checks status and code, so an engine working from
    // a stale read can only lose cleanly.
    let t = rig();
    let product = listed_product(&t.store, "seller-1").await?;
    let order = t.engine.reserve(product.id, "buyer-1").await?;
    t.engine.confirm(order.id, "seller-1").await?;
    let code = t.engine.initiate_delivery(order.id, "seller-1").await?;

    // A cancel lands between the engine's read and its completion write.
    t.store.cancel_order(order.id).await?;

    let res = t.store.complete_order(order.id, &code, chrono::Utc::now()).await?;
    assert!(res.is_none(), "completion after cancel must be a no-op");

    let order = t.engine.order(order.id, "buyer-1").await?;
    assert_eq!(order.status, OrderStatus::Cancelled);
    let product = t.engine.product(product.id).await?;
    assert_eq!(product.status, ProductStatus::Available);
    Ok(())
}
