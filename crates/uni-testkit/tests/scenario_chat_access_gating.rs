//! Scenario: chat opens, closes and stays readable on schedule.
//!
//! # Invariant under test
//!
//! The order chat is writable only by the two parties and only while the
//! order is CONFIRMED. Each refusal carries a distinct reason, so a client
//! can tell "not open yet" from "read-only after completion" from "closed
//! by cancellation". Reading stays party-only but works in any status.

use uni_lifecycle::{LifecycleError, Store};
use uni_testkit::{listed_product, rig};

#[tokio::test]
async fn chat_is_closed_until_confirmation() -> anyhow::Result<()> {
    let t = rig();
    let product = listed_product(&t.store, "seller-1").await?;
    let order = t.engine.reserve(product.id, "buyer-1").await?;

    let res = t.engine.post_message(order.id, "buyer-1", "hi!").await;
    match res {
        Err(LifecycleError::InvalidOperation(reason)) => {
            assert!(
                reason.contains("confirms"),
                "pending refusal must say the chat has not opened; got {reason:?}"
            );
        }
        other => panic!("pending chat must be InvalidOperation; got {other:?}"),
    }

    t.engine.confirm(order.id, "seller-1").await?;
    let msg = t
        .engine
        .post_message(order.id, "buyer-1", "when can we meet?")
        .await?;
    assert_eq!(msg.sender_id, "buyer-1");

    let reply = t
        .engine
        .post_message(order.id, "seller-1", "tomorrow at noon")
        .await?;
    assert_eq!(reply.sender_id, "seller-1");

    let thread = t.engine.list_messages(order.id, "buyer-1").await?;
    assert_eq!(thread.len(), 2);
    assert_eq!(thread[0].body, "when can we meet?");
    assert_eq!(thread[1].body, "tomorrow at noon");
    Ok(())
}

#[tokio::test]
async fn completed_chat_is_read_only() -> anyhow::Result<()> {
    let t = rig();
    let product = listed_product(&t.store, "seller-1").await?;
    let order = t.engine.reserve(product.id, "buyer-1").await?;
    t.engine.confirm(order.id, "seller-1").await?;
    t.engine.post_message(order.id, "buyer-1", "outside the library?").await?;

    let code = t.engine.initiate_delivery(order.id, "seller-1").await?;
    t.engine.verify_delivery(order.id, "seller-1", &code).await?;

    let res = t.engine.post_message(order.id, "buyer-1", "thanks!").await;
    match res {
        Err(LifecycleError::InvalidOperation(reason)) => {
            assert!(
                reason.contains("read-only"),
                "completed refusal must say read-only; got {reason:?}"
            );
        }
        other => panic!("completed chat write must be InvalidOperation; got {other:?}"),
    }

    // History stays readable for both parties.
    let thread = t.engine.list_messages(order.id, "seller-1").await?;
    assert_eq!(thread.len(), 1);
    Ok(())
}

#[tokio::test]
async fn cancelled_chat_is_closed() -> anyhow::Result<()> {
    let t = rig();
    let product = listed_product(&t.store, "seller-1").await?;
    let order = t.engine.reserve(product.id, "buyer-1").await?;
    t.engine.confirm(order.id, "seller-1").await?;
    t.engine.cancel(order.id, "buyer-1").await?;

    let res = t.engine.post_message(order.id, "seller-1", "still there?").await;
    match res {
        Err(LifecycleError::InvalidOperation(reason)) => {
            assert!(
                reason.contains("cancelled"),
                "cancelled refusal must name the cancellation; got {reason:?}"
            );
        }
        other => panic!("cancelled chat write must be InvalidOperation; got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn message_insert_is_conditional_at_the_store() -> anyhow::Result<()> {
    // The write itself re-checks the order status, so a cancel landing
    // between the engine's gate check and the insert cannot grow a closed
    // thread.
    let t = rig();
    let product = listed_product(&t.store, "seller-1").await?;
    let order = t.engine.reserve(product.id, "buyer-1").await?;
    t.engine.confirm(order.id, "seller-1").await?;
    t.engine.post_message(order.id, "buyer-1", "still on?").await?;

    // A cancel lands after the engine would have seen CONFIRMED.
    t.store.cancel_order(order.id).await?;

    let refused = t.store.insert_message(order.id, "buyer-1", "hello?").await?;
    assert!(refused.is_none(), "cancelled order must refuse the insert");
    assert_eq!(
        t.store.messages_for_order(order.id).await?.len(),
        1,
        "closed thread must not grow"
    );
    Ok(())
}

#[tokio::test]
async fn chat_is_party_only_in_both_directions() -> anyhow::Result<()> {
    let t = rig();
    let product = listed_product(&t.store, "seller-1").await?;
    let order = t.engine.reserve(product.id, "buyer-1").await?;
    t.engine.confirm(order.id, "seller-1").await?;
    t.engine.post_message(order.id, "buyer-1", "hello").await?;

    let res = t.engine.post_message(order.id, "stranger", "let me in").await;
    assert!(
        matches!(res, Err(LifecycleError::Forbidden(_))),
        "non-party write must be Forbidden; got {res:?}"
    );

    let res = t.engine.list_messages(order.id, "stranger").await;
    assert!(
        matches!(res, Err(LifecycleError::Forbidden(_))),
        "non-party read must be Forbidden; got {res:?}"
    );
    Ok(())
}
