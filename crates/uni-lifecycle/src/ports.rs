//! Outbound ports: notification delivery and the member directory.
//!
//! Both are external collaborators. The engine only ever calls them from
//! detached background tasks (see `dispatch`), so an implementation may be
//! slow or flaky without affecting the request path. Adapters live in
//! `uni-notify` (HTTP-backed) and `uni-testkit` (recording/static fakes).

use anyhow::Result;
use uni_schemas::MemberProfile;

/// Fire-and-forget notification delivery. No return value is consumed by
/// the engine beyond logging; failures never roll back the transition that
/// triggered them.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// "A delivery code was issued for your order" — sent to the buyer.
    async fn notify_code_issued(
        &self,
        recipient: &str,
        code: &str,
        order_id: i64,
        recipient_name: &str,
    ) -> Result<()>;

    /// "Your transaction is complete" — sent to the seller.
    async fn notify_transaction_complete(
        &self,
        recipient: &str,
        order_id: i64,
        product_title: &str,
        recipient_name: &str,
    ) -> Result<()>;
}

/// Read-only lookup against the institution's master registry. The
/// lifecycle core never stores member records (its only durable state is
/// products, orders and chat messages).
#[async_trait::async_trait]
pub trait Directory: Send + Sync {
    /// `Ok(None)` when the registry has no entry for `member_id`.
    async fn lookup(&self, member_id: &str) -> Result<Option<MemberProfile>>;
}
