//! Detached notification dispatch.
//!
//! Each dispatch is a spawned task carrying its own clones of the ports.
//! The triggering request returns before (and regardless of whether) the
//! notification succeeds; every failure path here ends in a log line, never
//! in an error surfaced to a caller.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::ports::{Directory, Notifier};

/// Spawn a "delivery code issued" notification to an explicit address.
/// The buyer's display name is resolved best-effort from the directory.
pub(crate) fn spawn_code_issued(
    notifier: Arc<dyn Notifier>,
    directory: Arc<dyn Directory>,
    recipient: String,
    code: String,
    order_id: i64,
    buyer_id: String,
) {
    let dispatch_id = Uuid::new_v4();
    tokio::spawn(async move {
        let name = display_name_or_default(directory.as_ref(), &buyer_id).await;
        match notifier
            .notify_code_issued(&recipient, &code, order_id, &name)
            .await
        {
            Ok(()) => info!(%dispatch_id, order_id, "code-issued notification sent"),
            Err(e) => warn!(%dispatch_id, order_id, error = %format!("{e:#}"),
                "code-issued notification failed; dropped"),
        }
    });
}

/// Spawn a "transaction complete" notification to the seller. The seller's
/// address comes from the directory; a missing entry drops the
/// notification with a warning.
pub(crate) fn spawn_transaction_complete(
    notifier: Arc<dyn Notifier>,
    directory: Arc<dyn Directory>,
    seller_id: String,
    order_id: i64,
    product_title: String,
) {
    let dispatch_id = Uuid::new_v4();
    tokio::spawn(async move {
        let profile = match directory.lookup(&seller_id).await {
            Ok(Some(p)) => p,
            Ok(None) => {
                warn!(%dispatch_id, order_id, seller_id,
                    "seller not in directory; transaction-complete notification dropped");
                return;
            }
            Err(e) => {
                warn!(%dispatch_id, order_id, seller_id, error = %format!("{e:#}"),
                    "directory lookup failed; transaction-complete notification dropped");
                return;
            }
        };
        match notifier
            .notify_transaction_complete(&profile.email, order_id, &product_title, &profile.display_name)
            .await
        {
            Ok(()) => info!(%dispatch_id, order_id, "transaction-complete notification sent"),
            Err(e) => warn!(%dispatch_id, order_id, error = %format!("{e:#}"),
                "transaction-complete notification failed; dropped"),
        }
    });
}

async fn display_name_or_default(directory: &dyn Directory, member_id: &str) -> String {
    match directory.lookup(member_id).await {
        Ok(Some(p)) => p.display_name,
        Ok(None) => "Member".to_string(),
        Err(e) => {
            warn!(member_id, error = %format!("{e:#}"), "directory lookup failed");
            "Member".to_string()
        }
    }
}
