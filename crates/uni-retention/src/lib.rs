//! uni-retention
//!
//! Time-based cleanup of stale marketplace data. Two independent sweeps run
//! on their own intervals:
//!
//! - sold products: SOLD_OUT listings older than the retention window are
//!   deleted (their completed orders are retained);
//! - expired chat: messages of orders completed longer ago than the chat
//!   window are deleted.
//!
//! Each sweep computes its cutoff at tick time and delegates the whole
//! predicate to one store delete, so a crash between ticks loses nothing
//! and a double-run deletes nothing twice. A failed tick is logged and the
//! loop keeps going.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uni_lifecycle::Store;

/// Sweep periods and retention windows.
#[derive(Debug, Clone, Copy)]
pub struct RetentionConfig {
    /// How often the sold-product sweep runs.
    pub product_sweep_period: Duration,
    /// SOLD_OUT products older than this are deleted.
    pub product_window: chrono::Duration,
    /// How often the chat sweep runs.
    pub chat_sweep_period: Duration,
    /// Chat of orders completed longer ago than this is deleted.
    pub chat_window: chrono::Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            product_sweep_period: Duration::from_secs(24 * 60 * 60),
            product_window: chrono::Duration::days(7),
            chat_sweep_period: Duration::from_secs(60 * 60),
            chat_window: chrono::Duration::hours(24),
        }
    }
}

/// One sold-product sweep: delete SOLD_OUT products past the window.
/// Returns the number of products deleted.
pub async fn sweep_sold_products<S: Store + ?Sized>(
    store: &S,
    config: &RetentionConfig,
) -> anyhow::Result<u64> {
    let cutoff = Utc::now() - config.product_window;
    let deleted = store.delete_sold_products_before(cutoff).await?;
    if deleted > 0 {
        info!(deleted, %cutoff, "retention: sold products removed");
    }
    Ok(deleted)
}

/// One chat sweep: delete messages of orders completed past the window.
/// Returns the number of messages deleted.
pub async fn sweep_expired_chats<S: Store + ?Sized>(
    store: &S,
    config: &RetentionConfig,
) -> anyhow::Result<u64> {
    let cutoff = Utc::now() - config.chat_window;
    let deleted = store.delete_chat_for_orders_completed_before(cutoff).await?;
    if deleted > 0 {
        info!(deleted, %cutoff, "retention: expired chat messages removed");
    }
    Ok(deleted)
}

/// Spawn both sweep loops. Tick failures are logged, never fatal; the
/// handles are returned so the daemon can abort them on shutdown.
pub fn spawn_retention<S>(store: Arc<S>, config: RetentionConfig) -> Vec<JoinHandle<()>>
where
    S: Store + 'static,
{
    let product_handle = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.product_sweep_period);
            loop {
                ticker.tick().await;
                if let Err(e) = sweep_sold_products(store.as_ref(), &config).await {
                    warn!(error = %format!("{e:#}"), "retention: sold-product sweep failed");
                }
            }
        })
    };

    let chat_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.chat_sweep_period);
        loop {
            ticker.tick().await;
            if let Err(e) = sweep_expired_chats(store.as_ref(), &config).await {
                warn!(error = %format!("{e:#}"), "retention: chat sweep failed");
            }
        }
    });

    vec![product_handle, chat_handle]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_operational_windows() {
        let c = RetentionConfig::default();
        assert_eq!(c.product_sweep_period, Duration::from_secs(86_400));
        assert_eq!(c.product_window, chrono::Duration::days(7));
        assert_eq!(c.chat_sweep_period, Duration::from_secs(3_600));
        assert_eq!(c.chat_window, chrono::Duration::hours(24));
    }
}
