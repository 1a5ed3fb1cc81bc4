//! Fakes for the outbound ports: a notifier that records, a notifier that
//! always fails, and a fixed in-memory directory.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use uni_lifecycle::{Directory, Notifier};
use uni_schemas::MemberProfile;

/// One recorded notification, in dispatch order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    CodeIssued {
        recipient: String,
        code: String,
        order_id: i64,
        recipient_name: String,
    },
    TransactionComplete {
        recipient: String,
        order_id: i64,
        product_title: String,
        recipient_name: String,
    },
}

/// Records every notification it is asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Poll until at least `count` notifications were recorded. Dispatch is
    /// detached from the triggering call, so tests wait instead of racing.
    pub async fn wait_for(&self, count: usize) -> Vec<Notification> {
        for _ in 0..100 {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.sent()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_code_issued(
        &self,
        recipient: &str,
        code: &str,
        order_id: i64,
        recipient_name: &str,
    ) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Notification::CodeIssued {
                recipient: recipient.to_string(),
                code: code.to_string(),
                order_id,
                recipient_name: recipient_name.to_string(),
            });
        Ok(())
    }

    async fn notify_transaction_complete(
        &self,
        recipient: &str,
        order_id: i64,
        product_title: &str,
        recipient_name: &str,
    ) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Notification::TransactionComplete {
                recipient: recipient.to_string(),
                order_id,
                product_title: product_title.to_string(),
                recipient_name: recipient_name.to_string(),
            });
        Ok(())
    }
}

/// Fails every send. For asserting that delivery failures never surface
/// into the transition that triggered them.
#[derive(Debug, Clone, Default)]
pub struct FailingNotifier;

#[async_trait::async_trait]
impl Notifier for FailingNotifier {
    async fn notify_code_issued(&self, _: &str, _: &str, _: i64, _: &str) -> Result<()> {
        Err(anyhow!("relay unreachable"))
    }

    async fn notify_transaction_complete(&self, _: &str, _: i64, _: &str, _: &str) -> Result<()> {
        Err(anyhow!("relay unreachable"))
    }
}

/// Fixed member registry.
#[derive(Default)]
pub struct StaticDirectory {
    members: HashMap<String, MemberProfile>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_member(mut self, profile: MemberProfile) -> Self {
        self.members.insert(profile.member_id.clone(), profile);
        self
    }
}

#[async_trait::async_trait]
impl Directory for StaticDirectory {
    async fn lookup(&self, member_id: &str) -> Result<Option<MemberProfile>> {
        Ok(self.members.get(member_id).cloned())
    }
}
