//! uni-notify
//!
//! HTTP adapters for the engine's outbound ports: a mail-relay
//! [`Notifier`](uni_lifecycle::Notifier) and a member-registry
//! [`Directory`](uni_lifecycle::Directory), plus log/empty fallbacks for a
//! daemon started without the corresponding URLs configured.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use uni_lifecycle::{Directory, Notifier};
use uni_schemas::MemberProfile;

// ---------------------------------------------------------------------------
// Mail relay notifier
// ---------------------------------------------------------------------------

/// Delivers notifications as templated mails through the campus mail relay.
///
/// Relay credentials live on the relay side; this client only posts JSON.
#[derive(Debug, Clone)]
pub struct MailRelayNotifier {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct MailRequest<'a> {
    to: &'a str,
    subject: String,
    body: String,
}

impl MailRelayNotifier {
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    fn build_send_url(&self) -> String {
        format!("{}/send", self.base_url.trim_end_matches('/'))
    }

    async fn post(&self, req: &MailRequest<'_>) -> Result<()> {
        let resp = self
            .http
            .post(self.build_send_url())
            .json(req)
            .send()
            .await
            .context("mail relay request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "mail relay http error status={} body={}",
                status.as_u16(),
                body
            ));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Notifier for MailRelayNotifier {
    async fn notify_code_issued(
        &self,
        recipient: &str,
        code: &str,
        order_id: i64,
        recipient_name: &str,
    ) -> Result<()> {
        self.post(&MailRequest {
            to: recipient,
            subject: format!("Your delivery code for order #{order_id}"),
            body: format!(
                "Hi {recipient_name},\n\n\
                 Your delivery code is {code}. Read it to the seller at \
                 handoff to complete the transaction.\n"
            ),
        })
        .await
    }

    async fn notify_transaction_complete(
        &self,
        recipient: &str,
        order_id: i64,
        product_title: &str,
        recipient_name: &str,
    ) -> Result<()> {
        self.post(&MailRequest {
            to: recipient,
            subject: format!("Transaction complete for order #{order_id}"),
            body: format!(
                "Hi {recipient_name},\n\n\
                 Your sale of \"{product_title}\" has been completed. \
                 Thanks for trading on Unimart.\n"
            ),
        })
        .await
    }
}

/// Fallback notifier for a daemon without a configured mail relay: every
/// notification becomes a log line. Codes are never logged.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn notify_code_issued(
        &self,
        recipient: &str,
        _code: &str,
        order_id: i64,
        _recipient_name: &str,
    ) -> Result<()> {
        tracing::info!(recipient, order_id, "mail relay unconfigured; code-issued mail skipped");
        Ok(())
    }

    async fn notify_transaction_complete(
        &self,
        recipient: &str,
        order_id: i64,
        product_title: &str,
        _recipient_name: &str,
    ) -> Result<()> {
        tracing::info!(
            recipient,
            order_id,
            product_title,
            "mail relay unconfigured; transaction-complete mail skipped"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Member directory
// ---------------------------------------------------------------------------

/// Read-only client for the institution's member registry.
#[derive(Debug, Clone)]
pub struct HttpDirectory {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct DirectoryEntry {
    member_id: String,
    display_name: String,
    email: String,
}

impl HttpDirectory {
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    fn build_member_url(&self, member_id: &str) -> String {
        format!("{}/members/{member_id}", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl Directory for HttpDirectory {
    async fn lookup(&self, member_id: &str) -> Result<Option<MemberProfile>> {
        let resp = self
            .http
            .get(self.build_member_url(member_id))
            .send()
            .await
            .context("directory request failed")?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("directory http error status={}", status.as_u16()));
        }

        let entry: DirectoryEntry = resp
            .json()
            .await
            .context("directory response json decode failed")?;

        Ok(Some(MemberProfile {
            member_id: entry.member_id,
            display_name: entry.display_name,
            email: entry.email,
        }))
    }
}

/// Fallback directory for a daemon without a configured registry: every
/// lookup resolves to `None`, so views show no names and seller
/// notifications are dropped (logged at the dispatch layer).
#[derive(Debug, Clone, Default)]
pub struct EmptyDirectory;

#[async_trait::async_trait]
impl Directory for EmptyDirectory {
    async fn lookup(&self, _member_id: &str) -> Result<Option<MemberProfile>> {
        Ok(None)
    }
}
