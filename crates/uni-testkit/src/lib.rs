//! uni-testkit
//!
//! In-process fakes for scenario tests: a [`MemoryStore`] with the same
//! conditional-write semantics as the Postgres adapter, a
//! [`RecordingNotifier`] / [`FailingNotifier`] pair and a
//! [`StaticDirectory`]. No DB or network required.

mod memory_store;
mod notify;

pub use memory_store::MemoryStore;
pub use notify::{FailingNotifier, Notification, RecordingNotifier, StaticDirectory};

use std::sync::Arc;

use uni_lifecycle::LifecycleEngine;
use uni_schemas::{MemberProfile, NewProduct, Product};

/// Engine wired to fresh fakes, plus handles to the fakes themselves.
pub struct TestRig {
    pub engine: LifecycleEngine<MemoryStore>,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
}

/// A fresh engine over a [`MemoryStore`], recording notifications, with
/// `seller-1` and `buyer-1` registered in the directory.
pub fn rig() -> TestRig {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let directory = Arc::new(
        StaticDirectory::new()
            .with_member(profile("seller-1", "Sam Seller", "sam@example.edu"))
            .with_member(profile("buyer-1", "Riley Buyer", "riley@example.edu")),
    );
    let engine = LifecycleEngine::new(
        Arc::clone(&store),
        Arc::clone(&notifier) as Arc<dyn uni_lifecycle::Notifier>,
        directory,
    );
    TestRig {
        engine,
        store,
        notifier,
    }
}

pub fn profile(member_id: &str, display_name: &str, email: &str) -> MemberProfile {
    MemberProfile {
        member_id: member_id.to_string(),
        display_name: display_name.to_string(),
        email: email.to_string(),
    }
}

/// Insert an AVAILABLE listing owned by `seller_id`.
pub async fn listed_product(store: &MemoryStore, seller_id: &str) -> anyhow::Result<Product> {
    use uni_lifecycle::Store;
    store
        .insert_product(NewProduct {
            seller_id: seller_id.to_string(),
            title: "Used textbook".to_string(),
            price_cents: 2_500,
        })
        .await
}
