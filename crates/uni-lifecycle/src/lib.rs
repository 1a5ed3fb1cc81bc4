//! uni-lifecycle
//!
//! The transactional lifecycle engine for peer-to-peer sales:
//! - coupled Product/Order state machines with explicit transition rules
//! - the one-time delivery-code handshake that gates irreversible completion
//! - chat-access gating on the order's lifecycle state
//!
//! Architectural decisions:
//! - Every multi-field transition (reserve, cancel, verify) is a single
//!   atomic unit in the [`Store`]; the engine never read-checks-writes
//!   across two store calls for state it relies on.
//! - Races surface as [`LifecycleError::Conflict`]; the loser observes the
//!   winner's effect and fails cleanly, never silently overwrites.
//! - Notifications are detached background work; their failures are logged
//!   and swallowed, never rolled back into the triggering transition.
//!
//! Deterministic, transport-free. The HTTP surface lives in `uni-daemon`;
//! persistence implementations live in `uni-db` (Postgres) and
//! `uni-testkit` (in-memory).

mod dispatch;
mod engine;
mod error;
mod otp;
mod ports;
mod store;
mod transition;

pub use engine::LifecycleEngine;
pub use error::LifecycleError;
pub use otp::{generate_delivery_code, CODE_WIDTH};
pub use ports::{Directory, Notifier};
pub use store::Store;
pub use transition::{order_can_transition, product_can_transition};
