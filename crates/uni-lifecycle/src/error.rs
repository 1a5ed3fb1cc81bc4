//! Typed error surface of the lifecycle engine.
//!
//! Every operation fails with exactly one of these kinds; callers map them
//! to their own boundary (the daemon maps to HTTP status codes). None are
//! retried automatically by the engine.

// ---------------------------------------------------------------------------
// LifecycleError
// ---------------------------------------------------------------------------

/// The reason a lifecycle operation was refused or failed.
///
/// Implements `std::error::Error` so it can be boxed and propagated through
/// `Box<dyn Error>` chains without extra wrapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// Entity id did not resolve. Carries the entity kind ("product",
    /// "order") for the caller's message.
    NotFound(&'static str),
    /// Actor lacks permission for this actor/entity pair.
    Forbidden(&'static str),
    /// Entity is not in a state from which the requested transition is
    /// defined.
    InvalidTransition {
        entity: &'static str,
        from: &'static str,
        op: &'static str,
    },
    /// Operation is structurally valid but rejected for a caller-visible
    /// reason (self-purchase, chat not open yet, chat read-only, ...).
    InvalidOperation(&'static str),
    /// Delivery-code mismatch. The stored code is retained so the seller
    /// may retry.
    InvalidCode,
    /// A concurrent transition won the race; re-submitting is a caller
    /// decision.
    Conflict(&'static str),
    /// Persistence adapter failure. Carries the flattened error chain.
    Storage(String),
}

impl std::fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleError::NotFound(entity) => write!(f, "{entity} not found"),
            LifecycleError::Forbidden(reason) => write!(f, "forbidden: {reason}"),
            LifecycleError::InvalidTransition { entity, from, op } => {
                write!(f, "invalid transition: {op} not defined for {entity} in {from}")
            }
            LifecycleError::InvalidOperation(reason) => write!(f, "invalid operation: {reason}"),
            LifecycleError::InvalidCode => write!(f, "delivery code mismatch"),
            LifecycleError::Conflict(reason) => write!(f, "conflict: {reason}"),
            LifecycleError::Storage(chain) => write!(f, "storage failure: {chain}"),
        }
    }
}

impl std::error::Error for LifecycleError {}

impl From<anyhow::Error> for LifecycleError {
    fn from(e: anyhow::Error) -> Self {
        // `{:#}` flattens the context chain into one line.
        LifecycleError::Storage(format!("{e:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_failed_transition() {
        let e = LifecycleError::InvalidTransition {
            entity: "order",
            from: "COMPLETED",
            op: "cancel",
        };
        let msg = e.to_string();
        assert!(msg.contains("cancel"), "got: {msg}");
        assert!(msg.contains("COMPLETED"), "got: {msg}");
    }

    #[test]
    fn storage_wraps_anyhow_context_chain() {
        let inner = anyhow::anyhow!("connection refused").context("fetch_order failed");
        let e = LifecycleError::from(inner);
        match &e {
            LifecycleError::Storage(chain) => {
                assert!(chain.contains("fetch_order failed"), "got: {chain}");
                assert!(chain.contains("connection refused"), "got: {chain}");
            }
            other => panic!("expected Storage, got {other:?}"),
        }
    }
}
