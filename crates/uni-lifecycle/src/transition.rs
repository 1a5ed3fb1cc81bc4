//! Legal-transition matrices for the two coupled state machines.
//!
//! # State diagram
//!
//! ```text
//!  Product:  AVAILABLE ──reserve──► RESERVED ──sell──► SOLD_OUT (term.)
//!                ▲                     │
//!                └──────release────────┘
//!
//!  Order:    PENDING ──confirm──► CONFIRMED ──complete──► COMPLETED (term.)
//!               │                     │
//!               └──────cancel──────► CANCELLED (term.) ◄──cancel──┘
//! ```
//!
//! The predicates here are the single source of truth for which edges
//! exist; the engine adds actor/permission checks on top and the store
//! enforces the same edges as conditional writes so concurrent callers
//! cannot both take one.

use uni_schemas::{OrderStatus, ProductStatus};

/// Returns `true` if transitioning a product from `from` to `to` is a
/// defined edge.
pub fn product_can_transition(from: ProductStatus, to: ProductStatus) -> bool {
    use ProductStatus::*;
    matches!(
        (from, to),
        (Available, Reserved) | (Reserved, Available) | (Reserved, SoldOut)
    )
}

/// Returns `true` if transitioning an order from `from` to `to` is a
/// defined edge.
pub fn order_can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    matches!(
        (from, to),
        (Pending, Confirmed)
            | (Pending, Cancelled)
            | (Confirmed, Completed)
            | (Confirmed, Cancelled)
    )
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use uni_schemas::{OrderStatus, ProductStatus};

    const PRODUCT_STATES: [ProductStatus; 3] = [
        ProductStatus::Available,
        ProductStatus::Reserved,
        ProductStatus::SoldOut,
    ];

    const ORDER_STATES: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    #[test]
    fn sold_out_is_a_sink() {
        for to in PRODUCT_STATES {
            assert!(
                !product_can_transition(ProductStatus::SoldOut, to),
                "SOLD_OUT must have no outgoing edge, found one to {to:?}"
            );
        }
    }

    #[test]
    fn available_only_reaches_reserved() {
        assert!(product_can_transition(
            ProductStatus::Available,
            ProductStatus::Reserved
        ));
        assert!(
            !product_can_transition(ProductStatus::Available, ProductStatus::SoldOut),
            "a product cannot be sold without being reserved first"
        );
    }

    #[test]
    fn reserved_has_release_back_edge_and_sell_edge() {
        assert!(product_can_transition(
            ProductStatus::Reserved,
            ProductStatus::Available
        ));
        assert!(product_can_transition(
            ProductStatus::Reserved,
            ProductStatus::SoldOut
        ));
    }

    #[test]
    fn terminal_order_states_are_sinks() {
        for from in [OrderStatus::Completed, OrderStatus::Cancelled] {
            for to in ORDER_STATES {
                assert!(
                    !order_can_transition(from, to),
                    "{from:?} must have no outgoing edge, found one to {to:?}"
                );
            }
        }
    }

    #[test]
    fn pending_cannot_skip_to_completed() {
        assert!(!order_can_transition(
            OrderStatus::Pending,
            OrderStatus::Completed
        ));
    }

    #[test]
    fn both_live_order_states_can_cancel() {
        assert!(order_can_transition(
            OrderStatus::Pending,
            OrderStatus::Cancelled
        ));
        assert!(order_can_transition(
            OrderStatus::Confirmed,
            OrderStatus::Cancelled
        ));
    }

    #[test]
    fn no_self_loops() {
        for s in PRODUCT_STATES {
            assert!(!product_can_transition(s, s));
        }
        for s in ORDER_STATES {
            assert!(!order_can_transition(s, s));
        }
    }
}
