//! Shared state handed to every route handler.

use uni_lifecycle::{LifecycleEngine, Store};

#[derive(Debug, Clone, Copy)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Everything a handler needs, generic over the store so tests run against
/// the in-memory one.
pub struct AppState<S> {
    pub engine: LifecycleEngine<S>,
    pub build: BuildInfo,
}

impl<S: Store> AppState<S> {
    pub fn new(engine: LifecycleEngine<S>) -> Self {
        Self {
            engine,
            build: BuildInfo {
                service: "uni-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
        }
    }
}
