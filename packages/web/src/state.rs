use std::sync::Arc;

use api::{Provider, SessionGate};

/// Shared by every handler.
pub struct AppState<S> {
    pub store: S,
    pub provider: Arc<Provider<S>>,
    pub gate: SessionGate,
}

impl<S> AppState<S> {
    pub fn new(store: S, provider: Provider<S>, gate: SessionGate) -> Self {
        Self {
            store,
            provider: Arc::new(provider),
            gate,
        }
    }
}

// Manual impl: `Provider` itself is not `Clone`
impl<S: Clone> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            provider: Arc::clone(&self.provider),
            gate: self.gate,
        }
    }
}
