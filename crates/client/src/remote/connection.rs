use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use machinery_store_core::Principal;

use super::StoreBackend;

/// The active remote session, if any.
///
/// Holds at most one backend. Swapping it is the only way the caller
/// identity changes.
#[derive(Default)]
pub struct Connection {
    backend: RwLock<Option<Arc<dyn StoreBackend>>>,
    session: AtomicU64,
}

impl Connection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active backend. Returns the previous one.
    pub fn connect(&self, backend: Arc<dyn StoreBackend>) -> Option<Arc<dyn StoreBackend>> {
        let mut slot = self.backend.write().unwrap_or_else(PoisonError::into_inner);
        self.session.fetch_add(1, Ordering::SeqCst);
        slot.replace(backend)
    }

    /// Drop the active backend. Returns it, if there was one.
    pub fn disconnect(&self) -> Option<Arc<dyn StoreBackend>> {
        let mut slot = self.backend.write().unwrap_or_else(PoisonError::into_inner);
        self.session.fetch_add(1, Ordering::SeqCst);
        slot.take()
    }

    /// Counter that changes on every `connect` and `disconnect`.
    #[must_use]
    pub fn session(&self) -> u64 {
        self.session.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.backend
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Principal of the active backend. `None` when disconnected or anonymous.
    #[must_use]
    pub fn identity(&self) -> Option<Principal> {
        self.backend().and_then(|b| b.caller().cloned())
    }

    /// Snapshot of the active backend.
    #[must_use]
    pub fn backend(&self) -> Option<Arc<dyn StoreBackend>> {
        self.backend
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("connected", &self.is_connected())
            .field("identity", &self.identity())
            .finish()
    }
}
