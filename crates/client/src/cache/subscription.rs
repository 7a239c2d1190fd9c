//! Change notifications for cache consumers.

use tokio::sync::broadcast;
use tracing::warn;

use super::key::CacheKey;

/// A change to cached state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// The key is stale; the next read refetches.
    Invalidated(CacheKey),
    /// A fresh value was stored for the key.
    Refreshed(CacheKey),
    /// Every entry was dropped (session ended or restarted).
    Cleared,
    /// The subscriber fell behind and missed this many events.
    Missed(u64),
}

impl CacheEvent {
    /// Whether a subscriber watching `watched` needs to see this event.
    #[must_use]
    pub fn concerns(&self, watched: &CacheKey) -> bool {
        match self {
            Self::Invalidated(key) | Self::Refreshed(key) => {
                key.covers(watched) || watched.covers(key)
            }
            Self::Cleared | Self::Missed(_) => true,
        }
    }
}

/// Receives cache events, optionally restricted to one key family.
///
/// A consumer awaits [`CacheSubscription::recv`] and re-reads through the
/// cache when an event arrives. Dropping the subscription unsubscribes.
pub struct CacheSubscription {
    receiver: broadcast::Receiver<CacheEvent>,
    watched: Option<CacheKey>,
}

impl CacheSubscription {
    pub(super) const fn new(
        receiver: broadcast::Receiver<CacheEvent>,
        watched: Option<CacheKey>,
    ) -> Self {
        Self { receiver, watched }
    }

    /// Wait for the next relevant event. Returns `None` once the cache is
    /// dropped.
    pub async fn recv(&mut self) -> Option<CacheEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.watched.as_ref().is_none_or(|key| event.concerns(key)) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Cache subscriber lagged behind");
                    return Some(CacheEvent::Missed(skipped));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Return an already-queued relevant event without waiting.
    pub fn try_recv(&mut self) -> Option<CacheEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.watched.as_ref().is_none_or(|key| event.concerns(key)) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    return Some(CacheEvent::Missed(skipped));
                }
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_products_invalidation_concerns_category_watchers() {
        let event = CacheEvent::Invalidated(CacheKey::Products);
        assert!(event.concerns(&CacheKey::ProductsByCategory("Tools".into())));
        assert!(event.concerns(&CacheKey::Products));
        assert!(!event.concerns(&CacheKey::Inquiries));
    }

    #[test]
    fn test_derived_refresh_concerns_root_watchers() {
        let event = CacheEvent::Refreshed(CacheKey::ProductsSearch("till".into()));
        assert!(event.concerns(&CacheKey::Products));
        assert!(!event.concerns(&CacheKey::ProductsSearch("drill".into())));
    }

    #[test]
    fn test_clear_concerns_everyone() {
        assert!(CacheEvent::Cleared.concerns(&CacheKey::Cart));
    }
}
