use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// In-memory store of authorization headers keyed by token scope, each entry
/// expiring after the TTL announced by the token endpoint.
#[derive(Debug, Default)]
pub struct TokenCache {
    store: RwLock<HashMap<String, (String, Instant)>>,
    counter: AtomicUsize,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn store(&self, key: &str, value: &str, expires_in: u64) {
        let count = self.counter.fetch_add(1, Ordering::Relaxed);

        let mut store = self.store.write().await;

        if count % 1000 == 0 {
            let now = Instant::now();
            store.retain(|_, &mut (_, expiry)| expiry > now);
        }

        store.insert(
            key.to_string(),
            (
                value.to_string(),
                Instant::now() + Duration::from_secs(expires_in),
            ),
        );
    }

    pub async fn retrieve(&self, key: &str) -> Option<String> {
        let store = self.store.read().await;
        match store.get(key) {
            Some((value, expiry)) if *expiry > Instant::now() => Some(value.clone()),
            _ => None,
        }
    }
}
