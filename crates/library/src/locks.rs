//! Per-book serialization of rename cascades

use audioshelf_core::BookId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Held for the duration of one book's cascade
pub type BookGuard = OwnedMutexGuard<()>;

/// Hands out one async mutex per book
#[derive(Debug, Clone, Default)]
pub struct BookLocks {
    inner: Arc<Mutex<HashMap<BookId, Arc<AsyncMutex<()>>>>>,
}

impl BookLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, id: BookId) -> Arc<AsyncMutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        // Drop entries nobody holds or waits on.
        map.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(map.entry(id).or_default())
    }

    pub async fn lock(&self, id: BookId) -> BookGuard {
        self.handle(id).lock_owned().await
    }

    /// Locks several books in id order so overlapping callers cannot deadlock
    pub async fn lock_many(&self, ids: &[BookId]) -> Vec<BookGuard> {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();

        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            guards.push(self.lock(id).await);
        }
        guards
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.inner.lock().map(|m| m.len()).unwrap_or(0)
    }
}
