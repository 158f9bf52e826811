// ==============================================================================
// shared latest-reading state
// ==============================================================================
// the ingestion handler is the only writer; /latest and /health read.
//
// we use arc<rwlock<>> for sharing between request tasks:
// - arc: reference-counted pointer, cloned into every handler
// - rwlock: many readers OR one writer. a commit swaps the whole value under
//   the write guard, so a reader never sees fields from two readings.

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::LatestState;

#[derive(Clone, Default)]
pub struct StateCell {
    inner: Arc<RwLock<LatestState>>,
}

impl StateCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// replace the whole state, returning what was there
    pub async fn replace(&self, next: LatestState) -> LatestState {
        let mut guard = self.inner.write().await;
        std::mem::replace(&mut *guard, next)
    }

    pub async fn snapshot(&self) -> LatestState {
        self.inner.read().await.clone()
    }

    pub async fn last_time(&self) -> String {
        self.inner.read().await.time.clone()
    }
}
