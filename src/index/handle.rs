use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::VectorIndex;

/// Shared pointer to the index currently being served.
///
/// Readers clone the `Arc` and search that snapshot without holding the lock;
/// a rebuild replaces the whole index at once.
#[derive(Debug, Default)]
pub struct IndexHandle {
    current: RwLock<Option<Arc<VectorIndex>>>,
}

impl IndexHandle {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_index(index: VectorIndex) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(index))),
        }
    }

    #[inline]
    pub async fn snapshot(&self) -> Option<Arc<VectorIndex>> {
        self.current.read().await.clone()
    }

    #[inline]
    pub async fn is_initialized(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Install `index`, returning the one it replaced
    #[inline]
    pub async fn swap(&self, index: VectorIndex) -> Option<Arc<VectorIndex>> {
        let next = Arc::new(index);
        let mut guard = self.current.write().await;
        debug!("Swapping in index with {} documents", next.len());
        guard.replace(next)
    }
}
