// Process-wide, lazily built handles to external resources
use crate::error::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Holds the single handle to one external resource.
///
/// The handle is built on the first `get_or_try_init` call; concurrent first
/// callers wait for that one construction. A failed construction leaves the
/// holder empty so the next call tries again. The handle is never closed.
pub struct LazyHandle<T> {
    name: &'static str,
    cell: OnceCell<Arc<T>>,
}

impl<T> LazyHandle<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            cell: OnceCell::new(),
        }
    }

    pub async fn get_or_try_init<F, Fut>(&self, build: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let handle = self
            .cell
            .get_or_try_init(|| async {
                tracing::info!("Creating {} connection", self.name);
                let handle = build().await;
                if let Err(e) = &handle {
                    tracing::error!("Failed to create {} connection: {}", self.name, e);
                }
                handle.map(Arc::new)
            })
            .await?;

        Ok(handle.clone())
    }

    #[cfg(test)]
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}
