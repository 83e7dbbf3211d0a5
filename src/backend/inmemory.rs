//! In-memory image backend (default, thread-safe, async).
//!
//! Uses DashMap for lock-free concurrent access with per-key sharding.

use super::ImageBackend;
use crate::error::Result;
use crate::model::{InvoiceId, ReceiptImage};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Thread-safe in-memory image store.
///
/// Clones share the same map, so the backend can be handed to the cache and
/// kept by the session for `clear` at logout.
///
/// # Example
///
/// ```no_run
/// use hka_receipt::backend::{ImageBackend, InMemoryBackend};
/// use hka_receipt::model::{ImageBytes, InvoiceId, ReceiptImage};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let backend = InMemoryBackend::new();
///     let id = InvoiceId::new("77");
///
///     backend
///         .insert_if_absent(&id, ReceiptImage::Image(ImageBytes::new("AAAA")))
///         .await?;
///     assert!(backend.get(&id).await?.is_some());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct InMemoryBackend {
    store: Arc<DashMap<InvoiceId, ReceiptImage>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        InMemoryBackend {
            store: Arc::new(DashMap::new()),
        }
    }

    /// Get memory statistics.
    pub fn stats(&self) -> BackendStats {
        let mut stats = BackendStats {
            total_entries: self.store.len(),
            ..BackendStats::default()
        };

        for entry in self.store.iter() {
            match entry.value() {
                ReceiptImage::Image(bytes) => {
                    stats.images += 1;
                    stats.total_bytes += bytes.as_str().len();
                }
                ReceiptImage::Document(pdf) => {
                    stats.documents += 1;
                    stats.total_bytes += pdf.len();
                }
            }
        }

        stats
    }

    /// Print statistics to the debug log.
    pub fn log_stats(&self) {
        let stats = self.stats();
        debug!(
            "Image store: {} entries ({} images, {} documents), {} bytes",
            stats.total_entries, stats.images, stats.documents, stats.total_bytes
        );
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBackend for InMemoryBackend {
    async fn get(&self, id: &InvoiceId) -> Result<Option<ReceiptImage>> {
        match self.store.get(id) {
            Some(entry) => {
                debug!("✓ InMemory GET {} -> HIT", id);
                Ok(Some(entry.value().clone()))
            }
            None => {
                debug!("✓ InMemory GET {} -> MISS", id);
                Ok(None)
            }
        }
    }

    async fn insert_if_absent(&self, id: &InvoiceId, image: ReceiptImage) -> Result<bool> {
        match self.store.entry(id.clone()) {
            Entry::Occupied(_) => {
                debug!("InMemory SET {} skipped, entry already present", id);
                Ok(false)
            }
            Entry::Vacant(slot) => {
                slot.insert(image);
                debug!("✓ InMemory SET {}", id);
                Ok(true)
            }
        }
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.store.len())
    }

    async fn clear(&self) -> Result<()> {
        self.store.clear();
        info!("InMemory CLEAR executed, image store emptied");
        Ok(())
    }

    async fn contains(&self, id: &InvoiceId) -> Result<bool> {
        Ok(self.store.contains_key(id))
    }
}

/// Store statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackendStats {
    pub total_entries: usize,
    pub images: usize,
    pub documents: usize,
    pub total_bytes: usize,
}
