//! Storage backends for fetched invoice images.

use crate::error::Result;
use crate::model::{InvoiceId, ReceiptImage};
use std::future::Future;

pub mod inmemory;

pub use inmemory::InMemoryBackend;

/// Trait for image storage implementations.
///
/// Entries are write-once: a stored invoice image is never replaced, so
/// concurrent writers racing on the same key cannot corrupt anything. There
/// is no TTL and no eviction; the only way to drop entries is `clear`, which
/// the owning session calls when it ends.
///
/// **IMPORTANT:** All methods use `&self`. Implementations should use
/// interior mutability or external storage.
///
/// **ASYNC:** All methods return `Send` futures so the cache can drive them
/// from spawned tasks.
pub trait ImageBackend: Send + Sync + Clone + 'static {
    /// Retrieve the image stored for an invoice.
    ///
    /// # Returns
    /// - `Ok(Some(image))` - Image present
    /// - `Ok(None)` - Nothing stored for this invoice
    ///
    /// # Errors
    /// Returns `Err` if the storage is unavailable.
    fn get(&self, id: &InvoiceId) -> impl Future<Output = Result<Option<ReceiptImage>>> + Send;

    /// Store an image unless one is already present.
    ///
    /// # Returns
    /// - `Ok(true)` - The image was stored
    /// - `Ok(false)` - An entry already existed and was kept
    ///
    /// # Errors
    /// Returns `Err` if the storage is unavailable.
    fn insert_if_absent(
        &self,
        id: &InvoiceId,
        image: ReceiptImage,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Number of stored images.
    ///
    /// # Errors
    /// Returns `Err` if the storage is unavailable.
    fn len(&self) -> impl Future<Output = Result<usize>> + Send;

    /// Drop every entry. Called at session end.
    ///
    /// # Errors
    /// Returns `Err` if the storage is unavailable.
    fn clear(&self) -> impl Future<Output = Result<()>> + Send;

    /// Check if an image is stored (optional optimization).
    ///
    /// # Errors
    /// Returns `Err` if the storage is unavailable.
    fn contains(&self, id: &InvoiceId) -> impl Future<Output = Result<bool>> + Send {
        async move { Ok(self.get(id).await?.is_some()) }
    }

    /// Health check - verify the storage is accessible.
    ///
    /// # Errors
    /// Returns `Err` if the storage is not accessible.
    fn health_check(&self) -> impl Future<Output = Result<bool>> + Send {
        async { Ok(true) }
    }
}
