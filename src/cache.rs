//! Invoice image cache - at most one fetch per invoice.

use crate::backend::ImageBackend;
use crate::error::{Error, Result};
use crate::model::{InvoiceId, ReceiptImage};
use crate::observability::{CacheMetrics, NoOpMetrics};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;

type SharedFetch = Shared<BoxFuture<'static, Result<Option<ReceiptImage>>>>;

/// In-flight fetches, tagged with the generation that started them.
type PendingMap = DashMap<InvoiceId, (u64, SharedFetch)>;

/// Session-owned cache of invoice images keyed by invoice id.
///
/// - A stored image is returned without calling the fetcher, and is never
///   re-fetched or replaced.
/// - On a miss the fetcher runs once, on its own task. Concurrent callers for
///   the same id attach to that single in-flight fetch and all get its result.
///   A caller that is dropped only loses interest: the fetch still completes,
///   stores its image and leaves the in-flight map.
/// - Only `Ok(Some(_))` results are stored. `Ok(None)` and errors are
///   returned to every waiter and forgotten, so the next call retries.
///
/// Clones share the store and the in-flight map. `get_or_fetch` must be
/// called from within a Tokio runtime.
///
/// # Example
///
/// ```ignore
/// use hka_receipt::{ImageCache, backend::InMemoryBackend};
///
/// let cache = ImageCache::new(InMemoryBackend::new());
/// let image = cache
///     .get_or_fetch(&invoice_id, |id| async move { remote_fetch(id).await })
///     .await?;
/// ```
#[derive(Clone)]
pub struct ImageCache<B: ImageBackend> {
    backend: B,
    pending: Arc<PendingMap>,
    generation: Arc<AtomicU64>,
    metrics: Arc<dyn CacheMetrics>,
}

/// Removes one fetch's in-flight entry when its task ends, unless the slot
/// was since taken by a newer fetch.
struct PendingSlot {
    pending: Arc<PendingMap>,
    id: InvoiceId,
    generation: u64,
}

impl Drop for PendingSlot {
    fn drop(&mut self) {
        self.pending
            .remove_if(&self.id, |_, (generation, _)| *generation == self.generation);
    }
}

impl<B: ImageBackend> ImageCache<B> {
    /// Create a cache over the given backend.
    pub fn new(backend: B) -> Self {
        ImageCache {
            backend,
            pending: Arc::new(DashMap::new()),
            generation: Arc::new(AtomicU64::new(0)),
            metrics: Arc::new(NoOpMetrics),
        }
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Box<dyn CacheMetrics>) -> Self {
        self.metrics = Arc::from(metrics);
        self
    }

    /// Return the cached image for `id`, fetching it on a miss.
    ///
    /// `fetcher` is only called when nothing is stored and no fetch for `id`
    /// is already running.
    ///
    /// # Errors
    ///
    /// Returns `Err` when the backend fails or when the fetch this call ran
    /// or joined failed. Failures are not cached.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        id: &InvoiceId,
        fetcher: F,
    ) -> Result<Option<ReceiptImage>>
    where
        F: FnOnce(InvoiceId) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<ReceiptImage>>> + Send + 'static,
    {
        let timer = Instant::now();

        if let Some(image) = self.backend.get(id).await? {
            self.metrics.record_hit(id.as_str(), timer.elapsed());
            return Ok(Some(image));
        }

        self.metrics.record_miss(id.as_str());

        let (fetch, task) = match self.pending.entry(id.clone()) {
            Entry::Occupied(in_flight) => {
                debug!("» Joining in-flight fetch for invoice {}", id);
                self.metrics.record_join(id.as_str());
                (in_flight.get().1.clone(), None)
            }
            Entry::Vacant(slot) => {
                debug!("» Starting fetch for invoice {}", id);
                let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                let (fetch, task) = self.start_fetch(id.clone(), generation, fetcher);
                slot.insert((generation, fetch.clone()));
                (fetch, Some(task))
            }
        };

        // Spawned only once the entry guard is released, so the task's own
        // removal always finds its entry in place.
        if let Some(task) = task {
            tokio::spawn(task);
        }

        fetch.await
    }

    /// Build one fetch: the task that runs it and the shared future its
    /// waiters await. The task removes its in-flight entry before publishing
    /// the result.
    fn start_fetch<F, Fut>(
        &self,
        id: InvoiceId,
        generation: u64,
        fetcher: F,
    ) -> (SharedFetch, BoxFuture<'static, ()>)
    where
        F: FnOnce(InvoiceId) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<ReceiptImage>>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let backend = self.backend.clone();
        let metrics = Arc::clone(&self.metrics);
        let slot = PendingSlot {
            pending: Arc::clone(&self.pending),
            id,
            generation,
        };

        let task = async move {
            let result = Self::run_fetch(&backend, metrics.as_ref(), &slot.id, fetcher).await;
            drop(slot);
            let _ = tx.send(result);
        }
        .boxed();

        // A dropped sender means the task died before finishing.
        let fetch = async move { rx.await.unwrap_or(Err(Error::Cancelled)) }
            .boxed()
            .shared();

        (fetch, task)
    }

    async fn run_fetch<F, Fut>(
        backend: &B,
        metrics: &dyn CacheMetrics,
        id: &InvoiceId,
        fetcher: F,
    ) -> Result<Option<ReceiptImage>>
    where
        F: FnOnce(InvoiceId) -> Fut,
        Fut: Future<Output = Result<Option<ReceiptImage>>>,
    {
        // A fetch that finished between our miss and taking the slot has
        // already stored its image.
        if let Some(image) = backend.get(id).await? {
            return Ok(Some(image));
        }

        let timer = Instant::now();
        match fetcher(id.clone()).await {
            Ok(Some(image)) => {
                let stored = backend.insert_if_absent(id, image.clone()).await?;
                metrics.record_fetch(id.as_str(), timer.elapsed(), stored);
                if stored {
                    info!("✓ Cached invoice image for {}", id);
                    Ok(Some(image))
                } else {
                    Ok(Some(backend.get(id).await?.unwrap_or(image)))
                }
            }
            Ok(None) => {
                metrics.record_fetch(id.as_str(), timer.elapsed(), false);
                debug!("No image data returned for invoice {}", id);
                Ok(None)
            }
            Err(e) => {
                metrics.record_error(id.as_str(), &e.to_string());
                Err(e)
            }
        }
    }

    /// Stored image for `id`, without fetching.
    ///
    /// # Errors
    /// Returns `Err` if the backend fails.
    pub async fn peek(&self, id: &InvoiceId) -> Result<Option<ReceiptImage>> {
        self.backend.get(id).await
    }

    /// Whether an image is stored for `id`.
    ///
    /// # Errors
    /// Returns `Err` if the backend fails.
    pub async fn contains(&self, id: &InvoiceId) -> Result<bool> {
        self.backend.contains(id).await
    }

    /// Number of stored images.
    ///
    /// # Errors
    /// Returns `Err` if the backend fails.
    pub async fn len(&self) -> Result<usize> {
        self.backend.len().await
    }

    /// Number of running fetches that callers can join. Every fetch runs to
    /// completion on its own task and leaves this count when it ends, whether
    /// or not anyone is still waiting on it.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Drop every stored image and forget in-flight fetches. Session end.
    ///
    /// A fetch already running still completes for its current waiters, but
    /// later callers no longer join it. When it ends it leaves any newer fetch
    /// for the same id in place.
    ///
    /// # Errors
    /// Returns `Err` if the backend fails.
    pub async fn clear(&self) -> Result<()> {
        self.pending.clear();
        self.backend.clear().await
    }

    /// Get backend reference (for advanced use).
    pub fn backend(&self) -> &B {
        &self.backend
    }
}
