//! Receipt image service: the order → invoice → image chain.
//!
//! Composes [`InvoiceResolver`], [`ImageCache`] and [`Rasterizer`] behind one
//! cheaply clonable handle that a POS session owns.

use crate::backend::{ImageBackend, InMemoryBackend};
use crate::cache::ImageCache;
use crate::error::{Error, Result};
use crate::model::{FetchState, InvoiceId, OrderData, ReceiptImage, RenderPayload};
use crate::rasterize::Rasterizer;
use crate::remote::PosRemote;
use crate::render::RenderContext;
use crate::resolver::InvoiceResolver;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Status text when the server confirms an invoice but sends no image.
pub const IMAGE_MISSING_MESSAGE: &str = "Failed to get image data";

/// High-level receipt image service.
///
/// Clones share the remote, the cache and the rasterizer.
///
/// # Example
///
/// ```ignore
/// use hka_receipt::{ReceiptImageService, remote::HttpRemote, config::ReceiptConfig};
///
/// let config = ReceiptConfig::from_env()?;
/// let service = ReceiptImageService::new(HttpRemote::new(&config)?);
///
/// // Printing path: always yields a payload, with the image when available.
/// let payload = service.export_for_printing(order).await;
/// ```
pub struct ReceiptImageService<R: PosRemote, B: ImageBackend = InMemoryBackend> {
    remote: Arc<R>,
    resolver: InvoiceResolver<R>,
    cache: ImageCache<B>,
    rasterizer: Rasterizer,
}

impl<R: PosRemote, B: ImageBackend> Clone for ReceiptImageService<R, B> {
    fn clone(&self) -> Self {
        ReceiptImageService {
            remote: Arc::clone(&self.remote),
            resolver: self.resolver.clone(),
            cache: self.cache.clone(),
            rasterizer: self.rasterizer.clone(),
        }
    }
}

impl<R: PosRemote> ReceiptImageService<R, InMemoryBackend> {
    /// Service with a fresh in-memory cache and no PDF rendering.
    pub fn new(remote: R) -> Self {
        Self::with_cache(remote, ImageCache::new(InMemoryBackend::new()))
    }
}

#[cfg(feature = "http")]
impl ReceiptImageService<crate::remote::HttpRemote, InMemoryBackend> {
    /// Service talking HTTP to the configured server.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if the configuration is invalid.
    pub fn from_config(config: &crate::config::ReceiptConfig) -> Result<Self> {
        let remote = crate::remote::HttpRemote::new(config)?;
        let rasterizer = Rasterizer::unavailable().with_scale(config.render_scale);
        Ok(Self::new(remote).with_rasterizer(rasterizer))
    }
}

impl<R: PosRemote, B: ImageBackend> ReceiptImageService<R, B> {
    /// Service over an explicitly constructed cache.
    pub fn with_cache(remote: R, cache: ImageCache<B>) -> Self {
        let remote = Arc::new(remote);
        ReceiptImageService {
            resolver: InvoiceResolver::new(Arc::clone(&remote)),
            remote,
            cache,
            rasterizer: Rasterizer::unavailable(),
        }
    }

    /// Replace the rasterizer used for PDF responses.
    pub fn with_rasterizer(mut self, rasterizer: Rasterizer) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn cache(&self) -> &ImageCache<B> {
        &self.cache
    }

    pub fn resolver(&self) -> &InvoiceResolver<R> {
        &self.resolver
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Resolve the order's invoice and return its image.
    ///
    /// # Errors
    /// - `Error::MissingReference`: the order carries no reference
    /// - `Error::NotInvoiced`: the order has no invoice yet
    /// - `Error::RemoteFault`: transport or server failure, or the server
    ///   sent no image data
    /// - `Error::ConversionError`: a PDF response could not be rasterized
    pub async fn fetch_receipt_image(&self, order: &OrderData) -> Result<ReceiptImage> {
        let invoice_id = self.resolver.resolve_order(order).await?.into_invoice_id()?;
        self.invoice_image(&invoice_id).await
    }

    /// Image for a known invoice, served from the cache when present.
    ///
    /// # Errors
    /// Same as [`fetch_receipt_image`](Self::fetch_receipt_image), minus the
    /// resolution errors.
    pub async fn invoice_image(&self, invoice_id: &InvoiceId) -> Result<ReceiptImage> {
        let remote = Arc::clone(&self.remote);
        let rasterizer = self.rasterizer.clone();

        self.cache
            .get_or_fetch(invoice_id, move |id| async move {
                fetch_remote_image(remote.as_ref(), &rasterizer, &id).await
            })
            .await?
            .ok_or_else(|| Error::RemoteFault(IMAGE_MISSING_MESSAGE.to_string()))
    }

    /// Run the chain and fold the outcome into a [`FetchState`].
    pub async fn load_state(&self, order: &OrderData) -> FetchState {
        match self.fetch_receipt_image(order).await {
            Ok(image) => FetchState::ready(image),
            Err(e) => {
                warn!("Receipt image unavailable: {}", e);
                FetchState::failed(e.status_message())
            }
        }
    }

    /// Build the print payload, attaching the image when one is available.
    ///
    /// Never fails: the base payload is produced even when the chain errors.
    pub async fn export_for_printing(&self, order: OrderData) -> RenderPayload {
        let image = self.fetch_receipt_image(&order).await;
        let mut payload = RenderPayload::new(order);

        match image {
            Ok(image) => payload.attach(&image),
            Err(e) => debug!("Printing without invoice image: {}", e),
        }

        payload
    }

    /// Re-run the chain in the background and publish the result to `ctx`.
    ///
    /// The context switches to loading immediately. When the chain finishes
    /// the new state is published, unless the context has been cancelled or
    /// dropped by then, in which case the result is discarded.
    pub fn spawn_reprint(&self, ctx: &RenderContext, order: OrderData) -> JoinHandle<()> {
        ctx.publish(FetchState::loading());

        let service = self.clone();
        let handle = ctx.handle();

        tokio::spawn(async move {
            let cancel = handle.cancel_token().clone();
            let state = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Reprint cancelled before completion");
                    return;
                }
                state = service.load_state(&order) => state,
            };

            if !handle.publish(state) {
                debug!("Render context gone, discarding reprint result");
            }
        })
    }
}

/// Fetch an invoice image from the server, rasterizing PDF responses.
///
/// `Ok(None)` means the server succeeded but sent nothing usable.
async fn fetch_remote_image<R: PosRemote>(
    remote: &R,
    rasterizer: &Rasterizer,
    invoice_id: &InvoiceId,
) -> Result<Option<ReceiptImage>> {
    let response = remote.get_hka_pdf(invoice_id).await?;

    if !response.success {
        let reason = response
            .error
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| IMAGE_MISSING_MESSAGE.to_string());
        return Err(Error::RemoteFault(reason));
    }

    if let Some(image) = response.image_data.filter(|data| !data.payload().is_empty()) {
        return Ok(Some(ReceiptImage::Image(image)));
    }

    match response.pdf_data.filter(|pdf| !pdf.is_empty()) {
        Some(pdf) => rasterizer.rasterize(&pdf).await.map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ImageBytes;
    use crate::rasterize::{DocumentRenderer, PagedDocument};
    use crate::remote::{HkaPdfResponse, InMemoryRemote, OrderInvoiceResponse};

    fn invoiced_remote() -> InMemoryRemote {
        let remote = InMemoryRemote::new();
        remote.insert_invoice("POS/0042", Ok(OrderInvoiceResponse::invoiced("INV-77")));
        remote.insert_pdf("INV-77", Ok(HkaPdfResponse::image("AAAA")));
        remote
    }

    fn order() -> OrderData {
        OrderData::new(Some("POS/0042"), None)
    }

    #[tokio::test]
    async fn test_fetch_receipt_image() {
        let service = ReceiptImageService::new(invoiced_remote());

        let image = service
            .fetch_receipt_image(&order())
            .await
            .expect("Failed to fetch image");

        assert_eq!(image, ReceiptImage::Image(ImageBytes::new("AAAA")));
        assert_eq!(service.cache().len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_success_without_data_is_a_fault() {
        let remote = InMemoryRemote::new();
        remote.insert_invoice("POS/0042", Ok(OrderInvoiceResponse::invoiced("INV-77")));
        remote.insert_pdf(
            "INV-77",
            Ok(HkaPdfResponse {
                success: true,
                ..Default::default()
            }),
        );
        let service = ReceiptImageService::new(remote);

        let result = service.fetch_receipt_image(&order()).await;

        assert_eq!(
            result,
            Err(Error::RemoteFault(IMAGE_MISSING_MESSAGE.to_string()))
        );
        assert_eq!(service.cache().len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_server_failure_carries_reason() {
        let remote = InMemoryRemote::new();
        remote.insert_invoice("POS/0042", Ok(OrderInvoiceResponse::invoiced("INV-77")));
        remote.insert_pdf("INV-77", Ok(HkaPdfResponse::failure("No PDF data found")));
        let service = ReceiptImageService::new(remote);

        let state = service.load_state(&order()).await;

        assert_eq!(state, FetchState::failed("No PDF data found"));
    }

    #[tokio::test]
    async fn test_pdf_without_renderer_is_passed_through() {
        let remote = InMemoryRemote::new();
        remote.insert_invoice("POS/0042", Ok(OrderInvoiceResponse::invoiced("INV-77")));
        remote.insert_pdf("INV-77", Ok(HkaPdfResponse::pdf("JVBERi0=")));
        let service = ReceiptImageService::new(remote);

        let payload = service.export_for_printing(order()).await;

        assert_eq!(payload.hka_pdf_image, None);
        assert_eq!(payload.hka_pdf_data.as_deref(), Some("JVBERi0="));
    }

    struct CorruptDocumentRenderer;

    impl DocumentRenderer for CorruptDocumentRenderer {
        fn load<'a>(&'a self, _bytes: &'a [u8]) -> Result<Box<dyn PagedDocument + 'a>> {
            Err(Error::ConversionError("Failed to load PDF: corrupt".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_rasterization_reports_error_and_caches_nothing() {
        let remote = InMemoryRemote::new();
        remote.insert_invoice("POS/0042", Ok(OrderInvoiceResponse::invoiced("INV-77")));
        remote.insert_pdf("INV-77", Ok(HkaPdfResponse::pdf("JVBERi0=")));
        let service = ReceiptImageService::new(remote)
            .with_rasterizer(Rasterizer::new(Arc::new(CorruptDocumentRenderer)));

        let state = service.load_state(&order()).await;

        assert!(!state.is_loading);
        assert_eq!(state.error.as_deref(), Some("Failed to load PDF: corrupt"));
        assert_eq!(state.image, None);
        assert_eq!(service.cache().len().await.unwrap(), 0);
        assert_eq!(service.cache().in_flight(), 0);

        let payload = service.export_for_printing(order()).await;
        assert!(!payload.has_invoice_image());
        assert_eq!(service.remote().pdf_calls(), 2);
    }

    #[tokio::test]
    async fn test_load_state_reports_missing_reference() {
        let service = ReceiptImageService::new(InMemoryRemote::new());

        let state = service.load_state(&OrderData::default()).await;

        assert_eq!(
            state,
            FetchState::failed("No valid reference found in order data")
        );
        assert_eq!(service.remote().total_calls(), 0);
    }

    #[tokio::test]
    async fn test_export_for_printing_keeps_order_fields() {
        let remote = InMemoryRemote::new();
        remote.insert_invoice(
            "POS/0042",
            Ok(OrderInvoiceResponse::not_invoiced("No invoice found for this order")),
        );
        let service = ReceiptImageService::new(remote);
        let order = order().with_field("amount_total", serde_json::json!(12.5));

        let payload = service.export_for_printing(order.clone()).await;

        assert_eq!(payload.order, order);
        assert!(!payload.has_invoice_image());
    }

    #[tokio::test]
    async fn test_spawn_reprint_publishes_state() {
        let service = ReceiptImageService::new(invoiced_remote());
        let ctx = RenderContext::new();

        let task = service.spawn_reprint(&ctx, order());
        assert!(ctx.state().is_loading);

        task.await.expect("Reprint task panicked");

        let state = ctx.state();
        assert!(!state.is_loading);
        assert_eq!(state.image, Some(ReceiptImage::Image(ImageBytes::new("AAAA"))));
    }
}
