//! Remote calls to the POS server.
//!
//! The [`PosRemote`] trait decouples the retrieval chain from the transport.
//! [`HttpRemote`] talks to the real server; [`InMemoryRemote`] serves canned
//! responses and counts calls, for tests.

use crate::error::Result;
use crate::model::{ImageBytes, InvoiceId, OrderReference};
use serde::{Deserialize, Serialize};
use std::future::Future;

#[cfg(feature = "http")]
pub mod http;
pub mod inmemory;

#[cfg(feature = "http")]
pub use http::HttpRemote;
pub use inmemory::InMemoryRemote;

/// Route resolving an order reference to its invoice.
pub const ORDER_INVOICE_ROUTE: &str = "/pos/get_order_invoice";

/// Route returning the fiscal PDF (or its rasterized image) for an invoice.
pub const HKA_PDF_ROUTE: &str = "/pos/get_hka_pdf";

/// Result of `/pos/get_order_invoice`.
///
/// A response without `invoice_id` and without a transport error means the
/// order is not invoiced yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderInvoiceResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<InvoiceId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos_reference: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_tried: Option<String>,
}

impl OrderInvoiceResponse {
    pub fn invoiced(invoice_id: impl Into<String>) -> Self {
        OrderInvoiceResponse {
            invoice_id: Some(InvoiceId::new(invoice_id)),
            success: Some(true),
            ..Default::default()
        }
    }

    pub fn not_invoiced(error: impl Into<String>) -> Self {
        OrderInvoiceResponse {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// The invoice id, only when the server reported success and sent a
    /// non-empty id.
    pub fn resolved_id(&self) -> Option<&InvoiceId> {
        match (&self.invoice_id, self.success) {
            (Some(id), Some(true)) if !id.is_empty() => Some(id),
            _ => None,
        }
    }
}

/// Result of `/pos/get_hka_pdf`.
///
/// `image_data` is an already rasterized image; `pdf_data` is the raw PDF
/// and needs client-side conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HkaPdfResponse {
    #[serde(default)]
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<ImageBytes>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_data: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HkaPdfResponse {
    pub fn image(image_data: impl Into<String>) -> Self {
        HkaPdfResponse {
            success: true,
            image_data: Some(ImageBytes::new(image_data)),
            ..Default::default()
        }
    }

    pub fn pdf(pdf_data: impl Into<String>) -> Self {
        HkaPdfResponse {
            success: true,
            pdf_data: Some(pdf_data.into()),
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        HkaPdfResponse {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Trait for the two server calls the retrieval chain depends on.
///
/// Implementations own timeouts and authentication. Neither method retries.
pub trait PosRemote: Send + Sync + 'static {
    /// Look up the invoice for an order.
    ///
    /// # Errors
    /// Returns `Error::RemoteFault` on transport, status or decode failure.
    fn get_order_invoice(
        &self,
        reference: &OrderReference,
    ) -> impl Future<Output = Result<OrderInvoiceResponse>> + Send;

    /// Fetch the fiscal PDF or its image for an invoice.
    ///
    /// # Errors
    /// Returns `Error::RemoteFault` on transport, status or decode failure.
    fn get_hka_pdf(
        &self,
        invoice_id: &InvoiceId,
    ) -> impl Future<Output = Result<HkaPdfResponse>> + Send;
}
