//! In-memory POS remote for tests.

use super::{HkaPdfResponse, OrderInvoiceResponse, PosRemote};
use crate::error::Result;
use crate::model::{InvoiceId, OrderReference};
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Canned-response remote that counts its calls.
///
/// Responses can be swapped at any time through `&self`, so a test can make
/// the first call fail and the next one succeed. Unknown references and
/// invoices get the same answers the real server gives.
///
/// # Example
///
/// ```ignore
/// let remote = InMemoryRemote::new();
/// remote.insert_invoice("POS/0042", Ok(OrderInvoiceResponse::invoiced("INV-77")));
/// remote.insert_pdf("INV-77", Ok(HkaPdfResponse::image("AAAA")));
/// ```
#[derive(Default)]
pub struct InMemoryRemote {
    invoices: DashMap<String, Result<OrderInvoiceResponse>>,
    pdfs: DashMap<InvoiceId, Result<HkaPdfResponse>>,
    invoice_calls: AtomicUsize,
    pdf_calls: AtomicUsize,
    latency: Option<Duration>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call, to let concurrent callers overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Set the `/pos/get_order_invoice` outcome for a reference.
    pub fn insert_invoice(&self, reference: &str, response: Result<OrderInvoiceResponse>) {
        self.invoices.insert(reference.to_string(), response);
    }

    /// Set the `/pos/get_hka_pdf` outcome for an invoice.
    pub fn insert_pdf(&self, invoice_id: &str, response: Result<HkaPdfResponse>) {
        self.pdfs.insert(InvoiceId::new(invoice_id), response);
    }

    /// Number of `/pos/get_order_invoice` calls made so far.
    pub fn invoice_calls(&self) -> usize {
        self.invoice_calls.load(Ordering::SeqCst)
    }

    /// Number of `/pos/get_hka_pdf` calls made so far.
    pub fn pdf_calls(&self) -> usize {
        self.pdf_calls.load(Ordering::SeqCst)
    }

    /// Total remote calls.
    pub fn total_calls(&self) -> usize {
        self.invoice_calls() + self.pdf_calls()
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl PosRemote for InMemoryRemote {
    async fn get_order_invoice(&self, reference: &OrderReference) -> Result<OrderInvoiceResponse> {
        self.invoice_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let response = self.invoices.get(reference.as_str()).map(|r| r.value().clone());
        response.unwrap_or_else(|| {
            Ok(OrderInvoiceResponse {
                error: Some("POS order not found".to_string()),
                reference_tried: Some(reference.to_string()),
                ..Default::default()
            })
        })
    }

    async fn get_hka_pdf(&self, invoice_id: &InvoiceId) -> Result<HkaPdfResponse> {
        self.pdf_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let response = self.pdfs.get(invoice_id).map(|r| r.value().clone());
        response.unwrap_or_else(|| Ok(HkaPdfResponse::failure("Invoice not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn reference(value: &str) -> OrderReference {
        OrderReference::new(value).expect("Empty reference")
    }

    #[tokio::test]
    async fn test_inmemory_remote_canned_responses() {
        let remote = InMemoryRemote::new();
        remote.insert_invoice("POS/0042", Ok(OrderInvoiceResponse::invoiced("INV-77")));
        remote.insert_pdf("INV-77", Ok(HkaPdfResponse::image("AAAA")));

        let invoice = remote
            .get_order_invoice(&reference("POS/0042"))
            .await
            .expect("Failed to resolve");
        assert_eq!(invoice.resolved_id(), Some(&InvoiceId::new("INV-77")));

        let pdf = remote
            .get_hka_pdf(&InvoiceId::new("INV-77"))
            .await
            .expect("Failed to fetch");
        assert!(pdf.success);
        assert_eq!(remote.invoice_calls(), 1);
        assert_eq!(remote.pdf_calls(), 1);
    }

    #[tokio::test]
    async fn test_inmemory_remote_unknown_entries() {
        let remote = InMemoryRemote::new();

        let invoice = remote
            .get_order_invoice(&reference("POS/9999"))
            .await
            .expect("Failed to resolve");
        assert!(invoice.resolved_id().is_none());
        assert_eq!(invoice.error.as_deref(), Some("POS order not found"));

        let pdf = remote
            .get_hka_pdf(&InvoiceId::new("1"))
            .await
            .expect("Failed to fetch");
        assert!(!pdf.success);
    }

    #[tokio::test]
    async fn test_inmemory_remote_faults() {
        let remote = InMemoryRemote::new();
        remote.insert_invoice("POS/0042", Err(Error::RemoteFault("offline".to_string())));

        let result = remote.get_order_invoice(&reference("POS/0042")).await;
        assert_eq!(result, Err(Error::RemoteFault("offline".to_string())));
        assert_eq!(remote.total_calls(), 1);
    }
}
