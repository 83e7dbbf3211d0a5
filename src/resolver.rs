//! Order reference to invoice id resolution.

use crate::error::{Error, Result};
use crate::model::{InvoiceId, OrderData, OrderReference};
use crate::remote::PosRemote;
use std::sync::Arc;

/// Default status text when the server gives no reason for a missing invoice.
pub const NO_INVOICE_MESSAGE: &str = "No invoice found for order";

/// Outcome of a resolution that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The order has an invoice.
    Invoiced(InvoiceId),

    /// The order is not invoiced yet. Carries the server's reason.
    NotInvoiced(String),
}

impl Resolution {
    pub fn invoice_id(&self) -> Option<&InvoiceId> {
        match self {
            Resolution::Invoiced(id) => Some(id),
            Resolution::NotInvoiced(_) => None,
        }
    }

    /// Turn "not invoiced yet" into `Error::NotInvoiced` for callers that
    /// need an invoice to continue.
    pub fn into_invoice_id(self) -> Result<InvoiceId> {
        match self {
            Resolution::Invoiced(id) => Ok(id),
            Resolution::NotInvoiced(reason) => Err(Error::NotInvoiced(reason)),
        }
    }
}

/// Resolves orders to invoice ids with one remote call per attempt.
///
/// Holds no state beyond the remote handle; nothing is cached here.
pub struct InvoiceResolver<R: PosRemote> {
    remote: Arc<R>,
}

impl<R: PosRemote> Clone for InvoiceResolver<R> {
    fn clone(&self) -> Self {
        InvoiceResolver {
            remote: Arc::clone(&self.remote),
        }
    }
}

impl<R: PosRemote> InvoiceResolver<R> {
    pub fn new(remote: Arc<R>) -> Self {
        InvoiceResolver { remote }
    }

    /// Resolve order data, deriving the reference first.
    ///
    /// # Errors
    /// - `Error::MissingReference` when the order has neither a
    ///   `pos_reference` nor a `name`; no remote call is made.
    /// - `Error::RemoteFault` on transport or server failure.
    pub async fn resolve_order(&self, order: &OrderData) -> Result<Resolution> {
        let reference = order.reference().ok_or(Error::MissingReference)?;
        self.resolve(&reference).await
    }

    /// Resolve a reference.
    ///
    /// An id is returned only when the server reports success and sends a
    /// non-empty id; anything else is [`Resolution::NotInvoiced`].
    ///
    /// # Errors
    /// Returns `Error::RemoteFault` on transport or server failure.
    pub async fn resolve(&self, reference: &OrderReference) -> Result<Resolution> {
        debug!("» Resolving invoice for order {}", reference);

        let response = self.remote.get_order_invoice(reference).await?;

        match response.resolved_id() {
            Some(id) => {
                debug!("✓ Order {} resolved to invoice {}", reference, id);
                Ok(Resolution::Invoiced(id.clone()))
            }
            None => {
                let reason = response
                    .error
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| NO_INVOICE_MESSAGE.to_string());
                info!("Order {} has no invoice yet: {}", reference, reason);
                Ok(Resolution::NotInvoiced(reason))
            }
        }
    }
}
