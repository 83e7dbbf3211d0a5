//! HTTP remote speaking the server's JSON-RPC `call` protocol.

use super::{
    HkaPdfResponse, OrderInvoiceResponse, PosRemote, HKA_PDF_ROUTE, ORDER_INVOICE_ROUTE,
};
use crate::config::ReceiptConfig;
use crate::error::{Error, Result};
use crate::model::{InvoiceId, OrderReference};
use reqwest::header::COOKIE;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Serialize)]
struct JsonRpcRequest<P> {
    jsonrpc: &'static str,
    method: &'static str,
    params: P,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<JsonRpcErrorData>,
}

#[derive(Deserialize)]
struct JsonRpcErrorData {
    #[serde(default)]
    message: Option<String>,
}

impl JsonRpcError {
    /// The server-side exception text when present, the envelope message otherwise.
    fn describe(&self) -> String {
        let detail = self
            .data
            .as_ref()
            .and_then(|d| d.message.as_deref())
            .unwrap_or(&self.message);
        match self.code {
            Some(code) => format!("{} (code {})", detail, code),
            None => detail.to_string(),
        }
    }
}

#[derive(Serialize)]
struct OrderInvoiceParams<'a> {
    pos_reference: &'a str,
}

#[derive(Serialize)]
struct HkaPdfParams<'a> {
    invoice_id: &'a str,
}

/// POS remote over HTTP.
///
/// Every call is a `POST` with a JSON-RPC 2.0 envelope. The optional session
/// id is sent as the `session_id` cookie. Timeouts come from
/// [`ReceiptConfig::timeout`].
///
/// # Example
///
/// ```no_run
/// # use hka_receipt::config::ReceiptConfig;
/// # use hka_receipt::remote::HttpRemote;
/// # fn example() -> hka_receipt::Result<()> {
/// let config = ReceiptConfig::new("https://pos.example.com").with_session_id("abc123");
/// let remote = HttpRemote::new(&config)?;
/// # Ok(())
/// # }
/// ```
pub struct HttpRemote {
    client: reqwest::Client,
    config: ReceiptConfig,
    next_id: AtomicU64,
}

impl HttpRemote {
    /// Build a client from configuration.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if the configuration is invalid or the
    /// HTTP client cannot be built.
    pub fn new(config: &ReceiptConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        info!("✓ HTTP remote initialized for {}", config.base_url);

        Ok(HttpRemote {
            client,
            config: config.clone(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<P, T>(&self, route: &str, params: P) -> Result<T>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let url = self.config.endpoint(route);
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            method: "call",
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(session_id) = &self.config.session_id {
            request = request.header(COOKIE, format!("session_id={}", session_id));
        }

        debug!("» POST {}", url);
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            error!("{} failed with status: {}", route, status);
            return Err(Error::RemoteFault(format!(
                "{} failed with status: {}",
                route, status
            )));
        }

        let envelope: JsonRpcResponse<T> = response.json().await?;
        match (envelope.result, envelope.error) {
            (_, Some(error)) => {
                let message = error.describe();
                warn!("{} returned an error: {}", route, message);
                Err(Error::RemoteFault(message))
            }
            (Some(result), None) => Ok(result),
            (None, None) => Err(Error::RemoteFault(format!(
                "{} returned an empty response",
                route
            ))),
        }
    }
}

impl PosRemote for HttpRemote {
    async fn get_order_invoice(&self, reference: &OrderReference) -> Result<OrderInvoiceResponse> {
        self.call(
            ORDER_INVOICE_ROUTE,
            OrderInvoiceParams {
                pos_reference: reference.as_str(),
            },
        )
        .await
    }

    async fn get_hka_pdf(&self, invoice_id: &InvoiceId) -> Result<HkaPdfResponse> {
        self.call(
            HKA_PDF_ROUTE,
            HkaPdfParams {
                invoice_id: invoice_id.as_str(),
            },
        )
        .await
    }
}
