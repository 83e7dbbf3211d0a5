//! Order, invoice and receipt payload types.

use crate::error::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Data-URL prefix the server puts in front of rasterized invoices.
pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Client-side identifier of a sale transaction.
///
/// Never empty. Build one from order data with [`OrderData::reference`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OrderReference(String);

impl OrderReference {
    /// Wrap a reference, rejecting the empty string.
    pub fn new(reference: impl Into<String>) -> Option<Self> {
        let reference = reference.into();
        if reference.is_empty() {
            None
        } else {
            Some(OrderReference(reference))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-side identifier of the fiscal invoice issued for an order.
///
/// The server sends record ids as JSON integers; both strings and integers
/// are accepted on the wire and kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct InvoiceId(String);

impl InvoiceId {
    pub fn new(id: impl Into<String>) -> Self {
        InvoiceId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InvoiceId {
    fn from(id: &str) -> Self {
        InvoiceId::new(id)
    }
}

impl<'de> Deserialize<'de> for InvoiceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => InvoiceId(text),
            Raw::Number(n) => InvoiceId(n.to_string()),
        })
    }
}

/// Base64 image, either bare or in `data:<mime>;base64,` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageBytes(String);

impl ImageBytes {
    pub fn new(encoded: impl Into<String>) -> Self {
        ImageBytes(encoded.into())
    }

    /// Encode raw PNG bytes as a data URL.
    pub fn from_png(png: &[u8]) -> Self {
        ImageBytes(format!("{}{}", PNG_DATA_URL_PREFIX, STANDARD.encode(png)))
    }

    /// The value exactly as received or produced.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The base64 payload without any data-URL header.
    pub fn payload(&self) -> &str {
        match self.0.split_once(";base64,") {
            Some((header, payload)) if header.starts_with("data:") => payload,
            _ => &self.0,
        }
    }

    /// A data URL suitable for an `<img src>`; bare payloads are assumed PNG.
    pub fn to_data_url(&self) -> String {
        if self.0.starts_with("data:") {
            self.0.clone()
        } else {
            format!("{}{}", PNG_DATA_URL_PREFIX, self.0)
        }
    }

    /// Decode the payload to raw image bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        Ok(STANDARD.decode(self.payload())?)
    }
}

/// What a receipt can show for an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum ReceiptImage {
    /// A rasterized image of the invoice.
    Image(ImageBytes),

    /// The raw PDF (base64), for hosts without a rendering capability.
    Document(String),
}

impl ReceiptImage {
    pub fn as_image(&self) -> Option<&ImageBytes> {
        match self {
            ReceiptImage::Image(image) => Some(image),
            ReceiptImage::Document(_) => None,
        }
    }

    pub fn as_document(&self) -> Option<&str> {
        match self {
            ReceiptImage::Image(_) => None,
            ReceiptImage::Document(pdf) => Some(pdf),
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, ReceiptImage::Image(_))
    }
}

/// Order data as exported for printing by the host.
///
/// Only the two reference fields are interpreted; everything else is carried
/// through to the render payload untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos_reference: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl OrderData {
    pub fn new(pos_reference: Option<&str>, name: Option<&str>) -> Self {
        OrderData {
            pos_reference: pos_reference.map(str::to_string),
            name: name.map(str::to_string),
            fields: Map::new(),
        }
    }

    /// Add an arbitrary receipt field.
    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    /// `pos_reference`, or `name` when the primary reference is absent or empty.
    pub fn reference(&self) -> Option<OrderReference> {
        self.pos_reference
            .as_deref()
            .and_then(OrderReference::new)
            .or_else(|| self.name.as_deref().and_then(OrderReference::new))
    }
}

/// Order data augmented with the invoice image for printing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderPayload {
    #[serde(flatten)]
    pub order: OrderData,

    #[serde(
        rename = "hkaPdfImage",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub hka_pdf_image: Option<String>,

    #[serde(rename = "hkaPdfData", default, skip_serializing_if = "Option::is_none")]
    pub hka_pdf_data: Option<String>,
}

impl RenderPayload {
    pub fn new(order: OrderData) -> Self {
        RenderPayload {
            order,
            hka_pdf_image: None,
            hka_pdf_data: None,
        }
    }

    /// Attach an image (as a data URL) or, in fallback mode, the raw PDF.
    pub fn attach(&mut self, image: &ReceiptImage) {
        match image {
            ReceiptImage::Image(bytes) => {
                self.hka_pdf_image = Some(bytes.to_data_url());
                self.hka_pdf_data = None;
            }
            ReceiptImage::Document(pdf) => {
                self.hka_pdf_image = None;
                self.hka_pdf_data = Some(pdf.clone());
            }
        }
    }

    pub fn has_invoice_image(&self) -> bool {
        self.hka_pdf_image.is_some() || self.hka_pdf_data.is_some()
    }

    /// Serialize to the JSON object the receipt template consumes.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Per-render status: loading flag, last error and the image once known.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchState {
    pub error: Option<String>,
    pub is_loading: bool,
    pub image: Option<ReceiptImage>,
}

impl FetchState {
    pub fn loading() -> Self {
        FetchState {
            error: None,
            is_loading: true,
            image: None,
        }
    }

    pub fn ready(image: ReceiptImage) -> Self {
        FetchState {
            error: None,
            is_loading: false,
            image: Some(image),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        FetchState {
            error: Some(message.into()),
            is_loading: false,
            image: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reference_prefers_pos_reference() {
        let order = OrderData::new(Some("POS/0042"), Some("Order 0042"));
        assert_eq!(order.reference().unwrap().as_str(), "POS/0042");
    }

    #[test]
    fn test_reference_falls_back_to_name() {
        let order = OrderData::new(None, Some("Order 0042"));
        assert_eq!(order.reference().unwrap().as_str(), "Order 0042");

        let empty_primary = OrderData::new(Some(""), Some("Order 0042"));
        assert_eq!(empty_primary.reference().unwrap().as_str(), "Order 0042");
    }

    #[test]
    fn test_reference_missing() {
        assert!(OrderData::new(None, None).reference().is_none());
        assert!(OrderData::new(Some(""), Some("")).reference().is_none());
    }

    #[test]
    fn test_invoice_id_accepts_numbers() {
        let id: InvoiceId = serde_json::from_value(json!(77)).unwrap();
        assert_eq!(id.as_str(), "77");

        let id: InvoiceId = serde_json::from_value(json!("INV-77")).unwrap();
        assert_eq!(id.as_str(), "INV-77");
    }

    #[test]
    fn test_image_bytes_payload_strips_data_url() {
        let image = ImageBytes::new("data:image/png;base64,AAAA");
        assert_eq!(image.payload(), "AAAA");
        assert_eq!(image.to_data_url(), "data:image/png;base64,AAAA");

        let bare = ImageBytes::new("AAAA");
        assert_eq!(bare.payload(), "AAAA");
        assert_eq!(bare.to_data_url(), "data:image/png;base64,AAAA");
    }

    #[test]
    fn test_image_bytes_from_png() {
        let image = ImageBytes::from_png(&[0x89, b'P', b'N', b'G']);
        assert!(image.as_str().starts_with(PNG_DATA_URL_PREFIX));
        assert_eq!(image.decode().unwrap(), vec![0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn test_payload_keeps_order_fields() {
        let order = OrderData::new(Some("POS/0042"), None).with_field("amount_total", json!(12.5));
        let mut payload = RenderPayload::new(order);
        payload.attach(&ReceiptImage::Image(ImageBytes::new("AAAA")));

        let value = payload.to_value().unwrap();
        assert_eq!(value["pos_reference"], "POS/0042");
        assert_eq!(value["amount_total"], 12.5);
        assert_eq!(value["hkaPdfImage"], "data:image/png;base64,AAAA");
        assert!(value.get("hkaPdfData").is_none());
    }

    #[test]
    fn test_payload_document_fallback() {
        let mut payload = RenderPayload::new(OrderData::default());
        payload.attach(&ReceiptImage::Document("JVBERi0=".to_string()));

        assert!(payload.hka_pdf_image.is_none());
        assert_eq!(payload.hka_pdf_data.as_deref(), Some("JVBERi0="));
        assert!(payload.has_invoice_image());
    }

    #[test]
    fn test_fetch_state_serializes_camel_case() {
        let value = serde_json::to_value(FetchState::loading()).unwrap();
        assert_eq!(value["isLoading"], true);
        assert!(value["error"].is_null());
    }
}
