//! # hka-receipt
//!
//! Fiscal invoice images for point-of-sale receipts.
//!
//! After a sale, the receipt can show the regulatory (HKA) invoice issued for
//! it. This crate resolves the order to its invoice, fetches the invoice image
//! (or PDF) from the POS server, caches it for the session and hands it to the
//! receipt renderer.
//!
//! ## Features
//!
//! - **Session cache:** one fetch per invoice, concurrent callers share it,
//!   failures are never cached
//! - **Pluggable transport:** [`remote::PosRemote`] with an HTTP JSON-RPC
//!   client and an in-memory double
//! - **PDF fallback:** first-page rasterization through an injected renderer,
//!   raw PDF pass-through when none is available
//! - **Never blocks printing:** failures become status text, the base payload
//!   is always produced
//!
//! ## Quick Start
//!
//! ```ignore
//! use hka_receipt::{ReceiptImageService, RenderContext, config::ReceiptConfig, model::OrderData};
//!
//! let service = ReceiptImageService::from_config(&ReceiptConfig::from_env()?)?;
//! let order = OrderData::new(Some("POS/0042"), None);
//!
//! // Printing path
//! let payload = service.export_for_printing(order.clone()).await;
//!
//! // Reprint path: publish into a view-owned context
//! let ctx = RenderContext::new();
//! let mut redraw = ctx.subscribe();
//! service.spawn_reprint(&ctx, order.clone());
//! redraw.changed().await?;
//! let payload = ctx.render_payload(order);
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod observability;
pub mod rasterize;
pub mod remote;
pub mod render;
pub mod resolver;
pub mod service;

// Re-exports for convenience
pub use backend::ImageBackend;
pub use cache::ImageCache;
pub use error::{Error, Result};
pub use model::{FetchState, InvoiceId, OrderData, ReceiptImage, RenderPayload};
pub use rasterize::Rasterizer;
pub use remote::PosRemote;
pub use render::RenderContext;
pub use resolver::{InvoiceResolver, Resolution};
pub use service::ReceiptImageService;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
