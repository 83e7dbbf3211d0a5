//! Client configuration.

use crate::error::{Error, Result};
use std::env;
use std::time::Duration;

/// Default upscaling factor for rasterized invoice pages.
pub const DEFAULT_RENDER_SCALE: f32 = 2.0;

/// Default timeout for each remote call.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the POS remote and the rasterizer.
///
/// Override from the environment with [`ReceiptConfig::from_env`]:
///
/// - `HKA_POS_URL` - server base URL
/// - `HKA_POS_SESSION_ID` - session cookie value
/// - `HKA_POS_TIMEOUT_SECS` - per-call timeout
/// - `HKA_RENDER_SCALE` - page upscaling factor
#[derive(Clone, Debug, PartialEq)]
pub struct ReceiptConfig {
    pub base_url: String,
    pub session_id: Option<String>,
    pub timeout: Duration,
    pub user_agent: String,
    pub render_scale: f32,
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        ReceiptConfig {
            base_url: "http://localhost:8069".to_string(),
            session_id: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("hka-receipt/{}", crate::VERSION),
            render_scale: DEFAULT_RENDER_SCALE,
        }
    }
}

impl ReceiptConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        ReceiptConfig {
            base_url: base_url.into(),
            ..ReceiptConfig::default()
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_render_scale(mut self, scale: f32) -> Self {
        self.render_scale = scale;
        self
    }

    /// Defaults overridden by whichever `HKA_*` variables are set.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` when a variable does not parse or the
    /// resulting configuration is invalid.
    pub fn from_env() -> Result<Self> {
        let mut config = ReceiptConfig::default();

        if let Ok(url) = env::var("HKA_POS_URL") {
            config.base_url = url;
        }

        if let Ok(session_id) = env::var("HKA_POS_SESSION_ID") {
            if !session_id.is_empty() {
                config.session_id = Some(session_id);
            }
        }

        if let Ok(secs) = env::var("HKA_POS_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().map_err(|_| {
                Error::ConfigError(format!("HKA_POS_TIMEOUT_SECS is not a number: {}", secs))
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        if let Ok(scale) = env::var("HKA_RENDER_SCALE") {
            config.render_scale = scale.parse().map_err(|_| {
                Error::ConfigError(format!("HKA_RENDER_SCALE is not a number: {}", scale))
            })?;
        }

        config.validate()?;
        debug!("Loaded receipt config for {}", config.base_url);
        Ok(config)
    }

    /// # Errors
    /// Returns `Error::ConfigError` for a non-HTTP base URL, a zero timeout
    /// or a non-positive render scale.
    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Error::ConfigError(format!(
                "base URL must be http(s): {}",
                self.base_url
            )));
        }

        if self.timeout.is_zero() {
            return Err(Error::ConfigError("timeout must be non-zero".to_string()));
        }

        if !self.render_scale.is_finite() || self.render_scale <= 0.0 {
            return Err(Error::ConfigError(format!(
                "render scale must be positive: {}",
                self.render_scale
            )));
        }

        Ok(())
    }

    /// Full URL for a server route such as `/pos/get_hka_pdf`.
    pub fn endpoint(&self, route: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), route)
    }
}
