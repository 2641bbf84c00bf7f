//! Configuration for the report service.
//!
//! Everything the service needs to know about its environment is held in
//! [`ServiceConfig`] and passed to [`crate::ReportService::new`] at
//! construction. There is no global state: two services with different
//! upload directories can live in the same process (the tests rely on this).
//!
//! Build one with [`ServiceConfig::builder()`] or take
//! [`ServiceConfig::default()`].

use crate::error::ReportError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default upper bound for one multipart upload: 16 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Configuration for a [`crate::ReportService`].
///
/// # Example
/// ```rust
/// use sheet_report::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .upload_dir("/var/lib/sheet-report")
///     .debug(true)
///     .build()
///     .unwrap();
/// assert!(config.debug);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Directory uploaded workbooks are stored in. Default: `uploads`.
    ///
    /// Created on service construction if missing. Files are keyed by their
    /// original filename and never cleaned up.
    pub upload_dir: PathBuf,

    /// Debug mode. Default: false.
    ///
    /// Adds a `detail` field with the underlying cause to error responses and
    /// lowers the binary's default log level to `debug`.
    pub debug: bool,

    /// Socket address the HTTP server binds to. Default: `127.0.0.1:5000`.
    pub bind_addr: String,

    /// Largest accepted upload body in bytes. Default: 16 MiB.
    pub max_upload_bytes: usize,

    /// Continue text on a new PDF page instead of drawing past the bottom
    /// edge. Default: true.
    pub paginate: bool,

    /// TrueType font used for chart labels.
    ///
    /// If `None`, or the file cannot be loaded, the bundled DejaVu Sans is
    /// used.
    pub chart_font: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            debug: false,
            bind_addr: "127.0.0.1:5000".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            paginate: true,
            chart_font: None,
        }
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn debug(mut self, v: bool) -> Self {
        self.config.debug = v;
        self
    }

    pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.bind_addr = addr.into();
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n.max(1024);
        self
    }

    pub fn paginate(mut self, v: bool) -> Self {
        self.config.paginate = v;
        self
    }

    pub fn chart_font(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chart_font = Some(path.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, ReportError> {
        let c = &self.config;
        if c.upload_dir.as_os_str().is_empty() {
            return Err(ReportError::InvalidConfig(
                "Upload directory must not be empty".into(),
            ));
        }
        if c.bind_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ReportError::InvalidConfig(format!(
                "Bind address must be HOST:PORT with an IP host, got '{}'",
                c.bind_addr
            )));
        }
        Ok(self.config)
    }
}
