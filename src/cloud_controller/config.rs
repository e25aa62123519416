use crate::cloud_controller::session::Session;
use crate::cloud_controller::types::CloudControllerError;
use std::time::Duration;

/// Environment variable overriding the request timeout, in whole seconds
pub const TIMEOUT_ENV: &str = "CLOUD_CONTROLLER_TIMEOUT_SECS";
/// Environment variable disabling TLS certificate verification ("true"/"1")
pub const SKIP_SSL_VALIDATION_ENV: &str = "CLOUD_CONTROLLER_SKIP_SSL_VALIDATION";
/// Environment variable capping the number of pages a collection walk may fetch
pub const MAX_PAGES_ENV: &str = "CLOUD_CONTROLLER_MAX_PAGES";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Gateway configuration
///
/// Transport-level knobs for [`CloudControllerGateway`](crate::CloudControllerGateway).
/// The API endpoint itself is not part of this struct; it comes from the
/// credential store at call time.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Per-request timeout enforced by the HTTP client
    pub request_timeout: Duration,
    /// Value of the `User-Agent` header
    pub user_agent: String,
    /// Accept invalid TLS certificates (self-signed test environments)
    pub skip_ssl_validation: bool,
    /// Upper bound on pages fetched by a single collection walk. `None` trusts the server.
    pub max_pages: Option<usize>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: format!("cloud-controller-sdk/{}", env!("CARGO_PKG_VERSION")),
            skip_ssl_validation: false,
            max_pages: None,
        }
    }
}

impl GatewayConfig {
    /// Create a new GatewayConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with the `CLOUD_CONTROLLER_*` environment variables
    pub fn from_env() -> Result<Self, CloudControllerError> {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var(TIMEOUT_ENV) {
            let secs = raw.trim().parse::<u64>().map_err(|e| {
                CloudControllerError::Config(format!("Invalid {}={:?}: {}", TIMEOUT_ENV, raw, e))
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Ok(raw) = std::env::var(SKIP_SSL_VALIDATION_ENV) {
            config.skip_ssl_validation = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                _ => {
                    return Err(CloudControllerError::Config(format!(
                        "Invalid {}={:?}: expected true or false",
                        SKIP_SSL_VALIDATION_ENV, raw
                    )))
                }
            };
        }

        if let Ok(raw) = std::env::var(MAX_PAGES_ENV) {
            let pages = raw.trim().parse::<usize>().map_err(|e| {
                CloudControllerError::Config(format!("Invalid {}={:?}: {}", MAX_PAGES_ENV, raw, e))
            })?;
            config = config.with_max_pages(pages);
        }

        tracing::debug!("Loaded gateway configuration: {:?}", config);
        Ok(config)
    }

    /// Set request timeout (builder pattern)
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set user agent (builder pattern)
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set TLS verification skipping (builder pattern)
    pub fn with_skip_ssl_validation(mut self, skip: bool) -> Self {
        self.skip_ssl_validation = skip;
        self
    }

    /// Apply the per-session settings stored at login (builder pattern)
    ///
    /// A session targeted with TLS verification disabled turns it off here too.
    /// It never turns verification back on.
    pub fn with_session(mut self, session: &Session) -> Self {
        if session.ssl_disabled {
            self.skip_ssl_validation = true;
        }
        self
    }

    /// Set page cap for collection walks (builder pattern)
    ///
    /// A cap of 0 is raised to 1: the first page is always fetched.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        if max_pages == 0 {
            tracing::warn!("max_pages of 0 would fetch nothing, using 1");
        }
        self.max_pages = Some(max_pages.max(1));
        self
    }

    /// Build the underlying HTTP client
    pub(crate) fn build_http_client(&self) -> Result<reqwest::Client, CloudControllerError> {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .user_agent(self.user_agent.clone())
            .danger_accept_invalid_certs(self.skip_ssl_validation)
            .build()
            .map_err(|e| CloudControllerError::Config(format!("Failed to build HTTP client: {}", e)))
    }
}
