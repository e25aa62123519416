use crate::cloud_controller::config::GatewayConfig;
use crate::cloud_controller::credentials::CredentialStore;
use crate::cloud_controller::pagination::{Page, PaginationWalker};
use crate::cloud_controller::request::{redact_token, ApiRequest};
use crate::cloud_controller::resources::Resource;
use crate::cloud_controller::types::{ApiError, CloudControllerError};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Successful (2xx) response, body untouched
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|e| {
            tracing::error!("Failed to parse response: {} - Response body: {}", e, self.body);
            ApiError::Parse(format!("Failed to parse response: {} - Body: {}", e, self.body))
        })
    }
}

/// Outcome of a single HTTP exchange
enum Attempt {
    Done(ApiResponse),
    Unauthorized(String),
}

/// Authenticated HTTP gateway for Cloud Controller style APIs
///
/// Every request carries `Authorization: bearer <token>` read from the
/// credential store at call time. An HTTP 401 triggers one token refresh
/// and one replay of the identical request; a second 401 is surfaced as
/// [`ApiError::Authentication`]. Any other failure is surfaced unchanged.
///
/// The gateway is cheap to clone. Clones share the HTTP connection pool and
/// the refresh lock, so concurrent callers that all hit a 401 with the same
/// stale token wait on a single refresh instead of each issuing their own.
#[derive(Clone)]
pub struct CloudControllerGateway {
    client: reqwest::Client,
    credentials: Arc<dyn CredentialStore>,
    refresh_lock: Arc<Mutex<()>>,
    config: GatewayConfig,
}

impl fmt::Debug for CloudControllerGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudControllerGateway")
            .field("endpoint", &self.credentials.endpoint())
            .field("config", &self.config)
            .finish()
    }
}

impl CloudControllerGateway {
    /// Create a gateway with default configuration
    ///
    /// # Example
    ///
    /// ```no_run
    /// use cloud_controller_sdk::{CloudControllerGateway, Session, SessionCredentials, UaaClient};
    /// use std::sync::Arc;
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let session = Session::new("https://api.example.com", "https://uaa.example.com");
    /// let uaa = UaaClient::new("https://uaa.example.com");
    /// let credentials = SessionCredentials::new(session, Arc::new(uaa));
    /// let gateway = CloudControllerGateway::new(Arc::new(credentials))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Result<Self, CloudControllerError> {
        Self::with_config(credentials, GatewayConfig::default())
    }

    /// Create a gateway with explicit configuration
    pub fn with_config(
        credentials: Arc<dyn CredentialStore>,
        config: GatewayConfig,
    ) -> Result<Self, CloudControllerError> {
        let client = config.build_http_client()?;
        tracing::debug!(
            "Creating CloudControllerGateway for endpoint: {}",
            credentials.endpoint()
        );

        Ok(Self {
            client,
            credentials,
            refresh_lock: Arc::new(Mutex::new(())),
            config,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    /// Execute one request, refreshing the token and retrying once on 401
    pub async fn perform(&self, request: &ApiRequest) -> Result<ApiResponse, CloudControllerError> {
        let endpoint = self.credentials.endpoint();
        let token = self.credentials.current_token();

        let body = match self.send_once(request, &endpoint, &token).await? {
            Attempt::Done(response) => return Ok(response),
            Attempt::Unauthorized(body) => body,
        };

        tracing::info!(
            "{} {} was unauthorized, refreshing access token",
            request.method(),
            request.path()
        );
        tracing::debug!("Unauthorized response body: {}", body);

        let fresh = self.refresh_after_unauthorized(&token).await?;

        match self.send_once(request, &endpoint, &fresh).await? {
            Attempt::Done(response) => Ok(response),
            Attempt::Unauthorized(body) => {
                tracing::error!(
                    "{} {} still unauthorized after token refresh",
                    request.method(),
                    request.path()
                );
                Err(ApiError::Authentication(format!(
                    "Request still unauthorized after token refresh: {}",
                    body
                ))
                .into())
            }
        }
    }

    /// One HTTP exchange, no retry
    async fn send_once(
        &self,
        request: &ApiRequest,
        endpoint: &str,
        token: &str,
    ) -> Result<Attempt, ApiError> {
        let url = request.url(endpoint)?;

        tracing::debug!(
            "REQUEST: {} {} (Authorization: bearer {})",
            request.method(),
            url,
            redact_token(token)
        );
        if let Some(body) = request.body() {
            tracing::debug!("Request body: {} bytes", body.len());
        }

        let builder = request.to_builder(&self.client, url, token);
        let response = builder.send().await.map_err(|e| {
            tracing::error!("Failed to send {} {}: {}", request.method(), request.path(), e);
            ApiError::from(e)
        })?;

        let status = response.status();
        tracing::debug!("Received response with status: {}", status);

        let body = response.text().await.map_err(|e| {
            tracing::error!("Failed to read response body: {}", e);
            ApiError::Network(format!("Failed to read response body: {}", e))
        })?;

        if status == StatusCode::UNAUTHORIZED {
            return Ok(Attempt::Unauthorized(body));
        }

        if !status.is_success() {
            tracing::error!(
                "{} {} failed: HTTP {} - {}",
                request.method(),
                request.path(),
                status.as_u16(),
                body
            );
            return Err(ApiError::from_response(status.as_u16(), body));
        }

        Ok(Attempt::Done(ApiResponse {
            status: status.as_u16(),
            body,
        }))
    }

    /// Single-flight token refresh
    ///
    /// Callers holding the same stale token serialize on the refresh lock.
    /// Whoever gets there first refreshes; the rest see a different current
    /// token and reuse it.
    async fn refresh_after_unauthorized(&self, stale: &str) -> Result<String, CloudControllerError> {
        let _guard = self.refresh_lock.lock().await;

        let current = self.credentials.current_token();
        if current != stale {
            tracing::debug!("Access token was already refreshed by a concurrent request");
            return Ok(current);
        }

        match self.credentials.refresh_token().await {
            Ok(token) => {
                tracing::info!("Access token refreshed");
                Ok(token)
            }
            Err(CloudControllerError::Api(ApiError::Authentication(msg))) => {
                tracing::error!("Token refresh failed: {}", msg);
                Err(ApiError::Authentication(msg).into())
            }
            Err(e) => {
                tracing::error!("Token refresh failed: {}", e);
                Err(ApiError::Authentication(format!("Token refresh failed: {}", e)).into())
            }
        }
    }

    /// GET one page of a collection
    pub async fn get_page<E: DeserializeOwned>(
        &self,
        request: &ApiRequest,
    ) -> Result<Page<E>, CloudControllerError> {
        let response = self.perform(request).await?;
        Ok(response.json::<Page<E>>()?)
    }

    /// GET a collection and drain every page into one ordered result
    pub async fn list_all_resources<E: DeserializeOwned>(
        &self,
        request: &ApiRequest,
    ) -> Result<Vec<Resource<E>>, CloudControllerError> {
        let first = self.get_page::<E>(request).await?;
        PaginationWalker::new(self).collect(first).await
    }

    /// GET a collection and hand each resource to `visit` until it breaks or pages run out
    pub async fn walk_resources<E, F>(
        &self,
        request: &ApiRequest,
        visit: F,
    ) -> Result<(), CloudControllerError>
    where
        E: DeserializeOwned,
        F: FnMut(Resource<E>) -> ControlFlow<()>,
    {
        let first = self.get_page::<E>(request).await?;
        PaginationWalker::new(self).walk(first, visit).await
    }

    /// POST a JSON body to a collection
    pub async fn create_resource<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, CloudControllerError> {
        let request = ApiRequest::post(path).with_json(body)?;
        self.perform(&request).await
    }

    /// PUT a JSON body to a resource
    pub async fn update_resource<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, CloudControllerError> {
        let request = ApiRequest::put(path).with_json(body)?;
        self.perform(&request).await
    }

    /// DELETE a resource
    pub async fn delete_resource(&self, path: &str) -> Result<(), CloudControllerError> {
        self.perform(&ApiRequest::delete(path)).await?;
        Ok(())
    }
}
