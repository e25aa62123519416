use crate::cloud_controller::config::GatewayConfig;
use crate::cloud_controller::credentials::{CredentialFuture, TokenPair, TokenRefresher};
use crate::cloud_controller::types::{ApiError, CloudControllerError};
use serde::{Deserialize, Serialize};

/// OAuth client id the command line tooling authenticates as
pub const DEFAULT_CLIENT_ID: &str = "cf";

/// HTTP client for the UAA (authorization server) token endpoint
#[derive(Debug, Clone)]
pub struct UaaClient {
    /// Base URL of the authorization server
    authorization_endpoint: String,
    client_id: String,
    client_secret: String,
    client: reqwest::Client,
}

/// Form body for the refresh-token grant
#[derive(Debug, Serialize)]
struct RefreshTokenForm<'a> {
    grant_type: &'a str,
    refresh_token: &'a str,
    scope: &'a str,
}

/// Token endpoint response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UaaTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl UaaClient {
    /// Create a client for `authorization_endpoint` using the default `cf` client with an empty secret
    pub fn new(authorization_endpoint: impl Into<String>) -> Self {
        let authorization_endpoint = authorization_endpoint.into();
        tracing::debug!("Creating UaaClient with base URL: {}", authorization_endpoint);

        Self {
            authorization_endpoint,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            client_secret: String::new(),
            client: reqwest::Client::new(),
        }
    }

    /// Create a client whose HTTP transport follows `config` (timeout, user agent, TLS verification)
    pub fn with_config(
        authorization_endpoint: impl Into<String>,
        config: &GatewayConfig,
    ) -> Result<Self, CloudControllerError> {
        let client = config.build_http_client()?;
        Ok(Self::new(authorization_endpoint).with_http_client(client))
    }

    /// Authenticate as a different OAuth client (builder pattern)
    pub fn with_client_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_id = client_id.into();
        self.client_secret = client_secret.into();
        self
    }

    /// Use a preconfigured HTTP client (builder pattern)
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn authorization_endpoint(&self) -> &str {
        &self.authorization_endpoint
    }

    /// Exchange a refresh token for a new access token
    ///
    /// Servers that do not rotate refresh tokens omit `refresh_token`; the
    /// old one is kept in that case.
    pub async fn refresh_auth_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenPair, CloudControllerError> {
        let url = format!(
            "{}/oauth/token",
            self.authorization_endpoint.trim_end_matches('/')
        );
        tracing::debug!("Refreshing access token at: {}", url);

        let form = RefreshTokenForm {
            grant_type: "refresh_token",
            refresh_token,
            scope: "",
        };

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send token refresh request: {}", e);
                ApiError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!(
                "Token refresh failed: HTTP {} - {}",
                status.as_u16(),
                error_body
            );
            return Err(ApiError::from_response(status.as_u16(), error_body).into());
        }

        let token: UaaTokenResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse token response: {}", e);
            ApiError::Parse(format!("Failed to parse token response: {}", e))
        })?;

        let token_type = token.token_type.as_deref().unwrap_or("bearer");
        tracing::info!("Access token refreshed by authorization server");

        Ok(TokenPair {
            access_token: format!("{} {}", token_type.to_ascii_lowercase(), token.access_token),
            refresh_token: token
                .refresh_token
                .unwrap_or_else(|| refresh_token.to_string()),
        })
    }
}

impl TokenRefresher for UaaClient {
    fn refresh(&self, refresh_token: &str) -> CredentialFuture<'_, TokenPair> {
        let refresh_token = refresh_token.to_string();
        Box::pin(async move { self.refresh_auth_token(&refresh_token).await })
    }
}
