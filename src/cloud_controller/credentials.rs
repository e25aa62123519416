use crate::cloud_controller::types::CloudControllerError;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by credential operations
pub type CredentialFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, CloudControllerError>> + Send + 'a>>;

/// Source of the API endpoint and access token used by the gateway
///
/// The gateway reads the endpoint and token at call time and never caches
/// them across calls. On an unauthorized response it asks the store for a
/// fresh token exactly once; the store is responsible for replacing its
/// token wholesale so later reads observe the new value.
pub trait CredentialStore: Send + Sync {
    /// Base URL of the API, e.g. `https://api.example.com`
    fn endpoint(&self) -> String;

    /// The access token to send right now
    fn current_token(&self) -> String;

    /// Obtain a new access token and make it the current one
    fn refresh_token(&self) -> CredentialFuture<'_, String>;
}

/// Token pair issued by an authorization server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Exchanges a refresh token for a new token pair
///
/// Implemented by [`UaaClient`](crate::UaaClient); tests plug in fakes.
pub trait TokenRefresher: Send + Sync {
    fn refresh(&self, refresh_token: &str) -> CredentialFuture<'_, TokenPair>;
}
