//! Cloud Controller SDK
//!
//! A Rust library for talking to Cloud Controller style resource APIs.
//!
//! This SDK provides:
//! - An authenticated HTTP gateway that refreshes an expired access token once and retries
//! - Transparent `next_url` pagination with cycle detection
//! - Typed repositories for service auth tokens, domains and routes
//! - Encrypted session storage (age x25519) and UAA refresh-token exchange
//!
//! # Example
//!
//! ```no_run
//! use cloud_controller_sdk::{
//!     load_session,
//!     repositories::{ServiceAuthTokenFields, ServiceAuthTokenRepository},
//!     CloudControllerGateway,
//!     GatewayConfig,
//!     SessionCredentials,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Load the session written at login
//! let session = load_session("default").await?.ok_or("not logged in")?;
//! let config = GatewayConfig::from_env()?.with_session(&session);
//!
//! // Refreshed tokens are written back to the same session
//! let credentials = SessionCredentials::connect(session, &config)?.persist_as("default");
//! let gateway = CloudControllerGateway::with_config(Arc::new(credentials), config)?;
//!
//! let repo = ServiceAuthTokenRepository::new(gateway);
//! repo.create(&ServiceAuthTokenFields {
//!     label: "mysql".to_string(),
//!     provider: "mysql-core".to_string(),
//!     token: "secret".to_string(),
//!     ..Default::default()
//! })
//! .await?;
//!
//! let token = repo.find_by_label_and_provider("mysql", "mysql-core").await?;
//! repo.delete(&token).await?;
//! # Ok(())
//! # }
//! ```

pub mod cloud_controller;
pub mod storage;

// Re-export commonly used types and functions
pub use cloud_controller::{
    config::GatewayConfig,
    credentials::{CredentialStore, TokenPair, TokenRefresher},
    gateway::{ApiResponse, CloudControllerGateway},
    pagination::{Page, PaginationWalker},
    repositories,
    request::{ApiRequest, Filter},
    resources::{Resource, ResourceDescriptor, ResourceMetadata},
    session::{clear_session, load_session, save_session, Session, SessionCredentials},
    token_info::{extract_bearer_token, TokenInfo},
    types::{ApiError, CloudControllerError},
    uaa::UaaClient,
};
