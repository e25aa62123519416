//! Shared fixtures for the integration tests

#![allow(dead_code)]

use cloud_controller_sdk::cloud_controller::credentials::CredentialFuture;
use cloud_controller_sdk::{ApiError, CloudControllerGateway, CredentialStore};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const STALE_TOKEN: &str = "bearer stale-token";
pub const FRESH_TOKEN: &str = "bearer fresh-token";

/// In-memory credential store that swaps to a fixed token on refresh
pub struct FakeCredentials {
    endpoint: String,
    token: Mutex<String>,
    fresh_token: String,
    refresh_delay: Duration,
    fail_refresh: bool,
    refreshes: AtomicUsize,
}

impl FakeCredentials {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: Mutex::new(STALE_TOKEN.to_string()),
            fresh_token: FRESH_TOKEN.to_string(),
            refresh_delay: Duration::ZERO,
            fail_refresh: false,
            refreshes: AtomicUsize::new(0),
        }
    }

    pub fn with_token(self, token: &str) -> Self {
        *self.token.lock().unwrap() = token.to_string();
        self
    }

    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    pub fn failing_refresh(mut self) -> Self {
        self.fail_refresh = true;
        self
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

impl CredentialStore for FakeCredentials {
    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    fn current_token(&self) -> String {
        self.token.lock().unwrap().clone()
    }

    fn refresh_token(&self) -> CredentialFuture<'_, String> {
        Box::pin(async move {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if !self.refresh_delay.is_zero() {
                tokio::time::sleep(self.refresh_delay).await;
            }
            if self.fail_refresh {
                return Err(ApiError::Http {
                    status: 401,
                    error_code: Some("invalid_token".to_string()),
                    description: Some("Refresh token expired".to_string()),
                    body: String::new(),
                }
                .into());
            }
            *self.token.lock().unwrap() = self.fresh_token.clone();
            Ok(self.fresh_token.clone())
        })
    }
}

/// Gateway authenticated with `FRESH_TOKEN` that never needs a refresh
pub fn fresh_gateway(endpoint: &str) -> (CloudControllerGateway, Arc<FakeCredentials>) {
    let credentials = Arc::new(FakeCredentials::new(endpoint).with_token(FRESH_TOKEN));
    let gateway = CloudControllerGateway::new(credentials.clone()).unwrap();
    (gateway, credentials)
}

/// One `{metadata, entity}` collection item
pub fn resource(guid: &str, entity: Value) -> Value {
    json!({
        "metadata": {
            "guid": guid,
            "url": format!("/v2/things/{}", guid),
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": null
        },
        "entity": entity
    })
}

/// A collection page with optional `next_url`
pub fn page(resources: Vec<Value>, next_url: Option<&str>) -> Value {
    json!({
        "total_results": resources.len(),
        "total_pages": 1,
        "prev_url": null,
        "next_url": next_url,
        "resources": resources
    })
}
