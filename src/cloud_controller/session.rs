use crate::cloud_controller::config::GatewayConfig;
use crate::cloud_controller::credentials::{CredentialFuture, CredentialStore, TokenRefresher};
use crate::cloud_controller::token_info::TokenInfo;
use crate::cloud_controller::types::{ApiError, CloudControllerError};
use crate::cloud_controller::uaa::UaaClient;
use crate::storage::{EncryptedFilesystemStorage, StorageBackend, StorageError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Path of the session file relative to the instance storage root
const SESSION_STORAGE_PATH: &str = "session.json";

/// A logged-in session against one API
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    /// Base URL of the API
    pub api_endpoint: String,
    /// Base URL of the authorization server issuing tokens
    pub authorization_endpoint: String,
    /// Access token, stored with its `bearer ` scheme
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// TLS verification disabled for this API
    #[serde(default)]
    pub ssl_disabled: bool,
    /// When the session was last written (RFC 3339)
    #[serde(default)]
    pub saved_at: Option<String>,
}

impl Session {
    /// A session that is targeted but not yet logged in
    pub fn new(api_endpoint: impl Into<String>, authorization_endpoint: impl Into<String>) -> Self {
        Self {
            api_endpoint: api_endpoint.into(),
            authorization_endpoint: authorization_endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the token pair (builder pattern)
    pub fn with_tokens(
        mut self,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        self.access_token = access_token.into();
        self.refresh_token = refresh_token.into();
        self
    }

    pub fn is_logged_in(&self) -> bool {
        !self.access_token.trim().is_empty()
    }

    /// Decoded claims of the current access token
    pub fn token_info(&self) -> Result<TokenInfo, CloudControllerError> {
        TokenInfo::from_access_token(&self.access_token)
    }
}

/// Save a session to encrypted storage for `instance_id`
///
/// The session is written to `<instance root>/session.json`, encrypted with
/// the instance key (see [`EncryptedFilesystemStorage`]).
pub async fn save_session(instance_id: &str, session: &Session) -> Result<(), StorageError> {
    tracing::debug!(
        "Saving session for {} (instance: {})",
        session.api_endpoint,
        instance_id
    );

    let storage = EncryptedFilesystemStorage::for_instance(instance_id).await?;

    let mut stored = session.clone();
    stored.saved_at = Some(Utc::now().to_rfc3339());

    let json = serde_json::to_vec_pretty(&stored).map_err(|e| {
        tracing::error!("Failed to serialize session: {}", e);
        StorageError::Serialization(format!("JSON serialization failed: {}", e))
    })?;

    storage.write(SESSION_STORAGE_PATH, &json).await?;
    tracing::info!("Session saved: api_endpoint={}", session.api_endpoint);
    Ok(())
}

/// Load the session for `instance_id`, `Ok(None)` if none was saved
pub async fn load_session(instance_id: &str) -> Result<Option<Session>, StorageError> {
    let storage = EncryptedFilesystemStorage::for_instance(instance_id).await?;

    if !storage.exists(SESSION_STORAGE_PATH) {
        tracing::debug!("No session stored for instance {}", instance_id);
        return Ok(None);
    }

    let json = storage.read(SESSION_STORAGE_PATH).await?;
    let session: Session = serde_json::from_slice(&json).map_err(|e| {
        tracing::error!("Failed to deserialize session: {}", e);
        StorageError::Serialization(format!("JSON deserialization failed: {}", e))
    })?;

    tracing::debug!(
        "Session loaded: api_endpoint={}, logged_in={}",
        session.api_endpoint,
        session.is_logged_in()
    );
    Ok(Some(session))
}

/// Remove the stored session for `instance_id`; succeeds if there was none
pub async fn clear_session(instance_id: &str) -> Result<(), StorageError> {
    let storage = EncryptedFilesystemStorage::for_instance(instance_id).await?;

    if !storage.exists(SESSION_STORAGE_PATH) {
        tracing::debug!("No session to clear for instance {}", instance_id);
        return Ok(());
    }

    storage.remove(SESSION_STORAGE_PATH).await?;
    tracing::info!("Session cleared (instance: {})", instance_id);
    Ok(())
}

/// [`CredentialStore`] backed by an in-memory [`Session`]
///
/// Refresh exchanges the session's refresh token through a
/// [`TokenRefresher`], replaces both tokens at once and, when configured with
/// [`persist_as`](Self::persist_as), writes the updated session back to storage.
pub struct SessionCredentials {
    session: RwLock<Session>,
    refresher: Arc<dyn TokenRefresher>,
    instance_id: Option<String>,
}

impl SessionCredentials {
    pub fn new(session: Session, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            session: RwLock::new(session),
            refresher,
            instance_id: None,
        }
    }

    /// Credentials refreshed against the session's own authorization endpoint
    ///
    /// The UAA client shares the gateway's transport settings, with the
    /// session's `ssl_disabled` flag applied, so a refresh reaches the same
    /// servers the gateway can.
    pub fn connect(session: Session, config: &GatewayConfig) -> Result<Self, CloudControllerError> {
        let config = config.clone().with_session(&session);
        let uaa = UaaClient::with_config(session.authorization_endpoint.clone(), &config)?;
        Ok(Self::new(session, Arc::new(uaa)))
    }

    /// Persist refreshed tokens to the stored session of `instance_id` (builder pattern)
    pub fn persist_as(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    /// Snapshot of the current session
    pub fn session(&self) -> Session {
        self.read().clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.session.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.session.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CredentialStore for SessionCredentials {
    fn endpoint(&self) -> String {
        self.read().api_endpoint.clone()
    }

    fn current_token(&self) -> String {
        self.read().access_token.clone()
    }

    fn refresh_token(&self) -> CredentialFuture<'_, String> {
        Box::pin(async move {
            let refresh_token = self.read().refresh_token.clone();
            if refresh_token.trim().is_empty() {
                return Err(ApiError::Authentication(
                    "No refresh token available, log in again".to_string(),
                )
                .into());
            }

            let pair = self.refresher.refresh(&refresh_token).await?;

            let snapshot = {
                let mut session = self.write();
                session.access_token = pair.access_token.clone();
                session.refresh_token = pair.refresh_token;
                session.clone()
            };

            if let Some(instance_id) = &self.instance_id {
                if let Err(e) = save_session(instance_id, &snapshot).await {
                    tracing::warn!("Refreshed token could not be persisted: {}", e);
                }
            }

            Ok(pair.access_token)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud_controller::credentials::TokenPair;
    use crate::storage::{encode_identity, ENCRYPTION_KEY_ENV, HOME_ENV};
    use serial_test::serial;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CountingRefresher {
        calls: AtomicUsize,
    }

    impl TokenRefresher for CountingRefresher {
        fn refresh(&self, refresh_token: &str) -> CredentialFuture<'_, TokenPair> {
            let refresh_token = refresh_token.to_string();
            Box::pin(async move {
                let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(TokenPair {
                    access_token: format!("bearer access-{}", n),
                    refresh_token: format!("{}-rotated", refresh_token),
                })
            })
        }
    }

    /// Point storage at a temp dir with a fixed key; restores env on drop
    fn setup_test_storage() -> (TempDir, impl Drop) {
        let temp_dir = TempDir::new().unwrap();
        std::env::set_var(HOME_ENV, temp_dir.path());
        std::env::set_var(
            ENCRYPTION_KEY_ENV,
            encode_identity(&age::x25519::Identity::generate()),
        );

        struct Guard;
        impl Drop for Guard {
            fn drop(&mut self) {
                std::env::remove_var(HOME_ENV);
                std::env::remove_var(ENCRYPTION_KEY_ENV);
            }
        }
        (temp_dir, Guard)
    }

    #[test]
    fn test_session_creation() {
        let session = Session::new("https://api.example.com", "https://uaa.example.com");
        assert!(!session.is_logged_in());

        let session = session.with_tokens("bearer abc", "refresh");
        assert!(session.is_logged_in());
        assert_eq!(session.refresh_token, "refresh");
    }

    #[tokio::test]
    async fn test_refresh_replaces_tokens_wholesale() {
        let refresher = Arc::new(CountingRefresher {
            calls: AtomicUsize::new(0),
        });
        let credentials = SessionCredentials::new(
            Session::new("https://api.example.com", "https://uaa.example.com")
                .with_tokens("bearer stale", "refresh-1"),
            refresher.clone(),
        );

        assert_eq!(credentials.current_token(), "bearer stale");
        let token = credentials.refresh_token().await.unwrap();

        assert_eq!(token, "bearer access-1");
        assert_eq!(credentials.current_token(), "bearer access-1");
        assert_eq!(credentials.session().refresh_token, "refresh-1-rotated");
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_is_authentication_error() {
        let credentials = SessionCredentials::new(
            Session::new("https://api.example.com", "https://uaa.example.com"),
            Arc::new(CountingRefresher {
                calls: AtomicUsize::new(0),
            }),
        );

        let err = credentials.refresh_token().await.unwrap_err();
        assert!(err.is_authentication());
    }

    #[tokio::test]
    #[serial]
    async fn test_save_load_clear_session() {
        let (_dir, _guard) = setup_test_storage();
        let instance_id = "test-save-load";

        let session = Session::new("https://api.example.com", "https://uaa.example.com")
            .with_tokens("bearer abc", "refresh-abc");
        save_session(instance_id, &session).await.unwrap();

        let loaded = load_session(instance_id).await.unwrap().unwrap();
        assert_eq!(loaded.api_endpoint, session.api_endpoint);
        assert_eq!(loaded.access_token, "bearer abc");
        assert!(loaded.saved_at.is_some());

        clear_session(instance_id).await.unwrap();
        assert!(load_session(instance_id).await.unwrap().is_none());
    }

    #[tokio::test]
    #[serial]
    async fn test_clear_nonexistent_session() {
        let (_dir, _guard) = setup_test_storage();
        clear_session("never-saved").await.unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn test_refresh_persists_when_configured() {
        let (_dir, _guard) = setup_test_storage();
        let instance_id = "test-persist";

        let credentials = SessionCredentials::new(
            Session::new("https://api.example.com", "https://uaa.example.com")
                .with_tokens("bearer stale", "refresh-1"),
            Arc::new(CountingRefresher {
                calls: AtomicUsize::new(0),
            }),
        )
        .persist_as(instance_id);

        credentials.refresh_token().await.unwrap();

        let stored = load_session(instance_id).await.unwrap().unwrap();
        assert_eq!(stored.access_token, "bearer access-1");
        assert_eq!(stored.refresh_token, "refresh-1-rotated");
    }
}
