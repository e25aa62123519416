use crate::cloud_controller::request::join_path;
use crate::cloud_controller::types::ApiError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Resource envelope: `{"metadata": {...}, "entity": {...}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource<E> {
    pub metadata: ResourceMetadata,
    pub entity: E,
}

/// Server-assigned resource metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceMetadata {
    pub guid: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Describes one resource kind: where it lives and how it maps to a domain value
pub trait ResourceDescriptor {
    /// Collection path, e.g. `/v2/service_auth_tokens`
    const COLLECTION_PATH: &'static str;
    /// Name used in "not found" errors, e.g. `Service Auth Token`
    const MODEL_NAME: &'static str;

    /// Wire shape of the `entity` block
    type Entity: DeserializeOwned + Send;
    /// Domain value handed to callers
    type Model;

    fn to_model(resource: Resource<Self::Entity>) -> Self::Model;

    /// Path of a single resource in the collection, guid escaped as one segment
    fn resource_path(guid: &str) -> Result<String, ApiError> {
        join_path(Self::COLLECTION_PATH, &[guid])
    }
}

// ============================================================================
// Service auth tokens
// ============================================================================

/// `entity` block of a service auth token. The token value is write-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAuthTokenEntity {
    pub label: String,
    pub provider: String,
}

/// Create body for a service auth token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAuthTokenCreateRequest {
    pub label: String,
    pub provider: String,
    pub token: String,
}

/// Update body for a service auth token; only the token is mutable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAuthTokenUpdateRequest {
    pub token: String,
}

// ============================================================================
// Domains
// ============================================================================

/// `entity` block shared by private and shared domains
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEntity {
    pub name: String,
    #[serde(default)]
    pub owning_organization_guid: Option<String>,
    #[serde(default)]
    pub router_group_guid: Option<String>,
}

/// Create body for a private domain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivateDomainCreateRequest {
    pub name: String,
    pub owning_organization_guid: String,
}

// ============================================================================
// Routes
// ============================================================================

/// `entity` block of a route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteEntity {
    #[serde(default)]
    pub host: String,
    pub domain_guid: String,
    pub space_guid: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

/// Create body for a route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteCreateRequest {
    pub host: String,
    pub domain_guid: String,
    pub space_guid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}
