use crate::cloud_controller::gateway::CloudControllerGateway;
use crate::cloud_controller::repositories::ResourceRepository;
use crate::cloud_controller::request::Filter;
use crate::cloud_controller::resources::{
    Resource, ResourceDescriptor, ServiceAuthTokenCreateRequest, ServiceAuthTokenEntity,
    ServiceAuthTokenUpdateRequest,
};
use crate::cloud_controller::types::CloudControllerError;

/// Service auth token as seen by callers
///
/// `guid` is empty until the token exists remotely. `token` is write-only on
/// the server and is never populated by lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceAuthTokenFields {
    pub guid: String,
    pub label: String,
    pub provider: String,
    pub token: String,
}

/// `/v2/service_auth_tokens`
pub struct ServiceAuthTokens;

impl ResourceDescriptor for ServiceAuthTokens {
    const COLLECTION_PATH: &'static str = "/v2/service_auth_tokens";
    const MODEL_NAME: &'static str = "Service Auth Token";

    type Entity = ServiceAuthTokenEntity;
    type Model = ServiceAuthTokenFields;

    fn to_model(resource: Resource<Self::Entity>) -> Self::Model {
        ServiceAuthTokenFields {
            guid: resource.metadata.guid,
            label: resource.entity.label,
            provider: resource.entity.provider,
            token: String::new(),
        }
    }
}

/// Repository for service auth tokens
#[derive(Clone)]
pub struct ServiceAuthTokenRepository {
    resources: ResourceRepository<ServiceAuthTokens>,
}

impl ServiceAuthTokenRepository {
    pub fn new(gateway: CloudControllerGateway) -> Self {
        Self {
            resources: ResourceRepository::new(gateway),
        }
    }

    /// Create a token from its label, provider and token value
    pub async fn create(&self, token: &ServiceAuthTokenFields) -> Result<(), CloudControllerError> {
        let body = ServiceAuthTokenCreateRequest {
            label: token.label.clone(),
            provider: token.provider.clone(),
            token: token.token.clone(),
        };
        self.resources.create(&body).await
    }

    pub async fn find_all(&self) -> Result<Vec<ServiceAuthTokenFields>, CloudControllerError> {
        self.resources.find_all().await
    }

    pub async fn find_by_label_and_provider(
        &self,
        label: &str,
        provider: &str,
    ) -> Result<ServiceAuthTokenFields, CloudControllerError> {
        let filter = Filter::new("label", label).and("provider", provider);
        self.resources.find_by_filter(filter).await
    }

    /// Replace the token value of an existing auth token
    pub async fn update(&self, token: &ServiceAuthTokenFields) -> Result<(), CloudControllerError> {
        let body = ServiceAuthTokenUpdateRequest {
            token: token.token.clone(),
        };
        self.resources.update(&token.guid, &body).await
    }

    pub async fn delete(&self, token: &ServiceAuthTokenFields) -> Result<(), CloudControllerError> {
        self.resources.delete(&token.guid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud_controller::resources::ResourceMetadata;

    #[test]
    fn test_to_model_maps_metadata_and_entity() {
        let resource = Resource {
            metadata: ResourceMetadata {
                guid: "mysql-core-guid".to_string(),
                ..Default::default()
            },
            entity: ServiceAuthTokenEntity {
                label: "mysql".to_string(),
                provider: "mysql-core".to_string(),
            },
        };

        assert_eq!(
            ServiceAuthTokens::to_model(resource),
            ServiceAuthTokenFields {
                guid: "mysql-core-guid".to_string(),
                label: "mysql".to_string(),
                provider: "mysql-core".to_string(),
                token: String::new(),
            }
        );
    }

    #[test]
    fn test_resource_path() {
        assert_eq!(
            ServiceAuthTokens::resource_path("mysql-core-guid").unwrap(),
            "/v2/service_auth_tokens/mysql-core-guid"
        );
    }
}
