use crate::cloud_controller::gateway::CloudControllerGateway;
use crate::cloud_controller::repositories::ResourceRepository;
use crate::cloud_controller::request::{join_path, ApiRequest, Filter};
use crate::cloud_controller::resources::{
    DomainEntity, PrivateDomainCreateRequest, Resource, ResourceDescriptor,
};
use crate::cloud_controller::types::CloudControllerError;

/// A routable domain
///
/// Shared domains are available to every organization; private domains are
/// owned by one organization and may be shared with others.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainFields {
    pub guid: String,
    pub name: String,
    pub owning_organization_guid: Option<String>,
    pub shared: bool,
}

/// `/v2/shared_domains`
pub struct SharedDomains;

impl ResourceDescriptor for SharedDomains {
    const COLLECTION_PATH: &'static str = "/v2/shared_domains";
    const MODEL_NAME: &'static str = "Shared Domain";

    type Entity = DomainEntity;
    type Model = DomainFields;

    fn to_model(resource: Resource<Self::Entity>) -> Self::Model {
        DomainFields {
            guid: resource.metadata.guid,
            name: resource.entity.name,
            owning_organization_guid: None,
            shared: true,
        }
    }
}

/// `/v2/private_domains`
pub struct PrivateDomains;

impl ResourceDescriptor for PrivateDomains {
    const COLLECTION_PATH: &'static str = "/v2/private_domains";
    const MODEL_NAME: &'static str = "Private Domain";

    type Entity = DomainEntity;
    type Model = DomainFields;

    fn to_model(resource: Resource<Self::Entity>) -> Self::Model {
        DomainFields {
            guid: resource.metadata.guid,
            name: resource.entity.name,
            owning_organization_guid: resource.entity.owning_organization_guid,
            shared: false,
        }
    }
}

/// Repository for shared and private domains
#[derive(Clone)]
pub struct DomainRepository {
    shared: ResourceRepository<SharedDomains>,
    private: ResourceRepository<PrivateDomains>,
}

impl DomainRepository {
    pub fn new(gateway: CloudControllerGateway) -> Self {
        Self {
            shared: ResourceRepository::new(gateway.clone()),
            private: ResourceRepository::new(gateway),
        }
    }

    /// Create a private domain owned by `owning_organization_guid`
    pub async fn create(
        &self,
        name: &str,
        owning_organization_guid: &str,
    ) -> Result<DomainFields, CloudControllerError> {
        if owning_organization_guid.trim().is_empty() {
            return Err(CloudControllerError::InvalidState(
                "Cannot create a private domain without an owning organization guid".to_string(),
            ));
        }

        let body = PrivateDomainCreateRequest {
            name: name.to_string(),
            owning_organization_guid: owning_organization_guid.to_string(),
        };
        self.private.create_returning(&body).await
    }

    pub async fn find_all_shared(&self) -> Result<Vec<DomainFields>, CloudControllerError> {
        self.shared.find_all().await
    }

    pub async fn find_all_private(&self) -> Result<Vec<DomainFields>, CloudControllerError> {
        self.private.find_all().await
    }

    /// Shared domains first, then private ones
    pub async fn find_all(&self) -> Result<Vec<DomainFields>, CloudControllerError> {
        let mut domains = self.find_all_shared().await?;
        domains.extend(self.find_all_private().await?);
        Ok(domains)
    }

    /// Look a domain up by name, checking shared domains before private ones
    pub async fn find_by_name(&self, name: &str) -> Result<DomainFields, CloudControllerError> {
        let filter = Filter::new("name", name);

        match self.shared.find_by_filter(filter.clone()).await {
            Ok(domain) => return Ok(domain),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        self.private
            .find_by_filter(filter.clone())
            .await
            .map_err(|e| match e {
                CloudControllerError::ModelNotFound { .. } => CloudControllerError::ModelNotFound {
                    model: "Domain".to_string(),
                    filter: filter.to_string(),
                },
                other => other,
            })
    }

    /// Share a private domain with another organization
    pub async fn share(
        &self,
        domain: &DomainFields,
        organization_guid: &str,
    ) -> Result<(), CloudControllerError> {
        if domain.guid.trim().is_empty() || organization_guid.trim().is_empty() {
            return Err(CloudControllerError::InvalidState(
                "Sharing a domain requires both a domain guid and an organization guid"
                    .to_string(),
            ));
        }
        if domain.shared {
            return Err(CloudControllerError::InvalidState(format!(
                "Domain {} is already shared with every organization",
                domain.name
            )));
        }

        let path = join_path(
            "/v2/organizations",
            &[organization_guid, "private_domains", domain.guid.as_str()],
        )?;
        self.private.gateway().perform(&ApiRequest::put(path)).await?;
        tracing::info!(
            "Private domain {} shared with organization {}",
            domain.name,
            organization_guid
        );
        Ok(())
    }

    pub async fn delete(&self, domain: &DomainFields) -> Result<(), CloudControllerError> {
        if domain.shared {
            self.shared.delete(&domain.guid).await
        } else {
            self.private.delete(&domain.guid).await
        }
    }
}
