use crate::cloud_controller::gateway::CloudControllerGateway;
use crate::cloud_controller::repositories::ResourceRepository;
use crate::cloud_controller::request::{ApiRequest, Filter};
use crate::cloud_controller::resources::{
    Resource, ResourceDescriptor, RouteCreateRequest, RouteEntity,
};
use crate::cloud_controller::types::CloudControllerError;
use std::ops::ControlFlow;

/// A route: `host.domain/path` (or a TCP port) bound to a space
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteFields {
    pub guid: String,
    pub host: String,
    pub domain_guid: String,
    pub space_guid: String,
    pub path: String,
    pub port: Option<u16>,
}

/// `/v2/routes`
pub struct Routes;

impl ResourceDescriptor for Routes {
    const COLLECTION_PATH: &'static str = "/v2/routes";
    const MODEL_NAME: &'static str = "Route";

    type Entity = RouteEntity;
    type Model = RouteFields;

    fn to_model(resource: Resource<Self::Entity>) -> Self::Model {
        RouteFields {
            guid: resource.metadata.guid,
            host: resource.entity.host,
            domain_guid: resource.entity.domain_guid,
            space_guid: resource.entity.space_guid,
            path: resource.entity.path.unwrap_or_default(),
            port: resource.entity.port,
        }
    }
}

/// Repository for routes
#[derive(Clone)]
pub struct RouteRepository {
    resources: ResourceRepository<Routes>,
}

impl RouteRepository {
    pub fn new(gateway: CloudControllerGateway) -> Self {
        Self {
            resources: ResourceRepository::new(gateway),
        }
    }

    /// Create a route and return it with its server-assigned guid
    pub async fn create(&self, route: &RouteFields) -> Result<RouteFields, CloudControllerError> {
        if route.domain_guid.trim().is_empty() || route.space_guid.trim().is_empty() {
            return Err(CloudControllerError::InvalidState(
                "Creating a route requires a domain guid and a space guid".to_string(),
            ));
        }

        let body = RouteCreateRequest {
            host: route.host.clone(),
            domain_guid: route.domain_guid.clone(),
            space_guid: route.space_guid.clone(),
            path: normalize_path(&route.path),
            port: route.port,
        };
        self.resources.create_returning(&body).await
    }

    pub async fn find_all(&self) -> Result<Vec<RouteFields>, CloudControllerError> {
        self.resources.find_all().await
    }

    /// Find the route for `host` on `domain_guid` with exactly this context path and port
    ///
    /// The server filter only narrows by host and domain, so every page is
    /// walked until an entry matches the normalized path and the port.
    pub async fn find(
        &self,
        host: &str,
        domain_guid: &str,
        path: &str,
        port: Option<u16>,
    ) -> Result<RouteFields, CloudControllerError> {
        let wanted_path = normalize_path(path);
        let filter = Filter::new("host", host).and("domain_guid", domain_guid);
        let request = ApiRequest::get(Routes::COLLECTION_PATH).with_filter(filter.clone());

        let mut found = None;
        self.resources
            .gateway()
            .walk_resources::<RouteEntity, _>(&request, |resource| {
                let route_path = normalize_path(resource.entity.path.as_deref().unwrap_or_default());
                if route_path == wanted_path && resource.entity.port == port {
                    found = Some(Routes::to_model(resource));
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .await?;

        found.ok_or_else(|| {
            let mut described = filter;
            if let Some(path) = &wanted_path {
                described = described.and("path", path.as_str());
            }
            if let Some(port) = port {
                described = described.and("port", port.to_string());
            }
            tracing::debug!("No route matches {}", described);
            CloudControllerError::ModelNotFound {
                model: Routes::MODEL_NAME.to_string(),
                filter: described.to_string(),
            }
        })
    }

    pub async fn delete(&self, route: &RouteFields) -> Result<(), CloudControllerError> {
        self.resources.delete(&route.guid).await
    }
}

/// Context paths always start with `/`; an empty path means none
fn normalize_path(path: &str) -> Option<String> {
    let path = path.trim();
    if path.is_empty() || path == "/" {
        None
    } else if path.starts_with('/') {
        Some(path.to_string())
    } else {
        Some(format!("/{}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud_controller::resources::ResourceMetadata;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(""), None);
        assert_eq!(normalize_path("/"), None);
        assert_eq!(normalize_path("api"), Some("/api".to_string()));
        assert_eq!(normalize_path("/api/v1"), Some("/api/v1".to_string()));
    }

    #[test]
    fn test_to_model_defaults_missing_path() {
        let route = Routes::to_model(Resource {
            metadata: ResourceMetadata {
                guid: "route-guid".to_string(),
                ..Default::default()
            },
            entity: RouteEntity {
                host: "app".to_string(),
                domain_guid: "domain-guid".to_string(),
                space_guid: "space-guid".to_string(),
                path: None,
                port: None,
            },
        });

        assert_eq!(route.guid, "route-guid");
        assert_eq!(route.path, "");
        assert!(route.port.is_none());
    }
}
