//! Typed repositories over the gateway
//!
//! [`ResourceRepository`] carries the operations every resource kind shares;
//! the concrete repositories map their domain values onto it.
pub mod domains;
pub mod routes;
pub mod service_auth_tokens;

pub use domains::{DomainFields, DomainRepository};
pub use routes::{RouteFields, RouteRepository};
pub use service_auth_tokens::{ServiceAuthTokenFields, ServiceAuthTokenRepository};

use crate::cloud_controller::gateway::CloudControllerGateway;
use crate::cloud_controller::request::{ApiRequest, Filter};
use crate::cloud_controller::resources::{Resource, ResourceDescriptor};
use crate::cloud_controller::types::CloudControllerError;
use serde::Serialize;
use std::marker::PhantomData;

/// Create/FindAll/FindByFilter/Update/Delete for one resource kind
pub struct ResourceRepository<R: ResourceDescriptor> {
    gateway: CloudControllerGateway,
    _kind: PhantomData<fn() -> R>,
}

impl<R: ResourceDescriptor> Clone for ResourceRepository<R> {
    fn clone(&self) -> Self {
        Self::new(self.gateway.clone())
    }
}

impl<R: ResourceDescriptor> ResourceRepository<R> {
    pub fn new(gateway: CloudControllerGateway) -> Self {
        Self {
            gateway,
            _kind: PhantomData,
        }
    }

    pub fn gateway(&self) -> &CloudControllerGateway {
        &self.gateway
    }

    /// POST the body to the collection
    pub async fn create<B: Serialize + ?Sized>(&self, body: &B) -> Result<(), CloudControllerError> {
        self.gateway.create_resource(R::COLLECTION_PATH, body).await?;
        tracing::info!("{} created", R::MODEL_NAME);
        Ok(())
    }

    /// POST the body to the collection and map the resource the server echoes back
    pub async fn create_returning<B: Serialize + ?Sized>(
        &self,
        body: &B,
    ) -> Result<R::Model, CloudControllerError> {
        let response = self.gateway.create_resource(R::COLLECTION_PATH, body).await?;
        let resource: Resource<R::Entity> = response.json()?;
        tracing::info!("{} created: guid={}", R::MODEL_NAME, resource.metadata.guid);
        Ok(R::to_model(resource))
    }

    /// Every resource in the collection, across all pages, in server order
    pub async fn find_all(&self) -> Result<Vec<R::Model>, CloudControllerError> {
        self.find_all_matching(Filter::default()).await
    }

    /// Every resource matching `filter`, across all pages
    pub async fn find_all_matching(
        &self,
        filter: Filter,
    ) -> Result<Vec<R::Model>, CloudControllerError> {
        let request = ApiRequest::get(R::COLLECTION_PATH).with_filter(filter);
        let resources = self.gateway.list_all_resources::<R::Entity>(&request).await?;
        tracing::debug!("Found {} {} resource(s)", resources.len(), R::MODEL_NAME);
        Ok(resources.into_iter().map(R::to_model).collect())
    }

    /// First resource on the first page matching `filter`
    ///
    /// Fails with [`CloudControllerError::ModelNotFound`] when nothing matches.
    pub async fn find_by_filter(&self, filter: Filter) -> Result<R::Model, CloudControllerError> {
        let request = ApiRequest::get(R::COLLECTION_PATH).with_filter(filter.clone());
        let page = self.gateway.get_page::<R::Entity>(&request).await?;

        match page.resources.into_iter().next() {
            Some(resource) => Ok(R::to_model(resource)),
            None => {
                tracing::debug!("No {} matches filter {}", R::MODEL_NAME, filter);
                Err(CloudControllerError::ModelNotFound {
                    model: R::MODEL_NAME.to_string(),
                    filter: filter.to_string(),
                })
            }
        }
    }

    /// PUT the body to `{collection}/{guid}`
    pub async fn update<B: Serialize + ?Sized>(
        &self,
        guid: &str,
        body: &B,
    ) -> Result<(), CloudControllerError> {
        let path = Self::guid_path(guid, "update")?;
        self.gateway.update_resource(&path, body).await?;
        tracing::info!("{} updated: guid={}", R::MODEL_NAME, guid);
        Ok(())
    }

    /// DELETE `{collection}/{guid}`
    pub async fn delete(&self, guid: &str) -> Result<(), CloudControllerError> {
        let path = Self::guid_path(guid, "delete")?;
        self.gateway.delete_resource(&path).await?;
        tracing::info!("{} deleted: guid={}", R::MODEL_NAME, guid);
        Ok(())
    }

    fn guid_path(guid: &str, operation: &str) -> Result<String, CloudControllerError> {
        if guid.trim().is_empty() {
            return Err(CloudControllerError::InvalidState(format!(
                "Cannot {} {} without a guid",
                operation,
                R::MODEL_NAME
            )));
        }
        if guid == "." || guid == ".." {
            return Err(CloudControllerError::InvalidState(format!(
                "Cannot {} {} with guid {:?}",
                operation,
                R::MODEL_NAME,
                guid
            )));
        }
        Ok(R::resource_path(guid)?)
    }
}
