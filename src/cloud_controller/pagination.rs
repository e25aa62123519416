use crate::cloud_controller::gateway::CloudControllerGateway;
use crate::cloud_controller::request::ApiRequest;
use crate::cloud_controller::resources::Resource;
use crate::cloud_controller::types::{ApiError, CloudControllerError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::ControlFlow;

/// One page of a collection response
///
/// ```json
/// {"next_url": "/v2/service_auth_tokens?page=2", "resources": [{"metadata": {...}, "entity": {...}}]}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<E> {
    #[serde(default)]
    pub total_results: Option<u64>,
    #[serde(default)]
    pub total_pages: Option<u64>,
    #[serde(default)]
    pub prev_url: Option<String>,
    #[serde(default)]
    pub next_url: Option<String>,
    pub resources: Vec<Resource<E>>,
}

impl<E> Page<E> {
    /// The next-page reference, treating an empty string as absent
    pub fn next_reference(&self) -> Option<&str> {
        self.next_url.as_deref().filter(|url| !url.is_empty())
    }
}

/// Follows `next_url` references until a collection is exhausted
///
/// Pages are fetched strictly one after another since each reference comes
/// from the previous response. References are opaque and requested exactly
/// as the server sent them.
pub struct PaginationWalker<'a> {
    gateway: &'a CloudControllerGateway,
    max_pages: Option<usize>,
}

impl<'a> PaginationWalker<'a> {
    pub fn new(gateway: &'a CloudControllerGateway) -> Self {
        Self {
            gateway,
            max_pages: gateway.config().max_pages,
        }
    }

    /// Override the page cap from the gateway configuration
    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Drain the collection starting at `first` into one ordered result
    ///
    /// All-or-nothing: any page failure discards what was already gathered.
    pub async fn collect<E: DeserializeOwned>(
        &self,
        first: Page<E>,
    ) -> Result<Vec<Resource<E>>, CloudControllerError> {
        let mut collected = Vec::new();
        self.walk(first, |resource| {
            collected.push(resource);
            ControlFlow::Continue(())
        })
        .await?;
        Ok(collected)
    }

    /// Visit every resource in page order, stopping early if `visit` breaks
    pub async fn walk<E, F>(&self, first: Page<E>, mut visit: F) -> Result<(), CloudControllerError>
    where
        E: DeserializeOwned,
        F: FnMut(Resource<E>) -> ControlFlow<()>,
    {
        let mut visited: HashSet<String> = HashSet::new();
        let mut pages_fetched = 1usize;
        let mut next = first.next_reference().map(str::to_string);

        for resource in first.resources {
            if visit(resource).is_break() {
                return Ok(());
            }
        }

        while let Some(next_url) = next {
            if !visited.insert(next_url.clone()) {
                tracing::error!("Pagination cycle detected at {}", next_url);
                return Err(ApiError::Parse(format!(
                    "Pagination cycle detected: next_url {} was already visited",
                    next_url
                ))
                .into());
            }

            if let Some(max_pages) = self.max_pages {
                if pages_fetched >= max_pages {
                    tracing::error!("Collection exceeded {} pages at {}", max_pages, next_url);
                    return Err(ApiError::Parse(format!(
                        "Collection exceeded the maximum of {} pages",
                        max_pages
                    ))
                    .into());
                }
            }

            tracing::debug!("Fetching next page: {}", next_url);
            let page: Page<E> = self.gateway.get_page(&ApiRequest::get(next_url)).await?;
            pages_fetched += 1;

            next = page.next_reference().map(str::to_string);
            for resource in page.resources {
                if visit(resource).is_break() {
                    return Ok(());
                }
            }
        }

        tracing::debug!("Collection walk finished after {} page(s)", pages_fetched);
        Ok(())
    }
}
