/// Cloud Controller API client module
///
/// Everything needed to talk to a Cloud Controller v2 API: the authenticated
/// gateway, paginated listing, resource repositories and session handling.
///
/// ## Request Flow
///
/// 1. A repository builds an [`ApiRequest`] (method, path, body, filter)
/// 2. The gateway resolves it against the current endpoint and attaches the access token
/// 3. On 401 the token is refreshed once through the [`CredentialStore`] and the request resent
/// 4. Listings follow `next_url` until the last page
pub mod config;
pub mod credentials;
pub mod gateway;
pub mod pagination;
pub mod repositories;
pub mod request;
pub mod resources;
pub mod session;
pub mod token_info;
pub mod types;
pub mod uaa;

pub use config::GatewayConfig;
pub use credentials::{CredentialFuture, CredentialStore, TokenPair, TokenRefresher};
pub use gateway::{ApiResponse, CloudControllerGateway};
pub use pagination::{Page, PaginationWalker};
pub use request::{ApiRequest, Filter};
pub use resources::{Resource, ResourceDescriptor, ResourceMetadata};
pub use session::{clear_session, load_session, save_session, Session, SessionCredentials};
pub use token_info::{extract_bearer_token, TokenInfo};
pub use types::{ApiError, CloudControllerError};
pub use uaa::UaaClient;
