use serde::Deserialize;
use std::fmt;

/// Cloud Controller SDK error type
///
/// Represents all possible errors that can occur when talking to a Cloud
/// Controller API through the gateway and its repositories.
#[derive(Debug)]
pub enum CloudControllerError {
    /// API request failed (network, HTTP, authentication or response parsing error)
    Api(ApiError),
    /// A filtered lookup matched no resources
    ModelNotFound {
        /// Human readable resource kind, e.g. "Service Auth Token"
        model: String,
        /// The filter that was searched, e.g. "label:mysql;provider:core"
        filter: String,
    },
    /// The operation needs state the caller's entity does not carry (usually a guid)
    InvalidState(String),
    /// Session storage operation failed
    Storage(crate::storage::StorageError),
    /// Configuration error
    Config(String),
    /// Access token could not be decoded
    Token(String),
}

impl fmt::Display for CloudControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloudControllerError::Api(err) => write!(f, "API error: {}", err),
            CloudControllerError::ModelNotFound { model, filter } => {
                write!(f, "{} {} not found", model, filter)
            }
            CloudControllerError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            CloudControllerError::Storage(err) => write!(f, "Storage error: {}", err),
            CloudControllerError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CloudControllerError::Token(msg) => write!(f, "Token error: {}", msg),
        }
    }
}

impl std::error::Error for CloudControllerError {}

impl CloudControllerError {
    /// True if this is a "not found" result from a filtered lookup
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudControllerError::ModelNotFound { .. })
    }

    /// True if the gateway gave up after its single refresh-and-retry
    pub fn is_authentication(&self) -> bool {
        matches!(self, CloudControllerError::Api(ApiError::Authentication(_)))
    }
}

impl From<ApiError> for CloudControllerError {
    fn from(err: ApiError) -> Self {
        CloudControllerError::Api(err)
    }
}

impl From<crate::storage::StorageError> for CloudControllerError {
    fn from(err: crate::storage::StorageError) -> Self {
        CloudControllerError::Storage(err)
    }
}

impl From<jsonwebtoken::errors::Error> for CloudControllerError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        CloudControllerError::Token(err.to_string())
    }
}

/// API-specific errors
#[derive(Debug)]
pub enum ApiError {
    /// Network error (connection refused, DNS, timeout, etc.)
    Network(String),
    /// Token refresh failed, or the retried request was still unauthorized
    Authentication(String),
    /// Non-2xx HTTP status other than an auth failure
    Http {
        status: u16,
        /// Machine readable code from the error body, if the body had one
        error_code: Option<String>,
        /// Human readable description from the error body, if the body had one
        description: Option<String>,
        /// Raw response body, passed through unchanged
        body: String,
    },
    /// Failed to parse a response (malformed body or misbehaving pagination)
    Parse(String),
    /// Request building failed
    Request(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Network(msg) => write!(f, "Network error: {}", msg),
            ApiError::Authentication(msg) => write!(f, "Authentication error: {}", msg),
            ApiError::Http {
                status,
                error_code,
                description,
                body,
            } => match (error_code, description) {
                (Some(code), Some(description)) => write!(
                    f,
                    "HTTP {} error: {}\nCode: {}",
                    status, description, code
                ),
                _ => write!(f, "HTTP {} error: {}", status, body),
            },
            ApiError::Parse(msg) => write!(f, "Parse error: {}", msg),
            ApiError::Request(msg) => write!(f, "Request error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Network("Request timeout".to_string())
        } else if err.is_connect() {
            ApiError::Network(format!("Connection failed: {}", err))
        } else if err.is_builder() {
            ApiError::Request(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Error payload as returned by the Cloud Controller
///
/// v2 bodies look like `{"code": 10003, "description": "...", "error_code": "CF-NotAuthorized"}`.
/// UAA bodies use `error` / `error_description` instead.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl ApiError {
    /// Build an `ApiError::Http` from a status and raw body, extracting the
    /// server's code and description when the body is JSON.
    pub fn from_response(status: u16, body: String) -> Self {
        let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();

        let error_code = parsed
            .error_code
            .or(parsed.error)
            .or_else(|| parsed.code.map(|code| match code {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            }));
        let description = parsed.description.or(parsed.error_description);

        ApiError::Http {
            status,
            error_code,
            description,
            body,
        }
    }

    /// HTTP status for `Http` errors
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_response_cloud_controller_body() {
        let body = r#"{"code":10003,"description":"You are not authorized","error_code":"CF-NotAuthorized"}"#;
        let err = ApiError::from_response(403, body.to_string());

        match err {
            ApiError::Http {
                status,
                error_code,
                description,
                body: raw,
            } => {
                assert_eq!(status, 403);
                assert_eq!(error_code.as_deref(), Some("CF-NotAuthorized"));
                assert_eq!(description.as_deref(), Some("You are not authorized"));
                assert_eq!(raw, body);
            }
            other => panic!("expected Http error, got {:?}", other),
        }
    }

    #[test]
    fn test_from_response_numeric_code_only() {
        let err = ApiError::from_response(400, r#"{"code":210003,"description":"taken"}"#.into());
        match err {
            ApiError::Http { error_code, .. } => assert_eq!(error_code.as_deref(), Some("210003")),
            other => panic!("expected Http error, got {:?}", other),
        }
    }

    #[test]
    fn test_from_response_uaa_body() {
        let body = r#"{"error":"invalid_token","error_description":"expired"}"#;
        let err = ApiError::from_response(401, body.into());
        match err {
            ApiError::Http {
                error_code,
                description,
                ..
            } => {
                assert_eq!(error_code.as_deref(), Some("invalid_token"));
                assert_eq!(description.as_deref(), Some("expired"));
            }
            other => panic!("expected Http error, got {:?}", other),
        }
    }

    #[test]
    fn test_from_response_non_json_body() {
        let err = ApiError::from_response(502, "Bad Gateway".into());
        assert_eq!(err.status(), Some(502));
        assert_eq!(err.to_string(), "HTTP 502 error: Bad Gateway");
    }

    #[test]
    fn test_model_not_found_display() {
        let err = CloudControllerError::ModelNotFound {
            model: "Service Auth Token".into(),
            filter: "label:a-label;provider:a-provider".into(),
        };
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "Service Auth Token label:a-label;provider:a-provider not found"
        );
    }

    #[test]
    fn test_is_authentication() {
        let err = CloudControllerError::from(ApiError::Authentication("nope".into()));
        assert!(err.is_authentication());
        assert!(!err.is_not_found());
    }
}
