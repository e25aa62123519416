use crate::cloud_controller::token_info::extract_bearer_token;
use crate::cloud_controller::types::ApiError;
use reqwest::{Method, Url};
use serde::Serialize;
use std::fmt;

/// Server-side query filter
///
/// Rendered as `key:value` pairs joined with `;` and sent as a single `q`
/// query parameter, e.g. `q=label%3Amysql%3Bprovider%3Acore`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pairs: Vec<(String, String)>,
}

impl Filter {
    /// Start a filter with one `key:value` pair
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::default().and(key, value)
    }

    /// Add another `key:value` pair (builder pattern)
    pub fn and(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((key.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Unescaped `q` value
    pub fn query_value(&self) -> String {
        self.pairs
            .iter()
            .map(|(key, value)| format!("{}:{}", key, value))
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.query_value())
    }
}

/// One API call, built fresh per request
///
/// The body is held as already-encoded bytes so the gateway can replay the
/// exact same request after a token refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: Option<Vec<u8>>,
    filter: Option<Filter>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            filter: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body
    pub fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        let bytes = serde_json::to_vec(body).map_err(|e| {
            tracing::error!("Failed to serialize request body: {}", e);
            ApiError::Request(format!("Failed to serialize request body: {}", e))
        })?;
        self.body = Some(bytes);
        Ok(self)
    }

    /// Attach a `q` filter. An empty filter is ignored.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = if filter.is_empty() { None } else { Some(filter) };
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// Resolve the full URL against an endpoint
    ///
    /// Absolute paths are used verbatim. Relative paths are appended to the
    /// endpoint, keeping any query string they already carry (`?page=2`).
    pub fn url(&self, endpoint: &str) -> Result<Url, ApiError> {
        let raw = if self.path.starts_with("http://") || self.path.starts_with("https://") {
            self.path.clone()
        } else if self.path.starts_with('/') {
            format!("{}{}", endpoint.trim_end_matches('/'), self.path)
        } else {
            format!("{}/{}", endpoint.trim_end_matches('/'), self.path)
        };

        let mut url = Url::parse(&raw)
            .map_err(|e| ApiError::Request(format!("Invalid request URL {}: {}", raw, e)))?;

        if let Some(filter) = &self.filter {
            url.query_pairs_mut().append_pair("q", &filter.query_value());
        }

        Ok(url)
    }

    /// Materialize as a reqwest builder for an already resolved `url`
    pub(crate) fn to_builder(
        &self,
        client: &reqwest::Client,
        url: Url,
        access_token: &str,
    ) -> reqwest::RequestBuilder {
        let mut builder = client
            .request(self.method.clone(), url)
            .header("Authorization", bearer_header(access_token))
            .header("Accept", "application/json");

        if let Some(body) = &self.body {
            builder = builder
                .header("Content-Type", "application/json")
                .body(body.clone());
        }

        builder
    }
}

/// Append percent-encoded segments to a collection path
///
/// Each segment stays a single path segment: `/`, `?`, `#` and `%` are
/// escaped. `.` and `..` are refused since URL parsing would resolve them.
pub fn join_path(base: &str, segments: &[&str]) -> Result<String, ApiError> {
    let mut url = Url::parse("http://localhost/")
        .map_err(|e| ApiError::Request(format!("Invalid base URL: {}", e)))?;
    url.set_path(base);

    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| ApiError::Request(format!("Cannot append to path {}", base)))?;
        for segment in segments {
            if segment.is_empty() || *segment == "." || *segment == ".." {
                return Err(ApiError::Request(format!(
                    "Invalid path segment {:?} for {}",
                    segment, base
                )));
            }
            path.push(segment);
        }
    }

    Ok(url.path().to_string())
}

/// `Authorization` header value for a token that may or may not already carry its scheme
pub fn bearer_header(access_token: &str) -> String {
    format!("bearer {}", extract_bearer_token(access_token).unwrap_or_default())
}

/// Mask a token for log output, keeping only a short prefix
pub fn redact_token(access_token: &str) -> String {
    let raw = extract_bearer_token(access_token).unwrap_or_default();
    let prefix: String = raw.chars().take(6).collect();
    format!("{}[PRIVATE DATA HIDDEN]", prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_query_value() {
        let filter = Filter::new("label", "a-label").and("provider", "a-provider");
        assert_eq!(filter.query_value(), "label:a-label;provider:a-provider");
        assert_eq!(filter.to_string(), "label:a-label;provider:a-provider");
    }

    #[test]
    fn test_filter_is_escaped_as_single_q_parameter() {
        let request = ApiRequest::get("/v2/service_auth_tokens")
            .with_filter(Filter::new("label", "a-label").and("provider", "a-provider"));

        let url = request.url("https://api.example.com").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/v2/service_auth_tokens?q=label%3Aa-label%3Bprovider%3Aa-provider"
        );
    }

    #[test]
    fn test_empty_filter_is_dropped() {
        let request = ApiRequest::get("/v2/routes").with_filter(Filter::default());
        assert!(request.filter().is_none());
        let url = request.url("https://api.example.com/").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v2/routes");
    }

    #[test]
    fn test_relative_next_url_keeps_query() {
        let request = ApiRequest::get("/v2/service_auth_tokens?page=2");
        let url = request.url("https://api.example.com").unwrap();
        assert_eq!(url.path(), "/v2/service_auth_tokens");
        assert_eq!(url.query(), Some("page=2"));
    }

    #[test]
    fn test_absolute_path_used_verbatim() {
        let request = ApiRequest::get("https://other.example.com/v2/routes?page=3");
        let url = request.url("https://api.example.com").unwrap();
        assert_eq!(url.as_str(), "https://other.example.com/v2/routes?page=3");
    }

    #[test]
    fn test_path_without_leading_slash() {
        let request = ApiRequest::delete("v2/routes/abc");
        let url = request.url("https://api.example.com").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v2/routes/abc");
    }

    #[test]
    fn test_json_body_is_encoded_once() {
        #[derive(Serialize)]
        struct Body<'a> {
            token: &'a str,
        }

        let request = ApiRequest::put("/v2/service_auth_tokens/guid")
            .with_json(&Body { token: "a value" })
            .unwrap();
        assert_eq!(request.method(), &Method::PUT);
        assert_eq!(request.body().unwrap(), br#"{"token":"a value"}"#);
    }

    #[test]
    fn test_bearer_header() {
        assert_eq!(bearer_header("abc"), "bearer abc");
        assert_eq!(bearer_header("bearer abc"), "bearer abc");
        assert_eq!(bearer_header("Bearer   abc"), "bearer abc");
    }

    #[test]
    fn test_bearer_header_any_scheme_casing() {
        assert_eq!(bearer_header("BEARER abc"), "bearer abc");
        assert_eq!(bearer_header("  bEaReR abc  "), "bearer abc");
    }

    #[test]
    fn test_redact_token() {
        let redacted = redact_token("bearer eyJhbGciOiJSUzI1NiJ9.secret");
        assert_eq!(redacted, "eyJhbG[PRIVATE DATA HIDDEN]");
        assert!(!redacted.contains("secret"));
    }

    #[test]
    fn test_redact_token_strips_scheme_in_any_casing() {
        assert_eq!(redact_token("BEARER abcdefghij"), "abcdef[PRIVATE DATA HIDDEN]");
        assert_eq!(redact_token("abcdefghij"), "abcdef[PRIVATE DATA HIDDEN]");
        assert_eq!(redact_token(""), "[PRIVATE DATA HIDDEN]");
    }

    #[test]
    fn test_join_path_escapes_each_segment() {
        assert_eq!(
            join_path("/v2/routes", &["route-guid"]).unwrap(),
            "/v2/routes/route-guid"
        );
        assert_eq!(
            join_path("/v2/service_auth_tokens", &["../../v2/apps/victim"]).unwrap(),
            "/v2/service_auth_tokens/..%2F..%2Fv2%2Fapps%2Fvictim"
        );
        assert_eq!(
            join_path("/v2/routes", &["a?b#c"]).unwrap(),
            "/v2/routes/a%3Fb%23c"
        );
    }

    #[test]
    fn test_join_path_survives_url_resolution() {
        let path = join_path("/v2/service_auth_tokens", &["../../v2/apps/victim"]).unwrap();
        let url = ApiRequest::delete(path).url("https://api.example.com").unwrap();
        assert_eq!(
            url.path(),
            "/v2/service_auth_tokens/..%2F..%2Fv2%2Fapps%2Fvictim"
        );
        assert!(url.query().is_none());
    }

    #[test]
    fn test_join_path_rejects_dot_segments() {
        assert!(matches!(join_path("/v2/routes", &[".."]), Err(ApiError::Request(_))));
        assert!(matches!(join_path("/v2/routes", &["."]), Err(ApiError::Request(_))));
        assert!(matches!(join_path("/v2/routes", &[""]), Err(ApiError::Request(_))));
    }
}
