use crate::cloud_controller::types::CloudControllerError;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims of a UAA-issued access token
///
/// Only the claims the client cares about are decoded. The signature is not
/// checked: the API server validates the token, the client just reads it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenInfo {
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    /// Expiration time (Unix timestamp)
    #[serde(default)]
    pub exp: Option<i64>,
    /// Issuer, the UAA token endpoint
    #[serde(default)]
    pub iss: Option<String>,
}

impl TokenInfo {
    /// Decode the claims of an access token, with or without its `bearer ` prefix
    pub fn from_access_token(access_token: &str) -> Result<Self, CloudControllerError> {
        let token = extract_bearer_token(access_token)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<TokenInfo>(token, &DecodingKey::from_secret(&[]), &validation)
            .map_err(|e| {
                tracing::debug!("Failed to decode access token claims: {}", e);
                CloudControllerError::Token(format!("Failed to decode access token: {}", e))
            })?;

        Ok(data.claims)
    }

    /// When the token expires, if it says
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    /// Check if the token is expired. Tokens without `exp` never expire.
    pub fn is_expired(&self) -> bool {
        match self.exp {
            Some(exp) => Utc::now().timestamp() >= exp,
            None => false,
        }
    }
}

/// Strip a case-insensitive `bearer ` scheme from a token or Authorization value
pub fn extract_bearer_token(value: &str) -> Result<&str, CloudControllerError> {
    let value = value.trim();
    let token = match value.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer ") => value[7..].trim(),
        _ => value,
    };

    if token.is_empty() {
        return Err(CloudControllerError::Token("Access token is empty".to_string()));
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn make_token(claims: serde_json::Value) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"uaa-signing-secret"),
        )
        .unwrap()
    }

    #[test]
    fn test_extract_bearer_token_valid() {
        assert_eq!(extract_bearer_token("bearer abc.def.ghi").unwrap(), "abc.def.ghi");
        assert_eq!(extract_bearer_token("Bearer abc.def.ghi").unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_extract_bearer_token_without_scheme() {
        assert_eq!(extract_bearer_token("  abc.def.ghi ").unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_extract_bearer_token_empty_token() {
        assert!(extract_bearer_token("bearer   ").is_err());
        assert!(extract_bearer_token("").is_err());
    }

    #[test]
    fn test_decode_claims_without_signature_check() {
        let token = make_token(json!({
            "user_name": "admin",
            "user_id": "user-guid",
            "email": "admin@example.com",
            "exp": 4102444800i64,
            "iss": "https://uaa.example.com/oauth/token"
        }));

        let info = TokenInfo::from_access_token(&format!("bearer {}", token)).unwrap();
        assert_eq!(info.user_name.as_deref(), Some("admin"));
        assert_eq!(info.user_id.as_deref(), Some("user-guid"));
        assert_eq!(info.email.as_deref(), Some("admin@example.com"));
        assert!(!info.is_expired());
        assert_eq!(info.expires_at().unwrap().timestamp(), 4102444800);
    }

    #[test]
    fn test_expired_token() {
        let token = make_token(json!({"user_name": "admin", "exp": 1577836800i64}));
        let info = TokenInfo::from_access_token(&token).unwrap();
        assert!(info.is_expired());
    }

    #[test]
    fn test_token_without_exp_is_not_expired() {
        let token = make_token(json!({"client_id": "cf"}));
        let info = TokenInfo::from_access_token(&token).unwrap();
        assert_eq!(info.client_id.as_deref(), Some("cf"));
        assert!(!info.is_expired());
        assert!(info.expires_at().is_none());
    }

    #[test]
    fn test_garbage_token_fails() {
        let err = TokenInfo::from_access_token("bearer not-a-jwt").unwrap_err();
        assert!(matches!(err, CloudControllerError::Token(_)));
    }
}
