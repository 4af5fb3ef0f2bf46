use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sfunet_config::CredentialSettings;
use sfunet_domain::{DomainError, DomainResult, ErrorKind};

/// Grants embedded in a validated credential . Authorization
/// beyond these booleans is explicitly a non-goal.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Grants {
    #[serde(default)]
    pub room_join: bool,
    #[serde(default)]
    pub can_publish: bool,
    #[serde(default)]
    pub can_subscribe: bool,
    #[serde(default)]
    pub can_publish_data: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub identity: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub grants: Grants,
    /// Restricts the credential to a single room name, if set.
    #[serde(default)]
    pub room: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub nbf: Option<i64>,
}

/// The Credential Validator . Verifies signature and time-bound
/// claims on an externally-issued bearer token; minting tokens is out of
/// scope for the core, but `issue` exists to drive the wire-level
/// `/api/token` endpoint in a self-contained deployment.
pub struct CredentialValidator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    default_expires_in: u64,
}

impl CredentialValidator {
    pub fn new(settings: &CredentialSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        // jsonwebtoken performs signature comparison in constant time
        // internally (ring's hmac verify), which is why we never hand-roll
        // byte comparison here.
        Self {
            encoding_key: EncodingKey::from_secret(settings.api_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.api_secret.as_bytes()),
            validation,
            default_expires_in: settings.expires_in,
        }
    }

    /// Verifies a bearer string and returns its claims. Malformed, expired,
    /// not-yet-valid, or signature-mismatched tokens all map to
    /// `unauthorized` without leaking which condition failed.
    pub fn validate(&self, bearer: &str) -> DomainResult<Claims> {
        decode::<Claims>(bearer, &self.decoding_key, &self.validation)
        .map(|data| data.claims)
        .map_err(|_| DomainError::new(ErrorKind::Unauthorized, "invalid credential"))
    }

    /// Issues a bearer token for the wire-level `/api/token` endpoint.
    pub fn issue(
        &self,
        identity: String,
        display_name: Option<String>,
        room: Option<String>,
        metadata: serde_json::Value,
        grants: Grants,
    ) -> DomainResult<String> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            identity,
            display_name,
            metadata,
            grants,
            room,
            exp: now + self.default_expires_in as i64,
            nbf: Some(now),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
        .map_err(|e| DomainError::new(ErrorKind::Unknown, format!("failed to issue token: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> CredentialSettings {
        CredentialSettings {
            api_key: "test-key".into(),
            api_secret: "test-secret".into(),
            expires_in: 3600,
        }
    }

    #[test]
    fn round_trips_a_valid_token() {
        let validator = CredentialValidator::new(&settings());
        let token = validator
        .issue(
            "alice".into(),
            Some("Alice".into()),
            Some("room1".into()),
            serde_json::json!({}),
            Grants {
                room_join: true,
                can_publish: true,
                can_subscribe: true,
                can_publish_data: false,
            },
        )
        .unwrap();

        let claims = validator.validate(&token).unwrap();
        assert_eq!(claims.identity, "alice");
        assert!(claims.grants.can_publish);
        assert!(!claims.grants.can_publish_data);
    }

    #[test]
    fn rejects_garbage_token() {
        let validator = CredentialValidator::new(&settings());
        let err = validator.validate("not-a-jwt").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthorized);
    }

    #[test]
    fn rejects_token_signed_with_different_secret() {
        let validator = CredentialValidator::new(&settings());
        let other = CredentialValidator::new(&CredentialSettings {
                api_key: "test-key".into(),
                api_secret: "different-secret".into(),
                expires_in: 3600,
        });
        let token = other
        .issue("bob".into(), None, None, serde_json::json!({}), Grants::default())
        .unwrap();
        let err = validator.validate(&token).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthorized);
    }
}
