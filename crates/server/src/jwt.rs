//! Access-token signing.
//!
//! Two signers sit behind one trait: an HMAC signer for single-instance
//! deployments (no published keys) and an RSA signer whose public component
//! is served from the JWKS endpoint so resource servers can verify offline.

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use utoipa::ToSchema;

pub const ACCESS_TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("failed to sign token: {0}")]
    Sign(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    /// Wallet address of the signed-in user.
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin: Option<bool>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn issue(issuer: &str, address: &str, audience: Option<&str>, admin: bool) -> Self {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        Self {
            iss: issuer.to_string(),
            sub: address.to_string(),
            aud: audience.map(str::to_string),
            admin: admin.then_some(true),
            iat: now,
            exp: now + ACCESS_TOKEN_LIFETIME_SECS,
        }
    }
}

/// One key as published by the JWKS endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Jwk {
    pub kid: String,
    pub kty: String,
    pub alg: String,
    #[serde(rename = "use")]
    pub key_use: String,
    pub n: String,
    pub e: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

pub trait JwtIssuer: Send + Sync {
    fn sign(&self, claims: &Claims) -> Result<String, JwtError>;
    /// Public keys for offline verification. Empty for symmetric signers.
    fn public_keys(&self) -> JwkSet;
}

/// HS256 signer over a locally shared secret.
pub struct HmacJwtIssuer {
    key: EncodingKey,
}

impl HmacJwtIssuer {
    pub fn new(secret: &str) -> Self {
        Self {
            key: EncodingKey::from_secret(secret.as_bytes()),
        }
    }
}

impl JwtIssuer for HmacJwtIssuer {
    fn sign(&self, claims: &Claims) -> Result<String, JwtError> {
        Ok(jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.key)?)
    }

    fn public_keys(&self) -> JwkSet {
        JwkSet { keys: Vec::new() }
    }
}

/// RS256 signer with the public modulus/exponent taken from configuration,
/// so the serving instance never needs to parse its own public key.
pub struct RsaJwtIssuer {
    key: EncodingKey,
    kid: String,
    modulus: String,
    exponent: String,
}

impl RsaJwtIssuer {
    pub fn new(
        private_pem: &str,
        kid: &str,
        modulus: &str,
        exponent: &str,
    ) -> Result<Self, JwtError> {
        Ok(Self {
            key: EncodingKey::from_rsa_pem(private_pem.as_bytes())?,
            kid: kid.to_string(),
            modulus: modulus.to_string(),
            exponent: exponent.to_string(),
        })
    }
}

impl JwtIssuer for RsaJwtIssuer {
    fn sign(&self, claims: &Claims) -> Result<String, JwtError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone());
        Ok(jsonwebtoken::encode(&header, claims, &self.key)?)
    }

    fn public_keys(&self) -> JwkSet {
        JwkSet {
            keys: vec![Jwk {
                kid: self.kid.clone(),
                kty: "RSA".to_string(),
                alg: "RS256".to_string(),
                key_use: "sig".to_string(),
                n: self.modulus.clone(),
                e: self.exponent.clone(),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation};

    fn decode_hmac(token: &str, secret: &str, audience: Option<&str>) -> Claims {
        let mut validation = Validation::new(Algorithm::HS256);
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
            .unwrap()
            .claims
    }

    #[test]
    fn hmac_tokens_carry_the_expected_claims() {
        let issuer = HmacJwtIssuer::new("0123456789abcdef0123456789abcdef");
        let claims = Claims::issue("id.example.com", "PHkh...", Some("app.example.com"), false);
        let token = issuer.sign(&claims).unwrap();
        let decoded = decode_hmac(&token, "0123456789abcdef0123456789abcdef", Some("app.example.com"));
        assert_eq!(decoded.iss, "id.example.com");
        assert_eq!(decoded.sub, "PHkh...");
        assert_eq!(decoded.exp - decoded.iat, ACCESS_TOKEN_LIFETIME_SECS);
        assert!(decoded.admin.is_none());
    }

    #[test]
    fn admin_claim_only_appears_when_granted() {
        let issuer = HmacJwtIssuer::new("0123456789abcdef0123456789abcdef");
        let admin = Claims::issue("id.example.com", "PHkh...", None, true);
        let token = issuer.sign(&admin).unwrap();
        let decoded = decode_hmac(&token, "0123456789abcdef0123456789abcdef", None);
        assert_eq!(decoded.admin, Some(true));
    }

    #[test]
    fn hmac_issuer_publishes_no_keys() {
        let issuer = HmacJwtIssuer::new("0123456789abcdef0123456789abcdef");
        assert!(issuer.public_keys().keys.is_empty());
    }

    #[test]
    fn jwk_serializes_use_field() {
        let jwk = Jwk {
            kid: "k1".into(),
            kty: "RSA".into(),
            alg: "RS256".into(),
            key_use: "sig".into(),
            n: "abc".into(),
            e: "AQAB".into(),
        };
        let json = serde_json::to_value(&jwk).unwrap();
        assert_eq!(json["use"], "sig");
        assert_eq!(json["alg"], "RS256");
    }
}
