//! The issuance state machine.
//!
//! Everything between "a client asked to sign in" and "a token left the
//! building" goes through `AuthFlowService`: session creation, wallet
//! callbacks, code redemption, SID redemption, refresh rotation and socket
//! reconnects. HTTP and WebSocket handlers stay thin wrappers around it.

use std::sync::Arc;

use serde::Serialize;
use url::Url;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::cirrus::WalletVerifier;
use crate::encryption::aes_cbc::{TwoWayCipher, url_safe_decode};
use crate::encryption::stratis_id::{StratisId, StratisIdGenerator};
use crate::encryption::validator::{SidValidationError, StratisIdValidator};
use crate::entity::{auth_code, auth_session};
use crate::error::AuthError;
use crate::jwt::{ACCESS_TOKEN_LIFETIME_SECS, Claims, JwtIssuer};
use crate::notify::AuthNotifier;
use crate::store::AuthStore;

/// Callback path for wallet signatures in the code flow.
pub const SSAS_CALLBACK_PATH: &str = "v1/ssas/callback";
/// Callback path embedded in SID-grant connection tokens.
pub const TOKEN_CALLBACK_PATH: &str = "v1/auth/token";

pub const REFRESH_TOKEN_LEN: usize = 24;

const REFRESH_ALPHABET: &[u8; 62] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Successful token response, serialized per RFC 6749 §5.1.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

/// Pushed to a prompt page when its wallet callback lands.
#[derive(Debug, Serialize)]
pub struct CodeNotification<'a> {
    pub status: &'static str,
    pub code: &'a str,
}

/// Pushed to a reconnecting page when its success is still valid.
#[derive(Debug, Serialize)]
pub struct BearerNotification<'a> {
    pub status: &'static str,
    pub access_token: &'a str,
}

#[derive(Clone)]
pub struct AuthFlowService {
    store: AuthStore,
    issuer: Arc<dyn JwtIssuer>,
    notifier: Arc<dyn AuthNotifier>,
    validator: Arc<StratisIdValidator>,
    generator: StratisIdGenerator,
    cipher: TwoWayCipher,
    authority: String,
    prompt_url: String,
}

impl AuthFlowService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: AuthStore,
        issuer: Arc<dyn JwtIssuer>,
        verifier: Arc<dyn WalletVerifier>,
        notifier: Arc<dyn AuthNotifier>,
        cipher: TwoWayCipher,
        authority: &str,
        prompt_url: &str,
    ) -> Self {
        Self {
            store,
            issuer,
            notifier,
            validator: Arc::new(StratisIdValidator::new(cipher.clone(), verifier)),
            generator: StratisIdGenerator::new(cipher.clone(), authority),
            cipher,
            authority: authority.to_string(),
            prompt_url: prompt_url.to_string(),
        }
    }

    pub fn issuer_authority(&self) -> &str {
        &self.authority
    }

    pub fn public_keys(&self) -> crate::jwt::JwkSet {
        self.issuer.public_keys()
    }

    /// Start a code-flow sign-in. The audience bound to the eventual tokens
    /// is the authority of the redirect URI, not the full URI.
    #[tracing::instrument(skip(self, code_challenge))]
    pub async fn begin_code_session(
        &self,
        redirect_uri: &str,
        code_challenge: &str,
        method: crate::pkce::CodeChallengeMethod,
    ) -> Result<(auth_session::Model, String), AuthError> {
        let audience = redirect_authority(redirect_uri)?;
        let session = self
            .store
            .create_session(auth_session::Model::for_code_flow(
                &audience,
                code_challenge,
                method,
            ))
            .await?;
        let prompt_uri = format!(
            "{}?redirect_uri={}&stamp={}",
            self.prompt_url,
            urlencoding::encode(redirect_uri),
            session.stamp
        );
        Ok((session, prompt_uri))
    }

    /// Start a SID-flow sign-in. The session is keyed by the token's outer
    /// `uid`, which the client echoes back at the token endpoint.
    #[tracing::instrument(skip(self))]
    pub async fn begin_sid_session(&self) -> Result<StratisId, AuthError> {
        let connection_value = Uuid::new_v4().to_string();
        let sid = self.generator.create(TOKEN_CALLBACK_PATH, &connection_value);
        self.store
            .create_session(auth_session::Model::for_sid_flow(&sid.uid))
            .await?;
        Ok(sid)
    }

    /// Bind a socket connection to a prompt session and mint the token the
    /// prompt displays for the wallet to sign.
    #[tracing::instrument(skip(self))]
    pub async fn link_connection(
        &self,
        stamp: Uuid,
        connection_id: &str,
    ) -> Result<StratisId, AuthError> {
        self.store.link_connection(stamp, connection_id).await?;
        Ok(self.generator.create(SSAS_CALLBACK_PATH, connection_id))
    }

    /// Handle a signed wallet callback for the code flow: validate, mint an
    /// authorization code, and push it to the waiting prompt page.
    #[tracing::instrument(skip_all, fields(signer = %public_key))]
    pub async fn wallet_callback(
        &self,
        uid: &str,
        exp: i64,
        public_key: &str,
        signature: &str,
    ) -> Result<(), AuthError> {
        let callback = format!("{}/{SSAS_CALLBACK_PATH}", self.authority);
        let connection_id = self
            .validator
            .retrieve_connection_id(&callback, uid, exp, public_key, signature)
            .await
            .map_err(map_sid_error)?;

        let session = self
            .store
            .find_session_by_connection_id(&connection_id)
            .await?
            .ok_or(AuthError::InvalidGrant)?;

        let code = self
            .store
            .create_code(auth_code::Model::issue(public_key, session.stamp))
            .await?;

        let code_value = code.value.to_string();
        let payload = serde_json::to_string(&CodeNotification {
            status: "authenticated",
            code: &code_value,
        })
        .unwrap_or_default();
        self.notifier.push(&connection_id, payload);
        Ok(())
    }

    /// Redeem an authorization code. Single use: the code is removed on
    /// every path out of here, including failures.
    #[tracing::instrument(skip(self, code_verifier))]
    pub async fn redeem_code(
        &self,
        code_value: Uuid,
        code_verifier: &str,
    ) -> Result<TokenPair, AuthError> {
        let code = self
            .store
            .find_code_by_value(code_value)
            .await?
            .ok_or(AuthError::InvalidGrant)?;

        if !code.is_valid() {
            self.cleanup_code(code.value);
            return Err(AuthError::InvalidGrant);
        }

        let Some(session) = self.store.find_session_by_stamp(code.stamp).await? else {
            // Session vanished from under a live code. Collapse to a plain
            // grant failure but keep a trace for operators.
            tracing::error!(stamp = %code.stamp, "auth code references a missing session");
            self.cleanup_code(code.value);
            return Err(AuthError::InvalidGrant);
        };

        if !session.verify(code_verifier) {
            self.cleanup_code(code.value);
            return Err(AuthError::InvalidGrant);
        }

        self.store.delete_code(code.value).await?;
        self.store.delete_session(session.stamp).await?;
        self.issue_for(&code.signer, session.audience.as_deref(), None)
            .await
    }

    /// Redeem a SID grant. The session is removed before validation so a
    /// replayed uid can never race two issuances.
    #[tracing::instrument(skip_all, fields(signer = %public_key))]
    pub async fn redeem_sid(
        &self,
        uid: &str,
        exp: i64,
        public_key: &str,
        signature: &str,
    ) -> Result<TokenPair, AuthError> {
        let session = self
            .store
            .find_session_by_connection_id(uid)
            .await?
            .ok_or(AuthError::InvalidGrant)?;
        self.store.delete_session(session.stamp).await?;

        let callback = format!("{}/{TOKEN_CALLBACK_PATH}", self.authority);
        let connection_value = self
            .validator
            .retrieve_connection_id(&callback, uid, exp, public_key, signature)
            .await
            .map_err(map_sid_error)?;

        self.issue_for(public_key, None, Some(&connection_value)).await
    }

    /// Rotate a refresh token. Presenting a superseded token purges the
    /// whole chain on the assumption it leaked.
    #[tracing::instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let lookup = self
            .store
            .find_success_by_refresh_token(refresh_token)
            .await?
            .ok_or(AuthError::InvalidGrant)?;

        if lookup.stale || lookup.success.is_expired() {
            if lookup.stale {
                tracing::warn!(
                    success_id = lookup.success.id,
                    "superseded refresh token presented, revoking chain"
                );
            }
            self.cleanup_success(lookup.success.id);
            return Err(AuthError::InvalidGrant);
        }

        let success = lookup.success;
        let admin = self.store.is_admin(&success.address).await?;
        let claims = Claims::issue(
            &self.authority,
            &success.address,
            success.audience.as_deref(),
            admin,
        );
        let access_token = self.issuer.sign(&claims)?;
        let next_refresh = random_refresh_token();
        self.store.append_refresh_token(success, &next_refresh).await?;

        Ok(TokenPair {
            access_token,
            refresh_token: next_refresh,
            expires_in: ACCESS_TOKEN_LIFETIME_SECS,
            token_type: "bearer".to_string(),
        })
    }

    /// Re-attach a returning page to its previous sign-in. Push a fresh
    /// bearer token to the caller's connection when the old success still
    /// stands; all soft failures answer `false` with no detail.
    #[tracing::instrument(skip(self, sid))]
    pub async fn reconnect(
        &self,
        caller_connection_id: &str,
        previous_connection_id: &str,
        sid: &str,
    ) -> Result<bool, AuthError> {
        let Some(parsed) = StratisId::parse(sid) else {
            return Ok(false);
        };
        if parsed.expired() {
            return Ok(false);
        }
        let Ok(raw) = url_safe_decode(&parsed.uid) else {
            return Ok(false);
        };
        let Ok(plaintext) = self.cipher.decrypt(&raw) else {
            return Ok(false);
        };
        if plaintext.len() <= crate::encryption::stratis_id::EXP_DIGITS {
            return Ok(false);
        }
        let (connection_value, _) =
            plaintext.split_at(plaintext.len() - crate::encryption::stratis_id::EXP_DIGITS);
        if connection_value != previous_connection_id {
            return Ok(false);
        }

        let Some(success) = self
            .store
            .find_success_by_connection_id(previous_connection_id)
            .await?
        else {
            return Ok(false);
        };
        if success.is_expired() {
            return Ok(false);
        }

        let admin = self.store.is_admin(&success.address).await?;
        let claims = Claims::issue(
            &self.authority,
            &success.address,
            success.audience.as_deref(),
            admin,
        );
        let access_token = self.issuer.sign(&claims)?;
        let payload = serde_json::to_string(&BearerNotification {
            status: "reconnected",
            access_token: &access_token,
        })
        .unwrap_or_default();
        self.notifier.push(caller_connection_id, payload);
        Ok(true)
    }

    /// Sign a token pair and record the success, displacing any earlier
    /// success for the same (address, audience) target.
    async fn issue_for(
        &self,
        address: &str,
        audience: Option<&str>,
        connection_id: Option<&str>,
    ) -> Result<TokenPair, AuthError> {
        if let Some(existing) = self.store.find_success_by_target(address, audience).await? {
            self.store.delete_success(existing.id).await?;
        }

        let admin = self.store.is_admin(address).await?;
        let claims = Claims::issue(&self.authority, address, audience, admin);
        let access_token = self.issuer.sign(&claims)?;
        let refresh_token = random_refresh_token();
        self.store
            .create_success(address, audience, connection_id, &refresh_token)
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: ACCESS_TOKEN_LIFETIME_SECS,
            token_type: "bearer".to_string(),
        })
    }

    /// Remove a spent or broken code without tying the deletion to the
    /// caller's lifetime; a dropped request must not leave the code behind.
    fn cleanup_code(&self, value: Uuid) {
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.delete_code(value).await {
                tracing::error!("failed to clean up auth code: {e}");
            }
        });
    }

    fn cleanup_success(&self, success_id: i32) {
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.delete_success(success_id).await {
                tracing::error!("failed to revoke auth success: {e}");
            }
        });
    }
}

fn redirect_authority(redirect_uri: &str) -> Result<String, AuthError> {
    let url = Url::parse(redirect_uri)
        .map_err(|_| AuthError::InvalidRequest("Invalid redirect_uri".to_string()))?;
    let host = url
        .host_str()
        .ok_or(AuthError::InvalidRequest("Invalid redirect_uri".to_string()))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

fn map_sid_error(err: SidValidationError) -> AuthError {
    match err {
        SidValidationError::Expired => AuthError::InvalidGrant,
        SidValidationError::SignatureInvalid => AuthError::SignatureInvalid,
        SidValidationError::MalformedUid | SidValidationError::ExpiryMismatch => {
            AuthError::InvalidRequest("Malformed request".to_string())
        }
        SidValidationError::Verifier(e) => AuthError::Verifier(e),
    }
}

/// Draw a 24-character `[A-Za-z0-9]` token with rejection sampling so every
/// character is uniformly likely. 248 is the largest multiple of 62 below
/// 256; bytes at or above it are discarded.
pub fn random_refresh_token() -> String {
    let mut token = String::with_capacity(REFRESH_TOKEN_LEN);
    let mut buf = [0u8; 32];
    while token.len() < REFRESH_TOKEN_LEN {
        getrandom::fill(&mut buf).expect("Failed to gather randomness for refresh token");
        for byte in buf {
            if token.len() == REFRESH_TOKEN_LEN {
                break;
            }
            if byte < 248 {
                token.push(REFRESH_ALPHABET[(byte % 62) as usize] as char);
            }
        }
    }
    token
}
