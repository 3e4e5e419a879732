//! Wallet-signature callback validation.
//!
//! Order matters: expiry is checked before the (comparatively expensive)
//! signature verification, and the signature before any decryption, so a
//! caller can never probe the cipher with an unsigned payload.

use std::sync::Arc;

use thiserror::Error;

use crate::cirrus::{VerifierError, WalletVerifier};
use crate::encryption::aes_cbc::{TwoWayCipher, url_safe_decode};
use crate::encryption::stratis_id::{EXP_DIGITS, StratisId};

#[derive(Debug, Error)]
pub enum SidValidationError {
    #[error("connection token expired")]
    Expired,
    #[error("signature could not be verified")]
    SignatureInvalid,
    /// Undecodable, undecryptable, or structurally wrong uid.
    #[error("malformed uid")]
    MalformedUid,
    /// The expiry inside the encrypted uid disagrees with the clear one.
    #[error("expiry mismatch")]
    ExpiryMismatch,
    #[error(transparent)]
    Verifier(#[from] VerifierError),
}

pub struct StratisIdValidator {
    cipher: TwoWayCipher,
    verifier: Arc<dyn WalletVerifier>,
}

impl StratisIdValidator {
    pub fn new(cipher: TwoWayCipher, verifier: Arc<dyn WalletVerifier>) -> Self {
        Self { cipher, verifier }
    }

    /// Validate a signed callback and recover the connection id embedded in
    /// the token's `uid`.
    ///
    /// The wallet signs the scheme-less callback URI, rebuilt here from the
    /// callback this server handed out rather than taken from the request.
    pub async fn retrieve_connection_id(
        &self,
        callback: &str,
        uid: &str,
        exp: i64,
        public_key: &str,
        signature: &str,
    ) -> Result<String, SidValidationError> {
        let sid = StratisId::new(callback, uid, exp);
        if sid.expired() {
            return Err(SidValidationError::Expired);
        }

        let verified = self
            .verifier
            .verify_signed_message(&sid.callback, public_key, signature)
            .await?;
        if !verified {
            return Err(SidValidationError::SignatureInvalid);
        }

        let raw = url_safe_decode(uid).map_err(|_| SidValidationError::MalformedUid)?;
        let plaintext = self
            .cipher
            .decrypt(&raw)
            .map_err(|_| SidValidationError::MalformedUid)?;

        if plaintext.len() <= EXP_DIGITS {
            return Err(SidValidationError::MalformedUid);
        }
        let (connection_id, embedded_exp) = plaintext.split_at(plaintext.len() - EXP_DIGITS);
        let embedded_exp: i64 = embedded_exp
            .parse()
            .map_err(|_| SidValidationError::MalformedUid)?;
        if embedded_exp != exp {
            return Err(SidValidationError::ExpiryMismatch);
        }

        Ok(connection_id.to_string())
    }
}
