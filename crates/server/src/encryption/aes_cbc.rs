//! AES-256-CBC codec for connection tokens.
//!
//! Ciphertext layout is `IV ‖ ciphertext` with a fresh random IV per call, so
//! encrypting the same plaintext twice yields different bytes. Tokens travel
//! inside URLs, so url-safe unpadded base64 helpers live here too.

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use thiserror::Error;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const IV_LEN: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    /// Input shorter than one IV + one block.
    #[error("ciphertext too short")]
    TooShort,
    /// Bad padding or truncated block data.
    #[error("decryption failed")]
    Decrypt,
    #[error("plaintext is not valid UTF-8")]
    Utf8,
}

/// Symmetric codec shared by token generation and validation.
#[derive(Clone)]
pub struct TwoWayCipher {
    key: [u8; 32],
}

impl TwoWayCipher {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub fn encrypt(&self, plaintext: &str) -> Vec<u8> {
        let mut iv = [0u8; IV_LEN];
        getrandom::fill(&mut iv).expect("Failed to gather randomness for IV");
        let cipher = Aes256CbcEnc::new(&self.key.into(), &iv.into());
        let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
        let mut out = Vec::with_capacity(IV_LEN + ciphertext.len());
        out.extend_from_slice(&iv);
        out.extend_from_slice(&ciphertext);
        out
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<String, CipherError> {
        if data.len() < IV_LEN + 16 {
            return Err(CipherError::TooShort);
        }
        let (iv, ciphertext) = data.split_at(IV_LEN);
        let iv: [u8; IV_LEN] = iv.try_into().map_err(|_| CipherError::TooShort)?;
        let cipher = Aes256CbcDec::new(&self.key.into(), &iv.into());
        let plaintext = cipher
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| CipherError::Decrypt)?;
        String::from_utf8(plaintext).map_err(|_| CipherError::Utf8)
    }
}

pub fn url_safe_encode(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

pub fn url_safe_decode(data: &str) -> Result<Vec<u8>, CipherError> {
    URL_SAFE_NO_PAD.decode(data).map_err(|_| CipherError::Decrypt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> TwoWayCipher {
        TwoWayCipher::new([42u8; 32])
    }

    #[test]
    fn round_trips_plaintext() {
        let c = cipher();
        let encrypted = c.encrypt("hunters-connection-id1755432100");
        assert_eq!(c.decrypt(&encrypted).unwrap(), "hunters-connection-id1755432100");
    }

    #[test]
    fn fresh_iv_each_call() {
        let c = cipher();
        assert_ne!(c.encrypt("same input"), c.encrypt("same input"));
    }

    #[test]
    fn rejects_short_input() {
        assert_eq!(cipher().decrypt(&[0u8; 8]), Err(CipherError::TooShort));
    }

    #[test]
    fn rejects_tampered_ciphertext() {
        let c = cipher();
        let mut encrypted = c.encrypt("payload");
        let last = encrypted.len() - 1;
        encrypted[last] ^= 0xFF;
        assert_eq!(c.decrypt(&encrypted), Err(CipherError::Decrypt));
    }

    #[test]
    fn wrong_key_fails() {
        let encrypted = cipher().encrypt("payload");
        let other = TwoWayCipher::new([43u8; 32]);
        assert!(other.decrypt(&encrypted).is_err());
    }

    #[test]
    fn url_safe_round_trip() {
        let data = b"\xff\xfe\x00binary";
        let encoded = url_safe_encode(data);
        assert!(!encoded.contains('+') && !encoded.contains('/') && !encoded.contains('='));
        assert_eq!(url_safe_decode(&encoded).unwrap(), data);
    }
}
