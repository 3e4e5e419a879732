//! Stratis ID connection tokens.
//!
//! A token is the URI `sid:{callback}?uid={uid}&exp={exp}`. The callback is
//! scheme-less; `uid` is the url-safe base64 of an AES-CBC-encrypted
//! `{connection-id}{exp}` string where `exp` is zero-padded to ten digits.

use std::fmt;

use time::OffsetDateTime;

use crate::encryption::aes_cbc::{TwoWayCipher, url_safe_encode};

pub const SID_SCHEME: &str = "sid:";

/// Lifetime of a freshly minted connection token.
pub const SID_TTL_SECS: i64 = 300;

/// Width of the unix-timestamp suffix embedded in the encrypted uid.
pub const EXP_DIGITS: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StratisId {
    /// Scheme-less callback the wallet posts its signature to.
    pub callback: String,
    pub uid: String,
    pub exp: i64,
}

impl StratisId {
    pub fn new(callback: &str, uid: &str, exp: i64) -> Self {
        Self {
            callback: strip_scheme(callback).to_string(),
            uid: uid.to_string(),
            exp,
        }
    }

    /// Parse the textual `sid:` form. Query parameter order is not significant.
    pub fn parse(input: &str) -> Option<Self> {
        let rest = input.strip_prefix(SID_SCHEME)?;
        let (callback, query) = rest.split_once('?')?;
        let mut uid = None;
        let mut exp = None;
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("uid", v)) => uid = Some(v.to_string()),
                Some(("exp", v)) => exp = v.parse::<i64>().ok(),
                _ => {}
            }
        }
        Some(Self {
            callback: strip_scheme(callback).to_string(),
            uid: uid?,
            exp: exp?,
        })
    }

    /// A token whose expiry has been reached is no longer honoured.
    pub fn expired(&self) -> bool {
        self.exp <= OffsetDateTime::now_utc().unix_timestamp()
    }
}

impl fmt::Display for StratisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{SID_SCHEME}{}?uid={}&exp={}",
            self.callback, self.uid, self.exp
        )
    }
}

fn strip_scheme(callback: &str) -> &str {
    callback
        .strip_prefix("https://")
        .or_else(|| callback.strip_prefix("http://"))
        .unwrap_or(callback)
}

/// Mints connection tokens bound to this deployment's authority.
#[derive(Clone)]
pub struct StratisIdGenerator {
    cipher: TwoWayCipher,
    authority: String,
}

impl StratisIdGenerator {
    pub fn new(cipher: TwoWayCipher, authority: &str) -> Self {
        Self {
            cipher,
            authority: strip_scheme(authority).to_string(),
        }
    }

    /// Create a token for `connection_id`, pointing the wallet at
    /// `callback_path` under this authority.
    pub fn create(&self, callback_path: &str, connection_id: &str) -> StratisId {
        let exp = OffsetDateTime::now_utc().unix_timestamp() + SID_TTL_SECS;
        let plaintext = format!("{connection_id}{exp:0>width$}", width = EXP_DIGITS);
        let uid = url_safe_encode(&self.cipher.encrypt(&plaintext));
        let callback = format!("{}/{}", self.authority, callback_path.trim_start_matches('/'));
        StratisId::new(&callback, &uid, exp)
    }
}
