//! Auth session entity - one in-flight sign-in attempt.
//!
//! A session is created by the authorize endpoint and consumed when tokens
//! are issued. Code-flow sessions carry PKCE material; SID-flow sessions only
//! carry the connection id their token was minted for.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::pkce::{self, CodeChallengeMethod};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "auth_session")]
pub struct Model {
    /// Opaque handle handed to the sign-in prompt.
    #[sea_orm(primary_key, auto_increment = false)]
    pub stamp: Uuid,
    /// Authority of the redirect URI, stamped into the `aud` claim.
    pub audience: Option<String>,
    pub code_challenge: Option<String>,
    pub challenge_method: Option<String>,
    /// Socket connection bound to this session, unique across live sessions.
    #[sea_orm(unique)]
    pub connection_id: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn for_code_flow(
        audience: &str,
        code_challenge: &str,
        method: CodeChallengeMethod,
    ) -> Self {
        Self {
            stamp: Uuid::new_v4(),
            audience: Some(audience.to_string()),
            code_challenge: Some(code_challenge.to_string()),
            challenge_method: Some(method.as_stored().to_string()),
            connection_id: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn for_sid_flow(connection_id: &str) -> Self {
        Self {
            stamp: Uuid::new_v4(),
            audience: None,
            code_challenge: None,
            challenge_method: None,
            connection_id: Some(connection_id.to_string()),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Check a code verifier against this session's PKCE challenge.
    ///
    /// Fails when the session carries no challenge or a challenge method
    /// that can no longer be decoded.
    pub fn verify(&self, code_verifier: &str) -> bool {
        let (Some(challenge), Some(method)) = (&self.code_challenge, &self.challenge_method)
        else {
            return false;
        };
        let Some(method) = CodeChallengeMethod::from_stored(method) else {
            return false;
        };
        pkce::verify(challenge, method, code_verifier)
    }
}
