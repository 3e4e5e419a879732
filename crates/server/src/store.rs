//! Persistence layer over the auth tables.
//!
//! All flow-level decisions (expiry polarity, rotation, stale-token
//! detection) live in `flow`; this module only implements the storage
//! contract those decisions rely on.

use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder,
};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::entity::{admin, auth_code, auth_session, auth_success, token_log};
use crate::error::AuthError;

/// The success row a refresh token points at, plus whether the token has
/// already been superseded by a later rotation.
pub struct RefreshLookup {
    pub success: auth_success::Model,
    pub stale: bool,
}

#[derive(Clone)]
pub struct AuthStore {
    db: Arc<DatabaseConnection>,
}

impl AuthStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // ---- sessions ----

    pub async fn create_session(
        &self,
        session: auth_session::Model,
    ) -> Result<auth_session::Model, AuthError> {
        let active: auth_session::ActiveModel = session.clone().into();
        auth_session::Entity::insert(active).exec(&*self.db).await?;
        Ok(session)
    }

    pub async fn find_session_by_stamp(
        &self,
        stamp: Uuid,
    ) -> Result<Option<auth_session::Model>, AuthError> {
        Ok(auth_session::Entity::find_by_id(stamp).one(&*self.db).await?)
    }

    pub async fn find_session_by_connection_id(
        &self,
        connection_id: &str,
    ) -> Result<Option<auth_session::Model>, AuthError> {
        Ok(auth_session::Entity::find()
            .filter(auth_session::Column::ConnectionId.eq(connection_id))
            .one(&*self.db)
            .await?)
    }

    /// Bind a socket connection to a session. Idempotent when the same
    /// connection links twice; any other connection is refused.
    pub async fn link_connection(
        &self,
        stamp: Uuid,
        connection_id: &str,
    ) -> Result<auth_session::Model, AuthError> {
        let session = self
            .find_session_by_stamp(stamp)
            .await?
            .ok_or(AuthError::InvalidRequest("Unknown session".to_string()))?;
        match session.connection_id.as_deref() {
            Some(existing) if existing == connection_id => Ok(session),
            Some(_) => Err(AuthError::SessionLinkConflict),
            None => {
                let mut active: auth_session::ActiveModel = session.into();
                active.connection_id = Set(Some(connection_id.to_string()));
                Ok(active.update(&*self.db).await?)
            }
        }
    }

    pub async fn delete_session(&self, stamp: Uuid) -> Result<(), AuthError> {
        auth_session::Entity::delete_by_id(stamp).exec(&*self.db).await?;
        Ok(())
    }

    // ---- codes ----

    pub async fn create_code(
        &self,
        code: auth_code::Model,
    ) -> Result<auth_code::Model, AuthError> {
        let active: auth_code::ActiveModel = code.clone().into();
        auth_code::Entity::insert(active).exec(&*self.db).await?;
        Ok(code)
    }

    pub async fn find_code_by_value(
        &self,
        value: Uuid,
    ) -> Result<Option<auth_code::Model>, AuthError> {
        Ok(auth_code::Entity::find_by_id(value).one(&*self.db).await?)
    }

    pub async fn find_code_by_stamp(
        &self,
        stamp: Uuid,
    ) -> Result<Option<auth_code::Model>, AuthError> {
        Ok(auth_code::Entity::find()
            .filter(auth_code::Column::Stamp.eq(stamp))
            .one(&*self.db)
            .await?)
    }

    pub async fn delete_code(&self, value: Uuid) -> Result<(), AuthError> {
        auth_code::Entity::delete_by_id(value).exec(&*self.db).await?;
        Ok(())
    }

    // ---- successes + token log ----

    /// Find the success for an (address, audience) rotation target.
    pub async fn find_success_by_target(
        &self,
        address: &str,
        audience: Option<&str>,
    ) -> Result<Option<auth_success::Model>, AuthError> {
        let mut query =
            auth_success::Entity::find().filter(auth_success::Column::Address.eq(address));
        query = match audience {
            Some(aud) => query.filter(auth_success::Column::Audience.eq(aud)),
            None => query.filter(auth_success::Column::Audience.is_null()),
        };
        Ok(query.one(&*self.db).await?)
    }

    pub async fn find_success_by_connection_id(
        &self,
        connection_id: &str,
    ) -> Result<Option<auth_success::Model>, AuthError> {
        Ok(auth_success::Entity::find()
            .filter(auth_success::Column::ConnectionId.eq(connection_id))
            .one(&*self.db)
            .await?)
    }

    /// Look a refresh token up and report whether a newer token has since
    /// been issued for the same success.
    pub async fn find_success_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<RefreshLookup>, AuthError> {
        let Some(log) = token_log::Entity::find()
            .filter(token_log::Column::RefreshToken.eq(refresh_token))
            .one(&*self.db)
            .await?
        else {
            return Ok(None);
        };
        let Some(success) = auth_success::Entity::find_by_id(log.auth_success_id)
            .one(&*self.db)
            .await?
        else {
            return Ok(None);
        };
        // Id breaks created_at ties for rotations within one clock tick.
        let latest = token_log::Entity::find()
            .filter(token_log::Column::AuthSuccessId.eq(log.auth_success_id))
            .order_by_desc(token_log::Column::CreatedAt)
            .order_by_desc(token_log::Column::Id)
            .one(&*self.db)
            .await?;
        let stale = latest.map(|l| l.id != log.id).unwrap_or(true);
        Ok(Some(RefreshLookup { success, stale }))
    }

    /// Record a fresh success and its first refresh token.
    pub async fn create_success(
        &self,
        address: &str,
        audience: Option<&str>,
        connection_id: Option<&str>,
        refresh_token: &str,
    ) -> Result<auth_success::Model, AuthError> {
        let active = auth_success::ActiveModel {
            address: Set(address.to_string()),
            audience: Set(audience.map(str::to_string)),
            connection_id: Set(connection_id.map(str::to_string)),
            expiry: Set(auth_success::next_expiry()),
            ..Default::default()
        };
        let success = active.insert(&*self.db).await?;
        self.insert_token_log(success.id, refresh_token).await?;
        Ok(success)
    }

    /// Rotate: append a refresh token and slide the expiry window forward.
    pub async fn append_refresh_token(
        &self,
        success: auth_success::Model,
        refresh_token: &str,
    ) -> Result<auth_success::Model, AuthError> {
        let success_id = success.id;
        let mut active: auth_success::ActiveModel = success.into();
        active.expiry = Set(auth_success::next_expiry());
        let updated = active.update(&*self.db).await?;
        self.insert_token_log(success_id, refresh_token).await?;
        Ok(updated)
    }

    /// Remove a success and every refresh token issued under it.
    pub async fn delete_success(&self, success_id: i32) -> Result<(), AuthError> {
        token_log::Entity::delete_many()
            .filter(token_log::Column::AuthSuccessId.eq(success_id))
            .exec(&*self.db)
            .await?;
        auth_success::Entity::delete_by_id(success_id).exec(&*self.db).await?;
        Ok(())
    }

    pub async fn is_admin(&self, address: &str) -> Result<bool, AuthError> {
        Ok(admin::Entity::find_by_id(address).one(&*self.db).await?.is_some())
    }

    async fn insert_token_log(
        &self,
        success_id: i32,
        refresh_token: &str,
    ) -> Result<(), AuthError> {
        let log = token_log::ActiveModel {
            refresh_token: Set(refresh_token.to_string()),
            auth_success_id: Set(success_id),
            created_at: Set(OffsetDateTime::now_utc()),
            ..Default::default()
        };
        token_log::Entity::insert(log).exec(&*self.db).await?;
        Ok(())
    }
}
