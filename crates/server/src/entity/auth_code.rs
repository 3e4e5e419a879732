//! Authorization code entity - single-use, sixty-second credential.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Upper bound on how long a code stays redeemable.
pub const CODE_LIFETIME_SECS: i64 = 60;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "auth_code")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub value: Uuid,
    /// Wallet address the code was issued to.
    pub signer: String,
    /// Session the code belongs to.
    pub stamp: Uuid,
    pub expiry: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn issue(signer: &str, stamp: Uuid) -> Self {
        Self {
            value: Uuid::new_v4(),
            signer: signer.to_string(),
            stamp,
            expiry: OffsetDateTime::now_utc() + Duration::seconds(CODE_LIFETIME_SECS),
        }
    }

    /// Construct with an explicit expiry, clamped to the sixty-second cap.
    pub fn with_expiry(signer: &str, stamp: Uuid, expiry: OffsetDateTime) -> Self {
        let cap = OffsetDateTime::now_utc() + Duration::seconds(CODE_LIFETIME_SECS);
        Self {
            value: Uuid::new_v4(),
            signer: signer.to_string(),
            stamp,
            expiry: expiry.min(cap),
        }
    }

    /// A code is redeemable strictly before its expiry instant.
    pub fn is_valid(&self) -> bool {
        OffsetDateTime::now_utc() < self.expiry
    }
}
