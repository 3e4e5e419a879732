//! Auth success entity - a completed sign-in with a sliding 30-day window.
//!
//! One row per (address, audience) target for the code flow, or per
//! connection id for the SID flow. Refresh tokens hang off it in `token_log`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

pub const SUCCESS_LIFETIME_DAYS: i64 = 30;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "auth_success")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Wallet address that signed in.
    pub address: String,
    pub audience: Option<String>,
    pub connection_id: Option<String>,
    /// Advanced on every refresh.
    pub expiry: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_expired(&self) -> bool {
        self.expiry <= OffsetDateTime::now_utc()
    }
}

pub fn next_expiry() -> OffsetDateTime {
    OffsetDateTime::now_utc() + Duration::days(SUCCESS_LIFETIME_DAYS)
}
