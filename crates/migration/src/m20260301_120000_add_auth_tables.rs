//! Migration to add the authorization tables.
//!
//! Creates tables for:
//! - auth_session: In-flight sign-in attempts
//! - auth_code: Single-use authorization codes
//! - auth_success: Completed sign-ins with a sliding refresh window
//! - token_log: Every refresh token issued per success
//! - admin: Addresses granted the admin claim

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuthSession::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuthSession::Stamp)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AuthSession::Audience).string().null())
                    .col(ColumnDef::new(AuthSession::CodeChallenge).string().null())
                    .col(ColumnDef::new(AuthSession::ChallengeMethod).string().null())
                    .col(
                        ColumnDef::new(AuthSession::ConnectionId)
                            .string()
                            .null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(AuthSession::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AuthCode::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuthCode::Value)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AuthCode::Signer).string().not_null())
                    .col(ColumnDef::new(AuthCode::Stamp).uuid().not_null())
                    .col(
                        ColumnDef::new(AuthCode::Expiry)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AuthSuccess::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuthSuccess::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AuthSuccess::Address).string().not_null())
                    .col(ColumnDef::new(AuthSuccess::Audience).string().null())
                    .col(ColumnDef::new(AuthSuccess::ConnectionId).string().null())
                    .col(
                        ColumnDef::new(AuthSuccess::Expiry)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Rotation targets are looked up by (address, audience).
        manager
            .create_index(
                Index::create()
                    .name("idx_auth_success_address_audience")
                    .table(AuthSuccess::Table)
                    .col(AuthSuccess::Address)
                    .col(AuthSuccess::Audience)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TokenLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TokenLog::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TokenLog::RefreshToken)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(TokenLog::AuthSuccessId).integer().not_null())
                    .col(
                        ColumnDef::new(TokenLog::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_token_log_auth_success")
                            .from(TokenLog::Table, TokenLog::AuthSuccessId)
                            .to(AuthSuccess::Table, AuthSuccess::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Admin::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Admin::Address)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TokenLog::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AuthSuccess::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AuthCode::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AuthSession::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Admin::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum AuthSession {
    Table,
    Stamp,
    Audience,
    CodeChallenge,
    ChallengeMethod,
    ConnectionId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum AuthCode {
    Table,
    Value,
    Signer,
    Stamp,
    Expiry,
}

#[derive(DeriveIden)]
enum AuthSuccess {
    Table,
    Id,
    Address,
    Audience,
    ConnectionId,
    Expiry,
}

#[derive(DeriveIden)]
enum TokenLog {
    Table,
    Id,
    RefreshToken,
    AuthSuccessId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Admin {
    Table,
    Address,
}
