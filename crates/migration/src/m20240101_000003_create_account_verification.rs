//! Create `account_verification` table with FK to `account`.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AccountVerification::Table)
                    .if_not_exists()
                    .col(uuid(AccountVerification::Id).primary_key())
                    .col(uuid(AccountVerification::AccountId).not_null())
                    .col(string_len(AccountVerification::Token, 64).unique_key().not_null())
                    .col(boolean(AccountVerification::Verified).not_null())
                    .col(timestamp_with_time_zone(AccountVerification::ExpiresAt).not_null())
                    .col(timestamp_with_time_zone(AccountVerification::CreatedAt).not_null())
                    .col(timestamp_with_time_zone(AccountVerification::UpdatedAt).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_account_verification_account")
                            .from(AccountVerification::Table, AccountVerification::AccountId)
                            .to(Account::Table, Account::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AccountVerification::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AccountVerification { Table, Id, AccountId, Token, Verified, ExpiresAt, CreatedAt, UpdatedAt }

#[derive(DeriveIden)]
enum Account { Table, Id }
