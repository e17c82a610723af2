use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Account: index on tenant_id
        manager
            .create_index(
                Index::create()
                    .name("idx_account_tenant")
                    .table(Account::Table)
                    .col(Account::TenantId)
                    .to_owned(),
            )
            .await?;

        // AccountVerification: index on account_id
        manager
            .create_index(
                Index::create()
                    .name("idx_account_verification_account")
                    .table(AccountVerification::Table)
                    .col(AccountVerification::AccountId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_account_tenant").table(Account::Table).to_owned())
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_account_verification_account")
                    .table(AccountVerification::Table)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum Account { Table, TenantId }

#[derive(DeriveIden)]
enum AccountVerification { Table, AccountId }
