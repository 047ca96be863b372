//! Create the `files` table (spec §3, §6).

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Files::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Files::FilePath)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Files::ContentHash).text())
                    .col(ColumnDef::new(Files::FsmState).text().not_null())
                    .col(
                        ColumnDef::new(Files::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Files::RemoteRawId).text())
                    .col(ColumnDef::new(Files::RemoteStoreDocId).text())
                    .col(ColumnDef::new(Files::IntentKind).text())
                    .col(ColumnDef::new(Files::IntentStartedAt).timestamp())
                    .col(ColumnDef::new(Files::IntentStepsDone).integer())
                    .col(ColumnDef::new(Files::FailureReason).text())
                    .col(ColumnDef::new(Files::FsmUpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_files_fsm_state")
                    .table(Files::Table)
                    .col(Files::FsmState)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_files_intent_kind")
                    .table(Files::Table)
                    .col(Files::IntentKind)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Files::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Files {
    Table,
    FilePath,
    ContentHash,
    FsmState,
    Version,
    RemoteRawId,
    RemoteStoreDocId,
    IntentKind,
    IntentStartedAt,
    IntentStepsDone,
    FailureReason,
    FsmUpdatedAt,
}
