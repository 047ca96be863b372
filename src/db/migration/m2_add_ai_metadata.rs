//! Add the `ai_metadata` column (spec §3: "sacred" AI-derived metadata).
//!
//! Non-destructive: a plain `ADD COLUMN`, never a table rewrite. This is the
//! shape every future schema change in this engine must take — the `files`
//! table is never dropped or recreated after its initial migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(Files::Table)
                    .add_column(ColumnDef::new(Files::AiMetadata).binary())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, _manager: &SchemaManager) -> Result<(), DbErr> {
        // SQLite can't drop a column without a table rebuild; migrations in
        // this engine are additive-only and never rolled back in place.
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Files {
    Table,
    AiMetadata,
}
