//! Create the `file_tags` placeholder table (spec §3 [EXPANDED]).
//!
//! No code in this engine ever writes to this table; it exists purely so the
//! schema itself documents that file tags are owned by the external
//! enrichment component, matching `m2`'s additive-only style.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FileTags::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(FileTags::FilePath).text().not_null())
                    .col(ColumnDef::new(FileTags::Tag).text().not_null())
                    .primary_key(
                        Index::create()
                            .col(FileTags::FilePath)
                            .col(FileTags::Tag),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FileTags::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum FileTags {
    Table,
    FilePath,
    Tag,
}
