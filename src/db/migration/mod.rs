//! Schema migrations. Non-destructive `ADD COLUMN`/`CREATE TABLE` only
//! (spec §6) — migrations never drop or rewrite the `files` table.

use sea_orm_migration::prelude::*;

mod m1_create_files;
mod m2_add_ai_metadata;
mod m3_create_file_tags;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m1_create_files::Migration),
            Box::new(m2_add_ai_metadata::Migration),
            Box::new(m3_create_file_tags::Migration),
        ]
    }
}
