//! Durable store (spec §2, §5): a single-file SQLite database with WAL,
//! opened through `sea-orm`. This module only owns connection setup,
//! pragmas and migrations — every write to the `files` table goes through
//! [`crate::transitions::TransitionLayer`], never through a raw query issued
//! from here.

pub mod entities;
pub mod migration;

use fs2::FileExt;
use sea_orm::{ConnectOptions, Database as SeaDatabase, DatabaseConnection, DbErr, Statement};
use sea_orm::ConnectionTrait;
use sea_orm_migration::MigratorTrait;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Holds the advisory lock on the database path for the engine's lifetime.
/// Two orchestrators can't run against the same DB file concurrently (spec
/// §5); dropping this releases the lock.
pub struct DbLock {
    _file: File,
}

/// Acquire an exclusive, non-blocking lock next to the database file.
/// Fails fast (configuration-class error) rather than waiting, since a held
/// lock means another orchestrator instance is already running.
pub fn acquire_db_lock(db_path: &Path) -> Result<DbLock, std::io::Error> {
    let lock_path = lock_path_for(db_path);
    let file = File::create(&lock_path)?;
    file.try_lock_exclusive()?;
    Ok(DbLock { _file: file })
}

fn lock_path_for(db_path: &Path) -> PathBuf {
    let mut p = db_path.as_os_str().to_owned();
    p.push(".lock");
    PathBuf::from(p)
}

/// Durable store handle.
pub struct Database {
    conn: DatabaseConnection,
}

impl Database {
    /// Open (creating if absent) the database at `path` and run migrations.
    pub async fn open(path: &Path) -> Result<Self, DbErr> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DbErr::Custom(format!("failed to create data dir: {e}")))?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", path.display());
        let mut opt = ConnectOptions::new(db_url);
        opt.max_connections(10)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(8))
            .sqlx_logging(false);

        let conn = SeaDatabase::connect(opt).await?;
        apply_pragmas(&conn).await;

        migration::Migrator::up(&conn, None).await?;
        info!(path = %path.display(), "database ready");

        Ok(Self { conn })
    }

    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }
}

async fn apply_pragmas(conn: &DatabaseConnection) {
    for pragma in [
        "PRAGMA journal_mode=WAL",
        "PRAGMA synchronous=NORMAL",
        "PRAGMA busy_timeout=5000",
        "PRAGMA foreign_keys=ON",
    ] {
        let _ = conn
            .execute(Statement::from_string(
                sea_orm::DatabaseBackend::Sqlite,
                pragma,
            ))
            .await;
    }
}
