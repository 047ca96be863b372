//! Versioned configuration migration, used by [`super::EngineConfig`].

use anyhow::Result;

/// Trait for versioned configuration migration.
pub trait Migrate {
    /// The version this instance currently reports.
    fn current_version(&self) -> u32;

    /// The version the binary expects to run against.
    fn target_version() -> u32;

    /// Apply migrations in place to bring the config up to `target_version`.
    fn migrate(&mut self) -> Result<()>;

    fn needs_migration(&self) -> bool {
        self.current_version() < Self::target_version()
    }
}
