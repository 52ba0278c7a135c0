//! Schema migrations for the embedded store (spec §6 "Persisted schema").

pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_core_tables;

/// The workspace's single migrator, run once at startup by
/// `tootik-server::main` before any worker starts.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20240101_000001_create_core_tables::Migration)]
    }
}
