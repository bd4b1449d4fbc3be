#![forbid(unsafe_code)]

pub mod entities;
mod store;

use log::debug;
use migration::{Migrator, MigratorTrait};
use miette::Diagnostic;
use sea_orm::{Database, DatabaseConnection};

pub use store::SeaOrmStore;

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
    #[error("Could not connect to database")]
    #[diagnostic(code(database::connect))]
    Connect(#[source] sea_orm::DbErr),

    #[error("Could not migrate database")]
    #[diagnostic(code(database::migrate))]
    Migrate(#[source] sea_orm::DbErr),
}

pub async fn connection(url: &str) -> Result<DatabaseConnection, Error> {
    debug!("Opening database connection");

    let db = Database::connect(url).await.map_err(Error::Connect)?;

    Ok(db)
}

/// Applies all pending migrations.
pub async fn migrate(db: &DatabaseConnection) -> Result<(), Error> {
    Migrator::up(db, None).await.map_err(Error::Migrate)?;
    Ok(())
}
