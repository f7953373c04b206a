//! Database configuration module.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs without hand-written SQL.
//!
//! The connection handle is opened once at startup, passed explicitly to every
//! operation and closed at shutdown. Nothing in the crate holds a global client.

use crate::entities::{
    Category, Drug, Purchase, PurchaseItem, Sale, SaleItem, StoreProfile, Supplier, Unit,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use tracing::{debug, info};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/pharmacy.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable or returns
/// the default local `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by [`get_database_url`].
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    debug!("Connecting to database at {}", database_url);
    Database::connect(&database_url).await.map_err(Into::into)
}

async fn create_table_for<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates all tables that do not exist yet.
///
/// Parents are created before children so the line-item foreign keys resolve.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let schema = Schema::new(db.get_database_backend());

    create_table_for(db, &schema, Drug).await?;
    create_table_for(db, &schema, Category).await?;
    create_table_for(db, &schema, Unit).await?;
    create_table_for(db, &schema, Supplier).await?;
    create_table_for(db, &schema, StoreProfile).await?;
    create_table_for(db, &schema, Purchase).await?;
    create_table_for(db, &schema, PurchaseItem).await?;
    create_table_for(db, &schema, Sale).await?;
    create_table_for(db, &schema, SaleItem).await?;

    info!("Database tables ensured.");
    Ok(())
}
