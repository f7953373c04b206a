//! Catalog business logic - Handles categories, units of measure and suppliers.
//!
//! These are the reference lists drugs and purchases point at by name. Names are
//! unique; a duplicate surfaces as `UniqueConstraintViolation` from the database.
//! The lists configured in `config.toml` are seeded on startup by [`seed_catalog`].

use crate::{
    config::settings::AppConfig,
    entities::{Category, Supplier, Unit, category, supplier, unit},
    errors::{Error, Result, required_text},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::Serialize;
use tracing::{debug, info};

fn not_found(entity: &'static str, id: i64) -> impl FnOnce() -> Error {
    move || Error::NotFound {
        entity,
        id: id.to_string(),
    }
}

// ---- Categories ----

/// Creates a category after trimming its name.
///
/// # Errors
/// Returns an error if:
/// - The name is empty or whitespace-only
/// - A category with this name already exists
pub async fn create_category<C>(db: &C, name: &str) -> Result<category::Model>
where
    C: ConnectionTrait,
{
    let name = required_text("Category name", name)?;
    let created = category::ActiveModel {
        name: Set(name),
        ..Default::default()
    }
    .insert(db)
    .await?;
    info!(category = %created.name, "category created");
    Ok(created)
}

/// Retrieves all categories ordered alphabetically by name.
pub async fn list_categories<C>(db: &C) -> Result<Vec<category::Model>>
where
    C: ConnectionTrait,
{
    Category::find()
        .order_by_asc(category::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a category by its exact name.
pub async fn get_category_by_name<C>(db: &C, name: &str) -> Result<Option<category::Model>>
where
    C: ConnectionTrait,
{
    Category::find()
        .filter(category::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Renames a category.
///
/// # Errors
/// `NotFound` for an unknown id, `Validation` for a blank name,
/// `UniqueConstraintViolation` when the new name is taken.
pub async fn rename_category<C>(db: &C, category_id: i64, name: &str) -> Result<category::Model>
where
    C: ConnectionTrait,
{
    let name = required_text("Category name", name)?;
    let mut model: category::ActiveModel = Category::find_by_id(category_id)
        .one(db)
        .await?
        .ok_or_else(not_found("Category", category_id))?
        .into();
    model.name = Set(name);
    model.update(db).await.map_err(Into::into)
}

/// Deletes a category.
pub async fn delete_category<C>(db: &C, category_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = Category::delete_by_id(category_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(not_found("Category", category_id)());
    }
    Ok(())
}

// ---- Units ----

/// Creates a unit of measure after trimming its name.
pub async fn create_unit<C>(db: &C, name: &str) -> Result<unit::Model>
where
    C: ConnectionTrait,
{
    let name = required_text("Unit name", name)?;
    let created = unit::ActiveModel {
        name: Set(name),
        ..Default::default()
    }
    .insert(db)
    .await?;
    info!(unit = %created.name, "unit created");
    Ok(created)
}

/// Retrieves all units ordered alphabetically by name.
pub async fn list_units<C>(db: &C) -> Result<Vec<unit::Model>>
where
    C: ConnectionTrait,
{
    Unit::find()
        .order_by_asc(unit::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a unit by its exact name.
pub async fn get_unit_by_name<C>(db: &C, name: &str) -> Result<Option<unit::Model>>
where
    C: ConnectionTrait,
{
    Unit::find()
        .filter(unit::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Renames a unit.
pub async fn rename_unit<C>(db: &C, unit_id: i64, name: &str) -> Result<unit::Model>
where
    C: ConnectionTrait,
{
    let name = required_text("Unit name", name)?;
    let mut model: unit::ActiveModel = Unit::find_by_id(unit_id)
        .one(db)
        .await?
        .ok_or_else(not_found("Unit", unit_id))?
        .into();
    model.name = Set(name);
    model.update(db).await.map_err(Into::into)
}

/// Deletes a unit.
pub async fn delete_unit<C>(db: &C, unit_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = Unit::delete_by_id(unit_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(not_found("Unit", unit_id)());
    }
    Ok(())
}

// ---- Suppliers ----

/// Input for [`create_supplier`]
#[derive(Debug, Clone, Default)]
pub struct NewSupplier {
    /// Unique name
    pub name: String,
    /// Postal address
    pub address: Option<String>,
    /// Contact phone number
    pub phone: Option<String>,
}

/// Partial update for [`update_supplier`]
#[derive(Debug, Clone, Default)]
pub struct SupplierChanges {
    /// New name
    pub name: Option<String>,
    /// New address, `Some(None)` clears it
    pub address: Option<Option<String>>,
    /// New phone number, `Some(None)` clears it
    pub phone: Option<Option<String>>,
}

/// Creates a supplier after trimming its name.
///
/// # Errors
/// Returns an error if:
/// - The name is empty or whitespace-only
/// - A supplier with this name already exists
pub async fn create_supplier<C>(db: &C, new_supplier: NewSupplier) -> Result<supplier::Model>
where
    C: ConnectionTrait,
{
    let name = required_text("Supplier name", &new_supplier.name)?;
    let created = supplier::ActiveModel {
        name: Set(name),
        address: Set(new_supplier.address),
        phone: Set(new_supplier.phone),
        ..Default::default()
    }
    .insert(db)
    .await?;
    info!(supplier = %created.name, "supplier created");
    Ok(created)
}

/// Retrieves all suppliers ordered alphabetically by name.
pub async fn list_suppliers<C>(db: &C) -> Result<Vec<supplier::Model>>
where
    C: ConnectionTrait,
{
    Supplier::find()
        .order_by_asc(supplier::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a supplier by its exact name.
pub async fn get_supplier_by_name<C>(db: &C, name: &str) -> Result<Option<supplier::Model>>
where
    C: ConnectionTrait,
{
    Supplier::find()
        .filter(supplier::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a supplier by id.
pub async fn get_supplier_by_id<C>(db: &C, supplier_id: i64) -> Result<Option<supplier::Model>>
where
    C: ConnectionTrait,
{
    Supplier::find_by_id(supplier_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Applies a partial edit to a supplier.
pub async fn update_supplier<C>(
    db: &C,
    supplier_id: i64,
    changes: SupplierChanges,
) -> Result<supplier::Model>
where
    C: ConnectionTrait,
{
    let mut model: supplier::ActiveModel = Supplier::find_by_id(supplier_id)
        .one(db)
        .await?
        .ok_or_else(not_found("Supplier", supplier_id))?
        .into();

    if let Some(name) = changes.name {
        model.name = Set(required_text("Supplier name", &name)?);
    }
    if let Some(address) = changes.address {
        model.address = Set(address);
    }
    if let Some(phone) = changes.phone {
        model.phone = Set(phone);
    }

    model.update(db).await.map_err(Into::into)
}

/// Deletes a supplier.
pub async fn delete_supplier<C>(db: &C, supplier_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = Supplier::delete_by_id(supplier_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(not_found("Supplier", supplier_id)());
    }
    Ok(())
}

// ---- Seeding ----

/// Number of records inserted by [`seed_catalog`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    /// Categories inserted
    pub categories: usize,
    /// Units inserted
    pub units: usize,
    /// Suppliers inserted
    pub suppliers: usize,
}

/// Inserts every configured category, unit and supplier that is not already present.
///
/// Existing records are left as they are, so running this on every startup is safe.
pub async fn seed_catalog<C>(db: &C, config: &AppConfig) -> Result<SeedReport>
where
    C: ConnectionTrait,
{
    let mut report = SeedReport::default();

    for name in &config.categories {
        if get_category_by_name(db, name.trim()).await?.is_none() {
            create_category(db, name).await?;
            report.categories += 1;
        } else {
            debug!(category = %name, "category already present");
        }
    }

    for name in &config.units {
        if get_unit_by_name(db, name.trim()).await?.is_none() {
            create_unit(db, name).await?;
            report.units += 1;
        } else {
            debug!(unit = %name, "unit already present");
        }
    }

    for supplier_config in &config.suppliers {
        if get_supplier_by_name(db, supplier_config.name.trim()).await?.is_none() {
            create_supplier(
                db,
                NewSupplier {
                    name: supplier_config.name.clone(),
                    address: supplier_config.address.clone(),
                    phone: supplier_config.phone.clone(),
                },
            )
            .await?;
            report.suppliers += 1;
        } else {
            debug!(supplier = %supplier_config.name, "supplier already present");
        }
    }

    info!(
        categories = report.categories,
        units = report.units,
        suppliers = report.suppliers,
        "catalog seeded"
    );
    Ok(report)
}
