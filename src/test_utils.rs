//! Shared test utilities for the inventory core.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test drugs, purchases and sales with sensible defaults.

use crate::{
    core::{
        calendar::BusinessCalendar,
        drug::{self, NewDrug},
        items::LineItem,
        purchase::NewPurchase,
        sale::NewSale,
    },
    entities::{self, PurchaseStatus},
    errors::Result,
};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use sea_orm::DatabaseConnection;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Calendar for UTC+7, the default business offset.
#[allow(clippy::unwrap_used)]
pub fn test_calendar() -> BusinessCalendar {
    BusinessCalendar::new(FixedOffset::east_opt(7 * 3600).unwrap())
}

/// Drug input with sensible defaults.
///
/// # Defaults
/// * `category`: "Analgesic"
/// * `unit_name`: "Strip"
/// * `supplier_name`: "PT Kimia Farma"
/// * `selling_price`: 1500.0
/// * `quantity`: 0
/// * `expired_date`: 2030-01-01
pub fn new_drug_input(name: &str, purchase_price: f64) -> NewDrug {
    NewDrug {
        name: name.to_string(),
        description: None,
        category: "Analgesic".to_string(),
        unit_name: "Strip".to_string(),
        supplier_name: "PT Kimia Farma".to_string(),
        purchase_price,
        selling_price: Some(1500.0),
        quantity: Some(0),
        expired_date: NaiveDate::from_ymd_opt(2030, 1, 1),
    }
}

/// Creates a test drug priced at 1000.0 (purchase) / 1500.0 (selling) with `quantity` on hand.
pub async fn create_test_drug(
    db: &DatabaseConnection,
    name: &str,
    quantity: i64,
) -> Result<entities::drug::Model> {
    let mut input = new_drug_input(name, 1000.0);
    input.quantity = Some(quantity);
    drug::create_drug(db, input).await
}

/// Current on-hand quantity of a drug.
pub async fn stock_of(db: &DatabaseConnection, name: &str) -> Result<i64> {
    Ok(drug::require_drug_by_name(db, name).await?.quantity)
}

/// Purchase input with an auto-assigned invoice.
///
/// # Defaults
/// * `supplier_name`: "PT Kimia Farma"
/// * `username`: "admin"
pub fn purchase_input(
    date: DateTime<Utc>,
    status: PurchaseStatus,
    items: Vec<LineItem>,
) -> NewPurchase {
    NewPurchase {
        date,
        supplier_name: "PT Kimia Farma".to_string(),
        status,
        items,
        invoice: None,
        username: "admin".to_string(),
    }
}

/// Sale input with an auto-assigned invoice and username "cashier".
pub fn sale_input(date: DateTime<Utc>, items: Vec<LineItem>) -> NewSale {
    NewSale {
        date,
        invoice: None,
        items,
        username: "cashier".to_string(),
    }
}
