//! Drug entity - The inventory record and home of the stock ledger.
//!
//! Each drug is identified by a unique name and carries its unit cost, unit price
//! and the on-hand `quantity`. The quantity is a stored running total maintained by
//! the purchase and sale managers, never recomputed from history on read.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Drug database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "drugs")]
pub struct Model {
    /// Surrogate identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Unique drug name used by transaction line items
    #[sea_orm(unique)]
    pub name: String,
    /// Free-form description
    pub description: Option<String>,
    /// Category name (e.g., "Antibiotic")
    pub category: String,
    /// Unit of measure name (e.g., "Strip", "Bottle")
    pub unit_name: String,
    /// Name of the usual supplier
    pub supplier_name: String,
    /// Unit cost paid to the supplier
    pub purchase_price: f64,
    /// Unit price charged to customers
    pub selling_price: f64,
    /// On-hand stock; may go negative through reversals
    pub quantity: i64,
    /// Expiry date of the current stock
    pub expired_date: Date,
    /// When the drug was created
    pub created_at: DateTime,
    /// When the drug was last modified
    pub updated_at: DateTime,
}

/// Line items reference drugs by name, so there are no foreign-key relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
