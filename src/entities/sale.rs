//! Sale entity - Stock-out transactions. A sale has no status and affects stock from creation.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Sale database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sales")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Unique invoice string, `INV-S-yyyyMMdd-NN` when assigned by the sequencer
    #[sea_orm(unique)]
    pub invoice: String,
    /// Transaction date
    pub date: DateTimeUtc,
    /// Sum of `selling_price * quantity` over items, priced when items last changed
    pub total_price: f64,
    /// Username of the cashier
    pub username: String,
}

/// Defines relationships between Sale and its line items
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One sale has many line items
    #[sea_orm(has_many = "super::sale_item::Entity")]
    Items,
}

impl Related<super::sale_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
