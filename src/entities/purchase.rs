//! Purchase entity - Stock-in orders placed with suppliers.
//!
//! A purchase moves through `Pending`, `On Delivery` and `Completed`, in any order.
//! Only a `Completed` purchase contributes its items to on-hand stock.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Delivery status of a purchase, stored as its display string.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum PurchaseStatus {
    /// Ordered, not yet shipped
    #[sea_orm(string_value = "Pending")]
    Pending,
    /// Shipped by the supplier
    #[sea_orm(string_value = "On Delivery")]
    OnDelivery,
    /// Received; items count toward stock
    #[sea_orm(string_value = "Completed")]
    Completed,
}

/// Purchase database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchases")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Unique invoice string, `INV-P-yyyyMMdd-NN` when assigned by the sequencer
    #[sea_orm(unique)]
    pub invoice: String,
    /// Transaction date
    pub date: DateTimeUtc,
    /// Supplier the order was placed with
    pub supplier_name: String,
    /// Current delivery status
    pub status: PurchaseStatus,
    /// Sum of `purchase_price * quantity` over items, priced when items last changed
    pub total_price: f64,
    /// Username of the creator
    pub username: String,
}

/// Defines relationships between Purchase and its line items
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One purchase has many line items
    #[sea_orm(has_many = "super::purchase_item::Entity")]
    Items,
}

impl Related<super::purchase_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
