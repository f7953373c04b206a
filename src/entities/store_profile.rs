//! Store profile entity - Single-row store configuration shown on invoices and reports.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Store profile database model. Only the row with id 1 is ever used.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "store_profile")]
pub struct Model {
    /// Always 1
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    /// Store display name
    pub name: String,
    /// Store address
    pub address: String,
    /// Store phone number
    pub phone: String,
    /// When the profile was last modified
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
