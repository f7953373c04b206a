//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod category;
pub mod drug;
pub mod purchase;
pub mod purchase_item;
pub mod sale;
pub mod sale_item;
pub mod store_profile;
pub mod supplier;
pub mod unit;

// Re-export specific types to avoid conflicts
pub use category::{Column as CategoryColumn, Entity as Category, Model as CategoryModel};
pub use drug::{Column as DrugColumn, Entity as Drug, Model as DrugModel};
pub use purchase::{
    Column as PurchaseColumn, Entity as Purchase, Model as PurchaseModel, PurchaseStatus,
};
pub use purchase_item::{
    Column as PurchaseItemColumn, Entity as PurchaseItem, Model as PurchaseItemModel,
};
pub use sale::{Column as SaleColumn, Entity as Sale, Model as SaleModel};
pub use sale_item::{Column as SaleItemColumn, Entity as SaleItem, Model as SaleItemModel};
pub use store_profile::{
    Column as StoreProfileColumn, Entity as StoreProfile, Model as StoreProfileModel,
};
pub use supplier::{Column as SupplierColumn, Entity as Supplier, Model as SupplierModel};
pub use unit::{Column as UnitColumn, Entity as Unit, Model as UnitModel};
