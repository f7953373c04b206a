//! Drug directory - Handles drug records and lookups used by the transaction managers.
//!
//! This module provides creation, lookup, filtering, partial editing and deletion of
//! drugs, plus expiry and stock statistics. The purchase and sale managers use
//! [`require_drug_by_name`] as their lookup-by-name collaborator.

use crate::{
    core::items::LineItem,
    entities::{Drug, PurchaseItem, SaleItem, drug, purchase_item, sale_item},
    errors::{Error, Result, required_text},
};
use chrono::{Months, NaiveDate, Utc};
use sea_orm::{
    PaginatorTrait, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*, sea_query::Expr,
};
use serde::Serialize;
use tracing::info;

const DEFAULT_PAGE_LIMIT: u64 = 10;

/// Input for [`create_drug`]
#[derive(Debug, Clone)]
pub struct NewDrug {
    /// Unique name
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// Category name
    pub category: String,
    /// Unit of measure name
    pub unit_name: String,
    /// Usual supplier
    pub supplier_name: String,
    /// Unit cost
    pub purchase_price: f64,
    /// Unit price, defaults to 0
    pub selling_price: Option<f64>,
    /// Opening stock, defaults to 0
    pub quantity: Option<i64>,
    /// Expiry date, defaults to one year from today
    pub expired_date: Option<NaiveDate>,
}

/// Partial update for [`update_drug`]. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct DrugChanges {
    /// New name
    pub name: Option<String>,
    /// New description
    pub description: Option<Option<String>>,
    /// New category
    pub category: Option<String>,
    /// New unit of measure
    pub unit_name: Option<String>,
    /// New supplier
    pub supplier_name: Option<String>,
    /// New unit cost
    pub purchase_price: Option<f64>,
    /// New unit price
    pub selling_price: Option<f64>,
    /// Manual stock correction (absolute value)
    pub quantity: Option<i64>,
    /// New expiry date
    pub expired_date: Option<NaiveDate>,
}

/// Filters for [`list_drugs`]
#[derive(Debug, Clone, Default)]
pub struct DrugFilter {
    /// Substring of the drug name (case-insensitive for ASCII)
    pub name_contains: Option<String>,
    /// Exact category name
    pub category: Option<String>,
    /// Exact unit name
    pub unit_name: Option<String>,
}

/// One-based page request
#[derive(Debug, Clone, Copy)]
pub struct Page {
    /// Page number, starting at 1
    pub page: u64,
    /// Items per page
    pub limit: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// A page of results with totals
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// Items across all pages
    pub total: u64,
    /// Page number, starting at 1
    pub page: u64,
    /// Items per page
    pub limit: u64,
    /// Number of pages
    pub total_pages: u64,
}

/// Inventory-wide drug counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrugStatistics {
    /// Number of drug records
    pub total_drugs: u64,
    /// Sum of on-hand quantities
    pub total_quantity: i64,
    /// Drugs whose expiry date has passed
    pub expired_drugs: u64,
    /// Drugs with no stock on hand
    pub out_of_stock_drugs: u64,
}

fn validate_price(label: &str, price: f64) -> Result<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(Error::validation(format!(
            "{label} must be a non-negative number, got {price}"
        )));
    }
    Ok(())
}

/// Creates a drug, applying the default selling price, quantity and expiry date.
///
/// # Errors
/// `Validation` for a blank name or a negative/non-finite price,
/// `UniqueConstraintViolation` when the name is taken.
pub async fn create_drug<C>(db: &C, new_drug: NewDrug) -> Result<drug::Model>
where
    C: ConnectionTrait,
{
    let name = required_text("Drug name", &new_drug.name)?;
    let selling_price = new_drug.selling_price.unwrap_or(0.0);
    validate_price("Purchase price", new_drug.purchase_price)?;
    validate_price("Selling price", selling_price)?;

    let today = Utc::now().date_naive();
    let expired_date = new_drug
        .expired_date
        .or_else(|| today.checked_add_months(Months::new(12)))
        .unwrap_or(today);
    let now = Utc::now().naive_utc();

    let model = drug::ActiveModel {
        name: Set(name),
        description: Set(new_drug.description),
        category: Set(new_drug.category),
        unit_name: Set(new_drug.unit_name),
        supplier_name: Set(new_drug.supplier_name),
        purchase_price: Set(new_drug.purchase_price),
        selling_price: Set(selling_price),
        quantity: Set(new_drug.quantity.unwrap_or(0)),
        expired_date: Set(expired_date),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let created = model.insert(db).await?;
    info!(drug = %created.name, quantity = created.quantity, "drug created");
    Ok(created)
}

/// Finds a drug by its unique name.
pub async fn get_drug_by_name<C>(db: &C, name: &str) -> Result<Option<drug::Model>>
where
    C: ConnectionTrait,
{
    Drug::find()
        .filter(drug::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a drug by name, failing with `DrugNotFound` when it does not exist.
pub async fn require_drug_by_name<C>(db: &C, name: &str) -> Result<drug::Model>
where
    C: ConnectionTrait,
{
    get_drug_by_name(db, name)
        .await?
        .ok_or_else(|| Error::DrugNotFound {
            name: name.to_string(),
        })
}

/// Finds a drug by its surrogate id.
pub async fn get_drug_by_id<C>(db: &C, drug_id: i64) -> Result<Option<drug::Model>>
where
    C: ConnectionTrait,
{
    Drug::find_by_id(drug_id).one(db).await.map_err(Into::into)
}

/// Lists drugs matching `filter`, ordered by name, one page at a time.
pub async fn list_drugs(
    db: &DatabaseConnection,
    filter: &DrugFilter,
    page: Page,
) -> Result<Paginated<drug::Model>> {
    let mut query = Drug::find();
    if let Some(fragment) = filter.name_contains.as_deref() {
        query = query.filter(drug::Column::Name.contains(fragment));
    }
    if let Some(category) = filter.category.as_deref() {
        query = query.filter(drug::Column::Category.eq(category));
    }
    if let Some(unit_name) = filter.unit_name.as_deref() {
        query = query.filter(drug::Column::UnitName.eq(unit_name));
    }

    let limit = page.limit.max(1);
    let page_number = page.page.max(1);
    let paginator = query.order_by_asc(drug::Column::Name).paginate(db, limit);
    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(page_number - 1).await?;

    Ok(Paginated {
        items,
        total,
        page: page_number,
        limit,
        total_pages: total.div_ceil(limit),
    })
}

/// Line-item rows, across purchases and sales, that name a drug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DrugUsage {
    /// Purchase line items
    pub purchase_items: u64,
    /// Sale line items
    pub sale_items: u64,
}

impl DrugUsage {
    /// True when no transaction references the drug.
    #[must_use]
    pub const fn is_unused(&self) -> bool {
        self.purchase_items == 0 && self.sale_items == 0
    }
}

/// Counts the purchase and sale items that reference `name`.
pub async fn drug_usage<C>(db: &C, name: &str) -> Result<DrugUsage>
where
    C: ConnectionTrait,
{
    Ok(DrugUsage {
        purchase_items: PurchaseItem::find()
            .filter(purchase_item::Column::DrugName.eq(name))
            .count(db)
            .await?,
        sale_items: SaleItem::find()
            .filter(sale_item::Column::DrugName.eq(name))
            .count(db)
            .await?,
    })
}

async fn find_drug<C>(db: &C, drug_id: i64) -> Result<drug::Model>
where
    C: ConnectionTrait,
{
    Drug::find_by_id(drug_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::DrugNotFound {
            name: drug_id.to_string(),
        })
}

/// Applies a partial edit to a drug. Setting `quantity` here is a manual stock
/// correction that bypasses the transaction managers.
///
/// Line items refer to drugs by name, so a rename is carried into every purchase
/// and sale item in the same transaction.
///
/// # Errors
/// `DrugNotFound`, `Validation` for a blank name or a bad price,
/// `UniqueConstraintViolation` when renaming onto a taken name.
pub async fn update_drug(
    db: &DatabaseConnection,
    drug_id: i64,
    changes: DrugChanges,
) -> Result<drug::Model> {
    let txn = db.begin().await?;

    let existing = find_drug(&txn, drug_id).await?;
    let old_name = existing.name.clone();
    let mut model: drug::ActiveModel = existing.into();

    let mut renamed_to = None;
    if let Some(name) = changes.name {
        let name = required_text("Drug name", &name)?;
        if name != old_name {
            renamed_to = Some(name.clone());
        }
        model.name = Set(name);
    }
    if let Some(description) = changes.description {
        model.description = Set(description);
    }
    if let Some(category) = changes.category {
        model.category = Set(category);
    }
    if let Some(unit_name) = changes.unit_name {
        model.unit_name = Set(unit_name);
    }
    if let Some(supplier_name) = changes.supplier_name {
        model.supplier_name = Set(supplier_name);
    }
    if let Some(price) = changes.purchase_price {
        validate_price("Purchase price", price)?;
        model.purchase_price = Set(price);
    }
    if let Some(price) = changes.selling_price {
        validate_price("Selling price", price)?;
        model.selling_price = Set(price);
    }
    if let Some(quantity) = changes.quantity {
        model.quantity = Set(quantity);
    }
    if let Some(expired_date) = changes.expired_date {
        model.expired_date = Set(expired_date);
    }
    model.updated_at = Set(Utc::now().naive_utc());
    let updated = model.update(&txn).await?;

    if let Some(new_name) = renamed_to {
        let purchase_rows = PurchaseItem::update_many()
            .col_expr(purchase_item::Column::DrugName, Expr::value(new_name.clone()))
            .filter(purchase_item::Column::DrugName.eq(old_name.as_str()))
            .exec(&txn)
            .await?
            .rows_affected;
        let sale_rows = SaleItem::update_many()
            .col_expr(sale_item::Column::DrugName, Expr::value(new_name.clone()))
            .filter(sale_item::Column::DrugName.eq(old_name.as_str()))
            .exec(&txn)
            .await?
            .rows_affected;
        info!(from = %old_name, to = %new_name, purchase_rows, sale_rows, "drug renamed");
    }

    txn.commit().await?;
    Ok(updated)
}

/// Deletes a drug and returns the removed record.
///
/// # Errors
/// `DrugNotFound`, or `Validation` while any purchase or sale still lists the
/// drug; those records could no longer be reversed without it.
pub async fn delete_drug(db: &DatabaseConnection, drug_id: i64) -> Result<drug::Model> {
    let txn = db.begin().await?;

    let drug = find_drug(&txn, drug_id).await?;
    let usage = drug_usage(&txn, &drug.name).await?;
    if !usage.is_unused() {
        return Err(Error::validation(format!(
            "Drug '{}' is listed on {} purchase item(s) and {} sale item(s) and cannot be deleted",
            drug.name, usage.purchase_items, usage.sale_items
        )));
    }
    Drug::delete_by_id(drug_id).exec(&txn).await?;

    txn.commit().await?;
    info!(drug = %drug.name, "drug deleted");
    Ok(drug)
}

/// Drugs whose expiry date is before `today`.
pub async fn expired_drugs<C>(db: &C, today: NaiveDate) -> Result<Vec<drug::Model>>
where
    C: ConnectionTrait,
{
    Drug::find()
        .filter(drug::Column::ExpiredDate.lt(today))
        .order_by_asc(drug::Column::ExpiredDate)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Drugs with zero or negative stock.
pub async fn out_of_stock_drugs<C>(db: &C) -> Result<Vec<drug::Model>>
where
    C: ConnectionTrait,
{
    Drug::find()
        .filter(drug::Column::Quantity.lte(0))
        .order_by_asc(drug::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// The `limit` drugs expiring soonest.
pub async fn almost_expired_drugs<C>(db: &C, limit: u64) -> Result<Vec<drug::Model>>
where
    C: ConnectionTrait,
{
    Drug::find()
        .order_by_asc(drug::Column::ExpiredDate)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Counts drugs, total stock, expired drugs and out-of-stock drugs.
pub async fn drug_statistics<C>(db: &C, today: NaiveDate) -> Result<DrugStatistics>
where
    C: ConnectionTrait,
{
    let total_drugs = Drug::find().count(db).await?;
    let total_quantity: Option<i64> = Drug::find()
        .select_only()
        .column_as(drug::Column::Quantity.sum(), "total_quantity")
        .into_tuple::<Option<i64>>()
        .one(db)
        .await?
        .flatten();
    let expired = Drug::find()
        .filter(drug::Column::ExpiredDate.lt(today))
        .count(db)
        .await?;
    let out_of_stock = Drug::find()
        .filter(drug::Column::Quantity.lte(0))
        .count(db)
        .await?;

    Ok(DrugStatistics {
        total_drugs,
        total_quantity: total_quantity.unwrap_or(0),
        expired_drugs: expired,
        out_of_stock_drugs: out_of_stock,
    })
}

/// Which unit price of a drug a line item is totalled at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceBasis {
    /// `purchase_price`, used for stock-in
    Purchase,
    /// `selling_price`, used for stock-out
    Selling,
}

impl PriceBasis {
    const fn unit_price(self, drug: &drug::Model) -> f64 {
        match self {
            Self::Purchase => drug.purchase_price,
            Self::Selling => drug.selling_price,
        }
    }
}

/// Totals `unit price * quantity` over `items` at each drug's current price.
///
/// Prices are read live at call time and are not snapshotted onto the items.
/// Re-pricing a transaction after a drug's price changed yields a new total.
///
/// # Errors
/// `DrugNotFound` for the first item naming a drug that does not exist.
pub async fn price_items<C>(db: &C, items: &[LineItem], basis: PriceBasis) -> Result<f64>
where
    C: ConnectionTrait,
{
    let mut total = 0.0;
    for item in items {
        let drug = require_drug_by_name(db, &item.drug_name).await?;
        // Quantities are far below 2^52
        #[allow(clippy::cast_precision_loss)]
        let quantity = item.quantity as f64;
        total += basis.unit_price(&drug) * quantity;
    }
    Ok(total)
}
