//! Report generation business logic.
//!
//! This module computes financial summaries, net income estimates, sales, purchase
//! and revenue/COGS series bucketed by day, week, month or year, and dashboard
//! counters. All functions return structured data; rendering them as
//! documents or charts is left to the caller.
//!
//! Cost of goods sold is priced at each drug's *current* purchase price, the same
//! live lookup the transaction managers use. Items naming a drug that no longer
//! exists contribute no cost and no profit.

use crate::{
    core::{
        calendar::{BusinessCalendar, Period, PeriodSpan},
        drug,
        items::LineItem,
        sale::SaleDetails,
    },
    entities::{Drug, Purchase, Sale, SaleItem, Supplier, purchase, sale, sale_item},
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{LoaderTrait, PaginatorTrait, QueryOrder, prelude::*};
use serde::Serialize;

/// Revenue, cost and purchasing totals over a business-local date range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialSummary {
    /// First local date covered
    pub start: NaiveDate,
    /// Last local date covered (inclusive)
    pub end: NaiveDate,
    /// Sum of stored sale totals
    pub revenue: f64,
    /// Cost of the sold items at current purchase prices
    pub cogs: f64,
    /// `revenue - cogs`
    pub gross_profit: f64,
    /// Number of sales
    pub sales_count: u64,
    /// Sum of stored purchase totals
    pub purchase_spend: f64,
    /// Number of purchases
    pub purchase_count: u64,
}

/// Net income after operating cost and tax on gross profit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetIncomeEstimate {
    /// Summary the estimate is based on
    pub summary: FinancialSummary,
    /// Operating cost for the period
    pub operation_cost: f64,
    /// Tax rate in percent
    pub tax_percentage: f64,
    /// `gross_profit * tax_percentage / 100`
    pub taxes: f64,
    /// `gross_profit - operation_cost - taxes`
    pub net_income: f64,
}

impl NetIncomeEstimate {
    /// Applies operating cost and tax to a financial summary.
    #[must_use]
    pub fn from_summary(summary: FinancialSummary, operation_cost: f64, tax_percentage: f64) -> Self {
        let taxes = summary.gross_profit * (tax_percentage / 100.0);
        let net_income = summary.gross_profit - operation_cost - taxes;
        Self {
            summary,
            operation_cost,
            tax_percentage,
            taxes,
            net_income,
        }
    }
}

/// Sales activity for one business-local day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySales {
    /// Local date
    pub date: NaiveDate,
    /// Number of sales
    pub sales_count: u64,
    /// Sum of stored sale totals
    pub revenue: f64,
    /// Margin on the sold items at current prices
    pub profit: f64,
}

/// Sales activity within one period of a series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesBucket {
    /// Local dates covered
    pub span: PeriodSpan,
    /// Number of sales
    pub sales_count: u64,
    /// Sum of stored sale totals
    pub revenue: f64,
    /// Margin on the sold items at current prices
    pub profit: f64,
}

/// Consecutive sales buckets with their totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesSeries {
    /// Bucket size
    pub period: Period,
    /// Buckets, oldest first
    pub buckets: Vec<SalesBucket>,
    /// Sales across all buckets
    pub sales_count: u64,
    /// Revenue across all buckets
    pub revenue: f64,
    /// Profit across all buckets
    pub profit: f64,
}

/// Sales over the last 7 days, 4 weeks and 12 months.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesOverview {
    /// One bucket per day
    pub daily: SalesSeries,
    /// One bucket per week
    pub weekly: SalesSeries,
    /// One bucket per month
    pub monthly: SalesSeries,
}

/// Purchasing within one period of a series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseBucket {
    /// Local dates covered
    pub span: PeriodSpan,
    /// Number of purchases, any status
    pub purchase_count: u64,
    /// Sum of stored purchase totals
    pub spend: f64,
}

/// Consecutive purchase buckets with their totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseSeries {
    /// Bucket size
    pub period: Period,
    /// Buckets, oldest first
    pub buckets: Vec<PurchaseBucket>,
    /// Purchases across all buckets
    pub purchase_count: u64,
    /// Spend across all buckets
    pub spend: f64,
}

/// Purchasing over the last 7 days, 4 weeks and 12 months.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseActivity {
    /// One bucket per day
    pub daily: PurchaseSeries,
    /// One bucket per week
    pub weekly: PurchaseSeries,
    /// One bucket per month
    pub monthly: PurchaseSeries,
}

/// Revenue against cost of goods sold for one period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueCogs {
    /// Local dates covered
    pub span: PeriodSpan,
    /// Sum of stored sale totals
    pub revenue: f64,
    /// Cost of the sold items at current purchase prices
    pub cogs: f64,
}

/// Record counts shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DashboardStatistics {
    /// Drug records
    pub total_drugs: u64,
    /// Supplier records
    pub total_suppliers: u64,
    /// Sales recorded
    pub total_sales: u64,
    /// Purchases recorded
    pub total_purchases: u64,
}

const OVERVIEW_DAYS: u32 = 7;
const OVERVIEW_WEEKS: u32 = 4;
const OVERVIEW_MONTHS: u32 = 12;
const COGS_YEARS: u32 = 5;

#[allow(clippy::cast_precision_loss)]
fn as_units(quantity: i64) -> f64 {
    quantity as f64
}

async fn sales_between<C>(db: &C, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<SaleDetails>>
where
    C: ConnectionTrait,
{
    let sales = Sale::find()
        .filter(sale::Column::Date.gte(start))
        .filter(sale::Column::Date.lt(end))
        .order_by_asc(sale::Column::Date)
        .all(db)
        .await?;
    let item_rows = sales
        .load_many(SaleItem::find().order_by_asc(sale_item::Column::Position), db)
        .await?;

    Ok(sales
        .into_iter()
        .zip(item_rows)
        .map(|(sale, rows)| SaleDetails {
            sale,
            items: rows
                .into_iter()
                .map(|row| LineItem::new(row.drug_name, row.quantity))
                .collect(),
        })
        .collect())
}

/// Cost of `items` at current purchase prices, skipping drugs that no longer exist.
pub async fn cost_of_items<C>(db: &C, items: &[LineItem]) -> Result<f64>
where
    C: ConnectionTrait,
{
    let mut cost = 0.0;
    for item in items {
        if let Some(drug) = drug::get_drug_by_name(db, &item.drug_name).await? {
            cost += drug.purchase_price * as_units(item.quantity);
        }
    }
    Ok(cost)
}

/// Margin on `items`: `(selling_price - purchase_price) * quantity` at current
/// prices, skipping drugs that no longer exist.
pub async fn sale_profit<C>(db: &C, items: &[LineItem]) -> Result<f64>
where
    C: ConnectionTrait,
{
    let mut profit = 0.0;
    for item in items {
        if let Some(drug) = drug::get_drug_by_name(db, &item.drug_name).await? {
            profit += (drug.selling_price - drug.purchase_price) * as_units(item.quantity);
        }
    }
    Ok(profit)
}

/// Summarizes sales and purchases dated within the local range `start..=end`.
///
/// # Errors
/// `Validation` when `end` is before `start`.
pub async fn financial_summary<C>(
    db: &C,
    calendar: &BusinessCalendar,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<FinancialSummary>
where
    C: ConnectionTrait,
{
    if end < start {
        return Err(Error::validation(format!(
            "report range ends ({end}) before it starts ({start})"
        )));
    }
    let (from, until) = calendar.range_bounds(start, end);

    let sales = sales_between(db, from, until).await?;
    let mut revenue = 0.0;
    let mut cogs = 0.0;
    for details in &sales {
        revenue += details.sale.total_price;
        cogs += cost_of_items(db, &details.items).await?;
    }

    let purchases = Purchase::find()
        .filter(purchase::Column::Date.gte(from))
        .filter(purchase::Column::Date.lt(until))
        .all(db)
        .await?;
    let purchase_spend = purchases.iter().map(|p| p.total_price).sum();

    Ok(FinancialSummary {
        start,
        end,
        revenue,
        cogs,
        gross_profit: revenue - cogs,
        sales_count: sales.len() as u64,
        purchase_spend,
        purchase_count: purchases.len() as u64,
    })
}

/// Sales bucketed into the `count` periods ending with the one containing
/// `end_date`, oldest first.
pub async fn sales_series<C>(
    db: &C,
    calendar: &BusinessCalendar,
    period: Period,
    end_date: NaiveDate,
    count: u32,
) -> Result<SalesSeries>
where
    C: ConnectionTrait,
{
    let mut series = SalesSeries {
        period,
        buckets: Vec::with_capacity(count as usize),
        sales_count: 0,
        revenue: 0.0,
        profit: 0.0,
    };
    for span in period.trailing(end_date, count) {
        let (from, until) = calendar.span_bounds(span);
        let mut bucket = SalesBucket {
            span,
            sales_count: 0,
            revenue: 0.0,
            profit: 0.0,
        };
        for details in sales_between(db, from, until).await? {
            bucket.sales_count += 1;
            bucket.revenue += details.sale.total_price;
            bucket.profit += sale_profit(db, &details.items).await?;
        }
        series.sales_count += bucket.sales_count;
        series.revenue += bucket.revenue;
        series.profit += bucket.profit;
        series.buckets.push(bucket);
    }
    Ok(series)
}

/// Daily, weekly and monthly sales series ending at `today`.
pub async fn sales_overview<C>(
    db: &C,
    calendar: &BusinessCalendar,
    today: NaiveDate,
) -> Result<SalesOverview>
where
    C: ConnectionTrait,
{
    Ok(SalesOverview {
        daily: sales_series(db, calendar, Period::Day, today, OVERVIEW_DAYS).await?,
        weekly: sales_series(db, calendar, Period::Week, today, OVERVIEW_WEEKS).await?,
        monthly: sales_series(db, calendar, Period::Month, today, OVERVIEW_MONTHS).await?,
    })
}

/// One entry per local day for the `days` days ending at `end_date`, oldest first.
pub async fn daily_sales<C>(
    db: &C,
    calendar: &BusinessCalendar,
    end_date: NaiveDate,
    days: u32,
) -> Result<Vec<DailySales>>
where
    C: ConnectionTrait,
{
    let series = sales_series(db, calendar, Period::Day, end_date, days).await?;
    Ok(series
        .buckets
        .into_iter()
        .map(|bucket| DailySales {
            date: bucket.span.first,
            sales_count: bucket.sales_count,
            revenue: bucket.revenue,
            profit: bucket.profit,
        })
        .collect())
}

/// Purchases bucketed into the `count` periods ending with the one containing
/// `end_date`, oldest first. Every status counts; spend is the stored total.
pub async fn purchase_series<C>(
    db: &C,
    calendar: &BusinessCalendar,
    period: Period,
    end_date: NaiveDate,
    count: u32,
) -> Result<PurchaseSeries>
where
    C: ConnectionTrait,
{
    let mut series = PurchaseSeries {
        period,
        buckets: Vec::with_capacity(count as usize),
        purchase_count: 0,
        spend: 0.0,
    };
    for span in period.trailing(end_date, count) {
        let (from, until) = calendar.span_bounds(span);
        let purchases = Purchase::find()
            .filter(purchase::Column::Date.gte(from))
            .filter(purchase::Column::Date.lt(until))
            .all(db)
            .await?;
        let bucket = PurchaseBucket {
            span,
            purchase_count: purchases.len() as u64,
            spend: purchases.iter().map(|p| p.total_price).sum(),
        };
        series.purchase_count += bucket.purchase_count;
        series.spend += bucket.spend;
        series.buckets.push(bucket);
    }
    Ok(series)
}

/// Daily, weekly and monthly purchase series ending at `today`.
pub async fn purchase_activity<C>(
    db: &C,
    calendar: &BusinessCalendar,
    today: NaiveDate,
) -> Result<PurchaseActivity>
where
    C: ConnectionTrait,
{
    Ok(PurchaseActivity {
        daily: purchase_series(db, calendar, Period::Day, today, OVERVIEW_DAYS).await?,
        weekly: purchase_series(db, calendar, Period::Week, today, OVERVIEW_WEEKS).await?,
        monthly: purchase_series(db, calendar, Period::Month, today, OVERVIEW_MONTHS).await?,
    })
}

/// Revenue and cost of goods sold for the `count` periods ending with the one
/// containing `end_date`, oldest first.
pub async fn revenue_and_cogs<C>(
    db: &C,
    calendar: &BusinessCalendar,
    period: Period,
    end_date: NaiveDate,
    count: u32,
) -> Result<Vec<RevenueCogs>>
where
    C: ConnectionTrait,
{
    let mut series = Vec::with_capacity(count as usize);
    for span in period.trailing(end_date, count) {
        let (from, until) = calendar.span_bounds(span);
        let mut entry = RevenueCogs {
            span,
            revenue: 0.0,
            cogs: 0.0,
        };
        for details in sales_between(db, from, until).await? {
            entry.revenue += details.sale.total_price;
            entry.cogs += cost_of_items(db, &details.items).await?;
        }
        series.push(entry);
    }
    Ok(series)
}

/// Revenue and COGS for the 12 months ending with the month of `today`.
pub async fn monthly_revenue_and_cogs<C>(
    db: &C,
    calendar: &BusinessCalendar,
    today: NaiveDate,
) -> Result<Vec<RevenueCogs>>
where
    C: ConnectionTrait,
{
    revenue_and_cogs(db, calendar, Period::Month, today, OVERVIEW_MONTHS).await
}

/// Revenue and COGS for the 5 years ending with the year of `today`.
pub async fn yearly_revenue_and_cogs<C>(
    db: &C,
    calendar: &BusinessCalendar,
    today: NaiveDate,
) -> Result<Vec<RevenueCogs>>
where
    C: ConnectionTrait,
{
    revenue_and_cogs(db, calendar, Period::Year, today, COGS_YEARS).await
}

/// Counts drugs, suppliers, sales and purchases.
pub async fn dashboard_statistics<C>(db: &C) -> Result<DashboardStatistics>
where
    C: ConnectionTrait,
{
    Ok(DashboardStatistics {
        total_drugs: Drug::find().count(db).await?,
        total_suppliers: Supplier::find().count(db).await?,
        total_sales: Sale::find().count(db).await?,
        total_purchases: Purchase::find().count(db).await?,
    })
}
