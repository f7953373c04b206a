//! Core business logic - framework-agnostic inventory operations.
//!
//! Every function takes its database handle explicitly. Mutating operations on
//! purchases and sales take a `&DatabaseConnection` and open their own transaction;
//! read-only helpers are generic over `ConnectionTrait` so they run inside one too.

/// Local-day bucketing in the business timezone
pub mod calendar;
/// Categories, units of measure and suppliers
pub mod catalog;
/// Drug records, lookups, pricing and stock statistics
pub mod drug;
/// Per-day invoice numbering
pub mod invoice;
/// Line items and per-drug quantity arithmetic
pub mod items;
/// Atomic stock adjustments
pub mod ledger;
/// Stock-in transactions and status reconciliation
pub mod purchase;
/// Financial summaries and dashboard counters
pub mod report;
/// Stock-out transactions
pub mod sale;
/// Single-row store profile
pub mod store;
