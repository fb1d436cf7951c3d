//! # Daily Balance Builder
//!
//! A library for converting a sparse ledger of dated transactions into a dense table
//! of daily running balances for every (account, category) pair.
//!
//! ## Core Concepts
//!
//! - **Sparse Data**: Transactions booked on a few days, each tagged with an account and a category
//! - **Partition**: One combination of partition key values, e.g. ("Checking", "Groceries")
//! - **Dense Grid**: Every calendar day from the first transaction through the month-end of the
//!   last one, crossed with every partition observed in the data
//! - **Daily Balance**: The cumulative sum of a partition's amounts up to and including a day
//!
//! The grid holds `days x partitions` rows, so memory grows with
//! O(days x accounts x categories).
//!
//! ## Example
//!
//! ```rust
//! use daily_balance_builder::*;
//! use chrono::NaiveDate;
//!
//! let transactions = vec![
//!     Transaction::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), "Checking", "Groceries", -50.0),
//!     Transaction::new(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(), "Checking", "Groceries", 200.0),
//! ];
//!
//! let table = calculate_daily_balances(&transactions).unwrap();
//! assert_eq!(table.len(), 31);
//! ```

pub mod accumulator;
pub mod cartesian;
pub mod error;
pub mod grid;
pub mod ingestion;
pub mod reports;
pub mod schema;
pub mod utils;

pub use accumulator::{accumulate_balances, BalanceAccumulator};
pub use cartesian::{cartesian_pair, cartesian_product};
pub use error::{BalanceError, Result};
pub use grid::{build_dense_grid, date_span, GridBuilder};
pub use ingestion::*;
pub use reports::*;
pub use schema::*;

use log::{debug, info};

pub struct DailyBalanceProcessor;

impl DailyBalanceProcessor {
    /// Only transactions inside the configured `min_date`/`max_date` window are used;
    /// error indices refer to positions among those.
    pub fn process(
        transactions: &[Transaction],
        config: &BalanceConfig,
    ) -> Result<DailyBalanceTable> {
        config.validate()?;

        let windowed: Vec<Transaction> = transactions
            .iter()
            .filter(|tx| config.contains_date(tx.date))
            .cloned()
            .collect();
        if windowed.len() < transactions.len() {
            debug!(
                "Skipped {} transactions outside the configured date window",
                transactions.len() - windowed.len()
            );
        }

        info!(
            "Calculating daily balances for {} transactions partitioned by {:?}",
            windowed.len(),
            config.partition_keys
        );

        let grid = build_dense_grid(&windowed, &config.partition_keys)?;
        debug!(
            "Dense grid has {} rows ({} days x {} partitions)",
            grid.len(),
            grid.day_count(),
            grid.partitions.len()
        );

        accumulate_balances(&grid, &windowed)
    }

    pub fn process_raw(
        rows: &[RawTransaction],
        config: &BalanceConfig,
    ) -> Result<DailyBalanceTable> {
        let transactions = convert_raw_transactions(rows, config)?;
        Self::process(&transactions, config)
    }
}

/// Daily balances partitioned by (account_name, category_name).
pub fn calculate_daily_balances(transactions: &[Transaction]) -> Result<DailyBalanceTable> {
    DailyBalanceProcessor::process(transactions, &BalanceConfig::default())
}

pub fn process_with_config(
    transactions: &[Transaction],
    config: &BalanceConfig,
) -> Result<DailyBalanceTable> {
    DailyBalanceProcessor::process(transactions, config)
}

pub fn process_raw_transactions(
    rows: &[RawTransaction],
    config: &BalanceConfig,
) -> Result<DailyBalanceTable> {
    DailyBalanceProcessor::process_raw(rows, config)
}
