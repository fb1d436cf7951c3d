use crate::cartesian::{cartesian_pair, cartesian_product};
use crate::error::{BalanceError, Result};
use crate::schema::{DenseGrid, GridRow, Partition, PartitionKey, Transaction};
use crate::utils::{days_in_period, month_end};
use chrono::NaiveDate;
use log::debug;
use std::collections::BTreeSet;

pub struct GridBuilder<'a> {
    keys: &'a [PartitionKey],
}

impl<'a> GridBuilder<'a> {
    pub fn new(keys: &'a [PartitionKey]) -> Self {
        Self { keys }
    }

    /// Distinct observed values per key, in key order. Values are sorted so the
    /// grid is deterministic for a given transaction set.
    pub fn distinct_values(&self, transactions: &[Transaction]) -> Result<Vec<Vec<String>>> {
        let mut sets: Vec<BTreeSet<&str>> = vec![BTreeSet::new(); self.keys.len()];

        for (index, tx) in transactions.iter().enumerate() {
            for (set, key) in sets.iter_mut().zip(self.keys) {
                let value = tx.attribute(*key).ok_or_else(|| BalanceError::Schema {
                    key: key.column_name().to_string(),
                    index,
                })?;
                set.insert(value);
            }
        }

        Ok(sets
            .into_iter()
            .map(|set| set.into_iter().map(str::to_string).collect())
            .collect())
    }

    pub fn partitions(&self, transactions: &[Transaction]) -> Result<Vec<Partition>> {
        let value_sets = self.distinct_values(transactions)?;

        Ok(cartesian_product(&value_sets)
            .into_iter()
            .map(|combination| Partition::new(self.keys.iter().copied().zip(combination).collect()))
            .collect())
    }

    pub fn build(&self, transactions: &[Transaction]) -> Result<DenseGrid> {
        if self.keys.is_empty() {
            return Err(BalanceError::NoPartitionKeys);
        }

        let (start, end) = date_span(transactions)?;
        let partitions = self.partitions(transactions)?;
        let dates = days_in_period(start, end);

        debug!(
            "Dense grid spans {} to {} ({} days) across {} partitions",
            start,
            end,
            dates.len(),
            partitions.len()
        );

        let rows: Vec<GridRow> = cartesian_pair(&dates, &partitions)
            .into_iter()
            .map(|(date, partition)| GridRow { date, partition })
            .collect();

        Ok(DenseGrid {
            keys: self.keys.to_vec(),
            start,
            end,
            partitions,
            rows,
        })
    }
}

/// Inclusive span from the earliest transaction date through the last day of the
/// month holding the latest one. The start is deliberately not moved to the first
/// of its month.
pub fn date_span(transactions: &[Transaction]) -> Result<(NaiveDate, NaiveDate)> {
    let start = transactions
        .iter()
        .map(|tx| tx.date)
        .min()
        .ok_or(BalanceError::EmptyInput)?;
    let latest = transactions
        .iter()
        .map(|tx| tx.date)
        .max()
        .ok_or(BalanceError::EmptyInput)?;

    Ok((start, month_end(latest)?))
}

pub fn build_dense_grid(transactions: &[Transaction], keys: &[PartitionKey]) -> Result<DenseGrid> {
    GridBuilder::new(keys).build(transactions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::default_partition_keys;

    fn tx(y: i32, m: u32, d: u32, account: &str, category: &str, amount: f64) -> Transaction {
        Transaction::new(NaiveDate::from_ymd_opt(y, m, d).unwrap(), account, category, amount)
    }

    #[test]
    fn test_grid_extends_to_month_end() {
        let transactions = vec![
            tx(2024, 1, 1, "Checking", "Groceries", -50.0),
            tx(2024, 1, 3, "Checking", "Groceries", 200.0),
        ];
        let grid = build_dense_grid(&transactions, &default_partition_keys()).unwrap();

        assert_eq!(grid.start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(grid.end, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        assert_eq!(grid.day_count(), 31);
        assert_eq!(grid.partitions.len(), 1);
        assert_eq!(grid.len(), 31);
    }

    #[test]
    fn test_grid_start_is_not_rounded() {
        let transactions = vec![
            tx(2024, 3, 17, "Checking", "Rent", -900.0),
            tx(2024, 4, 2, "Checking", "Rent", -900.0),
        ];
        let (start, end) = date_span(&transactions).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 3, 17).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 4, 30).unwrap());
    }

    #[test]
    fn test_grid_cardinality_is_full_cross_product() {
        // Only three of the four (account, category) pairs are observed.
        let transactions = vec![
            tx(2023, 2, 10, "Checking", "Groceries", -20.0),
            tx(2023, 2, 12, "Savings", "Interest", 1.5),
            tx(2023, 2, 20, "Checking", "Interest", 0.5),
        ];
        let grid = build_dense_grid(&transactions, &default_partition_keys()).unwrap();

        let days = 28 - 10 + 1;
        assert_eq!(grid.day_count(), days);
        assert_eq!(grid.partitions.len(), 2 * 2);
        assert_eq!(grid.len(), 2 * 2 * days);

        let mut seen: Vec<(NaiveDate, String)> = grid
            .rows
            .iter()
            .map(|row| (row.date, row.partition.to_string()))
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), grid.len());
    }

    #[test]
    fn test_distinct_values_are_deduplicated_and_sorted() {
        let transactions = vec![
            tx(2024, 1, 1, "Savings", "Rent", 1.0),
            tx(2024, 1, 2, "Checking", "Rent", 1.0),
            tx(2024, 1, 3, "Savings", "Food", 1.0),
        ];
        let keys = default_partition_keys();
        let values = GridBuilder::new(&keys).distinct_values(&transactions).unwrap();
        assert_eq!(values[0], vec!["Checking", "Savings"]);
        assert_eq!(values[1], vec!["Food", "Rent"]);
    }

    #[test]
    fn test_single_key_grid() {
        let transactions = vec![
            tx(2024, 1, 30, "Checking", "Rent", 1.0),
            tx(2024, 1, 31, "Savings", "Food", 1.0),
        ];
        let grid = build_dense_grid(&transactions, &[PartitionKey::AccountName]).unwrap();
        assert_eq!(grid.partitions.len(), 2);
        assert_eq!(grid.len(), 2 * 2);
        assert_eq!(grid.rows[0].partition.get(PartitionKey::CategoryName), None);
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let result = build_dense_grid(&[], &default_partition_keys());
        assert!(matches!(result, Err(BalanceError::EmptyInput)));
    }

    #[test]
    fn test_no_keys_is_rejected() {
        let transactions = vec![tx(2024, 1, 1, "Checking", "Rent", 1.0)];
        let result = build_dense_grid(&transactions, &[]);
        assert!(matches!(result, Err(BalanceError::NoPartitionKeys)));
    }

    #[test]
    fn test_missing_attribute_is_schema_error() {
        let mut missing = tx(2024, 1, 2, "Checking", "Rent", 1.0);
        missing.category_name = None;
        let transactions = vec![tx(2024, 1, 1, "Checking", "Rent", 1.0), missing];

        match build_dense_grid(&transactions, &default_partition_keys()) {
            Err(BalanceError::Schema { key, index }) => {
                assert_eq!(key, "category_name");
                assert_eq!(index, 1);
            }
            other => panic!("expected schema error, got {:?}", other),
        }
    }
}
