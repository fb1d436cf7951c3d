use crate::error::{BalanceError, Result};
use crate::schema::{DailyBalance, DailyBalanceTable, DenseGrid, JoinedRow, Partition, Transaction};
use chrono::NaiveDate;
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};

pub struct BalanceAccumulator<'a> {
    grid: &'a DenseGrid,
}

impl<'a> BalanceAccumulator<'a> {
    pub fn new(grid: &'a DenseGrid) -> Self {
        Self { grid }
    }

    /// Net amount per (partition, date). Several same-day transactions in one
    /// partition collapse into a single contribution.
    pub fn net_flows(
        &self,
        transactions: &[Transaction],
    ) -> Result<HashMap<(Partition, NaiveDate), f64>> {
        let mut flows: HashMap<(Partition, NaiveDate), f64> = HashMap::new();

        for (index, tx) in transactions.iter().enumerate() {
            if !tx.amount.is_finite() {
                return Err(BalanceError::DataQuality {
                    index,
                    details: format!("amount {} is not a finite number", tx.amount),
                });
            }

            let partition = Partition::from_transaction(tx, &self.grid.keys, index)?;
            *flows.entry((partition, tx.date)).or_insert(0.0) += tx.amount;
        }

        Ok(flows)
    }

    /// Left join of the net flows onto every skeleton row; unmatched rows get zero.
    pub fn join_net_flows(&self, transactions: &[Transaction]) -> Result<Vec<JoinedRow>> {
        let mut flows = self.net_flows(transactions)?;

        let joined: Vec<JoinedRow> = self
            .grid
            .rows
            .iter()
            .map(|row| JoinedRow {
                date: row.date,
                partition: row.partition.clone(),
                net_flow: flows
                    .remove(&(row.partition.clone(), row.date))
                    .unwrap_or(0.0),
            })
            .collect();

        if !flows.is_empty() {
            warn!(
                "{} (partition, date) flows fall outside the dense grid and were ignored",
                flows.len()
            );
        }

        Ok(joined)
    }

    pub fn accumulate(&self, transactions: &[Transaction]) -> Result<DailyBalanceTable> {
        let joined = self.join_net_flows(transactions)?;

        let mut by_partition: BTreeMap<Partition, Vec<(NaiveDate, f64)>> = BTreeMap::new();
        for row in joined {
            by_partition
                .entry(row.partition)
                .or_default()
                .push((row.date, row.net_flow));
        }

        debug!(
            "Accumulating running balances for {} partitions",
            by_partition.len()
        );

        let mut rows = Vec::with_capacity(self.grid.len());
        for (partition, mut days) in by_partition {
            days.sort_by_key(|(date, _)| *date);

            let mut running = 0.0;
            for (date, net_flow) in days {
                running += net_flow;
                rows.push(DailyBalance {
                    date,
                    partition: partition.clone(),
                    amount: running,
                });
            }
        }

        Ok(DailyBalanceTable {
            keys: self.grid.keys.clone(),
            rows,
        })
    }
}

pub fn accumulate_balances(
    grid: &DenseGrid,
    transactions: &[Transaction],
) -> Result<DailyBalanceTable> {
    BalanceAccumulator::new(grid).accumulate(transactions)
}
