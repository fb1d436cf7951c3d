//! Figures derived from the daily balance table for monthly reporting: balance
//! evolution per account, month-end totals, monthly in/out flows, a month-end snapshot
//! per account, net flows per category and the largest transactions of a month. Rendering is left to the caller; `to_csv` and
//! `evolution_to_markdown` cover plain-text export.

use crate::error::Result;
use crate::schema::{DailyBalanceTable, PartitionKey, Transaction};
use crate::utils::{is_month_end, last_day_of_month, month_end};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyFlow {
    pub month_end: NaiveDate,
    pub inflow: f64,
    pub outflow: f64,
    /// `inflow - outflow`
    pub savings: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionRow {
    pub month_end: NaiveDate,
    pub inflow: Option<f64>,
    pub outflow: Option<f64>,
    pub savings: Option<f64>,
    pub balance: f64,
}

/// Daily balance per account (summed over every other key) up to `through`.
/// Accounts whose balance is zero on every day are left out.
pub fn account_evolution(
    table: &DailyBalanceTable,
    through: NaiveDate,
) -> BTreeMap<String, BTreeMap<NaiveDate, f64>> {
    let mut accounts: BTreeMap<String, BTreeMap<NaiveDate, f64>> = BTreeMap::new();

    for row in table.iter().filter(|r| r.date <= through) {
        let Some(account) = row.partition.get(PartitionKey::AccountName) else {
            continue;
        };
        *accounts
            .entry(account.to_string())
            .or_default()
            .entry(row.date)
            .or_insert(0.0) += row.amount;
    }

    accounts.retain(|_, series| {
        series
            .values()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
            != 0.0
    });

    accounts
}

/// Sum of all partition balances on every month-end date present in the table.
pub fn month_end_totals(table: &DailyBalanceTable) -> Vec<(NaiveDate, f64)> {
    let mut totals: BTreeMap<NaiveDate, f64> = BTreeMap::new();

    for row in table.iter().filter(|r| is_month_end(r.date)) {
        *totals.entry(row.date).or_insert(0.0) += row.amount;
    }

    totals.into_iter().collect()
}

/// Inflows, outflows and savings per calendar month up to `through`, transfers excluded.
///
/// The first month is dropped: it books the opening balances as inflow.
pub fn monthly_flows(transactions: &[Transaction], through: NaiveDate) -> Result<Vec<MonthlyFlow>> {
    let mut months: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();

    for tx in transactions
        .iter()
        .filter(|tx| tx.date <= through && !tx.is_transfer())
    {
        let entry = months.entry(month_end(tx.date)?).or_insert((0.0, 0.0));
        if tx.amount > 0.0 {
            entry.0 += tx.amount;
        } else {
            entry.1 -= tx.amount;
        }
    }

    Ok(months
        .into_iter()
        .skip(1)
        .map(|(month_end, (inflow, outflow))| MonthlyFlow {
            month_end,
            inflow,
            outflow,
            savings: inflow - outflow,
        })
        .collect())
}

/// The `n` largest inflows (descending) and outflows (most negative first) of a month.
pub fn top_flows(
    transactions: &[Transaction],
    year: i32,
    month: u32,
    n: usize,
) -> (Vec<&Transaction>, Vec<&Transaction>) {
    let in_month = transactions
        .iter()
        .filter(|tx| tx.date.year() == year && tx.date.month() == month && !tx.is_transfer());

    let (mut inflows, mut outflows): (Vec<&Transaction>, Vec<&Transaction>) =
        in_month.partition(|tx| tx.amount >= 0.0);

    inflows.sort_by(|a, b| b.amount.partial_cmp(&a.amount).unwrap_or(Ordering::Equal));
    outflows.sort_by(|a, b| a.amount.partial_cmp(&b.amount).unwrap_or(Ordering::Equal));
    inflows.truncate(n);
    outflows.truncate(n);

    (inflows, outflows)
}

/// Balance per account on the last day of `year`-`month`, largest first, followed by a
/// `"Total"` row. Accounts with a zero balance on that day are left out.
pub fn financial_snapshot(
    table: &DailyBalanceTable,
    year: i32,
    month: u32,
) -> Result<Vec<(String, f64)>> {
    let eom = last_day_of_month(year, month)?;
    let mut accounts: BTreeMap<String, f64> = BTreeMap::new();

    for row in table.iter().filter(|r| r.date == eom) {
        let Some(account) = row.partition.get(PartitionKey::AccountName) else {
            continue;
        };
        *accounts.entry(account.to_string()).or_insert(0.0) += row.amount;
    }

    let mut snapshot: Vec<(String, f64)> = accounts
        .into_iter()
        .filter(|(_, balance)| *balance != 0.0)
        .collect();
    snapshot.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    let total = snapshot.iter().map(|(_, balance)| balance).sum();
    snapshot.push(("Total".to_string(), total));

    Ok(snapshot)
}

/// Net amount per category within a month, most negative first. Transfers and
/// uncategorised transactions are ignored.
pub fn category_flows(transactions: &[Transaction], year: i32, month: u32) -> Vec<(String, f64)> {
    let mut categories: BTreeMap<&str, f64> = BTreeMap::new();

    for tx in transactions
        .iter()
        .filter(|tx| tx.date.year() == year && tx.date.month() == month && !tx.is_transfer())
    {
        if let Some(category) = tx.category_name.as_deref() {
            *categories.entry(category).or_insert(0.0) += tx.amount;
        }
    }

    let mut flows: Vec<(String, f64)> = categories
        .into_iter()
        .map(|(category, amount)| (category.to_string(), amount))
        .collect();
    flows.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

    flows
}

/// Month-end totals up to `through`, each joined with that month's flows when known.
pub fn financial_evolution(
    table: &DailyBalanceTable,
    transactions: &[Transaction],
    through: NaiveDate,
) -> Result<Vec<EvolutionRow>> {
    let flows: BTreeMap<NaiveDate, MonthlyFlow> = monthly_flows(transactions, through)?
        .into_iter()
        .map(|flow| (flow.month_end, flow))
        .collect();

    Ok(month_end_totals(table)
        .into_iter()
        .filter(|(date, _)| *date <= through)
        .map(|(month_end, balance)| {
            let flow = flows.get(&month_end);
            EvolutionRow {
                month_end,
                inflow: flow.map(|f| f.inflow),
                outflow: flow.map(|f| f.outflow),
                savings: flow.map(|f| f.savings),
                balance,
            }
        })
        .collect())
}

pub fn to_csv(table: &DailyBalanceTable) -> String {
    let mut output = String::new();

    output.push_str("date");
    for key in &table.keys {
        output.push(',');
        output.push_str(key.column_name());
    }
    output.push_str(",amount\n");

    for row in table.iter() {
        output.push_str(&row.date.format("%Y-%m-%d").to_string());
        for key in &table.keys {
            output.push(',');
            output.push_str(&csv_field(row.partition.get(*key).unwrap_or("")));
        }
        output.push_str(&format!(",{}\n", row.amount));
    }

    output
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn evolution_to_markdown(rows: &[EvolutionRow]) -> String {
    let mut output = String::new();

    output.push_str("| Month | Inflow | Outflow | Savings | Amount |\n");
    output.push_str("|---|---:|---:|---:|---:|\n");

    let fmt = |value: Option<f64>| value.map(|v| format!("{:.2}", v)).unwrap_or_default();

    for row in rows {
        output.push_str(&format!(
            "| {} | {} | {} | {} | {:.2} |\n",
            row.month_end.format("%B %Y"),
            fmt(row.inflow),
            fmt(row.outflow),
            fmt(row.savings),
            row.balance
        ));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::accumulate_balances;
    use crate::grid::build_dense_grid;
    use crate::schema::default_partition_keys;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_transactions() -> Vec<Transaction> {
        let mut transfer_out = Transaction::new(date(2024, 2, 5), "Checking", "Transfer", -300.0);
        transfer_out.transfer_transaction_id = Some("t-2".to_string());
        let mut transfer_in = Transaction::new(date(2024, 2, 5), "Savings", "Transfer", 300.0);
        transfer_in.transfer_transaction_id = Some("t-1".to_string());

        vec![
            Transaction::new(date(2024, 1, 15), "Checking", "Opening", 1000.0),
            Transaction::new(date(2024, 1, 20), "Checking", "Groceries", -100.0),
            Transaction::new(date(2024, 2, 1), "Checking", "Salary", 2000.0),
            Transaction::new(date(2024, 2, 3), "Checking", "Groceries", -150.0),
            Transaction::new(date(2024, 2, 10), "Checking", "Rent", -800.0),
            transfer_out,
            transfer_in,
        ]
    }

    fn sample_table(transactions: &[Transaction]) -> DailyBalanceTable {
        let grid = build_dense_grid(transactions, &default_partition_keys()).unwrap();
        accumulate_balances(&grid, transactions).unwrap()
    }

    #[test]
    fn test_monthly_flows_skip_opening_month_and_transfers() {
        let flows = monthly_flows(&sample_transactions(), date(2024, 2, 29)).unwrap();

        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].month_end, date(2024, 2, 29));
        assert_eq!(flows[0].inflow, 2000.0);
        assert_eq!(flows[0].outflow, 950.0);
        assert_eq!(flows[0].savings, 1050.0);
    }

    #[test]
    fn test_month_end_totals() {
        let transactions = sample_transactions();
        let table = sample_table(&transactions);
        let totals = month_end_totals(&table);

        assert_eq!(
            totals,
            vec![(date(2024, 1, 31), 900.0), (date(2024, 2, 29), 1950.0)]
        );
    }

    #[test]
    fn test_account_evolution_drops_all_zero_accounts() {
        let transactions = vec![
            Transaction::new(date(2024, 3, 1), "Checking", "Salary", 500.0),
            Transaction::new(date(2024, 3, 2), "Dormant", "Salary", 0.0),
        ];
        let table = sample_table(&transactions);
        let evolution = account_evolution(&table, date(2024, 3, 10));

        assert_eq!(evolution.len(), 1);
        let checking = &evolution["Checking"];
        assert_eq!(checking.len(), 10);
        assert_eq!(checking[&date(2024, 3, 10)], 500.0);
    }

    #[test]
    fn test_top_flows() {
        let transactions = sample_transactions();
        let (inflows, outflows) = top_flows(&transactions, 2024, 2, 1);

        assert_eq!(inflows.len(), 1);
        assert_eq!(inflows[0].amount, 2000.0);
        assert_eq!(outflows.len(), 1);
        assert_eq!(outflows[0].amount, -800.0);
    }

    #[test]
    fn test_financial_snapshot_orders_accounts_and_appends_total() {
        let table = sample_table(&sample_transactions());

        let february = financial_snapshot(&table, 2024, 2).unwrap();
        assert_eq!(
            february,
            vec![
                ("Checking".to_string(), 1650.0),
                ("Savings".to_string(), 300.0),
                ("Total".to_string(), 1950.0),
            ]
        );

        // Savings is still empty at the end of January.
        let january = financial_snapshot(&table, 2024, 1).unwrap();
        assert_eq!(
            january,
            vec![("Checking".to_string(), 900.0), ("Total".to_string(), 900.0)]
        );
    }

    #[test]
    fn test_financial_snapshot_rejects_invalid_month() {
        let table = sample_table(&sample_transactions());
        assert!(financial_snapshot(&table, 2024, 13).is_err());
    }

    #[test]
    fn test_category_flows_excludes_transfers() {
        let mut transactions = sample_transactions();
        let mut uncategorised = Transaction::new(date(2024, 2, 12), "Checking", "", -5.0);
        uncategorised.category_name = None;
        transactions.push(uncategorised);
        transactions.push(Transaction::new(date(2024, 2, 20), "Checking", "Groceries", -25.0));

        let flows = category_flows(&transactions, 2024, 2);
        assert_eq!(
            flows,
            vec![
                ("Rent".to_string(), -800.0),
                ("Groceries".to_string(), -175.0),
                ("Salary".to_string(), 2000.0),
            ]
        );
        assert!(category_flows(&transactions, 2024, 3).is_empty());
    }

    #[test]
    fn test_financial_evolution_joins_flows() {
        let transactions = sample_transactions();
        let table = sample_table(&transactions);
        let rows = financial_evolution(&table, &transactions, date(2024, 2, 29)).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].inflow, None);
        assert_eq!(rows[1].savings, Some(1050.0));
        assert_eq!(rows[1].balance, 1950.0);

        let markdown = evolution_to_markdown(&rows);
        assert!(markdown.contains("| February 2024 | 2000.00 | 950.00 | 1050.00 | 1950.00 |"));
        assert!(markdown.contains("| January 2024 |  |  |  | 900.00 |"));
    }

    #[test]
    fn test_to_csv_quotes_fields() {
        let transactions = vec![Transaction::new(
            date(2024, 1, 31),
            "Checking",
            "Food, Drinks",
            -12.5,
        )];
        let table = sample_table(&transactions);
        let csv = to_csv(&table);

        assert_eq!(
            csv,
            "date,account_name,category_name,amount\n2024-01-31,Checking,\"Food, Drinks\",-12.5\n"
        );
    }

    #[test]
    fn test_to_csv_keeps_milliunit_precision() {
        let transactions = vec![
            Transaction::new(date(2024, 1, 30), "Checking", "Fees", 0.001),
            Transaction::new(date(2024, 1, 31), "Checking", "Bank", -45.999),
        ];
        let table = sample_table(&transactions);
        let csv = to_csv(&table);
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines,
            vec![
                "date,account_name,category_name,amount",
                "2024-01-30,Checking,Bank,0",
                "2024-01-31,Checking,Bank,-45.999",
                "2024-01-30,Checking,Fees,0.001",
                "2024-01-31,Checking,Fees,0.001",
            ]
        );
    }
}
