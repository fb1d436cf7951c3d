use crate::error::{BalanceError, Result};
use crate::schema::{BalanceConfig, Transaction};
use crate::utils::parse_iso_date;
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Budgeting APIs report amounts in thousandths of the currency unit.
pub const MILLIUNITS_PER_UNIT: f64 = 1000.0;

/// A transaction as delivered by the budgeting API, before normalisation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransaction {
    #[serde(default)]
    pub id: Option<String>,
    pub date: String,
    /// Signed amount in milliunits.
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub payee_name: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub transfer_transaction_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPayload {
    List(Vec<RawTransaction>),
    Envelope { data: RawEnvelopeData },
}

#[derive(Deserialize)]
struct RawEnvelopeData {
    transactions: Vec<RawTransaction>,
}

/// Accepts either a bare JSON array or the `{"data": {"transactions": [...]}}` envelope.
pub fn parse_raw_transactions_json(json: &str) -> Result<Vec<RawTransaction>> {
    let payload: RawPayload = serde_json::from_str(json)?;
    Ok(match payload {
        RawPayload::List(rows) => rows,
        RawPayload::Envelope { data } => data.transactions,
    })
}

/// Drops deleted and unapproved records, applies the configured date window and
/// scales milliunit amounts to currency units.
pub fn convert_raw_transactions(
    rows: &[RawTransaction],
    config: &BalanceConfig,
) -> Result<Vec<Transaction>> {
    config.validate()?;

    let mut transactions = Vec::with_capacity(rows.len());
    let mut skipped_status = 0usize;
    let mut skipped_window = 0usize;

    for (index, row) in rows.iter().enumerate() {
        if row.deleted || !row.approved {
            skipped_status += 1;
            continue;
        }

        let date = parse_iso_date(&row.date)?;
        if !config.contains_date(date) {
            skipped_window += 1;
            continue;
        }

        let milliunits = row.amount.ok_or_else(|| BalanceError::DataQuality {
            index,
            details: format!(
                "record {} has no amount",
                row.id.as_deref().unwrap_or("<unknown>")
            ),
        })?;

        transactions.push(Transaction {
            date,
            account_name: row.account_name.clone(),
            category_name: row.category_name.clone(),
            payee_name: row.payee_name.clone(),
            memo: row.memo.clone(),
            transfer_transaction_id: row.transfer_transaction_id.clone(),
            amount: milliunits as f64 / MILLIUNITS_PER_UNIT,
        });
    }

    debug!(
        "Skipped {} deleted/unapproved and {} out-of-window records",
        skipped_status, skipped_window
    );
    info!(
        "Ingested {} of {} raw transactions",
        transactions.len(),
        rows.len()
    );

    Ok(transactions)
}
