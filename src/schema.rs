use crate::error::{BalanceError, Result};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Transaction attributes that can be used to partition balances.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum PartitionKey {
    #[schemars(description = "The name of the account the transaction was booked on (e.g. 'Checking')")]
    AccountName,

    #[schemars(description = "The budget category of the transaction (e.g. 'Groceries')")]
    CategoryName,

    #[schemars(description = "The payee of the transaction")]
    PayeeName,
}

impl PartitionKey {
    pub fn column_name(&self) -> &'static str {
        match self {
            PartitionKey::AccountName => "account_name",
            PartitionKey::CategoryName => "category_name",
            PartitionKey::PayeeName => "payee_name",
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

pub fn default_partition_keys() -> Vec<PartitionKey> {
    vec![PartitionKey::AccountName, PartitionKey::CategoryName]
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Transaction {
    #[schemars(description = "Booking date in YYYY-MM-DD format")]
    pub date: NaiveDate,

    #[serde(default)]
    pub account_name: Option<String>,

    #[serde(default)]
    pub category_name: Option<String>,

    #[serde(default)]
    pub payee_name: Option<String>,

    #[serde(default)]
    pub memo: Option<String>,

    #[serde(default)]
    #[schemars(description = "Id of the mirrored transaction when this is a transfer between accounts")]
    pub transfer_transaction_id: Option<String>,

    #[schemars(description = "Signed amount in major currency units. Negative values are outflows.")]
    pub amount: f64,
}

impl Transaction {
    pub fn new(
        date: NaiveDate,
        account_name: impl Into<String>,
        category_name: impl Into<String>,
        amount: f64,
    ) -> Self {
        Self {
            date,
            account_name: Some(account_name.into()),
            category_name: Some(category_name.into()),
            payee_name: None,
            memo: None,
            transfer_transaction_id: None,
            amount,
        }
    }

    pub fn attribute(&self, key: PartitionKey) -> Option<&str> {
        match key {
            PartitionKey::AccountName => self.account_name.as_deref(),
            PartitionKey::CategoryName => self.category_name.as_deref(),
            PartitionKey::PayeeName => self.payee_name.as_deref(),
        }
    }

    pub fn is_transfer(&self) -> bool {
        self.transfer_transaction_id.is_some()
    }
}

/// One combination of partition key values, e.g. ("Checking", "Groceries").
///
/// Serializes as a map from column name to value, e.g.
/// `{"account_name": "Checking", "category_name": "Groceries"}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Partition {
    values: Vec<(PartitionKey, String)>,
}

impl Partition {
    pub fn new(values: Vec<(PartitionKey, String)>) -> Self {
        Self { values }
    }

    /// Reads every key from the transaction at position `index` of its input slice.
    pub fn from_transaction(
        transaction: &Transaction,
        keys: &[PartitionKey],
        index: usize,
    ) -> Result<Self> {
        let values = keys
            .iter()
            .map(|key| {
                transaction
                    .attribute(*key)
                    .map(|value| (*key, value.to_string()))
                    .ok_or_else(|| BalanceError::Schema {
                        key: key.column_name().to_string(),
                        index,
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { values })
    }

    pub fn get(&self, key: PartitionKey) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = PartitionKey> + '_ {
        self.values.iter().map(|(key, _)| *key)
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(_, value)| value.as_str())
    }
}

impl Serialize for Partition {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (key, value) in &self.values {
            map.serialize_entry(key.column_name(), value)?;
        }
        map.end()
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.values().collect();
        write!(f, "{}", joined.join(" / "))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridRow {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub partition: Partition,
}

/// The dense (date x partition) scaffold the balances are joined onto.
///
/// Holds `days * partitions` rows, so memory grows with
/// O(days x accounts x categories).
#[derive(Debug, Clone, Serialize)]
pub struct DenseGrid {
    pub keys: Vec<PartitionKey>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub partitions: Vec<Partition>,
    pub rows: Vec<GridRow>,
}

impl DenseGrid {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn day_count(&self) -> usize {
        ((self.end - self.start).num_days() + 1).max(0) as usize
    }
}

/// A skeleton row after the left join: the net amount booked on that day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinedRow {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub partition: Partition,
    pub net_flow: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyBalance {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub partition: Partition,
    /// Cumulative sum of every amount in this partition up to and including `date`.
    pub amount: f64,
}

impl DailyBalance {
    pub fn account_name(&self) -> Option<&str> {
        self.partition.get(PartitionKey::AccountName)
    }

    pub fn category_name(&self) -> Option<&str> {
        self.partition.get(PartitionKey::CategoryName)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyBalanceTable {
    pub keys: Vec<PartitionKey>,
    pub rows: Vec<DailyBalance>,
}

impl DailyBalanceTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DailyBalance> {
        self.rows.iter()
    }

    pub fn partitions(&self) -> Vec<&Partition> {
        let mut partitions: Vec<&Partition> = self.rows.iter().map(|r| &r.partition).collect();
        partitions.sort();
        partitions.dedup();
        partitions
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.rows.iter().map(|r| r.date).collect();
        dates.sort();
        dates.dedup();
        dates
    }

    /// The balance history of a single partition, keyed by date.
    pub fn series(&self, partition: &Partition) -> BTreeMap<NaiveDate, f64> {
        self.rows
            .iter()
            .filter(|r| &r.partition == partition)
            .map(|r| (r.date, r.amount))
            .collect()
    }

    pub fn balance_on(&self, date: NaiveDate, partition: &Partition) -> Option<f64> {
        self.rows
            .iter()
            .find(|r| r.date == date && &r.partition == partition)
            .map(|r| r.amount)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BalanceConfig {
    #[serde(default = "default_partition_keys")]
    #[schemars(
        description = "Ordered list of transaction attributes balances are grouped by. Defaults to [account_name, category_name]."
    )]
    pub partition_keys: Vec<PartitionKey>,

    #[serde(default)]
    #[schemars(description = "Ignore transactions dated before this day (YYYY-MM-DD, inclusive)")]
    pub min_date: Option<NaiveDate>,

    #[serde(default)]
    #[schemars(description = "Ignore transactions dated after this day (YYYY-MM-DD, inclusive)")]
    pub max_date: Option<NaiveDate>,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            partition_keys: default_partition_keys(),
            min_date: None,
            max_date: None,
        }
    }
}

impl BalanceConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.partition_keys.is_empty() {
            return Err(BalanceError::NoPartitionKeys);
        }

        if let (Some(start), Some(end)) = (self.min_date, self.max_date) {
            if end < start {
                return Err(BalanceError::InvalidDateWindow { start, end });
            }
        }

        Ok(())
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.min_date.map_or(true, |min| date >= min) && self.max_date.map_or(true, |max| date <= max)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(BalanceConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
