use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BalanceError {
    #[error("No transactions provided: the date span of an empty ledger is undefined")]
    EmptyInput,

    #[error("At least one partition key is required")]
    NoPartitionKeys,

    #[error("Transaction #{index} has no value for partition key '{key}'")]
    Schema { key: String, index: usize },

    #[error("Transaction #{index} has an unusable amount: {details}")]
    DataQuality { index: usize, details: String },

    #[error("Invalid date window: start {start} is after end {end}")]
    InvalidDateWindow { start: NaiveDate, end: NaiveDate },

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BalanceError>;
