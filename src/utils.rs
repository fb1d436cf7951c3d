use crate::error::{BalanceError, Result};
use chrono::{Datelike, NaiveDate};

pub fn last_day_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .ok_or_else(|| {
            BalanceError::DateError(format!(
                "Cannot compute the last day of {:04}-{:02}",
                year, month
            ))
        })
}

/// Last calendar day of the month containing `date`.
pub fn month_end(date: NaiveDate) -> Result<NaiveDate> {
    last_day_of_month(date.year(), date.month())
}

pub fn is_month_end(date: NaiveDate) -> bool {
    date.succ_opt()
        .map_or(true, |next| next.month() != date.month())
}

/// Every calendar day from `start` to `end`, both inclusive. Empty when `end < start`.
pub fn days_in_period(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|day| *day <= end).collect()
}

pub fn parse_iso_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        BalanceError::DateError(format!(
            "Invalid date '{}'. Expected YYYY-MM-DD",
            value
        ))
    })
}
