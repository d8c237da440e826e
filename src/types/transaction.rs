//! Transaction-related types for the statement engine
//!
//! A [`Transaction`] is the normalized record every statement parser produces.
//! Once created it is treated as immutable: categorization yields a new value
//! through [`Transaction::with_category`] instead of mutating in place.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized statement transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Booking date
    pub date: NaiveDate,

    /// Value date; parsers fill it with the booking date when the source has none
    pub value_date: NaiveDate,

    /// Signed amount with exact decimal precision
    pub amount: Decimal,

    /// ISO currency code as found in the source
    pub currency: String,

    /// Counterparty name (creditor or debtor)
    pub party_name: String,

    /// True when the account holder pays the party (debit booking)
    pub is_debtor: bool,

    /// Free-text booking description
    pub description: String,

    /// Assigned category, empty until categorized
    pub category: String,

    /// Optional sub-category, empty when unknown
    pub sub_category: String,
}

impl Transaction {
    /// Create an uncategorized transaction
    pub fn new(
        date: NaiveDate,
        amount: Decimal,
        currency: impl Into<String>,
        party_name: impl Into<String>,
        is_debtor: bool,
        description: impl Into<String>,
    ) -> Self {
        Self {
            date,
            value_date: date,
            amount,
            currency: currency.into(),
            party_name: party_name.into(),
            is_debtor,
            description: description.into(),
            category: String::new(),
            sub_category: String::new(),
        }
    }

    /// Builder-style value date override
    pub fn with_value_date(mut self, value_date: NaiveDate) -> Self {
        self.value_date = value_date;
        self
    }

    /// Return a copy carrying the given category
    pub fn with_category(&self, category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            ..self.clone()
        }
    }

    /// Key used to flag probable duplicates across statement files
    pub fn duplicate_key(&self) -> DuplicateKey {
        DuplicateKey {
            date: self.date,
            amount: self.amount.normalize(),
            party_name: self.party_name.trim().to_lowercase(),
            currency: self.currency.trim().to_uppercase(),
        }
    }
}

/// (date, amount, party, currency) tuple used for duplicate detection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DuplicateKey {
    pub date: NaiveDate,
    pub amount: Decimal,
    pub party_name: String,
    pub currency: String,
}

impl fmt::Display for DuplicateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} '{}'",
            self.date, self.amount, self.currency, self.party_name
        )
    }
}

/// Inclusive date span covered by one or more statements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a range, swapping the bounds if they are reversed
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Union span of two ranges
    pub fn merge(self, other: DateRange) -> DateRange {
        DateRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Merge with an optional range
    pub fn merge_opt(current: Option<DateRange>, other: DateRange) -> DateRange {
        match current {
            Some(range) => range.merge(other),
            None => other,
        }
    }

    /// Min/max span of transaction booking dates, `None` for an empty slice
    pub fn from_transactions(transactions: &[Transaction]) -> Option<DateRange> {
        let start = transactions.iter().map(|t| t.date).min()?;
        let end = transactions.iter().map(|t| t.date).max()?;
        Some(DateRange { start, end })
    }

    /// A range is zero-valued when either bound is the epoch placeholder
    /// some statement exports emit for unknown periods.
    pub fn is_zero(&self) -> bool {
        let zero = NaiveDate::default();
        self.start == zero || self.end == zero
    }
}
