//! Order numbers, totals and line specs.

use core::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::Money;

/// Errors building or parsing an [`OrderNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderNumberError {
    #[error("order number prefix must be 1-8 uppercase ASCII letters or digits")]
    InvalidPrefix,
    #[error("malformed order number: {0}")]
    Malformed(String),
    #[error("daily order sequence exhausted")]
    SequenceOverflow,
}

/// Human-readable order number: `{prefix}-{YYYYMMDD}-{sequence}`.
///
/// The sequence restarts at 1 every calendar day and is zero-padded to four
/// digits (it keeps growing past 9999 without truncation).
///
/// ```
/// use chrono::NaiveDate;
/// use pasar_core::OrderNumber;
///
/// let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
/// let first = OrderNumber::next_after("ORD", date, None).unwrap();
/// assert_eq!(first.to_string(), "ORD-20261016-0001");
/// let second = OrderNumber::next_after("ORD", date, Some(&first)).unwrap();
/// assert_eq!(second.to_string(), "ORD-20261016-0002");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrderNumber {
    prefix: String,
    date: NaiveDate,
    sequence: u32,
}

impl OrderNumber {
    const MAX_PREFIX_LEN: usize = 8;
    const DATE_FORMAT: &'static str = "%Y%m%d";

    /// Build an order number.
    ///
    /// # Errors
    ///
    /// Returns `OrderNumberError::InvalidPrefix` for an empty, overlong or
    /// non-alphanumeric prefix, and `Malformed` for sequence 0.
    pub fn new(prefix: &str, date: NaiveDate, sequence: u32) -> Result<Self, OrderNumberError> {
        validate_prefix(prefix)?;
        if sequence == 0 {
            return Err(OrderNumberError::Malformed(format!(
                "{prefix}-{}-0",
                date.format(Self::DATE_FORMAT)
            )));
        }
        Ok(Self {
            prefix: prefix.to_owned(),
            date,
            sequence,
        })
    }

    /// The `{prefix}-{YYYYMMDD}-` stem shared by every order of that day.
    ///
    /// Stores use it to find the latest number issued for the day.
    #[must_use]
    pub fn day_stem(prefix: &str, date: NaiveDate) -> String {
        format!("{prefix}-{}-", date.format(Self::DATE_FORMAT))
    }

    /// The number following `latest` on `date`, or the day's first number.
    ///
    /// `latest` from another day (or with another prefix) is ignored.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPrefix` for a bad prefix and `SequenceOverflow` if the
    /// day's sequence cannot grow further.
    pub fn next_after(
        prefix: &str,
        date: NaiveDate,
        latest: Option<&Self>,
    ) -> Result<Self, OrderNumberError> {
        let sequence = match latest {
            Some(latest) if latest.prefix == prefix && latest.date == date => latest
                .sequence
                .checked_add(1)
                .ok_or(OrderNumberError::SequenceOverflow)?,
            _ => 1,
        };
        Self::new(prefix, date, sequence)
    }

    /// Parse an order number.
    ///
    /// # Errors
    ///
    /// Returns `OrderNumberError::Malformed` if `s` does not have the
    /// `{prefix}-{YYYYMMDD}-{sequence}` shape.
    pub fn parse(s: &str) -> Result<Self, OrderNumberError> {
        let malformed = || OrderNumberError::Malformed(s.to_owned());
        let mut parts = s.splitn(3, '-');
        let (Some(prefix), Some(date), Some(sequence)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };
        if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let date = NaiveDate::parse_from_str(date, Self::DATE_FORMAT).map_err(|_| malformed())?;
        if sequence.is_empty() || !sequence.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let sequence = sequence.parse::<u32>().map_err(|_| malformed())?;
        Self::new(prefix, date, sequence).map_err(|_| malformed())
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    #[must_use]
    pub const fn sequence(&self) -> u32 {
        self.sequence
    }
}

fn validate_prefix(prefix: &str) -> Result<(), OrderNumberError> {
    let valid = !prefix.is_empty()
        && prefix.len() <= OrderNumber::MAX_PREFIX_LEN
        && prefix
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(OrderNumberError::InvalidPrefix)
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:04}",
            Self::day_stem(&self.prefix, self.date),
            self.sequence
        )
    }
}

impl std::str::FromStr for OrderNumber {
    type Err = OrderNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Money summary of an order.
///
/// `total = subtotal - discount + shipping`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub shipping: Money,
    pub total: Money,
}

impl OrderTotals {
    /// Compute totals. The discount is clamped to the subtotal.
    #[must_use]
    pub fn new(subtotal: Money, discount: Money, shipping: Money) -> Self {
        let discount = discount.min(subtotal).max(Money::ZERO);
        Self {
            subtotal,
            discount,
            shipping,
            total: subtotal.saturating_sub(discount) + shipping,
        }
    }
}

/// Per-line options captured at checkout, stored as JSON on the order line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}
