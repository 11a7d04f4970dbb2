//! Budget period representation
//!
//! Supports monthly periods, fiscal years and custom date ranges. A fiscal
//! year is named after the calendar year it ends in, so with a first fiscal
//! month of April, `2024` runs from 2023-04-01 to 2024-03-31.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::structural::StructuralError;

/// Represents a budget period
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum BudgetPeriod {
    /// Monthly period (e.g., "2025-01")
    Monthly { year: i32, month: u32 },

    /// Fiscal year (e.g., "2025")
    Yearly { year: i32 },

    /// Custom date range, both ends inclusive
    Custom { start: NaiveDate, end: NaiveDate },
}

impl BudgetPeriod {
    /// Create a monthly period
    pub fn monthly(year: i32, month: u32) -> Result<Self, StructuralError> {
        if !(1..=12).contains(&month) {
            return Err(StructuralError::InvalidPeriod(format!("{}-{}", year, month)));
        }
        Ok(Self::Monthly { year, month })
    }

    /// Create a fiscal-year period
    pub fn yearly(year: i32) -> Self {
        Self::Yearly { year }
    }

    /// Create a custom period
    pub fn custom(start: NaiveDate, end: NaiveDate) -> Result<Self, StructuralError> {
        if end < start {
            return Err(StructuralError::InvalidPeriod(format!("{}..{}", start, end)));
        }
        Ok(Self::Custom { start, end })
    }

    /// The monthly period containing a date
    pub fn month_of(date: NaiveDate) -> Self {
        Self::Monthly {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parse "YYYY-MM", "YYYY" or "YYYY-MM-DD..YYYY-MM-DD"
    pub fn parse(s: &str) -> Result<Self, StructuralError> {
        let s = s.trim();
        let invalid = || StructuralError::InvalidPeriod(s.to_string());

        if let Some((start, end)) = s.split_once("..") {
            let start = NaiveDate::parse_from_str(start.trim(), "%Y-%m-%d").map_err(|_| invalid())?;
            let end = NaiveDate::parse_from_str(end.trim(), "%Y-%m-%d").map_err(|_| invalid())?;
            return Self::custom(start, end);
        }

        if let Some((year, month)) = s.split_once('-') {
            let year: i32 = year.parse().map_err(|_| invalid())?;
            let month: u32 = month.parse().map_err(|_| invalid())?;
            return Self::monthly(year, month);
        }

        let year_str = s.strip_prefix("FY").unwrap_or(s);
        if year_str.len() == 4 {
            if let Ok(year) = year_str.parse::<i32>() {
                return Ok(Self::Yearly { year });
            }
        }

        Err(invalid())
    }

    /// First and last day of the period (inclusive)
    pub fn date_range(&self, first_fiscal_month: u32) -> (NaiveDate, NaiveDate) {
        match self {
            Self::Monthly { year, month } => {
                let start = first_of_month(*year, *month);
                let next = if *month == 12 {
                    first_of_month(*year + 1, 1)
                } else {
                    first_of_month(*year, *month + 1)
                };
                (start, next - Duration::days(1))
            }
            Self::Yearly { year } => {
                let first = first_fiscal_month.clamp(1, 12);
                if first == 1 {
                    (first_of_month(*year, 1), first_of_month(*year + 1, 1) - Duration::days(1))
                } else {
                    (
                        first_of_month(*year - 1, first),
                        first_of_month(*year, first) - Duration::days(1),
                    )
                }
            }
            Self::Custom { start, end } => (*start, *end),
        }
    }

    /// Check if a date falls within this period
    pub fn contains(&self, date: NaiveDate, first_fiscal_month: u32) -> bool {
        let (start, end) = self.date_range(first_fiscal_month);
        date >= start && date <= end
    }

    /// Get the next period
    pub fn next(&self) -> Self {
        match self {
            Self::Monthly { year, month } => {
                if *month == 12 {
                    Self::Monthly {
                        year: *year + 1,
                        month: 1,
                    }
                } else {
                    Self::Monthly {
                        year: *year,
                        month: *month + 1,
                    }
                }
            }
            Self::Yearly { year } => Self::Yearly { year: *year + 1 },
            Self::Custom { start, end } => {
                let duration = *end - *start;
                Self::Custom {
                    start: *end + Duration::days(1),
                    end: *end + duration + Duration::days(1),
                }
            }
        }
    }

    /// Get the previous period
    pub fn prev(&self) -> Self {
        match self {
            Self::Monthly { year, month } => {
                if *month == 1 {
                    Self::Monthly {
                        year: *year - 1,
                        month: 12,
                    }
                } else {
                    Self::Monthly {
                        year: *year,
                        month: *month - 1,
                    }
                }
            }
            Self::Yearly { year } => Self::Yearly { year: *year - 1 },
            Self::Custom { start, end } => {
                let duration = *end - *start;
                Self::Custom {
                    start: *start - duration - Duration::days(1),
                    end: *start - Duration::days(1),
                }
            }
        }
    }
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

/// Fiscal year a date belongs to, named after the calendar year it ends in
pub fn fiscal_year(date: NaiveDate, first_fiscal_month: u32) -> i32 {
    if first_fiscal_month <= 1 || date.month() < first_fiscal_month {
        date.year()
    } else {
        date.year() + 1
    }
}

/// 1-based month number within the fiscal year
pub fn fiscal_month(date: NaiveDate, first_fiscal_month: u32) -> u32 {
    let first = first_fiscal_month.clamp(1, 12);
    if date.month() >= first {
        date.month() - first + 1
    } else {
        12 - first + 1 + date.month()
    }
}

impl fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Monthly { year, month } => format!("{:04}-{:02}", year, month),
            Self::Yearly { year } => format!("{:04}", year),
            Self::Custom { start, end } => format!("{}..{}", start, end),
        };
        f.pad(&text)
    }
}

impl std::str::FromStr for BudgetPeriod {
    type Err = StructuralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
