//! Budgeting engine
//!
//! Compares actual postings against budget targets, one row per
//! (account, period). Works on a validated ledger and never changes it.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};

use super::validator::ValidatedLedger;
use crate::error::{BookError, BookResult};
use crate::models::{BudgetEntry, BudgetPeriod, Currency, Money, StructuralError};

/// Target vs actual for one account over one period
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetRow {
    pub account: String,
    pub period: BudgetPeriod,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub currency: Currency,
    pub target: Money,
    /// Raw signed sum of the account's postings inside the period
    pub actual: Money,
    /// `actual - target`
    pub variance: Money,
}

/// Sums of all rows sharing a period and currency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetTotal {
    pub period: BudgetPeriod,
    pub currency: Currency,
    pub target: Money,
    pub actual: Money,
    pub variance: Money,
}

/// Engine producing budget variance reports
#[derive(Debug, Clone, Copy)]
pub struct BudgetEngine {
    first_fiscal_month: u32,
}

impl Default for BudgetEngine {
    fn default() -> Self {
        Self {
            first_fiscal_month: 1,
        }
    }
}

impl BudgetEngine {
    /// Create an engine; yearly periods start in `first_fiscal_month`
    pub fn new(first_fiscal_month: u32) -> Self {
        Self {
            first_fiscal_month: first_fiscal_month.clamp(1, 12),
        }
    }

    /// One row per entry, sorted by account then period start
    pub fn report(
        &self,
        ledger: &ValidatedLedger<'_>,
        entries: &[BudgetEntry],
    ) -> BookResult<Vec<BudgetRow>> {
        let mut seen: HashSet<(&str, &BudgetPeriod)> = HashSet::new();
        let mut rows = Vec::with_capacity(entries.len());

        for entry in entries {
            if !seen.insert((entry.account.as_str(), &entry.period)) {
                return Err(BookError::Duplicate {
                    entity_type: "Budget entry",
                    identifier: format!("{} {}", entry.account, entry.period),
                });
            }

            let currency = ledger.effective_currency(&entry.account)?.clone();
            let (start, end) = entry.period.date_range(self.first_fiscal_month);
            let actual =
                ledger.sum_postings(&entry.account, &currency, |date| date >= start && date <= end)?;
            let variance = actual
                .checked_sub(entry.target)
                .ok_or_else(|| StructuralError::Overflow(currency.clone()))?;

            rows.push(BudgetRow {
                account: entry.account.clone(),
                period: entry.period.clone(),
                start,
                end,
                currency,
                target: entry.target,
                actual,
                variance,
            });
        }

        rows.sort_by(|a, b| {
            a.account
                .cmp(&b.account)
                .then(a.start.cmp(&b.start))
                .then(a.end.cmp(&b.end))
        });
        Ok(rows)
    }

    /// Per-period totals, ordered by period start
    pub fn totals(&self, rows: &[BudgetRow]) -> BookResult<Vec<BudgetTotal>> {
        let mut grouped: BTreeMap<(NaiveDate, NaiveDate, Currency), BudgetTotal> = BTreeMap::new();
        for row in rows {
            let total = grouped
                .entry((row.start, row.end, row.currency.clone()))
                .or_insert_with(|| BudgetTotal {
                    period: row.period.clone(),
                    currency: row.currency.clone(),
                    target: Money::zero(),
                    actual: Money::zero(),
                    variance: Money::zero(),
                });
            let overflow = || StructuralError::Overflow(row.currency.clone());
            total.target = total.target.checked_add(row.target).ok_or_else(overflow)?;
            total.actual = total.actual.checked_add(row.actual).ok_or_else(overflow)?;
            total.variance = total.variance.checked_add(row.variance).ok_or_else(overflow)?;
        }
        Ok(grouped.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Account, AccountType, Ledger, Posting, Transaction};
    use crate::services::validator::Validator;

    fn cad() -> Currency {
        Currency::new("CAD").unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn spend(d: NaiveDate, description: &str, to: &str, cents: i64) -> Transaction {
        Transaction::new(
            d,
            Some(description.to_string()),
            vec![
                Posting::new("Assets:Checking", Money::from_cents(-cents), cad()).unwrap(),
                Posting::new(to, Money::from_cents(cents), cad()).unwrap(),
            ],
        )
        .unwrap()
    }

    fn ledger() -> Ledger {
        Ledger::new(cad())
            .with_account(Account::new("Assets:Checking", AccountType::Asset).unwrap())
            .unwrap()
            .with_account(Account::new("Expense:Groceries", AccountType::Expense).unwrap())
            .unwrap()
            .with_account(Account::new("Expense:Rent", AccountType::Expense).unwrap())
            .unwrap()
            .with_transaction(spend(date(2024, 1, 5), "Grocery Store", "Expense:Groceries", 5000))
            .with_transaction(spend(date(2024, 1, 20), "Market", "Expense:Groceries", 7550))
            .with_transaction(spend(date(2024, 2, 2), "Grocery Store", "Expense:Groceries", 3000))
            .with_transaction(spend(date(2024, 1, 1), "Rent", "Expense:Rent", 120000))
    }

    fn entry(account: &str, period: &str, cents: i64) -> BudgetEntry {
        BudgetEntry::new(
            account,
            BudgetPeriod::parse(period).unwrap(),
            Money::from_cents(cents),
        )
        .unwrap()
    }

    #[test]
    fn test_variance() {
        let ledger = ledger();
        let validated = Validator::default().certify(&ledger).unwrap();
        let rows = BudgetEngine::default()
            .report(
                &validated,
                &[
                    entry("Expense:Rent", "2024-01", 120000),
                    entry("Expense:Groceries", "2024-02", 40000),
                    entry("Expense:Groceries", "2024-01", 40000),
                ],
            )
            .unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].account, "Expense:Groceries");
        assert_eq!(rows[0].period, BudgetPeriod::Monthly { year: 2024, month: 1 });
        assert_eq!(rows[0].actual, Money::from_cents(12550));
        assert_eq!(rows[0].variance, Money::from_cents(-27450));
        assert_eq!(rows[1].actual, Money::from_cents(3000));
        assert_eq!(rows[2].account, "Expense:Rent");
        assert_eq!(rows[2].variance, Money::zero());
    }

    #[test]
    fn test_fiscal_year_and_custom_periods() {
        let ledger = ledger();
        let validated = Validator::default().certify(&ledger).unwrap();
        let rows = BudgetEngine::new(2)
            .report(
                &validated,
                &[
                    entry("Expense:Groceries", "2024", 0),
                    entry("Expense:Groceries", "2024-01-15..2024-02-15", 0),
                ],
            )
            .unwrap();
        // fiscal 2024 runs 2023-02-01..2024-01-31
        assert_eq!(rows[0].actual, Money::from_cents(12550));
        assert_eq!(rows[1].actual, Money::from_cents(10550));
    }

    #[test]
    fn test_unknown_account_and_duplicates() {
        let ledger = ledger();
        let validated = Validator::default().certify(&ledger).unwrap();
        let engine = BudgetEngine::default();

        let err = engine
            .report(&validated, &[entry("Expense:Travel", "2024-01", 100)])
            .unwrap_err();
        assert!(err.is_not_found());

        let err = engine
            .report(
                &validated,
                &[
                    entry("Expense:Rent", "2024-01", 100),
                    entry("Expense:Rent", "2024-01", 200),
                ],
            )
            .unwrap_err();
        assert!(matches!(err, BookError::Duplicate { .. }));
    }

    #[test]
    fn test_totals() {
        let ledger = ledger();
        let validated = Validator::default().certify(&ledger).unwrap();
        let engine = BudgetEngine::default();
        let rows = engine
            .report(
                &validated,
                &[
                    entry("Expense:Rent", "2024-01", 120000),
                    entry("Expense:Groceries", "2024-01", 40000),
                ],
            )
            .unwrap();
        let totals = engine.totals(&rows).unwrap();
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].target, Money::from_cents(160000));
        assert_eq!(totals[0].actual, Money::from_cents(132550));
    }

    #[test]
    fn test_variance_overflow_is_an_error() {
        let big = i64::MAX / 2 + 10;
        let ledger = Ledger::new(cad())
            .with_account(Account::new("Assets:Checking", AccountType::Asset).unwrap())
            .unwrap()
            .with_account(Account::new("Expense:Yacht", AccountType::Expense).unwrap())
            .unwrap()
            .with_transaction(spend(date(2024, 1, 5), "Yacht", "Expense:Yacht", big));
        let validated = Validator::default().certify(&ledger).unwrap();

        let err = BudgetEngine::default()
            .report(&validated, &[entry("Expense:Yacht", "2024-01", -big)])
            .unwrap_err();
        assert!(matches!(err, BookError::Structural(StructuralError::Overflow(_))));
    }

    #[test]
    fn test_totals_overflow_is_an_error() {
        let row = |account: &str, cents: i64| BudgetRow {
            account: account.to_string(),
            period: BudgetPeriod::Monthly { year: 2024, month: 1 },
            start: date(2024, 1, 1),
            end: date(2024, 1, 31),
            currency: cad(),
            target: Money::from_cents(cents),
            actual: Money::zero(),
            variance: Money::zero(),
        };
        let rows = vec![row("Expense:A", i64::MAX - 1), row("Expense:B", 5)];

        let err = BudgetEngine::default().totals(&rows).unwrap_err();
        assert!(matches!(err, BookError::Structural(StructuralError::Overflow(_))));
    }
}
