//! Budget display formatting

use tabled::settings::object::Columns;
use tabled::settings::{Alignment, Modify, Style};
use tabled::{Table, Tabled};

use crate::services::{BudgetRow, BudgetTotal};

#[derive(Tabled)]
struct VarianceRow {
    #[tabled(rename = "Account")]
    account: String,
    #[tabled(rename = "Period")]
    period: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Actual")]
    actual: String,
    #[tabled(rename = "Variance")]
    variance: String,
    #[tabled(rename = "Currency")]
    currency: String,
}

/// Format a budget variance report, with one total line per period
pub fn format_budget_report(rows: &[BudgetRow], totals: &[BudgetTotal]) -> String {
    if rows.is_empty() {
        return "No budget entries.".to_string();
    }

    let lines = rows
        .iter()
        .map(|row| VarianceRow {
            account: row.account.clone(),
            period: row.period.to_string(),
            target: row.target.to_string(),
            actual: row.actual.to_string(),
            variance: row.variance.to_string(),
            currency: row.currency.to_string(),
        })
        .chain(totals.iter().map(|total| VarianceRow {
            account: "Total".to_string(),
            period: total.period.to_string(),
            target: total.target.to_string(),
            actual: total.actual.to_string(),
            variance: total.variance.to_string(),
            currency: total.currency.to_string(),
        }));

    Table::new(lines)
        .with(Style::sharp())
        .with(Modify::new(Columns::new(2..5)).with(Alignment::right()))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BudgetPeriod, Currency, Money};
    use chrono::NaiveDate;

    #[test]
    fn test_format_budget_report() {
        let period = BudgetPeriod::monthly(2024, 3).unwrap();
        let cad = Currency::new("CAD").unwrap();
        let rows = vec![BudgetRow {
            account: "Expense:Groceries".into(),
            period: period.clone(),
            start: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            currency: cad.clone(),
            target: Money::from_cents(40000),
            actual: Money::from_cents(42550),
            variance: Money::from_cents(2550),
        }];
        let totals = vec![BudgetTotal {
            period,
            currency: cad,
            target: Money::from_cents(40000),
            actual: Money::from_cents(42550),
            variance: Money::from_cents(2550),
        }];

        let output = format_budget_report(&rows, &totals);
        assert!(output.contains("Expense:Groceries"));
        assert!(output.contains("2024-03"));
        assert!(output.contains("425.50"));
        assert!(output.contains("Total"));
    }

    #[test]
    fn test_empty_report() {
        assert_eq!(format_budget_report(&[], &[]), "No budget entries.");
    }
}
