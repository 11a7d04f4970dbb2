//! Ledger display formatting
//!
//! Balances, account registers and validation reports.

use tabled::settings::object::Columns;
use tabled::settings::{Alignment, Modify, Style};
use tabled::{Table, Tabled};

use crate::models::{AccountType, Currency, Money, RegisterLine};
use crate::services::{ValidationReport, Violation};

/// Balance of one account, ready for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountBalance {
    pub identifier: String,
    pub account_type: AccountType,
    pub currency: Currency,
    pub balance: Money,
}

#[derive(Tabled)]
struct BalanceRow {
    #[tabled(rename = "Account")]
    account: String,
    #[tabled(rename = "Type")]
    account_type: String,
    #[tabled(rename = "Balance")]
    balance: String,
    #[tabled(rename = "Currency")]
    currency: String,
}

#[derive(Tabled)]
struct RegisterRow {
    #[tabled(rename = "#")]
    number: usize,
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Balance")]
    balance: String,
}

#[derive(Tabled)]
struct ViolationRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Where")]
    entity: String,
    #[tabled(rename = "Problem")]
    message: String,
}

/// Format account balances as a table
pub fn format_balances(balances: &[AccountBalance]) -> String {
    if balances.is_empty() {
        return "No accounts found.".to_string();
    }

    let rows = balances.iter().map(|b| BalanceRow {
        account: b.identifier.clone(),
        account_type: b.account_type.to_string(),
        balance: b.balance.to_string(),
        currency: b.currency.to_string(),
    });

    Table::new(rows)
        .with(Style::sharp())
        .with(Modify::new(Columns::single(2)).with(Alignment::right()))
        .to_string()
}

/// Format an account register; line numbers match `transactions.csv` ids
pub fn format_register(account: &str, lines: &[RegisterLine]) -> String {
    if lines.is_empty() {
        return format!("No transactions for {}.", account);
    }

    let rows = lines.iter().map(|line| RegisterRow {
        number: line.position + 1,
        date: line.date.format("%Y-%m-%d").to_string(),
        description: truncate(line.description.as_deref().unwrap_or(""), 40),
        amount: line.amount.to_string(),
        balance: line.balance.to_string(),
    });

    let table = Table::new(rows)
        .with(Style::sharp())
        .with(Modify::new(Columns::new(3..)).with(Alignment::right()))
        .to_string();

    format!("Register: {}\n{}", account, table)
}

pub fn format_violations(violations: &[Violation]) -> String {
    let rows = violations.iter().map(|v| ViolationRow {
        kind: v.kind.to_string(),
        entity: v.entity.to_string(),
        message: v.message.clone(),
    });

    Table::new(rows).with(Style::sharp()).to_string()
}

/// Format a validation report
pub fn format_validation_report(report: &ValidationReport) -> String {
    match report {
        ValidationReport::Valid => "Ledger is valid.".to_string(),
        ValidationReport::Invalid(violations) => format!(
            "Ledger has {} violation{}:\n{}",
            violations.len(),
            if violations.len() == 1 { "" } else { "s" },
            format_violations(violations)
        ),
    }
}

/// Cut a string to at most `max_len` characters, marking the cut
pub(crate) fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{EntityRef, ViolationKind};
    use chrono::NaiveDate;

    #[test]
    fn test_format_balances() {
        let output = format_balances(&[AccountBalance {
            identifier: "Assets:Checking".into(),
            account_type: AccountType::Asset,
            currency: Currency::new("CAD").unwrap(),
            balance: Money::from_cents(-5000),
        }]);

        assert!(output.contains("Assets:Checking"));
        assert!(output.contains("-50.00"));
        assert!(output.contains("CAD"));
    }

    #[test]
    fn test_empty_outputs() {
        assert_eq!(format_balances(&[]), "No accounts found.");
        assert_eq!(
            format_register("Assets:Checking", &[]),
            "No transactions for Assets:Checking."
        );
        assert_eq!(format_validation_report(&ValidationReport::Valid), "Ledger is valid.");
    }

    #[test]
    fn test_format_register_numbers_from_one() {
        let output = format_register(
            "Assets:Checking",
            &[RegisterLine {
                date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
                position: 0,
                description: Some("Grocery Store".into()),
                amount: Money::from_cents(-5000),
                balance: Money::from_cents(-5000),
            }],
        );

        assert!(output.starts_with("Register: Assets:Checking"));
        assert!(output.contains("2024-01-05"));
        assert!(output.contains("Grocery Store"));
        assert!(output.contains("│ 1 "));
    }

    #[test]
    fn test_format_violations() {
        let report = ValidationReport::Invalid(vec![Violation {
            kind: ViolationKind::Referential,
            entity: EntityRef::Posting { position: 2, index: 0 },
            message: "Unknown account 'Assets:Nowhere'".into(),
        }]);

        let output = format_validation_report(&report);
        assert!(output.starts_with("Ledger has 1 violation:"));
        assert!(output.contains("transaction #3 posting 1"));
        assert!(output.contains("Assets:Nowhere"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer description", 10), "a much ...");
    }
}
