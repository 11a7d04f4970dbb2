use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::path::Path;
use std::process::Command;

fn balancebook_cmd(home: &tempfile::TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("balancebook"));
    cmd.env("BALANCEBOOK_DIR", home.path());
    cmd.env_remove("RUST_LOG");
    cmd
}

fn run_ok(home: &tempfile::TempDir, args: &[&str]) -> String {
    let out = balancebook_cmd(home)
        .args(args)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    String::from_utf8(out).expect("utf8 stdout")
}

fn write(path: &Path, contents: &str) {
    std::fs::write(path, contents).expect("write fixture");
}

/// A book with checking, groceries and one grocery purchase
fn seeded_book() -> tempfile::TempDir {
    let home = tempfile::tempdir().expect("tempdir");
    run_ok(&home, &["init"]);
    write(
        &home.path().join("accounts.csv"),
        "identifier,type,currency,opening_balance,open_date,close_date,description\n\
         Assets:Checking,asset,,1000.00,,,\n\
         Expense:Groceries,expense,,,,,\n\
         Expense:Uncategorized,expense,,,,,\n",
    );
    write(
        &home.path().join("transactions.csv"),
        "id,date,description,account,amount,currency,memo\n\
         1,2024-01-05,Grocery Store,Assets:Checking,-50.00,,\n\
         1,2024-01-05,,Expense:Groceries,50.00,,\n",
    );
    home
}

#[test]
fn init_creates_book_files() {
    let home = tempfile::tempdir().expect("tempdir");

    balancebook_cmd(&home)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized balancebook"));

    assert!(home.path().join("balancebook.yaml").exists());
    assert!(home.path().join("transactions.csv").exists());

    balancebook_cmd(&home)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already initialized"));
}

#[test]
fn verify_and_balance() {
    let home = seeded_book();

    balancebook_cmd(&home)
        .arg("verify")
        .assert()
        .success()
        .stdout(predicate::str::contains("Ledger is valid."));

    let out = run_ok(&home, &["balance"]);
    assert!(out.contains("Assets:Checking"));
    assert!(out.contains("950.00"));

    let out = run_ok(&home, &["register", "Assets:Checking"]);
    assert!(out.contains("Grocery Store"));
}

#[test]
fn verify_fails_on_unknown_account() {
    let home = seeded_book();
    write(
        &home.path().join("transactions.csv"),
        "id,date,description,account,amount,currency,memo\n\
         1,2024-01-05,Mystery,Assets:Checking,-5.00,,\n\
         1,2024-01-05,,Expense:Nowhere,5.00,,\n",
    );

    balancebook_cmd(&home)
        .arg("verify")
        .assert()
        .failure()
        .stdout(predicate::str::contains("referential"));
}

#[test]
fn import_skips_duplicates_and_review_resolves() {
    let home = seeded_book();
    let export = home.path().join("export.csv");
    write(
        &export,
        "Date,Amount,Description\n\
         2024-01-05,-50.00,Grocery Store\n\
         2024-01-20,-8.00,Cinema\n",
    );

    let out = run_ok(
        &home,
        &["import", export.to_str().unwrap(), "--account", "Assets:Checking", "--counter", "Expense:Groceries"],
    );
    assert!(out.contains("Duplicates:    1"));
    assert!(out.contains("committed"));

    let transactions = std::fs::read_to_string(home.path().join("transactions.csv")).unwrap();
    assert!(transactions.contains("Cinema"));
    assert_eq!(transactions.matches("Grocery Store").count(), 1);

    // Two days later with the same amount: a probable duplicate
    write(&export, "Date,Amount,Description\n2024-01-07,-50.00,Grocery Store\n");
    let out = run_ok(
        &home,
        &["import", export.to_str().unwrap(), "--account", "Assets:Checking", "--counter", "Expense:Groceries"],
    );
    assert!(out.contains("R1"));
    assert!(home.path().join("pending_import.json").exists());

    balancebook_cmd(&home)
        .args(["import", export.to_str().unwrap(), "--account", "Assets:Checking"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("waiting for review"));

    let out = run_ok(&home, &["review", "resolve", "--reject", "R1"]);
    assert!(out.contains("1 rejected"));
    assert!(!home.path().join("pending_import.json").exists());

    let log = run_ok(&home, &["log"]);
    assert!(log.contains("IMPORT"));
}

#[test]
fn import_to_unknown_account_rolls_back() {
    let home = seeded_book();
    let before = std::fs::read_to_string(home.path().join("transactions.csv")).unwrap();
    let export = home.path().join("export.csv");
    write(&export, "Date,Amount,Description\n2024-02-01,-20.00,Bookshop\n");

    balancebook_cmd(&home)
        .args([
            "import",
            export.to_str().unwrap(),
            "--account",
            "Assets:Checking",
            "--counter",
            "Expense:Books",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("left unchanged"));

    let after = std::fs::read_to_string(home.path().join("transactions.csv")).unwrap();
    assert_eq!(before, after);

    let out = run_ok(
        &home,
        &[
            "import",
            export.to_str().unwrap(),
            "--account",
            "Assets:Checking",
            "--counter",
            "Expense:Books",
            "--create-accounts",
        ],
    );
    assert!(out.contains("New accounts:  Expense:Books"));
    let accounts = std::fs::read_to_string(home.path().join("accounts.csv")).unwrap();
    assert!(accounts.contains("Expense:Books"));
}

#[test]
fn budget_and_reverse() {
    let home = seeded_book();

    run_ok(&home, &["budget", "set", "Expense:Groceries", "2024-01", "40.00"]);
    let out = run_ok(&home, &["budget", "report", "--period", "2024-01"]);
    assert!(out.contains("Expense:Groceries"));
    assert!(out.contains("10.00"));

    let out = run_ok(&home, &["reverse", "1", "--date", "2024-01-31"]);
    assert!(out.contains("Reversed transaction #1 as #2"));

    balancebook_cmd(&home).arg("verify").assert().success();

    balancebook_cmd(&home)
        .args(["reverse", "9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn config_shows_settings() {
    let home = tempfile::tempdir().expect("tempdir");
    let out = run_ok(&home, &["config"]);
    assert!(out.contains("default_currency: CAD"));
    assert!(out.contains("date_tolerance_days: 3"));
}

#[test]
fn semicolon_import_then_reclassify_and_export() {
    let home = seeded_book();
    let export = home.path().join("export.csv");
    write(&export, "Date;Amount;Description\n2024-01-20;-8.00;Cinema Paradiso\n");

    let out = run_ok(&home, &["import", export.to_str().unwrap(), "--account", "Assets:Checking"]);
    assert!(out.contains("committed"));
    let transactions = std::fs::read_to_string(home.path().join("transactions.csv")).unwrap();
    assert!(transactions.contains("Expense:Uncategorized"));

    write(
        &home.path().join("balancebook.yaml"),
        "import:\n  rules:\n    - pattern: cinema\n      account: Expense:Groceries\n",
    );
    let out = run_ok(&home, &["reclassify"]);
    assert!(out.contains("Reclassified 1 transaction(s): #2"));
    let transactions = std::fs::read_to_string(home.path().join("transactions.csv")).unwrap();
    assert!(!transactions.contains("Expense:Uncategorized"));
    assert!(transactions.starts_with("id,date,description,account,amount,currency,memo,statement_date,statement_description"));

    let out = run_ok(&home, &["reclassify"]);
    assert!(out.contains("Nothing to reclassify"));

    let log = run_ok(&home, &["log", "--operation", "reclassify"]);
    assert!(log.contains("RECLASSIFY"));
    assert!(!log.contains("IMPORT"));

    balancebook_cmd(&home)
        .arg("verify")
        .assert()
        .success()
        .stdout(predicate::str::contains("changed since").not());

    let target = home.path().join("spreadsheet.csv");
    let out = run_ok(&home, &["export", "--output", target.to_str().unwrap()]);
    assert!(out.contains("Exported 4 postings"));
    let sheet = std::fs::read_to_string(&target).unwrap();
    assert!(sheet.lines().next().unwrap().ends_with("account_type,fiscal_year,fiscal_month,other_accounts"));
    assert!(sheet.contains("Cinema Paradiso,Assets:Checking,-8.00,CAD,,2024-01-20,Cinema Paradiso,Asset,2024,1,Expense:Groceries"));

    let out = run_ok(&home, &["export"]);
    assert!(out.starts_with("id,date,description"));
}

#[test]
fn verify_notes_edits_outside_the_tool() {
    let home = seeded_book();
    run_ok(&home, &["reverse", "1", "--date", "2024-01-31"]);
    balancebook_cmd(&home)
        .arg("verify")
        .assert()
        .success()
        .stdout(predicate::str::contains("changed since").not());

    let mut transactions = std::fs::read_to_string(home.path().join("transactions.csv")).unwrap();
    transactions.push_str("3,2024-02-02,Coffee,Assets:Checking,-3.00,,\n3,2024-02-02,,Expense:Groceries,3.00,,\n");
    write(&home.path().join("transactions.csv"), &transactions);

    balancebook_cmd(&home)
        .arg("verify")
        .assert()
        .success()
        .stdout(predicate::str::contains("changed since the last recorded operation"));
}
