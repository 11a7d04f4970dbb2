//! Deduplication matcher
//!
//! Decides, for each candidate transaction of an import batch, whether it is
//! already in the ledger (duplicate), probably in the ledger under a slightly
//! different date (review), or new.
//!
//! A dedup key is the transaction date plus a signature made of the sorted
//! absolute amounts per currency, the sorted normalized account set and the
//! normalized description. Exact matching compares keys; fuzzy matching
//! compares signatures within a date tolerance.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;

use crate::models::{Currency, Ledger, Transaction};

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥', '₹', '¢'];

/// Text normalization applied before keys are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Normalization {
    /// Replace punctuation with spaces in descriptions
    pub strip_punctuation: bool,
}

impl Default for Normalization {
    fn default() -> Self {
        Self {
            strip_punctuation: true,
        }
    }
}

impl Normalization {
    /// Trim, lowercase, drop currency symbols, optionally punctuation, collapse whitespace
    pub fn description(&self, description: Option<&str>) -> String {
        let lowered = description.unwrap_or("").trim().to_lowercase();
        let cleaned: String = lowered
            .chars()
            .filter(|c| !CURRENCY_SYMBOLS.contains(c))
            .map(|c| {
                if self.strip_punctuation && !c.is_alphanumeric() && !c.is_whitespace() {
                    ' '
                } else {
                    c
                }
            })
            .collect();
        cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    pub fn account(&self, identifier: &str) -> String {
        identifier.trim().to_lowercase()
    }
}

/// The date-independent part of a dedup key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Signature {
    amounts: BTreeMap<Currency, Vec<u64>>,
    accounts: BTreeSet<String>,
    description: String,
}

impl Signature {
    pub fn compute(transaction: &Transaction, normalization: &Normalization) -> Self {
        let mut amounts: BTreeMap<Currency, Vec<u64>> = BTreeMap::new();
        for posting in transaction.postings() {
            amounts
                .entry(posting.currency().clone())
                .or_default()
                .push(posting.amount().cents().unsigned_abs());
        }
        for values in amounts.values_mut() {
            values.sort_unstable();
        }

        Self {
            amounts,
            accounts: transaction
                .postings()
                .iter()
                .map(|p| normalization.account(p.account()))
                .collect(),
            description: normalization.description(transaction.description()),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Normalized identity of a transaction, used only for import matching
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DedupKey {
    date: NaiveDate,
    signature: Signature,
}

impl DedupKey {
    pub fn compute(transaction: &Transaction, normalization: &Normalization) -> Self {
        Self {
            date: transaction.date(),
            signature: Signature::compute(transaction, normalization),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Hex SHA-256 of the key, for display and the audit log
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.date.to_string().as_bytes());
        for (currency, amounts) in &self.signature.amounts {
            hasher.update(b"|");
            hasher.update(currency.as_str().as_bytes());
            for amount in amounts {
                hasher.update(b":");
                hasher.update(amount.to_string().as_bytes());
            }
        }
        for account in &self.signature.accounts {
            hasher.update(b"|");
            hasher.update(account.as_bytes());
        }
        hasher.update(b"|");
        hasher.update(self.signature.description.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOptions {
    /// Largest date gap, in days, still reported as a probable duplicate
    pub date_tolerance_days: u32,
    pub normalization: Normalization,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            date_tolerance_days: 3,
            normalization: Normalization::default(),
        }
    }
}

/// The ledger transaction a fuzzy candidate probably duplicates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingMatch {
    pub position: usize,
    pub transaction: Transaction,
    pub days_apart: i64,
}

/// Outcome for one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    New,
    /// Already recorded; `existing` is `None` for a repeat inside the batch
    Duplicate { existing: Option<usize> },
    Review(ExistingMatch),
}

/// Candidates split by classification, each list in input order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub new: Vec<Transaction>,
    pub duplicates: Vec<Transaction>,
    pub review: Vec<(Transaction, ExistingMatch)>,
}

#[derive(Debug, Clone, Default)]
pub struct Matcher {
    options: MatchOptions,
}

impl Matcher {
    pub fn new(options: MatchOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    pub fn key(&self, transaction: &Transaction) -> DedupKey {
        DedupKey::compute(transaction, &self.options.normalization)
    }

    /// Classify every candidate; the result is indexed like `candidates`
    pub fn classify(&self, ledger: &Ledger, candidates: &[Transaction]) -> Vec<Classification> {
        let mut exact: HashMap<DedupKey, Vec<usize>> = HashMap::new();
        let mut by_signature: HashMap<Signature, Vec<(NaiveDate, usize)>> = HashMap::new();
        for (position, txn) in ledger.transactions().iter().enumerate() {
            let key = self.key(txn);
            by_signature
                .entry(key.signature.clone())
                .or_default()
                .push((key.date, position));
            exact.entry(key).or_default().push(position);
        }

        let keys: Vec<DedupKey> = candidates.iter().map(|c| self.key(c)).collect();
        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by(|&a, &b| {
            keys[a]
                .cmp(&keys[b])
                .then_with(|| content_cmp(&candidates[a], &candidates[b]))
        });

        let mut result: Vec<Option<Classification>> = vec![None; candidates.len()];
        let mut consumed: HashSet<usize> = HashSet::new();
        let mut seen: HashSet<&DedupKey> = HashSet::new();
        let mut pending = Vec::new();

        for &index in &order {
            let key = &keys[index];
            let unconsumed = exact
                .get(key)
                .and_then(|positions| positions.iter().copied().find(|p| !consumed.contains(p)));

            if let Some(position) = unconsumed {
                debug!(row = index, position, "exact duplicate");
                consumed.insert(position);
                seen.insert(key);
                result[index] = Some(Classification::Duplicate {
                    existing: Some(position),
                });
            } else if !seen.insert(key) {
                debug!(row = index, "repeat within batch");
                result[index] = Some(Classification::Duplicate { existing: None });
            } else {
                pending.push(index);
            }
        }

        // Fuzzy matching only sees ledger transactions no exact match claimed
        let tolerance = i64::from(self.options.date_tolerance_days);
        for index in pending {
            let key = &keys[index];
            let best = by_signature
                .get(&key.signature)
                .into_iter()
                .flatten()
                .filter(|(_, position)| !consumed.contains(position))
                .map(|(date, position)| ((*date - key.date).num_days().abs(), *position))
                .filter(|(days, _)| *days <= tolerance)
                .min();

            result[index] = Some(match best {
                Some((days_apart, position)) => {
                    debug!(row = index, position, days_apart, "fuzzy match");
                    consumed.insert(position);
                    let transaction = ledger.transactions()[position].clone();
                    Classification::Review(ExistingMatch {
                        position,
                        transaction,
                        days_apart,
                    })
                }
                None => Classification::New,
            });
        }

        result
            .into_iter()
            .map(|c| c.unwrap_or(Classification::New))
            .collect()
    }

    /// Split candidates into new, duplicate and review lists
    pub fn partition(&self, ledger: &Ledger, candidates: Vec<Transaction>) -> Partition {
        let classes = self.classify(ledger, &candidates);
        let mut partition = Partition::default();
        for (candidate, class) in candidates.into_iter().zip(classes) {
            match class {
                Classification::New => partition.new.push(candidate),
                Classification::Duplicate { .. } => partition.duplicates.push(candidate),
                Classification::Review(existing) => partition.review.push((candidate, existing)),
            }
        }
        partition
    }
}

/// Total order on raw content, breaking ties between equal keys
fn content_cmp(a: &Transaction, b: &Transaction) -> Ordering {
    fn rank(t: &Transaction) -> (Option<&str>, Vec<(&str, i64, &str, Option<&str>)>) {
        (
            t.description(),
            t.postings()
                .iter()
                .map(|p| (p.account(), p.amount().cents(), p.currency().as_str(), p.memo()))
                .collect(),
        )
    }
    rank(a).cmp(&rank(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Account, AccountType, Money, Posting};

    fn cad() -> Currency {
        Currency::new("CAD").unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn grocery(d: NaiveDate, description: &str, cents: i64) -> Transaction {
        Transaction::new(
            d,
            Some(description.to_string()),
            vec![
                Posting::new("Assets:Checking", Money::from_cents(-cents), cad()).unwrap(),
                Posting::new("Expense:Groceries", Money::from_cents(cents), cad()).unwrap(),
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
            .with_transaction(grocery(date(2024, 1, 5), "Grocery Store", 5000))
    }

    #[test]
    fn test_signature_keeps_extreme_amounts_apart() {
        let stored = |cents: i64| {
            Transaction::from_stored(
                date(2024, 1, 5),
                Some("Wire".into()),
                vec![
                    Posting::from_stored("Assets:Checking", Money::from_cents(cents), cad(), None),
                    Posting::from_stored("Expense:Groceries", Money::from_cents(1), cad(), None),
                ],
            )
        };
        let n = Normalization::default();

        let min = Signature::compute(&stored(i64::MIN), &n);
        assert_eq!(min.amounts[&cad()], vec![1, 1u64 << 63]);

        let max = Signature::compute(&stored(i64::MAX), &n);
        assert_ne!(min, max);
        assert_eq!(max.amounts[&cad()], vec![1, i64::MAX as u64]);
    }

    #[test]
    fn test_description_normalization() {
        let n = Normalization::default();
        assert_eq!(n.description(Some("  GROCERY   Store $ ")), "grocery store");
        assert_eq!(n.description(Some("Tim Horton's #123")), "tim horton s 123");
        assert_eq!(n.description(None), "");

        let keep = Normalization {
            strip_punctuation: false,
        };
        assert_eq!(keep.description(Some("Tim Horton's")), "tim horton's");
    }

    #[test]
    fn test_key_ignores_case_and_posting_order() {
        let a = grocery(date(2024, 1, 5), "Grocery Store", 5000);
        let b = Transaction::new(
            date(2024, 1, 5),
            Some("grocery  store".into()),
            vec![
                Posting::new("expense:groceries", Money::from_cents(5000), cad()).unwrap(),
                Posting::new("assets:checking", Money::from_cents(-5000), cad()).unwrap(),
            ],
        )
        .unwrap();
        assert_eq!(a.dedup_key(), b.dedup_key());
        assert_eq!(a.dedup_key().fingerprint(), b.dedup_key().fingerprint());
        assert_eq!(a.dedup_key().fingerprint().len(), 64);
    }

    #[test]
    fn test_exact_duplicate() {
        let matcher = Matcher::default();
        let partition =
            matcher.partition(&ledger(), vec![grocery(date(2024, 1, 5), "Grocery Store", 5000)]);
        assert_eq!(partition.duplicates.len(), 1);
        assert!(partition.new.is_empty());
        assert!(partition.review.is_empty());
    }

    #[test]
    fn test_fuzzy_match_goes_to_review() {
        let matcher = Matcher::default();
        let partition =
            matcher.partition(&ledger(), vec![grocery(date(2024, 1, 7), "Grocery Store", 5000)]);
        assert_eq!(partition.review.len(), 1);
        assert_eq!(partition.review[0].1.position, 0);
        assert_eq!(partition.review[0].1.days_apart, 2);
    }

    #[test]
    fn test_outside_tolerance_is_new() {
        let matcher = Matcher::default();
        let partition =
            matcher.partition(&ledger(), vec![grocery(date(2024, 1, 9), "Grocery Store", 5000)]);
        assert_eq!(partition.new.len(), 1);

        let wide = Matcher::new(MatchOptions {
            date_tolerance_days: 5,
            ..MatchOptions::default()
        });
        let partition =
            wide.partition(&ledger(), vec![grocery(date(2024, 1, 9), "Grocery Store", 5000)]);
        assert_eq!(partition.review.len(), 1);
    }

    #[test]
    fn test_repeat_within_batch() {
        let matcher = Matcher::default();
        let batch = vec![
            grocery(date(2024, 2, 1), "Bakery", 700),
            grocery(date(2024, 2, 1), "Bakery", 700),
        ];
        let classes = matcher.classify(&ledger(), &batch);
        assert_eq!(classes[0], Classification::New);
        assert_eq!(classes[1], Classification::Duplicate { existing: None });
    }

    #[test]
    fn test_fuzzy_absorbs_once_and_waits_for_exact() {
        let matcher = Matcher::default();
        // exact copy claims the ledger entry, so the near copy is new
        let batch = vec![
            grocery(date(2024, 1, 6), "Grocery Store", 5000),
            grocery(date(2024, 1, 5), "Grocery Store", 5000),
        ];
        let classes = matcher.classify(&ledger(), &batch);
        assert_eq!(classes[0], Classification::New);
        assert_eq!(classes[1], Classification::Duplicate { existing: Some(0) });

        let batch = vec![
            grocery(date(2024, 1, 6), "Grocery Store", 5000),
            grocery(date(2024, 1, 7), "Grocery Store", 5000),
        ];
        let classes = matcher.classify(&ledger(), &batch);
        assert!(matches!(classes[0], Classification::Review(_)));
        assert_eq!(classes[1], Classification::New);
    }

    #[test]
    fn test_closest_date_wins() {
        let ledger = ledger().with_transaction(grocery(date(2024, 1, 8), "Grocery Store", 5000));
        let classes = Matcher::default().classify(
            &ledger,
            &[grocery(date(2024, 1, 7), "Grocery Store", 5000)],
        );
        match &classes[0] {
            Classification::Review(existing) => assert_eq!(existing.position, 1),
            other => panic!("expected review, got {:?}", other),
        }
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let matcher = Matcher::default();
        let a = grocery(date(2024, 1, 6), "Grocery Store", 5000);
        let b = grocery(date(2024, 1, 7), "Grocery Store", 5000);
        let forward = matcher.classify(&ledger(), &[a.clone(), b.clone()]);
        let backward = matcher.classify(&ledger(), &[b, a]);
        assert_eq!(forward[0], backward[1]);
        assert_eq!(forward[1], backward[0]);
    }
}
