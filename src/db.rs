use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, warn};

use crate::error::{Result, TallyError};
use crate::matcher::RuleSet;
use crate::models::{
    AmountCondition, AmountMatch, Category, CheckPattern, Classification, ClassificationStatus,
    DayWindow, Direction, MerchantMatcher, PatternRule, Transaction, VendorRule,
};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
    description TEXT NOT NULL DEFAULT '',
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS pattern_rules (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    merchant_pattern TEXT NOT NULL,
    is_regex INTEGER DEFAULT 0,
    amount_condition TEXT DEFAULT 'none',
    amount_value REAL,
    amount_max REAL,
    direction TEXT,
    category TEXT NOT NULL,
    confidence INTEGER DEFAULT 90,
    priority INTEGER DEFAULT 0,
    use_count INTEGER DEFAULT 0,
    is_active INTEGER DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS check_patterns (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    amount_kind TEXT NOT NULL,
    amount_value REAL,
    amount_max REAL,
    amount_set TEXT,
    day_first INTEGER,
    day_last INTEGER,
    is_active INTEGER DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS vendor_rules (
    id INTEGER PRIMARY KEY,
    merchant TEXT NOT NULL UNIQUE COLLATE NOCASE,
    category TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    account TEXT NOT NULL,
    date TEXT NOT NULL,
    description TEXT NOT NULL,
    merchant TEXT NOT NULL,
    amount REAL NOT NULL,
    direction TEXT NOT NULL DEFAULT 'unknown',
    type_code TEXT NOT NULL DEFAULT '',
    check_number TEXT,
    content_hash TEXT NOT NULL UNIQUE,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS classifications (
    transaction_id INTEGER PRIMARY KEY,
    category TEXT NOT NULL,
    status TEXT NOT NULL,
    confidence REAL NOT NULL,
    direction TEXT NOT NULL,
    classified_at TEXT NOT NULL,
    FOREIGN KEY (transaction_id) REFERENCES transactions(id)
);
";

// (name, description)
const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("Salary", "Paychecks and wages"),
    ("Other Income", "Refunds, interest, anything else coming in"),
    ("Groceries", "Supermarkets and food stores"),
    ("Food & Dining", "Restaurants, cafes, takeout"),
    ("Shopping", "General retail and online purchases"),
    ("Gas & Fuel", "Fuel stations"),
    ("Auto & Transport", "Parking, tolls, rideshare, transit"),
    ("Rent & Mortgage", "Housing payments"),
    ("Home Services", "Cleaning, repairs, lawn care"),
    ("Utilities", "Power, water, internet, phone"),
    ("Insurance", "Home, auto, health, life"),
    ("Healthcare", "Doctors, pharmacy, dental"),
    ("Entertainment", "Streaming, events, hobbies"),
    ("Subscriptions", "Recurring software and memberships"),
    ("Travel", "Flights, hotels, vacation"),
    ("Education", "Tuition, lessons, books"),
    ("Gifts & Donations", "Presents and charity"),
    ("Fees & Charges", "Bank fees and interest charges"),
    ("Transfer", "Moves between your own accounts"),
];

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let count: i64 = conn.query_row("SELECT count(*) FROM categories", [], |row| row.get(0))?;
    if count == 0 {
        for (name, description) in DEFAULT_CATEGORIES {
            conn.execute(
                "INSERT INTO categories (name, description) VALUES (?1, ?2)",
                params![name, description],
            )?;
        }
    }
    Ok(())
}

/// Rule sources and category catalogue, as seen by the classification engine.
pub trait RuleStore {
    fn load_rules(&self) -> Result<RuleSet>;
    fn categories(&self) -> Result<Vec<Category>>;
    fn increment_use_count(&self, rule_id: i64) -> Result<()>;
    fn add_vendor_rule(&self, rule: &VendorRule) -> Result<()>;
    fn create_category(&self, name: &str, description: &str) -> Result<()>;
}

pub struct Store {
    conn: Connection,
}

/// Input for `Store::add_pattern_rule`.
pub struct NewPatternRule<'a> {
    pub name: &'a str,
    pub matcher: MerchantMatcher,
    pub amount: AmountCondition,
    pub direction: Option<Direction>,
    pub category: &'a str,
    pub confidence_percent: u8,
    pub priority: i32,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct StatusCounts {
    pub pending: i64,
    pub classified_by_ai: i64,
    pub user_modified: i64,
    pub unclassified: i64,
}

impl Store {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = get_connection(db_path)?;
        init_db(&conn)?;
        Ok(Self { conn })
    }

    /// Returns `false` when a transaction with the same content hash exists.
    pub fn insert_transaction(&self, txn: &Transaction) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO transactions \
             (account, date, description, merchant, amount, direction, type_code, check_number, content_hash) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                txn.account,
                txn.date.format("%Y-%m-%d").to_string(),
                txn.description,
                txn.merchant,
                txn.amount,
                txn.direction.as_str(),
                txn.type_code,
                txn.check_number,
                txn.content_hash,
            ],
        )?;
        Ok(inserted == 1)
    }

    /// Transactions with no classification yet, or previously skipped.
    pub fn pending_transactions(&self) -> Result<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.date, t.description, t.merchant, t.amount, t.direction, t.account, \
                    t.type_code, t.check_number, t.content_hash \
             FROM transactions t LEFT JOIN classifications c ON c.transaction_id = t.id \
             WHERE c.transaction_id IS NULL OR c.status = 'unclassified' \
             ORDER BY t.date, t.id",
        )?;
        let rows = stmt
            .query_map([], transaction_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn save_classification(&self, c: &Classification) -> Result<()> {
        self.conn.execute(
            "INSERT INTO classifications (transaction_id, category, status, confidence, direction, classified_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(transaction_id) DO UPDATE SET category = ?2, status = ?3, confidence = ?4, \
             direction = ?5, classified_at = ?6",
            params![
                c.transaction.id,
                c.category,
                c.status.as_str(),
                c.confidence,
                c.transaction.direction.as_str(),
                c.classified_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;
        self.conn.execute(
            "UPDATE transactions SET direction = ?1 WHERE id = ?2",
            params![c.transaction.direction.as_str(), c.transaction.id],
        )?;
        debug!(id = c.transaction.id, status = c.status.as_str(), "classification saved");
        Ok(())
    }

    /// (merchant, category) pairs of past classifications, oldest first.
    pub fn classification_history(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.merchant, c.category FROM classifications c \
             JOIN transactions t ON t.id = c.transaction_id \
             WHERE c.status != 'unclassified' ORDER BY c.classified_at, t.date, t.id",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn status_counts(&self) -> Result<StatusCounts> {
        let mut counts = StatusCounts {
            pending: self.conn.query_row(
                "SELECT count(*) FROM transactions t LEFT JOIN classifications c ON c.transaction_id = t.id \
                 WHERE c.transaction_id IS NULL",
                [],
                |r| r.get(0),
            )?,
            ..Default::default()
        };
        let mut stmt = self
            .conn
            .prepare("SELECT status, count(*) FROM classifications GROUP BY status")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for (status, n) in rows {
            match ClassificationStatus::parse(&status) {
                Some(ClassificationStatus::ClassifiedByAI) => counts.classified_by_ai = n,
                Some(ClassificationStatus::UserModified) => counts.user_modified = n,
                Some(ClassificationStatus::Unclassified) => counts.unclassified = n,
                None => warn!(status, "unknown classification status in database"),
            }
        }
        Ok(counts)
    }

    pub fn add_pattern_rule(&self, rule: &NewPatternRule) -> Result<i64> {
        let (pattern, is_regex) = match &rule.matcher {
            MerchantMatcher::Literal(s) => (s.as_str(), false),
            MerchantMatcher::Regex(s) => (s.as_str(), true),
        };
        let (kind, value, max) = match rule.amount {
            AmountCondition::None => ("none", None, None),
            AmountCondition::LessThan(v) => ("lt", Some(v), None),
            AmountCondition::GreaterThan(v) => ("gt", Some(v), None),
            AmountCondition::Equal(v) => ("eq", Some(v), None),
            AmountCondition::Range { min, max } => ("range", Some(min), Some(max)),
        };
        self.conn.execute(
            "INSERT INTO pattern_rules (name, merchant_pattern, is_regex, amount_condition, amount_value, \
             amount_max, direction, category, confidence, priority) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                rule.name,
                pattern,
                is_regex,
                kind,
                value,
                max,
                rule.direction.map(|d| d.as_str()),
                rule.category,
                rule.confidence_percent,
                rule.priority,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn add_check_pattern(
        &self,
        name: &str,
        category: &str,
        amount: &AmountMatch,
        days: Option<DayWindow>,
    ) -> Result<i64> {
        let (kind, value, max, set) = match amount {
            AmountMatch::Exact(v) => ("exact", Some(*v), None, None),
            AmountMatch::Range { min, max } => ("range", Some(*min), Some(*max), None),
            AmountMatch::AnyOf(values) => ("set", None, None, Some(serde_json::to_string(values)?)),
        };
        self.conn.execute(
            "INSERT INTO check_patterns (name, category, amount_kind, amount_value, amount_max, amount_set, \
             day_first, day_last) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                name,
                category,
                kind,
                value,
                max,
                set,
                days.map(|d| d.first),
                days.map(|d| d.last),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn vendor_rules(&self) -> Result<Vec<VendorRule>> {
        let mut stmt = self
            .conn
            .prepare("SELECT merchant, category FROM vendor_rules ORDER BY merchant")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(VendorRule {
                    merchant: row.get(0)?,
                    category: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn category_exists(&self, name: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT id FROM categories WHERE name = ?1", [name], |r| r.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    fn pattern_rules(&self) -> Result<Vec<PatternRule>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, merchant_pattern, is_regex, amount_condition, amount_value, amount_max, \
                    direction, category, confidence, priority, use_count, is_active \
             FROM pattern_rules ORDER BY id",
        )?;
        type RawRule = (
            i64,
            String,
            String,
            bool,
            String,
            Option<f64>,
            Option<f64>,
            Option<String>,
            String,
            i64,
            i32,
            i64,
            bool,
        );
        let raw: Vec<RawRule> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                    row.get(9)?,
                    row.get(10)?,
                    row.get(11)?,
                    row.get(12)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut rules = Vec::with_capacity(raw.len());
        for (id, name, pattern, is_regex, kind, value, max, direction, category, conf, priority, uses, active) in raw {
            let amount = match amount_condition(&kind, value, max) {
                Ok(a) => a,
                Err(e) => {
                    warn!(rule = %name, "skipping rule: {e}");
                    continue;
                }
            };
            let rule = PatternRule {
                id,
                matcher: if is_regex {
                    MerchantMatcher::Regex(pattern)
                } else {
                    MerchantMatcher::Literal(pattern)
                },
                amount,
                direction: direction.as_deref().and_then(Direction::parse),
                category,
                confidence_percent: conf.clamp(0, 100) as u8,
                priority,
                use_count: uses,
                active,
                name,
            };
            rules.push(rule);
        }
        Ok(rules)
    }

    fn check_patterns(&self) -> Result<Vec<CheckPattern>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, category, amount_kind, amount_value, amount_max, amount_set, \
                    day_first, day_last, is_active \
             FROM check_patterns ORDER BY id",
        )?;
        type RawCheck = (
            i64,
            String,
            String,
            String,
            Option<f64>,
            Option<f64>,
            Option<String>,
            Option<u32>,
            Option<u32>,
            bool,
        );
        let raw: Vec<RawCheck> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                    row.get(9)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut checks = Vec::with_capacity(raw.len());
        for (id, name, category, kind, value, max, set, first, last, active) in raw {
            let amount = match (kind.as_str(), value, max, set) {
                ("exact", Some(v), _, _) => AmountMatch::Exact(v),
                ("range", Some(min), Some(max), _) => AmountMatch::Range { min, max },
                ("set", _, _, Some(json)) => match serde_json::from_str::<Vec<f64>>(&json) {
                    Ok(values) => AmountMatch::AnyOf(values),
                    Err(e) => {
                        warn!(check = %name, "skipping check pattern with bad amount set: {e}");
                        continue;
                    }
                },
                _ => {
                    warn!(check = %name, kind, "skipping check pattern with incomplete amount");
                    continue;
                }
            };
            let day_of_month = match (first, last) {
                (Some(first), Some(last)) => Some(DayWindow { first, last }),
                (Some(day), None) | (None, Some(day)) => Some(DayWindow { first: day, last: day }),
                (None, None) => None,
            };
            checks.push(CheckPattern {
                id,
                name,
                category,
                amount,
                day_of_month,
                active,
            });
        }
        Ok(checks)
    }
}

fn amount_condition(kind: &str, value: Option<f64>, max: Option<f64>) -> Result<AmountCondition> {
    match (kind, value, max) {
        ("none", _, _) | ("", _, _) => Ok(AmountCondition::None),
        ("lt", Some(v), _) => Ok(AmountCondition::LessThan(v)),
        ("gt", Some(v), _) => Ok(AmountCondition::GreaterThan(v)),
        ("eq", Some(v), _) => Ok(AmountCondition::Equal(v)),
        ("range", Some(min), Some(max)) => Ok(AmountCondition::Range { min, max }),
        _ => Err(TallyError::RuleEvaluation {
            rule: kind.to_string(),
            reason: "amount condition is missing its bounds or unknown".into(),
        }),
    }
}

fn transaction_from_row(row: &Row) -> rusqlite::Result<Transaction> {
    let date: String = row.get(1)?;
    let direction: String = row.get(5)?;
    Ok(Transaction {
        id: row.get(0)?,
        date: NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?,
        description: row.get(2)?,
        merchant: row.get(3)?,
        amount: row.get(4)?,
        direction: Direction::parse(&direction).unwrap_or(Direction::Unknown),
        account: row.get(6)?,
        type_code: row.get(7)?,
        check_number: row.get(8)?,
        content_hash: row.get(9)?,
    })
}

impl RuleStore for Store {
    fn load_rules(&self) -> Result<RuleSet> {
        Ok(RuleSet {
            patterns: self.pattern_rules()?,
            checks: self.check_patterns()?,
            vendors: self.vendor_rules()?,
        })
    }

    fn categories(&self) -> Result<Vec<Category>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, description FROM categories ORDER BY name")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Category {
                    name: row.get(0)?,
                    description: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn increment_use_count(&self, rule_id: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE pattern_rules SET use_count = use_count + 1 WHERE id = ?1",
            [rule_id],
        )?;
        Ok(())
    }

    fn add_vendor_rule(&self, rule: &VendorRule) -> Result<()> {
        self.conn.execute(
            "INSERT INTO vendor_rules (merchant, category) VALUES (?1, ?2) \
             ON CONFLICT(merchant) DO UPDATE SET category = ?2",
            params![rule.merchant.trim(), rule.category],
        )?;
        Ok(())
    }

    fn create_category(&self, name: &str, description: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TallyError::UnknownCategory(name.to_string()));
        }
        self.conn.execute(
            "INSERT OR IGNORE INTO categories (name, description) VALUES (?1, ?2)",
            params![name, description],
        )?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("test.db")).unwrap();
        (dir, store)
    }

    pub(crate) fn sample_txn(merchant: &str, amount: f64, hash: &str) -> Transaction {
        Transaction {
            id: 0,
            date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            description: format!("{merchant} PURCHASE"),
            merchant: merchant.to_string(),
            amount,
            direction: Direction::Expense,
            account: "Checking".into(),
            type_code: "DEBIT".into(),
            check_number: None,
            content_hash: hash.to_string(),
        }
    }

    #[test]
    fn test_init_db_creates_tables() {
        let (_dir, store) = test_store();
        let tables: Vec<String> = store
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &[
            "categories",
            "pattern_rules",
            "check_patterns",
            "vendor_rules",
            "transactions",
            "classifications",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_init_db_is_idempotent_and_seeds_once() {
        let (_dir, store) = test_store();
        init_db(&store.conn).unwrap();
        let cats = store.categories().unwrap();
        assert_eq!(cats.len(), DEFAULT_CATEGORIES.len());
    }

    #[test]
    fn test_duplicate_hash_is_ignored() {
        let (_dir, store) = test_store();
        assert!(store.insert_transaction(&sample_txn("SHELL", 40.0, "h1")).unwrap());
        assert!(!store.insert_transaction(&sample_txn("SHELL", 40.0, "h1")).unwrap());
        assert_eq!(store.pending_transactions().unwrap().len(), 1);
    }

    #[test]
    fn test_rules_roundtrip_through_store() {
        let (_dir, store) = test_store();
        store
            .add_pattern_rule(&NewPatternRule {
                name: "amazon",
                matcher: MerchantMatcher::Regex("AMZN.*".into()),
                amount: AmountCondition::Range { min: 1.0, max: 50.0 },
                direction: Some(Direction::Expense),
                category: "Shopping",
                confidence_percent: 85,
                priority: 10,
            })
            .unwrap();
        store
            .add_check_pattern("cleaner", "Home Services", &AmountMatch::AnyOf(vec![100.0, 200.0]), None)
            .unwrap();
        store
            .add_vendor_rule(&VendorRule { merchant: "Costco".into(), category: "Groceries".into() })
            .unwrap();

        let set = store.load_rules().unwrap();
        assert_eq!(set.patterns.len(), 1);
        assert_eq!(set.patterns[0].amount, AmountCondition::Range { min: 1.0, max: 50.0 });
        assert_eq!(set.patterns[0].direction, Some(Direction::Expense));
        assert_eq!(set.checks[0].amount, AmountMatch::AnyOf(vec![100.0, 200.0]));
        assert_eq!(set.checks[0].day_of_month, None);
        assert_eq!(set.vendors[0].category, "Groceries");
    }

    #[test]
    fn test_use_count_incremented() {
        let (_dir, store) = test_store();
        let id = store
            .add_pattern_rule(&NewPatternRule {
                name: "shell",
                matcher: MerchantMatcher::Literal("SHELL".into()),
                amount: AmountCondition::None,
                direction: None,
                category: "Gas & Fuel",
                confidence_percent: 95,
                priority: 0,
            })
            .unwrap();
        store.increment_use_count(id).unwrap();
        store.increment_use_count(id).unwrap();
        assert_eq!(store.load_rules().unwrap().patterns[0].use_count, 2);
    }

    #[test]
    fn test_vendor_rule_upserts_by_merchant() {
        let (_dir, store) = test_store();
        let rule = VendorRule { merchant: "Costco".into(), category: "Groceries".into() };
        store.add_vendor_rule(&rule).unwrap();
        let rule = VendorRule { merchant: "COSTCO".into(), category: "Shopping".into() };
        store.add_vendor_rule(&rule).unwrap();
        let rules = store.vendor_rules().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].category, "Shopping");
    }

    #[test]
    fn test_saved_classification_leaves_pending_unless_skipped() {
        let (_dir, store) = test_store();
        store.insert_transaction(&sample_txn("SHELL", 40.0, "a")).unwrap();
        store.insert_transaction(&sample_txn("UBER", 12.0, "b")).unwrap();
        let pending = store.pending_transactions().unwrap();
        store
            .save_classification(&Classification::accepted(pending[0].clone(), "Gas & Fuel", 0.95))
            .unwrap();
        store.save_classification(&Classification::skipped(pending[1].clone())).unwrap();

        let still = store.pending_transactions().unwrap();
        assert_eq!(still.len(), 1);
        assert_eq!(still[0].merchant, "UBER");

        let counts = store.status_counts().unwrap();
        assert_eq!(counts.classified_by_ai, 1);
        assert_eq!(counts.unclassified, 1);
        assert_eq!(
            store.classification_history().unwrap(),
            vec![("SHELL".to_string(), "Gas & Fuel".to_string())]
        );
    }

    #[test]
    fn test_create_category_ignores_duplicates() {
        let (_dir, store) = test_store();
        store.create_category("Pets", "Vet, food").unwrap();
        store.create_category("pets", "").unwrap();
        assert!(store.category_exists("Pets").unwrap());
        assert_eq!(store.categories().unwrap().len(), DEFAULT_CATEGORIES.len() + 1);
        assert!(store.create_category("  ", "").is_err());
    }
}
