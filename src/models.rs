use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Income,
    Expense,
    Transfer,
    Unknown,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Income => "income",
            Direction::Expense => "expense",
            Direction::Transfer => "transfer",
            Direction::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "income" => Some(Direction::Income),
            "expense" => Some(Direction::Expense),
            "transfer" => Some(Direction::Transfer),
            "unknown" | "" => Some(Direction::Unknown),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Direction::Income => "Income",
            Direction::Expense => "Expense",
            Direction::Transfer => "Transfer",
            Direction::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: i64,
    pub date: NaiveDate,
    pub description: String,
    pub merchant: String,
    /// Magnitude only; `direction` carries the sign.
    pub amount: f64,
    pub direction: Direction,
    pub account: String,
    pub type_code: String,
    pub check_number: Option<String>,
    pub content_hash: String,
}

impl Transaction {
    pub fn is_check(&self) -> bool {
        self.check_number.is_some() || self.type_code.eq_ignore_ascii_case("CHECK")
    }

    pub fn with_direction(&self, direction: Direction) -> Self {
        Self {
            direction,
            ..self.clone()
        }
    }
}

/// Amounts are compared at cent precision throughout.
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

#[derive(Debug, Clone, PartialEq)]
pub enum MerchantMatcher {
    Literal(String),
    Regex(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AmountCondition {
    None,
    LessThan(f64),
    GreaterThan(f64),
    Equal(f64),
    Range { min: f64, max: f64 },
}

impl AmountCondition {
    pub fn holds(&self, amount: f64) -> bool {
        let cents = to_cents(amount);
        match self {
            AmountCondition::None => true,
            AmountCondition::LessThan(v) => cents < to_cents(*v),
            AmountCondition::GreaterThan(v) => cents > to_cents(*v),
            AmountCondition::Equal(v) => cents == to_cents(*v),
            AmountCondition::Range { min, max } => {
                to_cents(*min) <= cents && cents <= to_cents(*max)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternRule {
    pub id: i64,
    pub name: String,
    pub matcher: MerchantMatcher,
    pub amount: AmountCondition,
    pub direction: Option<Direction>,
    pub category: String,
    pub confidence_percent: u8,
    pub priority: i32,
    pub use_count: i64,
    pub active: bool,
}

impl PatternRule {
    pub fn confidence(&self) -> f64 {
        f64::from(self.confidence_percent.min(100)) / 100.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AmountMatch {
    Exact(f64),
    Range { min: f64, max: f64 },
    AnyOf(Vec<f64>),
}

impl AmountMatch {
    pub fn matches(&self, amount: f64) -> bool {
        let cents = to_cents(amount);
        match self {
            AmountMatch::Exact(v) => cents == to_cents(*v),
            AmountMatch::Range { min, max } => to_cents(*min) <= cents && cents <= to_cents(*max),
            AmountMatch::AnyOf(values) => values.iter().any(|v| to_cents(*v) == cents),
        }
    }
}

/// Inclusive day-of-month window, e.g. 1..=5 for "early in the month".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub first: u32,
    pub last: u32,
}

impl DayWindow {
    pub fn contains(&self, day: u32) -> bool {
        self.first <= day && day <= self.last
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckPattern {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub amount: AmountMatch,
    pub day_of_month: Option<DayWindow>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorRule {
    pub merchant: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRanking {
    pub category: String,
    pub score: f64,
    pub description: String,
}

/// Suggested category from the AI collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiSuggestion {
    pub category: String,
    pub confidence: f64,
    #[serde(default)]
    pub is_new_category: bool,
    #[serde(default)]
    pub category_description: String,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionSuggestion {
    pub direction: Direction,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone)]
pub struct PendingClassification {
    pub transaction: Transaction,
    pub suggested_category: String,
    pub confidence: f64,
    pub is_new_category: bool,
    pub category_description: String,
    pub rankings: Vec<CategoryRanking>,
    pub check_patterns: Vec<CheckPattern>,
    pub suggested_direction: Direction,
    pub direction_confidence: f64,
    pub direction_reasoning: String,
    pub similar_count: usize,
    /// Set by the resolver when no human confirmation is needed.
    pub auto_acceptable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationStatus {
    Unclassified,
    ClassifiedByAI,
    UserModified,
}

impl ClassificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationStatus::Unclassified => "unclassified",
            ClassificationStatus::ClassifiedByAI => "classified_by_ai",
            ClassificationStatus::UserModified => "user_modified",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unclassified" => Some(ClassificationStatus::Unclassified),
            "classified_by_ai" => Some(ClassificationStatus::ClassifiedByAI),
            "user_modified" => Some(ClassificationStatus::UserModified),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub transaction: Transaction,
    pub category: String,
    pub status: ClassificationStatus,
    pub confidence: f64,
    pub classified_at: NaiveDateTime,
}

impl Classification {
    pub fn skipped(transaction: Transaction) -> Self {
        Self {
            transaction,
            category: String::new(),
            status: ClassificationStatus::Unclassified,
            confidence: 0.0,
            classified_at: now(),
        }
    }

    pub fn accepted(transaction: Transaction, category: &str, confidence: f64) -> Self {
        Self {
            transaction,
            category: category.to_string(),
            status: ClassificationStatus::ClassifiedByAI,
            confidence,
            classified_at: now(),
        }
    }

    pub fn user_modified(transaction: Transaction, category: &str) -> Self {
        Self {
            transaction,
            category: category.to_string(),
            status: ClassificationStatus::UserModified,
            confidence: 1.0,
            classified_at: now(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.status == ClassificationStatus::Unclassified
    }
}

fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}
