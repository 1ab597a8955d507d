use comfy_table::{Cell, Table};
use regex::RegexBuilder;

use crate::cli::open_store;
use crate::db::{NewPatternRule, RuleStore};
use crate::error::{Result, TallyError};
use crate::fmt::money;
use crate::models::{AmountCondition, Direction, MerchantMatcher};

/// `lt:N`, `gt:N`, `eq:N` or `MIN-MAX`.
pub fn parse_amount_condition(raw: &str) -> Result<AmountCondition> {
    let raw = raw.trim();
    let bad = || TallyError::Other(format!("Invalid amount condition '{raw}'"));
    let number = |s: &str| s.trim().parse::<f64>().map_err(|_| bad());
    if let Some((op, value)) = raw.split_once(':') {
        return match op.trim().to_lowercase().as_str() {
            "lt" => Ok(AmountCondition::LessThan(number(value)?)),
            "gt" => Ok(AmountCondition::GreaterThan(number(value)?)),
            "eq" => Ok(AmountCondition::Equal(number(value)?)),
            _ => Err(bad()),
        };
    }
    let (min, max) = raw.split_once('-').ok_or_else(bad)?;
    let (min, max) = (number(min)?, number(max)?);
    if min > max {
        return Err(bad());
    }
    Ok(AmountCondition::Range { min, max })
}

fn describe_amount(amount: &AmountCondition) -> String {
    match amount {
        AmountCondition::None => "any".to_string(),
        AmountCondition::LessThan(v) => format!("< {}", money(*v)),
        AmountCondition::GreaterThan(v) => format!("> {}", money(*v)),
        AmountCondition::Equal(v) => format!("= {}", money(*v)),
        AmountCondition::Range { min, max } => format!("{} to {}", money(*min), money(*max)),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn add(
    name: &str,
    merchant: &str,
    regex: bool,
    category: &str,
    amount: Option<&str>,
    direction: Option<&str>,
    confidence: u8,
    priority: i32,
) -> Result<()> {
    let store = open_store()?;
    if !store.category_exists(category)? {
        return Err(TallyError::UnknownCategory(category.to_string()));
    }
    let matcher = if regex {
        RegexBuilder::new(merchant)
            .case_insensitive(true)
            .build()
            .map_err(|e| TallyError::Other(format!("Invalid regex '{merchant}': {e}")))?;
        MerchantMatcher::Regex(merchant.to_string())
    } else {
        MerchantMatcher::Literal(merchant.to_string())
    };
    let amount = match amount {
        Some(raw) => parse_amount_condition(raw)?,
        None => AmountCondition::None,
    };
    let direction = direction
        .map(|d| {
            Direction::parse(d)
                .filter(|d| *d != Direction::Unknown)
                .ok_or_else(|| TallyError::Other(format!("Unknown direction '{d}'")))
        })
        .transpose()?;
    if confidence > 100 {
        return Err(TallyError::Other("Confidence must be between 0 and 100".into()));
    }

    let id = store.add_pattern_rule(&NewPatternRule {
        name,
        matcher,
        amount,
        direction,
        category,
        confidence_percent: confidence,
        priority,
    })?;
    println!("Added rule {id}: '{merchant}' \u{2192} {category}");
    Ok(())
}

pub fn list() -> Result<()> {
    let store = open_store()?;
    let mut rules = store.load_rules()?.patterns;
    rules.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));

    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Name", "Merchant", "Amount", "Direction", "Category", "Conf", "Priority", "Uses",
    ]);
    for rule in rules.iter().filter(|r| r.active) {
        let merchant = match &rule.matcher {
            MerchantMatcher::Literal(s) => s.clone(),
            MerchantMatcher::Regex(s) => format!("/{s}/"),
        };
        table.add_row(vec![
            Cell::new(rule.id),
            Cell::new(&rule.name),
            Cell::new(merchant),
            Cell::new(describe_amount(&rule.amount)),
            Cell::new(rule.direction.map(|d| d.label()).unwrap_or("any")),
            Cell::new(&rule.category),
            Cell::new(format!("{}%", rule.confidence_percent)),
            Cell::new(rule.priority),
            Cell::new(rule.use_count),
        ]);
    }
    println!("Pattern rules\n{table}");
    Ok(())
}
