use comfy_table::{Cell, Table};

use crate::cli::open_store;
use crate::db::RuleStore;
use crate::error::{Result, TallyError};
use crate::fmt::money;
use crate::models::{AmountMatch, DayWindow};

/// `N`, `N,N,...` or `MIN-MAX`.
pub fn parse_amount_match(raw: &str) -> Result<AmountMatch> {
    let raw = raw.trim();
    let bad = || TallyError::Other(format!("Invalid check amount '{raw}'"));
    let number = |s: &str| s.trim().parse::<f64>().map_err(|_| bad());
    if raw.contains(',') {
        let values = raw.split(',').map(number).collect::<Result<Vec<_>>>()?;
        return Ok(AmountMatch::AnyOf(values));
    }
    if let Some((min, max)) = raw.split_once('-') {
        let (min, max) = (number(min)?, number(max)?);
        if min > max {
            return Err(bad());
        }
        return Ok(AmountMatch::Range { min, max });
    }
    Ok(AmountMatch::Exact(number(raw)?))
}

/// `D` or `FIRST-LAST`, days 1 to 31.
pub fn parse_days(raw: &str) -> Result<DayWindow> {
    let raw = raw.trim();
    let bad = || TallyError::Other(format!("Invalid day window '{raw}'"));
    let day = |s: &str| {
        s.trim()
            .parse::<u32>()
            .ok()
            .filter(|d| (1..=31).contains(d))
            .ok_or_else(bad)
    };
    let window = match raw.split_once('-') {
        Some((first, last)) => DayWindow {
            first: day(first)?,
            last: day(last)?,
        },
        None => {
            let d = day(raw)?;
            DayWindow { first: d, last: d }
        }
    };
    if window.first > window.last {
        return Err(bad());
    }
    Ok(window)
}

fn describe(amount: &AmountMatch) -> String {
    match amount {
        AmountMatch::Exact(v) => money(*v),
        AmountMatch::Range { min, max } => format!("{} to {}", money(*min), money(*max)),
        AmountMatch::AnyOf(values) => values
            .iter()
            .map(|v| money(*v))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

pub fn add(name: &str, category: &str, amount: &str, days: Option<&str>) -> Result<()> {
    let store = open_store()?;
    if !store.category_exists(category)? {
        return Err(TallyError::UnknownCategory(category.to_string()));
    }
    let amount = parse_amount_match(amount)?;
    let days = days.map(parse_days).transpose()?;
    let id = store.add_check_pattern(name, category, &amount, days)?;
    println!("Added check pattern {id}: {} \u{2192} {category}", describe(&amount));
    Ok(())
}

pub fn list() -> Result<()> {
    let store = open_store()?;
    let checks = store.load_rules()?.checks;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Amount", "Days", "Category"]);
    for check in checks.iter().filter(|c| c.active) {
        let days = match check.day_of_month {
            Some(w) if w.first == w.last => w.first.to_string(),
            Some(w) => format!("{}-{}", w.first, w.last),
            None => "any".to_string(),
        };
        table.add_row(vec![
            Cell::new(check.id),
            Cell::new(&check.name),
            Cell::new(describe(&check.amount)),
            Cell::new(days),
            Cell::new(&check.category),
        ]);
    }
    println!("Check patterns\n{table}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount_match() {
        assert_eq!(parse_amount_match("100").unwrap(), AmountMatch::Exact(100.0));
        assert_eq!(
            parse_amount_match("100, 200").unwrap(),
            AmountMatch::AnyOf(vec![100.0, 200.0])
        );
        assert_eq!(
            parse_amount_match("50-75").unwrap(),
            AmountMatch::Range { min: 50.0, max: 75.0 }
        );
        assert!(parse_amount_match("lots").is_err());
    }

    #[test]
    fn test_parse_days() {
        assert_eq!(parse_days("1-5").unwrap(), DayWindow { first: 1, last: 5 });
        assert_eq!(parse_days("15").unwrap(), DayWindow { first: 15, last: 15 });
        assert!(parse_days("0").is_err());
        assert!(parse_days("20-3").is_err());
    }

    #[test]
    fn test_describe_set() {
        assert_eq!(describe(&AmountMatch::AnyOf(vec![100.0, 200.0])), "$100.00, $200.00");
    }
}
