use std::time::Duration;

use chrono::NaiveDate;

/// Format a float as a dollar amount with thousands separators: $1,234.56
pub fn money(val: f64) -> String {
    let cents = format!("{:.2}", val.abs());
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::new();
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }

    let sign = if val < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{dec_part}")
}

/// Seconds under a minute, minutes under an hour, hours beyond.
pub fn human_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    let whole = secs.round() as u64;
    if whole < 60 {
        format!("{whole} seconds")
    } else if secs < 3600.0 {
        format!("{:.1} minutes", secs / 60.0)
    } else {
        format!("{:.1} hours", secs / 3600.0)
    }
}

pub fn date_range(dates: &[NaiveDate]) -> String {
    let (Some(first), Some(last)) = (dates.iter().min(), dates.iter().max()) else {
        return String::new();
    };
    if first == last {
        first.format("%Y-%m-%d").to_string()
    } else {
        format!("{} to {}", first.format("%Y-%m-%d"), last.format("%Y-%m-%d"))
    }
}

pub fn percent(part: usize, whole: usize) -> String {
    if whole == 0 {
        return "0.0%".to_string();
    }
    format!("{:.1}%", part as f64 * 100.0 / whole as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_formatting() {
        assert_eq!(money(1234.56), "$1,234.56");
        assert_eq!(money(-500.00), "-$500.00");
        assert_eq!(money(0.0), "$0.00");
        assert_eq!(money(1000000.99), "$1,000,000.99");
        assert_eq!(money(42.10), "$42.10");
        assert_eq!(money(100.0), "$100.00");
    }

    #[test]
    fn test_human_duration_units() {
        assert_eq!(human_duration(Duration::from_secs(45)), "45 seconds");
        assert_eq!(human_duration(Duration::from_secs(150)), "2.5 minutes");
        assert_eq!(human_duration(Duration::from_secs(5400)), "1.5 hours");
        assert_eq!(human_duration(Duration::from_millis(59_600)), "1.0 minutes");
        assert_eq!(human_duration(Duration::from_millis(59_400)), "59 seconds");
    }

    #[test]
    fn test_date_range() {
        let a = NaiveDate::from_ymd_opt(2025, 1, 3).unwrap();
        let b = NaiveDate::from_ymd_opt(2025, 2, 9).unwrap();
        assert_eq!(date_range(&[b, a]), "2025-01-03 to 2025-02-09");
        assert_eq!(date_range(&[a]), "2025-01-03");
        assert_eq!(date_range(&[]), "");
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(1, 4), "25.0%");
        assert_eq!(percent(0, 0), "0.0%");
    }
}
