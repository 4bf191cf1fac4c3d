// src/extract.rs
//! Best-effort numeric scraping from the model's free-text answer.
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref PRICE_RE: Regex = Regex::new(r"\$\s?([0-9,]+\.[0-9]{2})").unwrap();
    static ref CHANGE_RE: Regex = Regex::new(r"([+-][0-9,]+\.[0-9]{2})").unwrap();
}

fn first_number(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().replace(',', "").parse::<f64>().ok())
}

/// First dollar amount with two decimals, e.g. `$175.43` or `$ 1,234.56`.
pub fn extract_price(text: &str) -> Option<f64> {
    first_number(&PRICE_RE, text)
}

/// First explicitly signed amount with two decimals, e.g. `+1.23` or `-0.50`.
pub fn extract_change(text: &str) -> Option<f64> {
    first_number(&CHANGE_RE, text)
}

/// Percent change relative to the previous close (`price - change`).
pub fn change_percent(price: f64, change: f64) -> f64 {
    let previous = price - change;
    if price == 0.0 || previous == 0.0 {
        return 0.0;
    }
    change / previous * 100.0
}
