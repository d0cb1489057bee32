use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::error::ParseError;

static NOT_NUMERIC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^0-9.,]").unwrap());

/// Parse a displayed price such as `$129.900`, `$ 1,299.99` or `12,50 €`.
///
/// Separator rules: when both `.` and `,` appear, the rightmost is the
/// decimal point. A lone separator kind is a thousands separator when it
/// repeats, or when it appears once followed by exactly three digits after a
/// non-zero integer part.
pub fn parse_price(raw: &str) -> Result<Decimal, ParseError> {
    let cleaned = NOT_NUMERIC_RE.replace_all(raw, "");
    let cleaned = cleaned.trim_end_matches(|c: char| c == '.' || c == ',');
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return Err(ParseError::Price {
            raw: raw.to_string(),
        });
    }
    // `.99` has an implied zero integer part
    let cleaned = if cleaned.starts_with(['.', ',']) {
        format!("0{}", cleaned)
    } else {
        cleaned.to_string()
    };
    let cleaned = cleaned.as_str();

    let canonical = match (cleaned.rfind('.'), cleaned.rfind(',')) {
        (Some(dot), Some(comma)) => {
            let (decimal, thousands) = if dot > comma { ('.', ',') } else { (',', '.') };
            cleaned.replace(thousands, "").replace(decimal, ".")
        }
        (Some(_), None) => single_separator(cleaned, '.'),
        (None, Some(_)) => single_separator(cleaned, ','),
        (None, None) => cleaned.to_string(),
    };

    Decimal::from_str(&canonical)
        .map(|d| d.normalize())
        .map_err(|_| ParseError::Price {
            raw: raw.to_string(),
        })
}

fn single_separator(s: &str, sep: char) -> String {
    let parts: Vec<&str> = s.split(sep).collect();
    let is_thousands = parts.len() > 2
        || (parts[1].len() == 3 && !parts[0].trim_start_matches('0').is_empty());
    if is_thousands {
        parts.concat()
    } else {
        format!("{}.{}", parts[0], parts[1])
    }
}
