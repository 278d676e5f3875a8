// Utility helpers for parsing and number formatting.
//
// This module centralizes the "dirty" CSV handling so the rest of the code can
// assume clean, typed values, and keeps presentation formatting in one place.
use num_format::{Locale, ToFormattedString};

/// Parse a money or quantity field exported by a sales system.
///
/// - Trims whitespace.
/// - Strips currency symbols (`$`, `€`), thousands separators and inner spaces.
/// - Rejects values that still contain alphabetic characters.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_amount(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    let cleaned: String = s
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | ',') && !c.is_whitespace())
        .collect();
    if cleaned.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

pub fn parse_i32_safe(s: Option<&str>) -> Option<i32> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    // Spreadsheet exports sometimes write years as `2024.0`.
    s.parse::<i32>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().filter(|f| f.fract() == 0.0).map(|f| f as i32))
}

/// Grouping keys are compared case- and whitespace-insensitively.
pub fn normalize_key(s: Option<String>) -> String {
    s.map(|v| v.trim().to_uppercase()).unwrap_or_default()
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals plus locale-aware thousands separators (`1,234,567.89`).
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

/// Amounts are shown rounded to whole units; zero and missing show as `-`.
pub fn format_amount(n: Option<f64>) -> String {
    match n {
        Some(v) if v.is_finite() && v.round() != 0.0 => format_number(v.round(), 0),
        _ => "-".to_string(),
    }
}

pub fn format_percentage(n: Option<f64>) -> String {
    match n {
        Some(v) if v.is_finite() && v != 0.0 => format!("{}%", format_number(v, 2)),
        _ => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_amount_strips_currency_noise() {
        assert_eq!(parse_amount(Some(" $1,234.50 ")), Some(1234.5));
        assert_eq!(parse_amount(Some("€ 99")), Some(99.0));
        assert_eq!(parse_amount(Some("-12")), Some(-12.0));
        assert_eq!(parse_amount(Some("n/a")), None);
        assert_eq!(parse_amount(Some("")), None);
        assert_eq!(parse_amount(None), None);
    }

    #[test]
    fn parse_year_accepts_float_exports() {
        assert_eq!(parse_i32_safe(Some("2024")), Some(2024));
        assert_eq!(parse_i32_safe(Some("2024.0")), Some(2024));
        assert_eq!(parse_i32_safe(Some("2024.5")), None);
    }

    #[test]
    fn keys_are_trimmed_and_uppercased() {
        assert_eq!(normalize_key(Some("  acme corp ".into())), "ACME CORP");
        assert_eq!(normalize_key(None), "");
    }

    #[test]
    fn formatting_rules() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-1500.0, 0), "-1,500");
        assert_eq!(format_amount(Some(9973518.4)), "9,973,518");
        assert_eq!(format_amount(Some(0.0)), "-");
        assert_eq!(format_amount(None), "-");
        assert_eq!(format_percentage(Some(-50.0)), "-50.00%");
        assert_eq!(format_percentage(Some(0.0)), "-");
        assert_eq!(format_int(12000usize), "12,000");
    }
}
