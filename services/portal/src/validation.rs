//! Input validation and phone normalization utilities

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

/// Normalize a Turkish phone number to its bare 10-digit form.
///
/// Strips every non-digit, then a leading `90` country code or a
/// leading `0`.
pub fn normalize_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    if let Some(rest) = digits.strip_prefix("90") {
        if rest.len() == 10 {
            return rest.to_string();
        }
    }
    if let Some(rest) = digits.strip_prefix('0') {
        return rest.to_string();
    }

    digits
}

/// Format a phone number internationally (`+90…`) for the gateways
pub fn international_phone(phone: &str) -> String {
    format!("+90{}", normalize_phone(phone))
}

/// Validate a phone number
pub fn validate_phone(phone: &str) -> Result<(), String> {
    if phone.trim().is_empty() {
        return Err("Telefon numarası gerekli".to_string());
    }

    let normalized = normalize_phone(phone);
    if normalized.len() != 10 {
        return Err("Geçersiz telefon numarası".to_string());
    }

    Ok(())
}

fn parse_date(date: &str) -> Result<NaiveDate, String> {
    static DATE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = DATE_REGEX
        .get_or_init(|| Regex::new(r"^\d{2}\.\d{2}\.\d{4}$").expect("Failed to compile date regex"));

    if !regex.is_match(date) {
        return Err("Tarih gg.aa.yyyy biçiminde olmalı".to_string());
    }

    NaiveDate::parse_from_str(date, "%d.%m.%Y").map_err(|_| "Geçersiz tarih".to_string())
}

/// Validate a `dd.mm.yyyy` date string
pub fn validate_date(date: &str) -> Result<(), String> {
    parse_date(date).map(|_| ())
}

/// Validate a date range: both ends well-formed, start not after end
pub fn validate_date_range(start: &str, end: &str) -> Result<(), String> {
    let start_date = parse_date(start)?;
    let end_date = parse_date(end)?;

    if start_date > end_date {
        return Err("Başlangıç tarihi bitiş tarihinden sonra olamaz".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_country_code_and_leading_zero() {
        assert_eq!(normalize_phone("+90 555 123 45 67"), "5551234567");
        assert_eq!(normalize_phone("905551234567"), "5551234567");
        assert_eq!(normalize_phone("05551234567"), "5551234567");
        assert_eq!(normalize_phone("5551234567"), "5551234567");
    }

    #[test]
    fn international_format() {
        assert_eq!(international_phone("05551234567"), "+905551234567");
        assert_eq!(international_phone("+905551234567"), "+905551234567");
    }

    #[test]
    fn rejects_empty_and_short_phones() {
        assert!(validate_phone("").is_err());
        assert!(validate_phone("555").is_err());
        assert!(validate_phone("5551234567").is_ok());
    }

    #[test]
    fn validates_dates() {
        assert!(validate_date("01.08.2025").is_ok());
        assert!(validate_date("2025-08-01").is_err());
        assert!(validate_date("32.01.2025").is_err());
    }

    #[test]
    fn validates_date_ranges() {
        assert!(validate_date_range("01.08.2025", "05.08.2025").is_ok());
        assert!(validate_date_range("01.08.2025", "01.08.2025").is_ok());
        assert!(validate_date_range("05.08.2025", "01.08.2025").is_err());
    }
}
