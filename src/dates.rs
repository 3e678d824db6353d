//! Host-side date input handling.
//!
//! Users type dates as `D/M/YY`, `DD/MM/YYYY` or ISO `YYYY-MM-DD`. Hosts
//! normalize them to the `DD/MM/YY` display form, expand them to the API's
//! `DD/MM/YYYY` form and cap the range before an export is started.

use chrono::{Days, NaiveDate};
use regex::Regex;

use crate::error::ExportError;
use crate::types::ExportDates;

/// Longest range the site will export in one go.
pub const MAX_RANGE_DAYS: i64 = 732;

/// Normalize user input to `DD/MM/YY`. Returns `None` if it is not a date.
pub fn normalize_date_input(raw: &str) -> Option<String> {
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return None;
    }

    let iso = Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").ok()?;
    if let Some(cap) = iso.captures(&cleaned) {
        let year = &cap[1];
        return Some(format!("{}/{}/{}", &cap[3], &cap[2], &year[2..]));
    }

    let dmy = Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{2}|\d{4})$").ok()?;
    let cap = dmy.captures(&cleaned)?;
    let day: u32 = cap[1].parse().ok()?;
    let month: u32 = cap[2].parse().ok()?;
    if !(1..=31).contains(&day) || !(1..=12).contains(&month) {
        return None;
    }
    let year = &cap[3];
    Some(format!("{:02}/{:02}/{}", day, month, &year[year.len() - 2..]))
}

/// Expand `DD/MM/YY` to `DD/MM/20YY`. Four-digit years pass through.
pub fn to_api_date(ddmmyy: &str) -> Option<String> {
    let mut parts = ddmmyy.split('/');
    let (day, month, year) = (parts.next()?, parts.next()?, parts.next()?);
    if day.is_empty() || month.is_empty() || year.is_empty() {
        return None;
    }
    let year = if year.len() == 4 {
        year.to_string()
    } else {
        format!("20{}", year)
    };
    Some(format!("{}/{}/{}", day, month, year))
}

/// Calendar date of a normalized `DD/MM/YY` string.
///
/// Days past the end of the month roll over into the next one.
pub fn calendar_date(normalized: &str) -> Option<NaiveDate> {
    let api = to_api_date(normalized)?;
    let mut parts = api.split('/');
    let day: u64 = parts.next()?.parse().ok()?;
    let month: u32 = parts.next()?.parse().ok()?;
    let year: i32 = parts.next()?.parse().ok()?;
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    first.checked_add_days(Days::new(day.checked_sub(1)?))
}

/// Both dates resolve and lie at most `MAX_RANGE_DAYS` apart, in either order.
pub fn is_range_within_limit(normalized_from: &str, normalized_to: &str) -> bool {
    match (calendar_date(normalized_from), calendar_date(normalized_to)) {
        (Some(from), Some(to)) => (to - from).num_days().abs() <= MAX_RANGE_DAYS,
        _ => false,
    }
}

/// Validate two raw user inputs and build the dates an export runs with.
pub fn export_dates(from_raw: &str, to_raw: &str) -> Result<ExportDates, ExportError> {
    let (Some(display_from), Some(display_to)) =
        (normalize_date_input(from_raw), normalize_date_input(to_raw))
    else {
        return Err(ExportError::InvalidInput(
            "Select valid From/To dates before downloading.".to_string(),
        ));
    };
    let (Some(from_date), Some(to_date)) = (to_api_date(&display_from), to_api_date(&display_to))
    else {
        return Err(ExportError::InvalidInput(
            "Something went wrong parsing your dates.".to_string(),
        ));
    };
    if !is_range_within_limit(&display_from, &display_to) {
        return Err(ExportError::InvalidInput(
            "Downloads limited to 24 months at a time. Try a smaller range.".to_string(),
        ));
    }
    Ok(ExportDates {
        display_from,
        display_to,
        from_date,
        to_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_formats() {
        assert_eq!(normalize_date_input("2024-03-05").as_deref(), Some("05/03/24"));
        assert_eq!(normalize_date_input("5/3/24").as_deref(), Some("05/03/24"));
        assert_eq!(normalize_date_input(" 05 / 03 / 2024 ").as_deref(), Some("05/03/24"));
        assert_eq!(normalize_date_input("32/01/24"), None);
        assert_eq!(normalize_date_input("01/13/24"), None);
        assert_eq!(normalize_date_input("00/01/24"), None);
        assert_eq!(normalize_date_input("1/1/224"), None);
        assert_eq!(normalize_date_input("yesterday"), None);
        assert_eq!(normalize_date_input(""), None);
    }

    #[test]
    fn test_normalize_then_api_date_round_trips() {
        for (input, expected) in [
            ("2024-03-05", "05/03/2024"),
            ("31/12/99", "31/12/2099"),
            ("1/1/2030", "01/01/2030"),
            ("2025-02-28", "28/02/2025"),
        ] {
            let normalized = normalize_date_input(input).unwrap();
            assert_eq!(to_api_date(&normalized).as_deref(), Some(expected), "{}", input);
        }
    }

    #[test]
    fn test_to_api_date() {
        assert_eq!(to_api_date("05/03/2024").as_deref(), Some("05/03/2024"));
        assert_eq!(to_api_date("05/03"), None);
        assert_eq!(to_api_date("05//24"), None);
    }

    #[test]
    fn test_range_boundary() {
        // 2024-01-01 + 732 days = 2026-01-02
        assert!(is_range_within_limit("01/01/24", "02/01/26"));
        assert!(!is_range_within_limit("01/01/24", "03/01/26"));
        // order does not matter
        assert!(is_range_within_limit("02/01/26", "01/01/24"));
        assert!(!is_range_within_limit("03/01/26", "01/01/24"));
    }

    #[test]
    fn test_day_overflow_rolls_over() {
        assert_eq!(
            calendar_date("31/02/24"),
            NaiveDate::from_ymd_opt(2024, 3, 2)
        );
    }

    #[test]
    fn test_export_dates() {
        let dates = export_dates("2024-03-01", "31/3/24").unwrap();
        assert_eq!(dates.display_from, "01/03/24");
        assert_eq!(dates.display_to, "31/03/24");
        assert_eq!(dates.from_date, "01/03/2024");
        assert_eq!(dates.to_date, "31/03/2024");

        let err = export_dates("bad", "31/3/24").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Select valid From/To dates before downloading."
        );
        let err = export_dates("01/01/20", "01/01/24").unwrap_err();
        assert!(err.to_string().starts_with("Downloads limited"));
    }
}
