use chrono::NaiveDate;

/// Fast parse of `"DD-MM-YYYY"` → `NaiveDate`
pub fn parse_extract_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    // minimal shape check; byte-level so odd encodings cannot panic a slice
    let b = s.as_bytes();
    if b.len() != 10 || !s.is_ascii() || b[2] != b'-' || b[5] != b'-' {
        return None;
    }
    let day: u32 = s[0..2].parse().ok()?;
    let month: u32 = s[3..5].parse().ok()?;
    let year: i32 = s[6..10].parse().ok()?;

    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_day_month_year() {
        assert_eq!(
            parse_extract_date("31-01-2025"),
            NaiveDate::from_ymd_opt(2025, 1, 31)
        );
        assert_eq!(
            parse_extract_date(" 05-09-2025 "),
            NaiveDate::from_ymd_opt(2025, 9, 5)
        );
    }

    #[test]
    fn rejects_other_shapes() {
        assert_eq!(parse_extract_date("2025-01-31"), None);
        assert_eq!(parse_extract_date("31/01/2025"), None);
        assert_eq!(parse_extract_date("not-a-date"), None);
        assert_eq!(parse_extract_date(""), None);
        // calendar-invalid
        assert_eq!(parse_extract_date("32-01-2025"), None);
        assert_eq!(parse_extract_date("29-02-2025"), None);
    }
}
