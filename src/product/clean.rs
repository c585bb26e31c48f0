//! Cell normalization shared by both record builders.
//!
//! Every raw cell goes through [`clean`] before it is assigned to a
//! [`Product`](super::Product) field. Currency cells go through
//! [`parse_currency`] and end up as integer cents.

use std::str::FromStr;

use rust_decimal::{prelude::ToPrimitive, Decimal};

/// Placeholders the legacy exports use for "no value", compared case-insensitively.
const NULL_SENTINELS: [&str; 4] = ["n/a", "none", "nan", "null"];

/// Produced when binary OLE fields were exported as text.
const CORRUPT_ENCODING_MARKER: &str = "\u{FFFD}\u{FFFD}\u{FFFD}\u{FFFD}";

/// Embedded documents start with this tag within their first characters.
const DOCUMENT_MARKER: &str = "Document";
const DOCUMENT_MARKER_WINDOW: usize = 50;

/// Cleans a raw cell into an optional text value.
///
/// Returns `None` for absent, empty and placeholder values, and for cells that
/// hold binary garbage. Runs of line breaks become a single space, surrounding
/// whitespace is trimmed and the result is cut to `max_len` characters.
///
/// ```
/// use parts_import::product::clean::clean;
///
/// assert_eq!(clean(Some("  N/A "), None), None);
/// assert_eq!(clean(Some("Ford\r\nRanger"), None), Some("Ford Ranger".to_string()));
/// assert_eq!(clean(Some("ABCDEFG"), Some(3)), Some("ABC".to_string()));
/// ```
pub fn clean(raw: Option<&str>, max_len: Option<usize>) -> Option<String> {
    let raw = raw?;

    if is_corrupt(raw) {
        return None;
    }

    let value = collapse_line_breaks(raw);
    let value = value.trim();

    if value.is_empty() || is_null_sentinel(value) {
        return None;
    }

    let value = match max_len {
        Some(max_len) => truncate(value.to_string(), max_len),
        None => value.to_string(),
    };

    if value.is_empty() { None } else { Some(value) }
}

/// Parses a price cell such as `$1,800.00` into cents.
///
/// The amount is parsed as an exact decimal, multiplied by 100 and truncated.
///
/// ```
/// use parts_import::product::clean::parse_currency;
///
/// assert_eq!(parse_currency(Some("$1,800.00")), Some(180000));
/// assert_eq!(parse_currency(Some("")), None);
/// assert_eq!(parse_currency(Some("abc")), None);
/// ```
pub fn parse_currency(raw: Option<&str>) -> Option<i64> {
    let raw = raw?;
    let digits: String = raw
        .chars()
        .filter(|c| *c != '$' && *c != ',' && !c.is_whitespace())
        .collect();

    if digits.is_empty() {
        return None;
    }

    let amount = Decimal::from_str(&digits).ok()?;
    (amount * Decimal::ONE_HUNDRED).trunc().to_i64()
}

/// Parses a numeric cell such as a weight into a float.
pub fn parse_decimal(raw: Option<&str>) -> Option<f64> {
    let value = clean(raw, None)?;
    value.parse::<f64>().ok().filter(|number| number.is_finite())
}

/// Joins the present parts with `separator`.
///
/// Returns `None` rather than an empty string when no part is present.
pub fn join_parts<I>(parts: I, separator: &str) -> Option<String>
where
    I: IntoIterator<Item = Option<String>>,
{
    let parts: Vec<String> = parts.into_iter().flatten().collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(separator))
    }
}

/// Renders cents as `$1800.00`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!("{}${}.{:02}", sign, cents / 100, cents % 100)
}

/// Hard cut to `max_len` characters.
pub(crate) fn truncate(value: String, max_len: usize) -> String {
    if value.chars().count() > max_len {
        value.chars().take(max_len).collect()
    } else {
        value
    }
}

fn is_null_sentinel(value: &str) -> bool {
    NULL_SENTINELS
        .iter()
        .any(|sentinel| value.eq_ignore_ascii_case(sentinel))
}

fn is_corrupt(value: &str) -> bool {
    if value.contains(CORRUPT_ENCODING_MARKER) {
        return true;
    }

    let window: String = value.chars().take(DOCUMENT_MARKER_WINDOW).collect();
    window.contains(DOCUMENT_MARKER)
}

fn collapse_line_breaks(value: &str) -> String {
    let mut collapsed = String::with_capacity(value.len());
    let mut in_break = false;

    for c in value.chars() {
        if c == '\r' || c == '\n' {
            if !in_break {
                collapsed.push(' ');
                in_break = true;
            }
        } else {
            collapsed.push(c);
            in_break = false;
        }
    }

    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sentinels_clean_to_none() {
        for raw in [
            "", "   ", "N/A", "n/a", "None", "NONE", "nan", "NaN", "null", "NULL", " Null ",
        ] {
            assert_eq!(clean(Some(raw), None), None, "{:?} should be null", raw);
        }
        assert_eq!(clean(None, Some(10)), None);
    }

    #[test]
    fn sentinel_words_inside_text_are_kept() {
        assert_eq!(
            clean(Some("None required"), None),
            Some("None required".to_string())
        );
        assert_eq!(clean(Some("N/A-12"), None), Some("N/A-12".to_string()));
    }

    #[test]
    fn line_breaks_become_single_spaces() {
        assert_eq!(clean(Some("a\r\nb"), None), Some("a b".to_string()));
        assert_eq!(clean(Some("a\rb\nc"), None), Some("a b c".to_string()));
        assert_eq!(clean(Some("a\r\n\r\n\nb"), None), Some("a b".to_string()));
        assert_eq!(clean(Some("\na b\n"), None), Some("a b".to_string()));

        let cleaned = clean(Some("line one\r\nline two\rline three\n"), None).unwrap();
        assert!(!cleaned.contains('\r') && !cleaned.contains('\n'));
        assert_eq!(cleaned, "line one line two line three");
    }

    #[test]
    fn long_values_are_cut_to_exactly_max_len() {
        let raw = "x".repeat(300);
        assert_eq!(clean(Some(&raw), Some(255)).unwrap().len(), 255);

        let raw = "é".repeat(120);
        assert_eq!(clean(Some(&raw), Some(100)).unwrap().chars().count(), 100);

        assert_eq!(clean(Some("short"), Some(100)), Some("short".to_string()));
        assert_eq!(clean(Some("exact"), Some(5)), Some("exact".to_string()));
    }

    #[test]
    fn zero_max_len_yields_none() {
        assert_eq!(clean(Some("value"), Some(0)), None);
    }

    #[test]
    fn corrupt_cells_clean_to_none() {
        assert_eq!(clean(Some("abc\u{FFFD}\u{FFFD}\u{FFFD}\u{FFFD}def"), None), None);
        assert_eq!(clean(Some("Microsoft Word Document 97"), None), None);

        let late_marker = format!("{}Document", "x".repeat(60));
        assert!(clean(Some(&late_marker), None).is_some());
        assert!(clean(Some("single \u{FFFD} replacement"), None).is_some());
    }

    #[test]
    fn currency_is_parsed_to_cents() {
        assert_eq!(parse_currency(Some("$1,800.00")), Some(180000));
        assert_eq!(parse_currency(Some(" $ 19.99 ")), Some(1999));
        assert_eq!(parse_currency(Some("0.1")), Some(10));
        assert_eq!(parse_currency(Some("12.345")), Some(1234));
        assert_eq!(parse_currency(Some("-5.50")), Some(-550));
        assert_eq!(parse_currency(Some("250")), Some(25000));
    }

    #[test]
    fn unparsable_currency_is_none() {
        assert_eq!(parse_currency(Some("")), None);
        assert_eq!(parse_currency(Some("   ")), None);
        assert_eq!(parse_currency(Some("abc")), None);
        assert_eq!(parse_currency(Some("N/A")), None);
        assert_eq!(parse_currency(Some("$")), None);
        assert_eq!(parse_currency(None), None);
    }

    #[test]
    fn decimals_are_parsed() {
        assert_eq!(parse_decimal(Some(" 42.5 ")), Some(42.5));
        assert_eq!(parse_decimal(Some("7")), Some(7.0));
        assert_eq!(parse_decimal(Some("heavy")), None);
        assert_eq!(parse_decimal(Some("nan")), None);
        assert_eq!(parse_decimal(Some("inf")), None);
        assert_eq!(parse_decimal(Some("")), None);
    }

    #[test]
    fn join_parts_skips_missing_parts() {
        let joined = join_parts(
            [Some("Ford".to_string()), None, Some("(2004)".to_string())],
            " ",
        );
        assert_eq!(joined, Some("Ford (2004)".to_string()));
        assert_eq!(join_parts([None, None], " | "), None);
    }

    #[test]
    fn cents_are_formatted_as_dollars() {
        assert_eq!(format_cents(180000), "$1800.00");
        assert_eq!(format_cents(5), "$0.05");
        assert_eq!(format_cents(-1250), "-$12.50");
    }
}
