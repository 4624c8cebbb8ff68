//! Normalization of raw source values.
//!
//! Source documents carry numbers as JSON strings or numbers with placeholder
//! tokens mixed in, and period labels such as `"2021-12"` or `"TTM"`. Both
//! functions here return `None` for anything they cannot use; neither ever
//! fails. A `None` argument stands for a value that is missing altogether.

use serde_json::Value;

use crate::types::YearMonth;

/// Tokens that mark a value as not reported.
const ABSENT_TOKENS: [&str; 3] = ["N/A", "-", ""];

/// Label of the trailing-twelve-months column.
const TRAILING_TWELVE_MONTHS: &str = "TTM";

/// Separator between year and month in a fiscal label.
const FISCAL_SEPARATOR: char = '-';

/// Widest year the storage schema holds.
const MAX_YEAR_WIDTH: usize = 5;

/// Widest month the storage schema holds.
const MAX_MONTH_WIDTH: usize = 3;

/// Parses a raw value into a finite number.
///
/// `"N/A"`, `"-"`, `""`, `null` and a missing value are absent. Strings are
/// trimmed and parsed as `f64`; JSON numbers are taken as is. Everything else,
/// including non-finite results, is absent. Booleans are rejected rather than
/// read as `1.0`/`0.0`.
#[must_use]
pub fn parse_number(raw: Option<&Value>) -> Option<f64> {
    let parsed = match raw? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            if ABSENT_TOKENS.contains(&s.as_str()) {
                return None;
            }
            s.trim().parse::<f64>().ok()
        }
        _ => None,
    }?;

    parsed.is_finite().then_some(parsed)
}

/// Splits a fiscal label into its year and month components.
///
/// Missing, empty, non-string and `"TTM"` labels are absent, as are labels
/// without a `-`. Otherwise the first two components are returned verbatim,
/// so `"2021-12-31"` yields year `"2021"` and month `"12"`. An empty year, or
/// a component wider than its storage column, is absent.
#[must_use]
pub fn parse_fiscal_period(label: Option<&Value>) -> Option<YearMonth> {
    let label = label?.as_str()?;
    if label.is_empty() || label == TRAILING_TWELVE_MONTHS || !label.contains(FISCAL_SEPARATOR) {
        return None;
    }

    let mut parts = label.split(FISCAL_SEPARATOR);
    let year = parts.next()?;
    let month = parts.next()?;

    if year.is_empty() || year.chars().count() > MAX_YEAR_WIDTH {
        return None;
    }
    if month.chars().count() > MAX_MONTH_WIDTH {
        return None;
    }

    Some(YearMonth::new(year, month))
}
