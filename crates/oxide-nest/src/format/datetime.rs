//! Normalization of filter values on datetime columns.

use chrono::{DateTime, Months, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Normalizes a datetime filter value.
///
/// - `2019`, `2019-03` and `2019-03-04` expand to the range covering that
///   year, month or day.
/// - RFC 3339 timestamps are converted to UTC.
/// - Each side of an `a..b` range is normalized on its own, a partial date
///   on the left taking the start of its period and on the right the end.
///
/// Anything else is returned unchanged.
#[must_use]
pub fn format_datetime(value: &Value) -> Value {
    let Value::String(text) = value else {
        return value.clone();
    };

    if let Some((from, to)) = text.split_once("..") {
        return Value::String(format!("{}..{}", range_start(from), range_end(to)));
    }

    if let Some((start, end)) = period(text) {
        return Value::String(format!(
            "{}..{}",
            start.format(FORMAT),
            end.format(FORMAT)
        ));
    }

    Value::String(timestamp(text).unwrap_or_else(|| text.clone()))
}

fn range_start(side: &str) -> String {
    period(side).map_or_else(
        || timestamp(side).unwrap_or_else(|| side.to_string()),
        |(start, _)| start.format(FORMAT).to_string(),
    )
}

fn range_end(side: &str) -> String {
    period(side).map_or_else(
        || timestamp(side).unwrap_or_else(|| side.to_string()),
        |(_, end)| end.format(FORMAT).to_string(),
    )
}

fn timestamp(text: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).format(FORMAT).to_string())
}

/// Returns the first and last second of the year, month or day `text`
/// names.
fn period(text: &str) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    let parts: Vec<&str> = text.split('-').collect();

    let (first, months) = match parts.as_slice() {
        [y] if y.len() == 4 && digits(y) => (NaiveDate::from_ymd_opt(y.parse().ok()?, 1, 1)?, 12),
        [y, m] if y.len() == 4 && m.len() == 2 && digits(y) && digits(m) => (
            NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, 1)?,
            1,
        ),
        [y, m, d] if y.len() == 4 && m.len() == 2 && d.len() == 2 && digits(y) && digits(m) && digits(d) => {
            let day = NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)?;
            return Some((day.and_hms_opt(0, 0, 0)?, day.and_hms_opt(23, 59, 59)?));
        }
        _ => return None,
    };

    let last = first.checked_add_months(Months::new(months))?.pred_opt()?;
    Some((first.and_hms_opt(0, 0, 0)?, last.and_hms_opt(23, 59, 59)?))
}
