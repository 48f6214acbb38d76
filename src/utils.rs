//! Small string and date helpers shared by the scrapers and the status composer.
//!
//! - Japanese locale date formatting for headers
//! - Character-based prefix slicing that accepts negative lengths
//! - String truncation for logging

use chrono::{Datelike, NaiveDate};

/// Weekday characters indexed by ISO weekday, Monday first.
const WEEKDAY_CHARS: [char; 7] = ['月', '火', '水', '木', '金', '土', '日'];

/// Format a date as `<year>年<month>月<day>日(<weekday>)`.
///
/// Month and day are not zero padded.
///
/// # Examples
///
/// ```ignore
/// let d = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
/// assert_eq!(format_date_ja(d), "2024年3月4日(月)");
/// ```
pub fn format_date_ja(date: NaiveDate) -> String {
    let wday = WEEKDAY_CHARS[date.weekday().num_days_from_monday() as usize];
    format!(
        "{}年{}月{}日({})",
        date.year(),
        date.month(),
        date.day(),
        wday
    )
}

/// Take a character prefix of `s`, counting from the end when `n` is negative.
///
/// # Arguments
///
/// * `s` - The string to cut
/// * `n` - Characters to keep; a negative value counts from the end
///
/// # Returns
///
/// The first `n` characters (all of `s` if shorter) for `n >= 0`. For a
/// negative `n`, everything but the last `|n|` characters, which is empty
/// once `|n|` reaches the length.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(char_prefix("あいうえお", 2), "あい");
/// assert_eq!(char_prefix("あいうえお", -2), "あいう");
/// assert_eq!(char_prefix("あい", -5), "");
/// ```
pub fn char_prefix(s: &str, n: i64) -> &str {
    let count = s.chars().count() as i64;
    let keep = if n >= 0 { n.min(count) } else { (count + n).max(0) };
    match s.char_indices().nth(keep as usize) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and the number
/// of dropped characters appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let count = s.chars().count();
    if count <= max {
        s.to_string()
    } else {
        format!("{}…(+{} chars)", char_prefix(s, max as i64), count - max)
    }
}
