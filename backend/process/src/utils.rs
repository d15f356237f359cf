use std::sync::LazyLock;

use chrono::{DateTime, Duration, TimeZone, Utc};
use regex::Regex;

static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[_\s]+").unwrap());
static DISALLOWED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9-]").unwrap());
static DASHES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-{2,}").unwrap());

/// URL path segment for a title: lowercase ASCII words joined by dashes.
pub fn slugify(input: &str) -> String {
    let lower = input.trim().to_lowercase();
    let dashed = SEPARATORS.replace_all(&lower, "-");
    let cleaned = DISALLOWED.replace_all(&dashed, "");

    DASHES
        .replace_all(&cleaned, "-")
        .trim_matches('-')
        .to_string()
}

/// Fixed origin for fixture timestamps so every seed produces the same rows.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Spreads rows over time: a day apart, plus a drift so times of day differ.
pub fn created_at(index: usize) -> DateTime<Utc> {
    let index = index as i64;

    epoch() + Duration::days(index) + Duration::minutes(index * 37 % 600)
}

/// Cycles through `options` by row index.
pub fn pick<'a>(options: &[&'a str], index: usize) -> &'a str {
    options[index % options.len()]
}
