//! Frequency matcher — decides whether a row's schedule tags fire on a
//! given run date.
//!
//! Tags combine by OR: a row tagged `monday, monthly` fires on Mondays and
//! on the last day of each month. A row with no recognized tag always
//! fires — an undeclared frequency means "always send".

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate};

/// Parse a raw frequency column into schedule tags.
///
/// Splits on commas, trims whitespace, lowercases, drops empty segments.
/// An absent or empty column yields no tags.
pub fn parse_tags(frequency: Option<&str>) -> HashSet<String> {
    frequency
        .map(|raw| {
            raw.split(',')
                .map(|tag| tag.trim().to_lowercase())
                .filter(|tag| !tag.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Evaluate whether `tags` fire on `date_valid`.
///
/// Weekday tags (`weekly`, `monday`..`sunday`) test the run date itself;
/// `monthly`, `quarterly` and `yearly` test the *following* day's
/// day-of-month and month. `monthly` therefore fires on the last day of a
/// month, when tomorrow is the 1st. Existing schedules depend on the
/// one-day lookahead; changing it is a breaking change.
///
/// Unrecognized tags are ignored. If no recognized tag remains, the row
/// fires.
pub fn should_fire(date_valid: NaiveDate, tags: &HashSet<String>) -> bool {
    // 0 = Monday .. 6 = Sunday
    let weekday = date_valid.weekday().num_days_from_monday();
    let next = date_valid.succ_opt().unwrap_or(date_valid);
    let day = next.day();
    let month = next.month();

    let conditions = [
        ("daily", true),
        ("weekly", weekday == 6),
        ("monthly", day == 1),
        ("quarterly", day == 1 && matches!(month, 1 | 4 | 7 | 10)),
        ("yearly", day == 1 && month == 1),
        ("monday", weekday == 0),
        ("tuesday", weekday == 1),
        ("wednesday", weekday == 2),
        ("thursday", weekday == 3),
        ("friday", weekday == 4),
        ("saturday", weekday == 5),
        ("sunday", weekday == 6),
        ("never", false),
        ("always", true),
    ];

    let matched: Vec<bool> = conditions
        .iter()
        .filter(|(tag, _)| tags.contains(*tag))
        .map(|(_, fires)| *fires)
        .collect();

    if matched.is_empty() {
        return true;
    }
    matched.into_iter().any(|fires| fires)
}
