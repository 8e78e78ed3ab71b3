//! Deterministic task-input parsing.
//!
//! Accepted shapes:
//!   "HH:MM DD.MM Task text"
//!   "HH:MM DD.MM\nTask text"
//!
//! The timestamp is interpreted in the chat's timezone and stored as UTC.
//! Anything that doesn't match falls through to the AI extraction oracle.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::clock::resolve_local;

/// Parse "HH:MM DD.MM text" into an absolute due instant plus the task text.
///
/// The year is the current one in `tz`; a date more than a minute in the past
/// rolls over to next year. Returns `None` for anything that doesn't match.
pub fn parse_task_input(text: &str, tz: Tz, now: DateTime<Utc>) -> Option<(DateTime<Utc>, String)> {
    let text = text.trim();

    // "HH:MM DD.MM" on its own line with the task text below.
    let candidate = match text.split_once('\n') {
        Some((header, body)) => format!("{} {}", header.trim(), body.trim()),
        None => text.to_string(),
    };

    let mut tokens = candidate.split_whitespace();
    let hhmm = tokens.next()?;
    let ddmm = tokens.next()?;
    let task_text = tokens.collect::<Vec<_>>().join(" ");
    if task_text.is_empty() {
        return None;
    }

    let (hour, minute) = parse_hhmm(hhmm)?;
    let (day, month) = parse_ddmm(ddmm)?;

    let year = now.with_timezone(&tz).year();
    let due = local_instant(tz, year, month, day, hour, minute)?;

    // Already passed this year (with a minute of tolerance) — assume next year.
    let due = if due < now - Duration::minutes(1) {
        local_instant(tz, year + 1, month, day, hour, minute)?
    } else {
        due
    };

    Some((due, task_text))
}

/// "HH:MM" → (hour, minute), range-checked.
pub fn parse_hhmm(s: &str) -> Option<(u32, u32)> {
    let (hh, mm) = s.split_once(':')?;
    let hour: u32 = hh.parse().ok()?;
    let minute: u32 = mm.parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute))
}

/// "DD.MM" → (day, month), range-checked.
pub fn parse_ddmm(s: &str) -> Option<(u32, u32)> {
    let (dd, mm) = s.split_once('.')?;
    let day: u32 = dd.parse().ok()?;
    let month: u32 = mm.parse().ok()?;
    if day == 0 || day > 31 || month == 0 || month > 12 {
        return None;
    }
    Some((day, month))
}

fn local_instant(tz: Tz, year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Option<DateTime<Utc>> {
    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)?;
    Some(resolve_local(tz, naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::resolve_tz;

    fn rome() -> Tz {
        resolve_tz("Europe/Rome").unwrap()
    }

    fn now() -> DateTime<Utc> {
        // 2025-08-01 10:00 UTC = 12:00 in Rome.
        "2025-08-01T10:00:00Z".parse().unwrap()
    }

    #[test]
    fn inline_format_parses() {
        let (due, text) = parse_task_input("14:30 15.08 Call mum", rome(), now()).unwrap();
        assert_eq!(text, "Call mum");
        // 14:30 Rome summer time = 12:30 UTC.
        assert_eq!(due, "2025-08-15T12:30:00Z".parse::<DateTime<Utc>>().unwrap());
    }

    #[test]
    fn newline_after_date_is_accepted() {
        let (due, text) =
            parse_task_input("09:00 20.08\nDentist appointment", rome(), now()).unwrap();
        assert_eq!(text, "Dentist appointment");
        assert_eq!(due, "2025-08-20T07:00:00Z".parse::<DateTime<Utc>>().unwrap());
    }

    #[test]
    fn passed_date_rolls_to_next_year() {
        let (due, _) = parse_task_input("10:00 01.01 New year plan", rome(), now()).unwrap();
        assert_eq!(due.year(), 2026);
    }

    #[test]
    fn near_past_same_day_does_not_roll() {
        // Due 11:59:30-ish local vs now 12:00 local — inside the tolerance.
        let (due, _) = parse_task_input("12:00 01.08 Lunch", rome(), now()).unwrap();
        assert_eq!(due.year(), 2025);
    }

    #[test]
    fn task_text_is_required() {
        assert!(parse_task_input("14:30 15.08", rome(), now()).is_none());
        assert!(parse_task_input("14:30 15.08   ", rome(), now()).is_none());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_task_input("hello there", rome(), now()).is_none());
        assert!(parse_task_input("25:00 15.08 Too late", rome(), now()).is_none());
        assert!(parse_task_input("14:30 32.08 No such day", rome(), now()).is_none());
        assert!(parse_task_input("14:30 15.13 No such month", rome(), now()).is_none());
        assert!(parse_task_input("14-30 15.08 Wrong separator", rome(), now()).is_none());
    }

    #[test]
    fn feb_29_on_non_leap_year_is_rejected() {
        assert!(parse_task_input("10:00 29.02 Leap", rome(), now()).is_none());
    }
}
