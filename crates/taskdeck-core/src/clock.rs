//! Wall-clock resolution per user timezone.
//!
//! Reminder math is pure instant arithmetic (both operands are UTC), but the
//! daily-summary trigger is a *local* hour:minute, so everything here goes
//! through the real tz database (`chrono-tz`) rather than fixed offsets —
//! otherwise the trigger comparison breaks on every DST transition.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::error::{Result, TaskdeckError};

/// Look up an IANA timezone name.
pub fn resolve_tz(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| TaskdeckError::Timezone(name.to_string()))
}

/// Absolute instant at which a task's reminder becomes due.
pub fn reminder_instant(due_utc: DateTime<Utc>, lead_minutes: u32) -> DateTime<Utc> {
    due_utc - Duration::minutes(lead_minutes as i64)
}

/// The user's local calendar date — the summary deduplication key.
///
/// This is a real calendar date, never an elapsed-24h counter, so 23-hour and
/// 25-hour DST transition days still bucket to exactly one date each.
pub fn local_day(now_utc: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now_utc.with_timezone(&tz).date_naive()
}

/// True once the local wall clock has reached `hour:minute`.
///
/// `>=` instead of `==` so a trigger that falls inside a spring-forward gap
/// still fires at the first valid local instant past the gap, and a missed
/// tick never loses the whole day. The (chat, local date) claim keeps the
/// repeated hour on fall-back days — and every later tick — at one delivery.
pub fn summary_due(now_utc: DateTime<Utc>, tz: Tz, hour: u8, minute: u8) -> bool {
    let local = now_utc.with_timezone(&tz);
    (local.hour(), local.minute()) >= (hour as u32, minute as u32)
}

/// Map a naive local datetime to UTC.
///
/// Ambiguous local times (fall-back) take the earlier instant; nonexistent
/// ones (spring-forward gap) advance in half-hour steps to the first valid
/// instant after the gap.
pub fn resolve_local(tz: Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => dt.with_timezone(&Utc),
        chrono::LocalResult::Ambiguous(earlier, _) => earlier.with_timezone(&Utc),
        chrono::LocalResult::None => {
            let mut probe = naive;
            // Gaps are at most a few hours wide; 48 half-hour steps caps it.
            for _ in 0..48 {
                probe += Duration::minutes(30);
                if let Some(dt) = tz.from_local_datetime(&probe).earliest() {
                    return dt.with_timezone(&Utc);
                }
            }
            naive.and_utc()
        }
    }
}

/// UTC bounds `[start, end)` of a local calendar date.
pub fn local_day_bounds(date: NaiveDate, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    let next = date.succ_opt().unwrap_or(date);
    let next_midnight = next.and_hms_opt(0, 0, 0).unwrap_or_default();
    (resolve_local(tz, midnight), resolve_local(tz, next_midnight))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Tz;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn rome() -> Tz {
        resolve_tz("Europe/Rome").unwrap()
    }

    #[test]
    fn resolve_tz_rejects_garbage() {
        assert!(resolve_tz("Europe/Rome").is_ok());
        assert!(resolve_tz("Mars/Olympus_Mons").is_err());
    }

    #[test]
    fn reminder_instant_is_due_minus_lead() {
        let due = utc("2025-08-15T14:00:00Z");
        assert_eq!(reminder_instant(due, 30), utc("2025-08-15T13:30:00Z"));
        assert_eq!(reminder_instant(due, 0), due);
    }

    #[test]
    fn local_day_uses_the_timezone() {
        // 23:30 UTC is already the next day in Rome (UTC+2 in summer).
        let now = utc("2025-08-15T23:30:00Z");
        assert_eq!(
            local_day(now, rome()),
            NaiveDate::from_ymd_opt(2025, 8, 16).unwrap()
        );
    }

    #[test]
    fn summary_due_comparison() {
        let tz = rome();
        // 05:59 UTC = 07:59 local in August.
        assert!(!summary_due(utc("2025-08-15T05:59:00Z"), tz, 8, 0));
        // 06:00 UTC = 08:00 local.
        assert!(summary_due(utc("2025-08-15T06:00:00Z"), tz, 8, 0));
        // Later in the day still counts — the day-bucket claim dedups.
        assert!(summary_due(utc("2025-08-15T15:00:00Z"), tz, 8, 0));
    }

    #[test]
    fn spring_forward_gap_still_fires_once_that_day() {
        let tz = rome();
        // 2025-03-30: Rome jumps 02:00 -> 03:00. A 02:30 trigger has no valid
        // local instant; at 01:30 UTC the local clock reads 03:30.
        assert!(!summary_due(utc("2025-03-30T00:59:00Z"), tz, 2, 30));
        assert!(summary_due(utc("2025-03-30T01:30:00Z"), tz, 2, 30));
        assert_eq!(
            local_day(utc("2025-03-30T01:30:00Z"), tz),
            NaiveDate::from_ymd_opt(2025, 3, 30).unwrap()
        );
    }

    #[test]
    fn fall_back_day_is_25_hours_long() {
        let tz = rome();
        // 2025-10-26: Rome falls back 03:00 -> 02:00.
        let (start, end) =
            local_day_bounds(NaiveDate::from_ymd_opt(2025, 10, 26).unwrap(), tz);
        assert_eq!(end - start, Duration::hours(25));
    }

    #[test]
    fn spring_forward_day_is_23_hours_long() {
        let tz = rome();
        let (start, end) =
            local_day_bounds(NaiveDate::from_ymd_opt(2025, 3, 30).unwrap(), tz);
        assert_eq!(end - start, Duration::hours(23));
    }

    #[test]
    fn resolve_local_skips_the_gap() {
        let tz = rome();
        // 02:30 local does not exist on 2025-03-30; expect 03:00 local = 01:00 UTC.
        let naive = NaiveDate::from_ymd_opt(2025, 3, 30)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        assert_eq!(resolve_local(tz, naive), utc("2025-03-30T01:00:00Z"));
    }

    #[test]
    fn resolve_local_takes_earlier_ambiguous_instant() {
        let tz = rome();
        // 02:30 local occurs twice on 2025-10-26; the earlier is UTC+2.
        let naive = NaiveDate::from_ymd_opt(2025, 10, 26)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        assert_eq!(resolve_local(tz, naive), utc("2025-10-26T00:30:00Z"));
    }
}
