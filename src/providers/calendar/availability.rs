//! Availability calculations over a list of calendar events.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};

use super::traits::{BusyStatus, CalendarEvent};

/// Step between candidate slots in [`next_available_slot`].
pub const SLOT_STEP_MINUTES: i64 = 15;

const BUSINESS_START_HOUR: u32 = 9;
const BUSINESS_END_HOUR: u32 = 17;

/// Whether the user is busy at `now`, and until when.
///
/// Back-to-back blocking events are merged, so a 10:00-10:20 meeting
/// followed by a 10:20-10:45 meeting reports `free_at` 10:45.
pub fn busy_status(events: &[CalendarEvent], now: DateTime<Utc>) -> BusyStatus {
    let blocking: Vec<&CalendarEvent> = events.iter().filter(|e| e.status.blocks_time()).collect();

    let Some(mut free_at) = blocking
        .iter()
        .filter(|e| e.start <= now && now < e.end)
        .map(|e| e.end)
        .max()
    else {
        return BusyStatus::free();
    };

    while let Some(end) = blocking
        .iter()
        .filter(|e| e.start <= free_at && free_at < e.end)
        .map(|e| e.end)
        .max()
    {
        free_at = end;
    }

    BusyStatus::busy_until(free_at)
}

/// Whether `[start, end)` is clear of blocking events padded by `buffer`.
///
/// Free and tentative events never conflict.
pub fn is_time_available(
    events: &[CalendarEvent],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    buffer: Duration,
) -> bool {
    events
        .iter()
        .filter(|e| e.status.blocks_time())
        .all(|e| {
            let conflict = start < e.end + buffer && end > e.start - buffer;
            if conflict {
                tracing::debug!(
                    event = %e.subject,
                    start = %e.start,
                    end = %e.end,
                    "Time conflict"
                );
            }
            !conflict
        })
}

fn in_business_hours(at: DateTime<Utc>) -> bool {
    !matches!(at.weekday(), Weekday::Sat | Weekday::Sun)
        && (BUSINESS_START_HOUR..BUSINESS_END_HOUR).contains(&at.hour())
}

/// Finds the first free slot of `duration` starting at or after
/// `preferred_start`, searching up to `max_search` ahead in 15-minute steps.
///
/// With `business_hours_only`, candidates must start Monday to Friday
/// between 09:00 and 17:00.
pub fn next_available_slot(
    events: &[CalendarEvent],
    preferred_start: DateTime<Utc>,
    duration: Duration,
    max_search: Duration,
    business_hours_only: bool,
) -> Option<DateTime<Utc>> {
    let search_end = preferred_start + max_search;
    let step = Duration::minutes(SLOT_STEP_MINUTES);
    let mut candidate = preferred_start;

    while candidate + duration <= search_end {
        let allowed = !business_hours_only || in_business_hours(candidate);
        if allowed && is_time_available(events, candidate, candidate + duration, Duration::zero())
        {
            return Some(candidate);
        }
        candidate += step;
    }

    tracing::warn!(
        max_search_hours = max_search.num_hours(),
        "No available slot found"
    );
    None
}
