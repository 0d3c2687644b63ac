//! Meeting-awareness gate.
//!
//! Asks the calendar whether the user is in a meeting before a cycle runs.
//! Calendar failures and timeouts fail open: the gate reports "not busy"
//! and logs the failure.

use std::sync::Arc;
use std::time::Duration;

use crate::providers::calendar::{BusyStatus, CalendarError, CalendarSource};

/// Wraps the calendar collaborator with the skip-during-meetings policy.
pub struct MeetingGate {
    calendar: Option<Arc<dyn CalendarSource>>,
    timeout: Duration,
}

impl MeetingGate {
    pub fn new(calendar: Option<Arc<dyn CalendarSource>>, timeout: Duration) -> Self {
        Self { calendar, timeout }
    }

    /// A gate with no calendar; always reports free.
    pub fn disabled() -> Self {
        Self::new(None, Duration::from_secs(10))
    }

    /// Current busy status.
    ///
    /// When `skip_during_meetings` is false the calendar is not consulted.
    pub async fn check_meeting(&self, skip_during_meetings: bool) -> BusyStatus {
        if !skip_during_meetings {
            return BusyStatus::free();
        }
        let Some(calendar) = &self.calendar else {
            return BusyStatus::free();
        };

        let result = match tokio::time::timeout(self.timeout, calendar.is_busy_now()).await {
            Ok(result) => result,
            Err(_) => Err(CalendarError::Timeout(self.timeout)),
        };

        match result {
            Ok(status) => {
                if status.busy {
                    tracing::debug!(free_at = ?status.free_at, "Calendar reports busy");
                }
                status
            }
            Err(e) => {
                tracing::warn!(error = %e, "Calendar check failed, assuming free");
                BusyStatus::free()
            }
        }
    }
}
