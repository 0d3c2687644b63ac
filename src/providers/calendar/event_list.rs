//! Busy-now collaborator backed by an event list.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use tokio::sync::RwLock;

use super::availability::busy_status;
use super::traits::{BusyStatus, CalendarEvent, CalendarEventSource, CalendarSource, Result};
use crate::services::Clock;

/// How far ahead events are requested when answering `is_busy_now`.
const LOOKAHEAD_HOURS: i64 = 24;

/// Adapts a [`CalendarEventSource`] into a [`CalendarSource`].
pub struct EventListCalendar {
    source: Arc<dyn CalendarEventSource>,
    clock: Arc<dyn Clock>,
}

impl EventListCalendar {
    pub fn new(source: Arc<dyn CalendarEventSource>, clock: Arc<dyn Clock>) -> Self {
        Self { source, clock }
    }
}

#[async_trait]
impl CalendarSource for EventListCalendar {
    async fn is_busy_now(&self) -> Result<BusyStatus> {
        let events = self
            .source
            .upcoming_events(Duration::hours(LOOKAHEAD_HOURS))
            .await?;
        Ok(busy_status(&events, self.clock.now()))
    }
}

/// An event list held in memory, replaced wholesale by the host.
#[derive(Default)]
pub struct StaticEvents {
    events: RwLock<Vec<CalendarEvent>>,
}

impl StaticEvents {
    pub fn new(events: Vec<CalendarEvent>) -> Self {
        Self {
            events: RwLock::new(events),
        }
    }

    pub async fn replace(&self, events: Vec<CalendarEvent>) {
        *self.events.write().await = events;
    }
}

#[async_trait]
impl CalendarEventSource for StaticEvents {
    async fn upcoming_events(&self, _horizon: Duration) -> Result<Vec<CalendarEvent>> {
        Ok(self.events.read().await.clone())
    }
}
