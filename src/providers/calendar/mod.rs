//! Calendar collaborator and availability helpers.
//!
//! The meeting gate only needs [`CalendarSource::is_busy_now`]. Backends that
//! can list events plug in through [`CalendarEventSource`] and are adapted by
//! [`EventListCalendar`].

pub mod availability;
mod event_list;
mod traits;

pub use event_list::{EventListCalendar, StaticEvents};
#[cfg(test)]
pub use traits::MockCalendarSource;
pub use traits::{
    BusyStatus, CalendarError, CalendarEvent, CalendarEventSource, CalendarSource, EventStatus,
    Result,
};
