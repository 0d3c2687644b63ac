//! Notification dispatcher.
//!
//! Owns the popup state machine and pushes [`UiEvent`]s to the UI over a
//! broadcast channel. The UI never reports its state back; everything the
//! dispatcher knows comes from pending counts, due reminders and user
//! commands.
//!
//! ```text
//!   Hidden ──show──▶ CountingDown ──keep open──▶ KeptOpen
//!     ▲                 │  │                        │
//!     └──── expiry ─────┘  └──── dismiss ───────────┴──▶ Hidden
//! ```
//!
//! A global snooze hides the popup from any state. A closed check window only
//! keeps a hidden popup from showing; a visible one stays up.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tokio::time::Instant;

use crate::domain::Reminder;

/// Default countdown before a popup hides itself.
pub const DEFAULT_AUTO_DISMISS: Duration = Duration::from_secs(10);

/// Events delivered to the UI collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    Show { count: usize },
    UpdateCount { count: usize },
    Hide,
    ReminderDue(Reminder),
}

/// Whether the popup may be on screen right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Allowed,
    /// Outside the active window or days.
    WindowClosed,
    /// A global snooze is active.
    Suppressed,
}

impl Visibility {
    pub fn from_window(window_open: bool, suppressed: bool) -> Self {
        if suppressed {
            Visibility::Suppressed
        } else if window_open {
            Visibility::Allowed
        } else {
            Visibility::WindowClosed
        }
    }
}

/// Popup visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupState {
    Hidden,
    /// Visible, hiding itself at `deadline`.
    CountingDown { deadline: Instant },
    /// Visible until explicitly dismissed.
    KeptOpen,
}

impl PopupState {
    pub fn is_visible(&self) -> bool {
        !matches!(self, PopupState::Hidden)
    }
}

/// Snapshot of the dispatcher's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationState {
    pub popup: PopupState,
    /// Last reported pending count.
    pub count: usize,
    /// Pending count the user has already seen and dismissed.
    pub acknowledged: usize,
}

/// The popup state machine, independent of any channel.
#[derive(Debug)]
struct Popup {
    state: PopupState,
    count: usize,
    acknowledged: usize,
    auto_dismiss: Duration,
}

impl Popup {
    fn new(auto_dismiss: Duration) -> Self {
        Self {
            state: PopupState::Hidden,
            count: 0,
            acknowledged: 0,
            auto_dismiss,
        }
    }

    fn show(&mut self, now: Instant) -> UiEvent {
        self.state = PopupState::CountingDown {
            deadline: now + self.auto_dismiss,
        };
        UiEvent::Show { count: self.count }
    }

    fn hide(&mut self) -> Option<UiEvent> {
        if !self.state.is_visible() {
            return None;
        }
        self.state = PopupState::Hidden;
        self.acknowledged = self.count;
        Some(UiEvent::Hide)
    }

    /// Applies a new pending count.
    ///
    /// A hidden popup shows whenever the count exceeds what the user last
    /// dismissed, not only when it rises from zero. A visible popup only
    /// updates its count; it leaves on expiry, dismissal or global snooze.
    fn report_pending(
        &mut self,
        count: usize,
        visibility: Visibility,
        now: Instant,
    ) -> Vec<UiEvent> {
        let previous = self.count;
        self.count = count;
        self.acknowledged = self.acknowledged.min(count);

        match (self.state, visibility) {
            (_, Visibility::Suppressed) => self.hide().into_iter().collect(),
            (PopupState::Hidden, Visibility::Allowed) if count > self.acknowledged => {
                vec![self.show(now)]
            }
            (PopupState::Hidden, _) => Vec::new(),
            _ if count != previous => vec![UiEvent::UpdateCount { count }],
            _ => Vec::new(),
        }
    }

    fn reminder_due(
        &mut self,
        reminder: Reminder,
        visibility: Visibility,
        now: Instant,
    ) -> Vec<UiEvent> {
        if visibility != Visibility::Allowed {
            return Vec::new();
        }
        let mut events = vec![UiEvent::ReminderDue(reminder)];
        if !self.state.is_visible() {
            events.insert(0, self.show(now));
        }
        events
    }

    fn keep_open(&mut self) -> bool {
        match self.state {
            PopupState::CountingDown { .. } => {
                self.state = PopupState::KeptOpen;
                true
            }
            _ => false,
        }
    }

    fn tick(&mut self, now: Instant) -> Option<UiEvent> {
        match self.state {
            PopupState::CountingDown { deadline } if now >= deadline => self.hide(),
            _ => None,
        }
    }

    fn snapshot(&self) -> NotificationState {
        NotificationState {
            popup: self.state,
            count: self.count,
            acknowledged: self.acknowledged,
        }
    }
}

/// Pushes popup and reminder events to the UI.
pub struct NotificationDispatcher {
    popup: Mutex<Popup>,
    event_sender: broadcast::Sender<UiEvent>,
}

impl NotificationDispatcher {
    pub fn new(auto_dismiss: Duration) -> Self {
        let (event_sender, _) = broadcast::channel(100);
        Self {
            popup: Mutex::new(Popup::new(auto_dismiss)),
            event_sender,
        }
    }

    /// Subscribes to UI events.
    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.event_sender.subscribe()
    }

    fn emit(&self, events: impl IntoIterator<Item = UiEvent>) {
        for event in events {
            tracing::debug!(event = ?event, "UI event");
            let _ = self.event_sender.send(event);
        }
    }

    pub async fn set_auto_dismiss(&self, auto_dismiss: Duration) {
        self.popup.lock().await.auto_dismiss = auto_dismiss;
    }

    /// Reports the current pending count.
    pub async fn report_pending(&self, count: usize, visibility: Visibility) {
        let mut popup = self.popup.lock().await;
        let events = popup.report_pending(count, visibility, Instant::now());
        self.emit(events);
    }

    /// Announces a due reminder, showing the popup if hidden.
    pub async fn reminder_due(&self, reminder: Reminder, visibility: Visibility) {
        let mut popup = self.popup.lock().await;
        let events = popup.reminder_due(reminder, visibility, Instant::now());
        self.emit(events);
    }

    /// Cancels the countdown. Returns false if the popup was not counting down.
    pub async fn keep_open(&self) -> bool {
        self.popup.lock().await.keep_open()
    }

    /// Hides the popup if visible.
    pub async fn dismiss(&self) {
        let mut popup = self.popup.lock().await;
        let event = popup.hide();
        self.emit(event);
    }

    /// Hides the popup when expiring its countdown at the current instant.
    pub async fn tick(&self) {
        let mut popup = self.popup.lock().await;
        let event = popup.tick(Instant::now());
        self.emit(event);
    }

    pub async fn state(&self) -> NotificationState {
        self.popup.lock().await.snapshot()
    }
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_AUTO_DISMISS)
    }
}
