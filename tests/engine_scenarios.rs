//! End-to-end check-cycle scenarios driven through the public engine API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc, Weekday};
use pretty_assertions::assert_eq;

use mailwatch::config::{CheckCycleConfig, Settings};
use mailwatch::domain::{IncomingEmail, MessageId, ProviderProfile, TimeRange};
use mailwatch::providers::ai::{LlmError, LlmResult, SummaryProvider};
use mailwatch::providers::calendar::{
    BusyStatus, CalendarEvent, CalendarSource, EventListCalendar, StaticEvents,
};
use mailwatch::providers::email::InMemoryMailbox;
use mailwatch::services::{
    next_cycle_delay, Clock, CycleOutcome, CycleReport, ManualClock, ReasonCode, UiEvent,
};
use mailwatch::{Collaborators, MonitorEngine, UiCommand};

fn monday(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, h, m, 0).unwrap()
}

fn scenario_config() -> CheckCycleConfig {
    CheckCycleConfig {
        interval_minutes: 15,
        max_messages_per_check: 20,
        active_days: vec![
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
        ],
        active_hours: TimeRange::from_hm((9, 0), (17, 0)).unwrap(),
        quiet_hours: TimeRange::from_hm((12, 0), (13, 0)),
        skip_during_meetings: true,
        default_snooze_minutes: 60,
    }
}

/// Provider that either always rate-limits or always echoes a summary.
struct ScriptedProvider {
    name: String,
    rate_limited: bool,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(name: &str, rate_limited: bool) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            rate_limited,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SummaryProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_budget(&self) -> usize {
        8_000
    }

    async fn summarize(&self, text: &str) -> LlmResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.rate_limited {
            return Err(LlmError::RateLimited {
                retry_after_secs: None,
            });
        }
        let subject = text.lines().nth(1).unwrap_or_default();
        Ok(format!("{} says: {subject}", self.name))
    }

    async fn draft_reply(&self, _text: &str, instructions: &str) -> LlmResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("Draft: {instructions}"))
    }

    async fn generate_task(&self, text: &str) -> LlmResult<String> {
        self.summarize(text).await.map(|summary| format!("Title: {summary}"))
    }

    async fn test_connection(&self) -> LlmResult<()> {
        self.summarize("ping").await.map(|_| ())
    }
}

/// Counts calendar checks so tests can tell a skipped tick from a busy one.
struct CountingCalendar {
    inner: EventListCalendar,
    checks: AtomicUsize,
}

#[async_trait]
impl CalendarSource for CountingCalendar {
    async fn is_busy_now(&self) -> mailwatch::providers::calendar::Result<BusyStatus> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.inner.is_busy_now().await
    }
}

struct Scenario {
    engine: MonitorEngine,
    clock: Arc<ManualClock>,
    mailbox: Arc<InMemoryMailbox>,
    events: Arc<StaticEvents>,
    calendar: Arc<CountingCalendar>,
    openai: Arc<ScriptedProvider>,
    anthropic: Arc<ScriptedProvider>,
}

async fn scenario(now: DateTime<Utc>) -> Scenario {
    let clock = Arc::new(ManualClock::new(now));
    let mailbox = Arc::new(InMemoryMailbox::new());
    for (i, subject) in ["Invoice overdue", "Offsite agenda", "Contract redlines"]
        .iter()
        .enumerate()
    {
        mailbox
            .deliver(IncomingEmail {
                id: MessageId::from(format!("msg-{i}")),
                sender: "ops@example.com".to_string(),
                subject: subject.to_string(),
                received_at: monday(8, i as u32),
                body_preview: "Details inside.".to_string(),
            })
            .await;
    }

    let events = Arc::new(StaticEvents::default());
    let calendar = Arc::new(CountingCalendar {
        inner: EventListCalendar::new(events.clone(), clock.clone()),
        checks: AtomicUsize::new(0),
    });
    let openai = ScriptedProvider::new("openai", true);
    let anthropic = ScriptedProvider::new("anthropic", false);

    let mut settings = Settings::default();
    settings.check = scenario_config();
    let engine = MonitorEngine::new(
        &settings,
        Collaborators {
            mail: mailbox.clone(),
            calendar: Some(calendar.clone() as Arc<dyn CalendarSource>),
            providers: vec![
                (
                    ProviderProfile::new("openai", 0, true),
                    openai.clone() as Arc<dyn SummaryProvider>,
                ),
                (
                    ProviderProfile::new("anthropic", 1, true),
                    anthropic.clone() as Arc<dyn SummaryProvider>,
                ),
            ],
            clock: clock.clone(),
        },
    )
    .unwrap();

    Scenario {
        engine,
        clock,
        mailbox,
        events,
        calendar,
        openai,
        anthropic,
    }
}

fn standup() -> CalendarEvent {
    CalendarEvent::new("evt-1", "Standup", monday(10, 0), monday(10, 20))
}

#[tokio::test]
async fn quiet_hours_cycle_returns_before_any_io() {
    let s = scenario(monday(12, 30)).await;

    let outcome = s.engine.run_cycle_now().await.unwrap();

    assert_eq!(
        outcome,
        Some(CycleOutcome::Ineligible(ReasonCode::QuietHours))
    );
    assert_eq!(s.calendar.checks.load(Ordering::SeqCst), 0);
    assert!(s.engine.messages().await.is_empty());
    assert_eq!(s.openai.calls() + s.anthropic.calls(), 0);
}

#[tokio::test]
async fn busy_calendar_pushes_next_cycle_past_meeting() {
    let s = scenario(monday(10, 0)).await;
    s.events.replace(vec![standup()]).await;

    let outcome = s.engine.run_cycle_now().await.unwrap().unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::InMeeting {
            free_at: Some(monday(10, 20))
        }
    );
    assert!(s.engine.messages().await.is_empty());

    let delay = next_cycle_delay(
        Some(&outcome),
        s.clock.now(),
        Duration::from_secs(15 * 60),
        Duration::from_secs(60),
    );
    assert_eq!(delay, Duration::from_secs(21 * 60));
}

#[tokio::test(start_paused = true)]
async fn scheduler_waits_for_meeting_end_instead_of_interval() {
    let s = scenario(monday(10, 0)).await;
    s.events.replace(vec![standup()]).await;

    s.engine.start(scenario_config()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(16 * 60)).await;

    // Only the initial check ran; the 10:15 tick was replaced by 10:21
    assert_eq!(s.calendar.checks.load(Ordering::SeqCst), 1);
    assert!(s.engine.messages().await.is_empty());

    s.clock.set(monday(10, 21));
    tokio::time::sleep(Duration::from_secs(5 * 60 + 1)).await;

    assert_eq!(s.calendar.checks.load(Ordering::SeqCst), 2);
    assert_eq!(s.engine.messages().await.len(), 3);
    s.engine.stop().await;
}

#[tokio::test]
async fn rate_limited_primary_falls_back_for_every_message() {
    let s = scenario(monday(16, 0)).await;
    s.events.replace(vec![standup()]).await;

    let outcome = s.engine.run_cycle_now().await.unwrap().unwrap();
    let CycleOutcome::Completed(report) = outcome else {
        panic!("expected completed cycle, got {outcome:?}");
    };
    assert_eq!(
        report,
        CycleReport {
            fetched: 3,
            created: 3,
            summarized: 3,
            summaries_unavailable: 0,
            pending_count: 3,
            reminders_due: 0,
        }
    );

    let summaries: Vec<String> = s
        .engine
        .messages()
        .await
        .into_iter()
        .map(|m| m.summary.unwrap().display_text().to_string())
        .collect();
    assert_eq!(
        summaries,
        vec![
            "anthropic says: Subject: Contract redlines",
            "anthropic says: Subject: Offsite agenda",
            "anthropic says: Subject: Invoice overdue",
        ]
    );

    // OpenAI was tried once, then skipped while backing off
    assert_eq!(s.openai.calls(), 1);
    assert_eq!(s.anthropic.calls(), 3);
    let profiles = s.engine.provider_profiles().await;
    assert_eq!(profiles[0].name, "openai");
    assert_eq!(profiles[0].failure_count, 1);
    assert_eq!(
        profiles[0].backoff_until,
        Some(monday(16, 0) + chrono::Duration::seconds(30))
    );
    assert_eq!(profiles[1].backoff_until, None);
}

#[tokio::test]
async fn repeated_polls_keep_one_row_per_message() {
    let s = scenario(monday(16, 0)).await;

    s.engine.run_cycle_now().await.unwrap();
    s.clock.set(monday(16, 15));
    let second = s.engine.run_cycle_now().await.unwrap().unwrap();

    assert!(matches!(
        second,
        CycleOutcome::Completed(CycleReport {
            fetched: 3,
            created: 0,
            ..
        })
    ));
    assert_eq!(s.engine.messages().await.len(), 3);
    assert_eq!(s.anthropic.calls(), 3);
}

#[tokio::test]
async fn ui_commands_drive_popup() {
    let s = scenario(monday(16, 0)).await;
    let mut rx = s.engine.subscribe();

    s.engine.run_cycle_now().await.unwrap();
    assert_eq!(rx.try_recv().unwrap(), UiEvent::Show { count: 3 });

    s.engine
        .apply(UiCommand::SnoozeMessage {
            id: MessageId::from("msg-0"),
            minutes: Some(30),
        })
        .await
        .unwrap();
    assert_eq!(rx.try_recv().unwrap(), UiEvent::UpdateCount { count: 2 });

    s.engine
        .apply(UiCommand::MarkRead {
            id: MessageId::from("msg-1"),
        })
        .await
        .unwrap();
    assert!(s.mailbox.is_read(&MessageId::from("msg-1")).await);
    assert_eq!(rx.try_recv().unwrap(), UiEvent::UpdateCount { count: 1 });

    s.engine.apply(UiCommand::KeepPopupOpen).await.unwrap();
    s.engine
        .apply(UiCommand::GlobalSnooze { minutes: 60 })
        .await
        .unwrap();
    assert_eq!(rx.try_recv().unwrap(), UiEvent::Hide);

    // Still suppressed on the next cycle
    s.clock.set(monday(16, 30));
    s.engine.run_cycle_now().await.unwrap();
    assert!(rx.try_recv().is_err());

    // Clearing the global snooze brings back the message whose own snooze lapsed
    s.clock.set(monday(16, 59));
    assert_eq!(s.engine.pending_count().await, 0);
    s.engine.apply(UiCommand::ClearGlobalSnooze).await.unwrap();
    assert_eq!(s.engine.pending_count().await, 2);
}

#[tokio::test]
async fn create_task_command_adds_reminder_from_fallback_provider() {
    let s = scenario(monday(16, 0)).await;
    s.engine.run_cycle_now().await.unwrap();

    s.engine
        .apply(UiCommand::CreateTask {
            id: MessageId::from("msg-2"),
        })
        .await
        .unwrap();

    let reminders = s
        .engine
        .reminders_for_message(&MessageId::from("msg-2"), true)
        .await;
    assert_eq!(reminders.len(), 1);
    assert_eq!(
        reminders[0].text,
        "anthropic says: Subject: Contract redlines"
    );
    assert_eq!(reminders[0].due_at, monday(17, 0));
    // OpenAI is still backing off from the cycle's rate limit
    assert_eq!(s.openai.calls(), 1);
}

#[tokio::test]
async fn mark_read_of_unknown_message_is_rejected() {
    let s = scenario(monday(16, 0)).await;
    s.engine.run_cycle_now().await.unwrap();

    let result = s
        .engine
        .apply(UiCommand::MarkRead {
            id: MessageId::from("missing"),
        })
        .await;
    assert!(result.is_err());
}
