//! Check-cycle scheduler.
//!
//! One background loop drives cycles on the configured interval, reschedules
//! around meetings, and polls the popup countdown. At most one cycle is in
//! flight; ticks arriving while one runs are dropped, not queued.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::{CheckCycleConfig, ConfigError};
use crate::services::dispatcher::NotificationDispatcher;
use crate::services::orchestrator::{CycleError, CycleOutcome, PollOrchestrator};
use crate::services::Clock;

/// How often the loop checks the popup's auto-dismiss deadline.
const COUNTDOWN_POLL: Duration = Duration::from_millis(500);

/// Delay until the next scheduled cycle after `outcome`.
///
/// A meeting with a known end defers the cycle to `free_at + buffer`;
/// everything else waits a full `interval`.
pub fn next_cycle_delay(
    outcome: Option<&CycleOutcome>,
    now: DateTime<Utc>,
    interval: Duration,
    buffer: Duration,
) -> Duration {
    match outcome {
        Some(CycleOutcome::InMeeting {
            free_at: Some(free_at),
        }) => (*free_at - now).to_std().unwrap_or(Duration::ZERO) + buffer,
        _ => interval,
    }
}

type CycleResult = Result<CycleOutcome, CycleError>;

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Shared between the scheduler handle and its loop task.
struct Inner {
    orchestrator: Arc<PollOrchestrator>,
    dispatcher: Arc<NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    meeting_buffer: Duration,
    in_flight: AtomicBool,
    trigger: Notify,
    cycles_started: AtomicU64,
    ticks_dropped: AtomicU64,
}

impl Inner {
    /// Runs a cycle unless one is already in flight.
    async fn guarded_cycle(&self) -> Option<CycleResult> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.ticks_dropped.fetch_add(1, Ordering::SeqCst);
            tracing::warn!("Check cycle already in flight, dropping tick");
            return None;
        }
        let cycle = self.cycles_started.fetch_add(1, Ordering::SeqCst) + 1;

        let result = self.orchestrator.run_cycle().await;
        self.in_flight.store(false, Ordering::SeqCst);

        if let Err(e) = &result {
            tracing::error!(cycle, error = %e, "Check cycle failed");
        }
        Some(result)
    }

    /// Starts a cycle on its own task so the loop keeps polling timers.
    fn spawn_cycle(self: &Arc<Self>, done: mpsc::Sender<CycleResult>) {
        if self.in_flight.load(Ordering::SeqCst) {
            self.ticks_dropped.fetch_add(1, Ordering::SeqCst);
            tracing::warn!("Check cycle already in flight, dropping tick");
            return;
        }
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            if let Some(result) = inner.guarded_cycle().await {
                let _ = done.send(result).await;
            }
        });
    }

    async fn run_loop(self: Arc<Self>, cancel: CancellationToken) {
        let (done_tx, mut done_rx) = mpsc::channel::<CycleResult>(4);
        let mut next_tick = Instant::now();
        let mut countdown = tokio::time::interval(COUNTDOWN_POLL);
        countdown.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!("Scheduler started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep_until(next_tick) => {
                    let interval = self.orchestrator.config().await.interval();
                    next_tick = Instant::now() + interval;
                    self.spawn_cycle(done_tx.clone());
                }
                _ = self.trigger.notified() => {
                    tracing::debug!("Immediate check requested");
                    self.spawn_cycle(done_tx.clone());
                }
                Some(result) = done_rx.recv() => {
                    if let Ok(outcome @ CycleOutcome::InMeeting { .. }) = &result {
                        let interval = self.orchestrator.config().await.interval();
                        let delay = next_cycle_delay(
                            Some(outcome),
                            self.clock.now(),
                            interval,
                            self.meeting_buffer,
                        );
                        next_tick = Instant::now() + delay;
                        tracing::info!(delay_secs = delay.as_secs(), "Next check rescheduled after meeting");
                    }
                }
                _ = countdown.tick() => self.dispatcher.tick().await,
            }
        }
        tracing::info!("Scheduler stopped");
    }
}

/// Owns the background loop that drives check cycles.
pub struct Scheduler {
    inner: Arc<Inner>,
    running: Mutex<Option<Running>>,
}

impl Scheduler {
    pub fn new(
        orchestrator: Arc<PollOrchestrator>,
        dispatcher: Arc<NotificationDispatcher>,
        clock: Arc<dyn Clock>,
        meeting_buffer: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                orchestrator,
                dispatcher,
                clock,
                meeting_buffer,
                in_flight: AtomicBool::new(false),
                trigger: Notify::new(),
                cycles_started: AtomicU64::new(0),
                ticks_dropped: AtomicU64::new(0),
            }),
            running: Mutex::new(None),
        }
    }

    /// Validates `config` and starts the loop, restarting it if running.
    /// The first cycle runs immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for a malformed configuration; the
    /// scheduler is left untouched in that case.
    pub async fn start(&self, config: CheckCycleConfig) -> Result<(), ConfigError> {
        self.inner.orchestrator.update_config(config).await?;

        let mut running = self.running.lock().await;
        if let Some(previous) = running.take() {
            previous.cancel.cancel();
            let _ = previous.handle.await;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(&self.inner).run_loop(cancel.clone()));
        *running = Some(Running { cancel, handle });
        Ok(())
    }

    /// Cancels the pending tick. A cycle already in flight finishes and its
    /// results are kept.
    pub async fn stop(&self) {
        if let Some(running) = self.running.lock().await.take() {
            running.cancel.cancel();
            let _ = running.handle.await;
        }
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Asks the running loop to start a cycle now, outside the interval.
    pub fn trigger_immediate_check(&self) {
        self.inner.trigger.notify_one();
    }

    /// Runs a cycle on the caller's task. Returns `None` if one is in flight.
    pub async fn run_cycle_now(&self) -> Option<CycleResult> {
        self.inner.guarded_cycle().await
    }

    pub fn cycles_started(&self) -> u64 {
        self.inner.cycles_started.load(Ordering::SeqCst)
    }

    pub fn ticks_dropped(&self) -> u64 {
        self.inner.ticks_dropped.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IncomingEmail, ProviderProfile, TimeRange};
    use crate::providers::ai::{MockSummaryProvider, SummaryProvider};
    use crate::providers::calendar::{BusyStatus, CalendarSource, MockCalendarSource};
    use crate::providers::email::{MailError, MailSource, MockMailSource};
    use crate::services::meeting_gate::MeetingGate;
    use crate::services::provider_chain::{BackoffPolicy, ProviderChain};
    use crate::services::reminder_store::{ReminderStore, SharedStore};
    use crate::services::ManualClock;
    use async_trait::async_trait;
    use chrono::{TimeZone, Weekday};
    use std::sync::atomic::AtomicUsize;

    fn monday(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, h, m, 0).unwrap()
    }

    fn config() -> CheckCycleConfig {
        CheckCycleConfig {
            interval_minutes: 15,
            max_messages_per_check: 20,
            active_days: vec![Weekday::Mon],
            active_hours: TimeRange::from_hm((9, 0), (17, 0)).unwrap(),
            quiet_hours: TimeRange::from_hm((12, 0), (13, 0)),
            skip_during_meetings: true,
            default_snooze_minutes: 60,
        }
    }

    fn counting_mail(calls: Arc<AtomicUsize>) -> MockMailSource {
        let mut mail = MockMailSource::new();
        mail.expect_fetch_unread().returning(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        });
        mail
    }

    fn scheduler(
        mail: Arc<dyn MailSource>,
        calendar: Option<Arc<dyn CalendarSource>>,
    ) -> Scheduler {
        scheduler_with_store(mail, calendar).0
    }

    fn scheduler_with_store(
        mail: Arc<dyn MailSource>,
        calendar: Option<Arc<dyn CalendarSource>>,
    ) -> (Scheduler, SharedStore) {
        let store = ReminderStore::shared();
        let clock = Arc::new(ManualClock::new(monday(10, 0)));
        let mut provider = MockSummaryProvider::new();
        provider.expect_input_budget().return_const(8_000usize);
        provider
            .expect_summarize()
            .returning(|_| Ok("summary".to_string()));
        let provider: Arc<dyn SummaryProvider> = Arc::new(provider);

        let chain = ProviderChain::new(
            vec![(ProviderProfile::new("p", 0, true), provider)],
            BackoffPolicy::default(),
            clock.clone(),
        )
        .unwrap();
        let dispatcher = Arc::new(NotificationDispatcher::default());
        let orchestrator = Arc::new(PollOrchestrator::new(
            config(),
            clock.clone(),
            mail,
            MeetingGate::new(calendar, Duration::from_secs(5)),
            Arc::new(chain),
            store.clone(),
            dispatcher.clone(),
        ));

        let scheduler = Scheduler::new(orchestrator, dispatcher, clock, Duration::from_secs(60));
        (scheduler, store)
    }

    #[test]
    fn meeting_defers_to_free_at_plus_buffer() {
        let outcome = CycleOutcome::InMeeting {
            free_at: Some(monday(10, 20)),
        };
        let delay = next_cycle_delay(
            Some(&outcome),
            monday(10, 0),
            Duration::from_secs(15 * 60),
            Duration::from_secs(60),
        );
        assert_eq!(delay, Duration::from_secs(21 * 60));
    }

    #[test]
    fn meeting_already_over_waits_only_buffer() {
        let outcome = CycleOutcome::InMeeting {
            free_at: Some(monday(9, 50)),
        };
        let delay = next_cycle_delay(
            Some(&outcome),
            monday(10, 0),
            Duration::from_secs(900),
            Duration::from_secs(60),
        );
        assert_eq!(delay, Duration::from_secs(60));
    }

    #[test]
    fn other_outcomes_wait_interval() {
        let interval = Duration::from_secs(900);
        let unknown_end = CycleOutcome::InMeeting { free_at: None };
        assert_eq!(
            next_cycle_delay(Some(&unknown_end), monday(10, 0), interval, Duration::ZERO),
            interval
        );
        assert_eq!(
            next_cycle_delay(None, monday(10, 0), interval, Duration::ZERO),
            interval
        );
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_config_prevents_start() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scheduler = scheduler(Arc::new(counting_mail(calls)), None);
        let mut bad = config();
        bad.quiet_hours = TimeRange::from_hm((12, 0), (12, 0));

        assert!(scheduler.start(bad).await.is_err());
        assert!(!scheduler.is_running().await);
    }

    #[tokio::test(start_paused = true)]
    async fn runs_on_interval_until_stopped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scheduler = scheduler(Arc::new(counting_mail(calls.clone())), None);

        scheduler.start(config()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(15 * 60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        scheduler.stop().await;
        tokio::time::sleep(Duration::from_secs(60 * 60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!scheduler.is_running().await);
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_trigger_runs_extra_cycle() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scheduler = scheduler(Arc::new(counting_mail(calls.clone())), None);

        scheduler.start(config()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        scheduler.trigger_immediate_check();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_cycle_does_not_stop_ticks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut mail = MockMailSource::new();
        mail.expect_fetch_unread().returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(MailError::Connection("offline".to_string()))
            } else {
                Ok(Vec::<IncomingEmail>::new())
            }
        });
        let scheduler = scheduler(Arc::new(mail), None);

        scheduler.start(config()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(15 * 60 + 1)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.cycles_started(), 2);
        scheduler.stop().await;
    }

    /// Mail source that never answers, keeping a cycle in flight.
    struct StalledMail {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MailSource for StalledMail {
        async fn fetch_unread(&self, _limit: usize) -> crate::providers::email::Result<Vec<IncomingEmail>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }

        async fn mark_read(&self, _id: &crate::domain::MessageId) -> crate::providers::email::Result<()> {
            Ok(())
        }

        async fn send_reply(
            &self,
            _id: &crate::domain::MessageId,
            _body: &str,
        ) -> crate::providers::email::Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_ticks_are_dropped() {
        let mail = Arc::new(StalledMail {
            calls: AtomicUsize::new(0),
        });
        let scheduler = scheduler(mail.clone(), None);

        scheduler.start(config()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        scheduler.trigger_immediate_check();
        tokio::time::sleep(Duration::from_secs(15 * 60)).await;

        assert_eq!(mail.calls.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.ticks_dropped(), 2);
        assert!(scheduler.run_cycle_now().await.is_none());

        // Stopping does not wait for the stalled cycle
        scheduler.stop().await;
    }

    /// Mail source that takes ten seconds to return one message.
    struct SlowMail {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MailSource for SlowMail {
        async fn fetch_unread(&self, _limit: usize) -> crate::providers::email::Result<Vec<IncomingEmail>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(vec![IncomingEmail {
                id: crate::domain::MessageId::from("late"),
                sender: "alice@example.com".to_string(),
                subject: "Late arrival".to_string(),
                received_at: monday(9, 58),
                body_preview: "Sorry for the delay.".to_string(),
            }])
        }

        async fn mark_read(&self, _id: &crate::domain::MessageId) -> crate::providers::email::Result<()> {
            Ok(())
        }

        async fn send_reply(
            &self,
            _id: &crate::domain::MessageId,
            _body: &str,
        ) -> crate::providers::email::Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stop_keeps_results_of_in_flight_cycle() {
        let mail = Arc::new(SlowMail {
            calls: AtomicUsize::new(0),
        });
        let (scheduler, store) = scheduler_with_store(mail.clone(), None);

        scheduler.start(config()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        scheduler.stop().await;
        assert!(!scheduler.is_running().await);

        tokio::time::sleep(Duration::from_secs(20)).await;
        let store = store.lock().await;
        assert_eq!(store.messages().len(), 1);
        assert!(store.message(&crate::domain::MessageId::from("late")).is_some());
        drop(store);

        tokio::time::sleep(Duration::from_secs(60 * 60)).await;
        assert_eq!(mail.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn meeting_reschedules_next_cycle() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let checks = Arc::new(AtomicUsize::new(0));
        let counter = checks.clone();
        let mut calendar = MockCalendarSource::new();
        calendar.expect_is_busy_now().returning(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(BusyStatus::busy_until(monday(10, 20)))
            } else {
                Ok(BusyStatus::free())
            }
        });
        let scheduler = scheduler(
            Arc::new(counting_mail(fetches.clone())),
            Some(Arc::new(calendar) as Arc<dyn CalendarSource>),
        );

        scheduler.start(config()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(16 * 60)).await;
        assert_eq!(checks.load(Ordering::SeqCst), 1);
        assert_eq!(fetches.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(5 * 60 + 1)).await;
        assert_eq!(checks.load(Ordering::SeqCst), 2);
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        scheduler.stop().await;
    }
}
