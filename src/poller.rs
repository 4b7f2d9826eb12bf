//! Approval status poller: watches a pending employer account until the
//! backend approves or rejects it.
//!
//! The first query runs immediately, then once per interval. Queries are
//! awaited serially, so at most one is in flight; ticks missed while a slow
//! query runs are skipped rather than queued. A failed query is reported and
//! the loop keeps going. Approval or rejection ends the loop, so each is
//! emitted at most once.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::api::OnboardingBackend;
use crate::registration::AccountStatus;
use crate::session::SessionStore;

/// Shortest interval the poller runs at; shorter requests are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What one poll tick observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PollEvent {
    Pending,
    Approved,
    Rejected { reason: Option<String> },
    QueryFailed { error: String },
}

/// Spawns status polling tasks.
#[derive(Clone)]
pub struct StatusPoller {
    backend: Arc<dyn OnboardingBackend>,
    session: Option<Arc<SessionStore>>,
}

impl StatusPoller {
    pub fn new(backend: Arc<dyn OnboardingBackend>) -> Self {
        Self {
            backend,
            session: None,
        }
    }

    /// Keep the session user's cached status in step with what is polled.
    pub fn with_session(mut self, session: Arc<SessionStore>) -> Self {
        self.session = Some(session);
        self
    }

    /// Start polling `user_id`. Events arrive on the returned receiver, which
    /// closes when polling ends for any reason.
    pub fn start(
        &self,
        user_id: impl Into<String>,
        interval: Duration,
    ) -> (PollerHandle, mpsc::UnboundedReceiver<PollEvent>) {
        let user_id = user_id.into();
        let interval = if interval < MIN_POLL_INTERVAL {
            warn!(
                user_id = %user_id,
                requested_ms = interval.as_millis() as u64,
                "Poll interval too short; using minimum"
            );
            MIN_POLL_INTERVAL
        } else {
            interval
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let backend = Arc::clone(&self.backend);
        let session = self.session.clone();
        let task = tokio::spawn(async move {
            info!(user_id = %user_id, interval_ms = interval.as_millis() as u64, "Status poller started");
            poll_loop(backend, session, &user_id, interval, shutdown_rx, event_tx).await;
            info!(user_id = %user_id, "Status poller stopped");
        });

        (
            PollerHandle {
                shutdown_tx,
                task: Some(task),
            },
            event_rx,
        )
    }
}

async fn poll_loop(
    backend: Arc<dyn OnboardingBackend>,
    session: Option<Arc<SessionStore>>,
    user_id: &str,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    events: mpsc::UnboundedSender<PollEvent>,
) {
    let mut tick = tokio::time::interval(interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => return,
            _ = tick.tick() => {}
        }
        if *shutdown_rx.borrow() {
            return;
        }

        // A stop during the query discards its result.
        let result = tokio::select! {
            biased;
            _ = shutdown_rx.changed() => return,
            result = backend.get_employer_status(user_id) => result,
        };

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                warn!(user_id, error = %e, "Status query failed; will retry next interval");
                let _ = events.send(PollEvent::QueryFailed {
                    error: e.to_string(),
                });
                continue;
            }
        };

        debug!(user_id, status = %report.status, "Polled employer status");
        if report.status != AccountStatus::Pending
            && let Some(ref session) = session
            && let Err(e) = session.update_status(user_id, report.status).await
        {
            warn!(user_id, error = %e, "Failed to update cached session status");
        }

        match report.status {
            AccountStatus::Pending => {
                let _ = events.send(PollEvent::Pending);
            }
            AccountStatus::Approved => {
                info!(user_id, "Employer account approved");
                let _ = events.send(PollEvent::Approved);
                return;
            }
            AccountStatus::Rejected => {
                info!(user_id, reason = ?report.rejection_reason, "Employer account rejected");
                let _ = events.send(PollEvent::Rejected {
                    reason: report.rejection_reason,
                });
                return;
            }
        }
    }
}

/// Owner's handle on a running poller. Dropping it stops the poller.
pub struct PollerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Stop polling. Safe to call any number of times, including after the
    /// poller stopped on its own.
    pub fn stop(&self) {
        if !self.shutdown_tx.send_replace(true) {
            debug!("Status poller stop requested");
        }
    }

    /// Whether the poller has stopped or been asked to.
    pub fn is_stopped(&self) -> bool {
        *self.shutdown_tx.borrow() || self.task.as_ref().is_none_or(|t| t.is_finished())
    }

    /// Wait for the polling task to exit.
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "Status poller task failed");
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::api::testing::{FakeBackend, ScriptedStatus};
    use crate::session::SessionUser;

    const MINUTE: Duration = Duration::from_secs(60);

    async fn collect(mut rx: mpsc::UnboundedReceiver<PollEvent>) -> Vec<PollEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    fn pending(n: usize) -> Vec<ScriptedStatus> {
        vec![ScriptedStatus::Report(AccountStatus::Pending, None); n]
    }

    #[tokio::test(start_paused = true)]
    async fn approval_is_signalled_exactly_once() {
        let fake = FakeBackend::new();
        let mut script = pending(2);
        script.push(ScriptedStatus::Report(AccountStatus::Approved, None));
        script.push(ScriptedStatus::Report(AccountStatus::Approved, None));
        fake.script_statuses(script);

        let (mut handle, rx) = StatusPoller::new(fake.clone()).start("EMP-1", MINUTE);
        let events = collect(rx).await;
        handle.join().await;

        assert_eq!(
            events,
            vec![PollEvent::Pending, PollEvent::Pending, PollEvent::Approved]
        );
        assert_eq!(fake.status_count(), 3);
        assert!(handle.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_keeps_polling() {
        let fake = FakeBackend::new();
        fake.script_statuses(vec![
            ScriptedStatus::Report(AccountStatus::Pending, None),
            ScriptedStatus::Fail,
            ScriptedStatus::Report(AccountStatus::Pending, None),
            ScriptedStatus::Report(AccountStatus::Approved, None),
        ]);

        let (_handle, rx) = StatusPoller::new(fake.clone()).start("EMP-1", MINUTE);
        let events = collect(rx).await;

        assert_eq!(events.len(), 4);
        assert!(matches!(events[1], PollEvent::QueryFailed { .. }));
        assert_eq!(events[2], PollEvent::Pending);
        assert_eq!(events[3], PollEvent::Approved);
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_stops_with_reason() {
        let fake = FakeBackend::new();
        fake.script_statuses(vec![ScriptedStatus::Report(
            AccountStatus::Rejected,
            Some("Documents unclear".into()),
        )]);

        let (_handle, rx) = StatusPoller::new(fake.clone()).start("EMP-1", MINUTE);
        let events = collect(rx).await;

        assert_eq!(
            events,
            vec![PollEvent::Rejected {
                reason: Some("Documents unclear".into())
            }]
        );
        // No further queries after rejection
        tokio::time::sleep(MINUTE * 3).await;
        assert_eq!(fake.status_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_halts_ticks() {
        let fake = FakeBackend::new();
        let (mut handle, mut rx) = StatusPoller::new(fake.clone()).start("EMP-1", MINUTE);

        assert_eq!(rx.recv().await, Some(PollEvent::Pending));
        handle.stop();
        handle.stop();
        handle.join().await;
        handle.stop();

        assert!(rx.recv().await.is_none());
        let calls = fake.status_count();
        tokio::time::sleep(MINUTE * 5).await;
        assert_eq!(fake.status_count(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_queries_never_overlap() {
        let fake = FakeBackend::new();
        fake.set_status_delay(Duration::from_secs(150));
        let (handle, mut rx) = StatusPoller::new(fake.clone()).start("EMP-1", MINUTE);

        for _ in 0..3 {
            assert_eq!(rx.recv().await, Some(PollEvent::Pending));
        }
        handle.stop();
        assert_eq!(fake.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_query_discards_result() {
        let fake = FakeBackend::new();
        fake.set_status_delay(Duration::from_secs(30));
        fake.script_statuses(vec![ScriptedStatus::Report(AccountStatus::Approved, None)]);
        let (mut handle, rx) = StatusPoller::new(fake.clone()).start("EMP-1", MINUTE);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fake.status_count(), 1);
        handle.stop();
        handle.join().await;

        assert!(collect(rx).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_stops_poller() {
        let fake = FakeBackend::new();
        let (handle, mut rx) = StatusPoller::new(fake.clone()).start("EMP-1", MINUTE);
        assert_eq!(rx.recv().await, Some(PollEvent::Pending));
        drop(handle);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn approval_refreshes_cached_session() {
        let fake = FakeBackend::new();
        fake.script_statuses(vec![ScriptedStatus::Report(AccountStatus::Approved, None)]);
        let session = SessionStore::in_memory();
        session
            .write(SessionUser {
                user_id: "EMP-1".into(),
                role: "Employer".into(),
                name: "Acme".into(),
                status: AccountStatus::Pending,
            })
            .await
            .unwrap();

        let poller = StatusPoller::new(fake.clone()).with_session(session.clone());
        let (_handle, rx) = poller.start("EMP-1", MINUTE);
        collect(rx).await;

        assert_eq!(session.current().unwrap().status, AccountStatus::Approved);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_raised_to_minimum() {
        let fake = FakeBackend::new();
        let (mut handle, mut rx) = StatusPoller::new(fake.clone()).start("EMP-1", Duration::ZERO);

        assert_eq!(rx.recv().await, Some(PollEvent::Pending));
        tokio::time::sleep(MIN_POLL_INTERVAL * 3 - Duration::from_millis(10)).await;
        assert_eq!(fake.status_count(), 3);
        assert!(!handle.is_stopped());

        handle.stop();
        handle.join().await;
        assert!(collect(rx).await.len() <= 2);
    }
}
