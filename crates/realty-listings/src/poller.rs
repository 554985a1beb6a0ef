//! Bounded polling of a remote snapshot job.
//!
//! The loop stops on the first terminal status, on the first query error, or
//! when either the wall-clock or the attempt budget runs out. Whatever the
//! cause, the caller gets exactly one [`TerminalState`]; nothing here returns
//! an error.

use std::future::Future;
use std::time::Duration;

use realty_core::ListingSearchConfig;
use serde::Serialize;
use tokio::time::Instant;

use crate::error::ListingsError;
use crate::types::{JobState, SnapshotStatus, TerminalState};

/// Anything that can report the status of a snapshot job.
pub trait SnapshotStatusSource {
    fn status(
        &self,
        job_id: &str,
    ) -> impl Future<Output = Result<SnapshotStatus, ListingsError>> + Send;
}

/// Time and attempt limits for one poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBudget {
    pub max_wait: Duration,
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollBudget {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_millis(15_000),
            poll_interval: Duration::from_millis(1_000),
            max_attempts: 10,
        }
    }
}

impl PollBudget {
    #[must_use]
    pub fn from_config(config: &ListingSearchConfig) -> Self {
        Self {
            max_wait: config.max_wait(),
            poll_interval: config.poll_interval(),
            max_attempts: config.max_poll_attempts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Completed,
    RemoteFailed,
    QueryError,
    BudgetExhausted,
}

/// Outcome of one poll loop.
#[derive(Debug, Clone, PartialEq)]
pub struct PollReport {
    pub terminal: TerminalState,
    /// Number of status queries issued.
    pub attempts: u32,
    pub stop_reason: StopReason,
    pub last_status: Option<SnapshotStatus>,
}

impl PollReport {
    fn new(
        terminal: TerminalState,
        attempts: u32,
        stop_reason: StopReason,
        last_status: Option<SnapshotStatus>,
    ) -> Self {
        Self {
            terminal,
            attempts,
            stop_reason,
            last_status,
        }
    }
}

pub struct SnapshotPoller<'a, S> {
    source: &'a S,
    budget: PollBudget,
}

impl<'a, S: SnapshotStatusSource> SnapshotPoller<'a, S> {
    #[must_use]
    pub fn new(source: &'a S, budget: PollBudget) -> Self {
        Self { source, budget }
    }

    /// Polls `job_id` with the full budget starting now.
    pub async fn poll(&self, job_id: &str) -> PollReport {
        self.poll_since(job_id, Instant::now()).await
    }

    /// Polls `job_id`, counting elapsed time from `started` so that time
    /// spent before polling (triggering the job) comes out of the same
    /// budget.
    pub async fn poll_since(&self, job_id: &str, started: Instant) -> PollReport {
        let PollBudget {
            max_wait,
            poll_interval,
            max_attempts,
        } = self.budget;

        let mut attempts: u32 = 0;
        let mut last_status: Option<SnapshotStatus> = None;

        while attempts < max_attempts && started.elapsed() < max_wait {
            attempts += 1;

            match self.source.status(job_id).await {
                Ok(status) => {
                    tracing::debug!(
                        job_id,
                        attempt = attempts,
                        status = %status.raw_status,
                        records = ?status.records,
                        errors = ?status.errors,
                        "snapshot status"
                    );
                    match status.state {
                        JobState::Completed => {
                            return PollReport::new(
                                TerminalState::DataReady,
                                attempts,
                                StopReason::Completed,
                                Some(status),
                            );
                        }
                        JobState::Failed => {
                            tracing::warn!(
                                job_id,
                                attempt = attempts,
                                status = %status.raw_status,
                                error_codes = ?status.error_codes,
                                "snapshot job failed, using fallback listings"
                            );
                            return PollReport::new(
                                TerminalState::FallbackRequired,
                                attempts,
                                StopReason::RemoteFailed,
                                Some(status),
                            );
                        }
                        JobState::Pending | JobState::Running | JobState::Unknown => {
                            last_status = Some(status);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        job_id,
                        attempt = attempts,
                        error = %e,
                        "snapshot status query failed, using fallback listings"
                    );
                    return PollReport::new(
                        TerminalState::FallbackRequired,
                        attempts,
                        StopReason::QueryError,
                        last_status,
                    );
                }
            }

            if attempts < max_attempts {
                tokio::time::sleep(poll_interval).await;
            }
        }

        tracing::warn!(
            job_id,
            attempts,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "snapshot poll budget exhausted, using fallback listings"
        );
        PollReport::new(
            TerminalState::FallbackRequired,
            attempts,
            StopReason::BudgetExhausted,
            last_status,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// Replays a fixed script of statuses, repeating the last one forever.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<&'static str, u16>>>,
        calls: AtomicU32,
    }

    impl ScriptedSource {
        fn new(script: &[Result<&'static str, u16>]) -> Self {
            Self {
                script: Mutex::new(script.iter().copied().collect()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl SnapshotStatusSource for ScriptedSource {
        async fn status(&self, _job_id: &str) -> Result<SnapshotStatus, ListingsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = {
                let mut script = self.script.lock().unwrap();
                if script.len() > 1 {
                    script.pop_front().unwrap()
                } else {
                    *script.front().unwrap()
                }
            };
            match next {
                Ok(raw) => Ok(SnapshotStatus::from_raw(raw)),
                Err(status) => Err(ListingsError::UnexpectedStatus {
                    status,
                    endpoint: "progress".to_string(),
                    message: format!("API Error {status}"),
                }),
            }
        }
    }

    fn budget(max_wait_ms: u64, poll_interval_ms: u64, max_attempts: u32) -> PollBudget {
        PollBudget {
            max_wait: Duration::from_millis(max_wait_ms),
            poll_interval: Duration::from_millis(poll_interval_ms),
            max_attempts,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn never_terminal_job_uses_exactly_max_attempts() {
        let source = ScriptedSource::new(&[Ok("running")]);
        let poller = SnapshotPoller::new(&source, budget(15_000, 1_000, 10));

        let report = poller.poll("s_1").await;

        assert_eq!(source.calls(), 10);
        assert_eq!(report.attempts, 10);
        assert_eq!(report.terminal, TerminalState::FallbackRequired);
        assert_eq!(report.stop_reason, StopReason::BudgetExhausted);
        assert_eq!(
            report.last_status.map(|s| s.state),
            Some(JobState::Running)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn wall_clock_budget_stops_before_attempt_cap() {
        let source = ScriptedSource::new(&[Ok("pending")]);
        let poller = SnapshotPoller::new(&source, budget(2_500, 1_000, 10));

        let report = poller.poll("s_1").await;

        // Queries at t=0, 1s, 2s; the check at 3s is past the 2.5s budget.
        assert_eq!(source.calls(), 3);
        assert_eq!(report.stop_reason, StopReason::BudgetExhausted);
    }

    #[tokio::test(start_paused = true)]
    async fn completed_status_stops_immediately() {
        let source = ScriptedSource::new(&[Ok("running"), Ok("running"), Ok("ready")]);
        let poller = SnapshotPoller::new(&source, PollBudget::default());

        let started = Instant::now();
        let report = poller.poll("s_1").await;

        assert_eq!(report.terminal, TerminalState::DataReady);
        assert_eq!(report.stop_reason, StopReason::Completed);
        assert_eq!(report.attempts, 3);
        assert_eq!(started.elapsed(), Duration::from_millis(2_000));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_statuses_require_fallback() {
        for raw in ["failed", "error", "FAILED"] {
            let source = ScriptedSource::new(&[Ok("running"), Ok(raw)]);
            let poller = SnapshotPoller::new(&source, PollBudget::default());

            let report = poller.poll("s_1").await;

            assert_eq!(report.terminal, TerminalState::FallbackRequired, "raw: {raw}");
            assert_eq!(report.stop_reason, StopReason::RemoteFailed, "raw: {raw}");
            assert_eq!(report.attempts, 2);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn query_error_stops_without_retry() {
        let source = ScriptedSource::new(&[Ok("initializing"), Err(500), Ok("ready")]);
        let poller = SnapshotPoller::new(&source, PollBudget::default());

        let report = poller.poll("s_1").await;

        assert_eq!(source.calls(), 2);
        assert_eq!(report.terminal, TerminalState::FallbackRequired);
        assert_eq!(report.stop_reason, StopReason::QueryError);
        assert_eq!(
            report.last_status.map(|s| s.raw_status),
            Some("initializing".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_status_keeps_polling() {
        let source = ScriptedSource::new(&[Ok("building"), Ok("mystery"), Ok("done")]);
        let poller = SnapshotPoller::new(&source, PollBudget::default());

        let report = poller.poll("s_1").await;

        assert_eq!(report.terminal, TerminalState::DataReady);
        assert_eq!(report.attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_cap_is_never_exceeded() {
        for max_attempts in [1, 2, 5, 7] {
            let source = ScriptedSource::new(&[Ok("running")]);
            let poller = SnapshotPoller::new(&source, budget(60_000, 250, max_attempts));

            let report = poller.poll("s_1").await;

            assert_eq!(source.calls(), max_attempts);
            assert!(report.attempts <= max_attempts);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_issues_no_queries() {
        let source = ScriptedSource::new(&[Ok("ready")]);
        let poller = SnapshotPoller::new(&source, budget(15_000, 1_000, 0));

        let report = poller.poll("s_1").await;

        assert_eq!(source.calls(), 0);
        assert_eq!(report.terminal, TerminalState::FallbackRequired);
        assert!(report.last_status.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn poll_since_counts_time_already_spent() {
        let source = ScriptedSource::new(&[Ok("running")]);
        let poller = SnapshotPoller::new(&source, budget(3_000, 1_000, 10));

        let started = Instant::now();
        tokio::time::sleep(Duration::from_millis(2_000)).await;
        let report = poller.poll_since("s_1", started).await;

        // Only t=2s is inside the 3s budget.
        assert_eq!(source.calls(), 1);
        assert_eq!(report.stop_reason, StopReason::BudgetExhausted);
    }
}
