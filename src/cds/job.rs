//! Polling of asynchronous push jobs.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::CdsClient;
use crate::{
    config::PollingConfig,
    error::{Error, JobFailure},
    types::{JobState, TxJobStatus},
};

/// States of one polling run. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Pending { attempts: u32, delay: Duration },
    Completed(TxJobStatus),
    Failed(TxJobStatus),
    TimedOut,
    Cancelled,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollState::Pending { .. })
    }

    fn into_result(self) -> Result<TxJobStatus, Error> {
        match self {
            PollState::Completed(status) => Ok(status),
            PollState::Failed(status) => Err(Error::JobFailed {
                reason: JobFailure::Rejected,
                errors: status.errors,
            }),
            PollState::TimedOut | PollState::Pending { .. } => Err(Error::JobFailed {
                reason: JobFailure::TimedOut,
                errors: Vec::new(),
            }),
            PollState::Cancelled => Err(Error::JobFailed {
                reason: JobFailure::Cancelled,
                errors: Vec::new(),
            }),
        }
    }
}

/// Polls a job with exponential backoff until it completes, fails, runs out of
/// attempts or time, or is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobPoller {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
    pub timeout: Duration,
}

impl Default for JobPoller {
    fn default() -> Self {
        Self::from_config(&PollingConfig::default())
    }
}

impl JobPoller {
    pub fn from_config(config: &PollingConfig) -> Self {
        Self {
            initial_delay: config.initial_delay(),
            max_delay: config.max_delay(),
            max_attempts: config.max_attempts,
            timeout: config.timeout(),
        }
    }

    /// Runs the state machine for the job at `link`.
    ///
    /// Cancelling `cancel` stops polling at once; the job itself keeps running
    /// on the server. Network errors abort polling and are returned as-is.
    pub async fn run(
        &self,
        client: &CdsClient,
        link: &str,
        cancel: &CancellationToken,
    ) -> Result<TxJobStatus, Error> {
        let deadline = Instant::now() + self.timeout;
        let mut state = PollState::Pending {
            attempts: 0,
            delay: self.initial_delay,
        };

        while let PollState::Pending { attempts, delay } = state {
            state = self
                .step(client, link, cancel, deadline, attempts, delay)
                .await?;
            tracing::debug!(link, state = ?state, "Job poll transition");
        }

        if let PollState::Failed(status) = &state {
            tracing::warn!(
                job_id = %status.job_id,
                errors = status.errors.len(),
                "Job failed"
            );
        }
        state.into_result()
    }

    async fn step(
        &self,
        client: &CdsClient,
        link: &str,
        cancel: &CancellationToken,
        deadline: Instant,
        attempts: u32,
        delay: Duration,
    ) -> Result<PollState, Error> {
        if cancel.is_cancelled() {
            return Ok(PollState::Cancelled);
        }
        if attempts >= self.max_attempts {
            return Ok(PollState::TimedOut);
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(PollState::TimedOut);
        }
        let wait = delay.min(deadline - now);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(PollState::Cancelled),
            _ = tokio::time::sleep(wait) => {}
        }
        if Instant::now() >= deadline {
            return Ok(PollState::TimedOut);
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(PollState::Cancelled),
            status = tokio::time::timeout(remaining, client.poll_job(link)) => match status {
                Ok(status) => status?,
                Err(_) => {
                    tracing::debug!(link, "Job poll outlived the deadline");
                    return Ok(PollState::TimedOut);
                }
            },
        };

        tracing::debug!(
            job_id = %status.job_id,
            attempt = attempts + 1,
            processed = status.details.processed(),
            total = status.details.total(),
            "Polled job"
        );
        Ok(match status.state {
            JobState::Pending => PollState::Pending {
                attempts: attempts + 1,
                delay: delay.saturating_mul(2).min(self.max_delay),
            },
            JobState::Completed => PollState::Completed(status),
            JobState::Failed => PollState::Failed(status),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cds::{HttpRequest, HttpResponse, Transport};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    /// Answers every poll with the next state of a script, repeating the last one.
    struct JobServer {
        states: Mutex<Vec<&'static str>>,
        polls: AtomicU32,
        cancel_after: Option<(u32, CancellationToken)>,
        latency: Option<Duration>,
    }

    impl JobServer {
        fn new(states: &[&'static str]) -> Self {
            Self {
                states: Mutex::new(states.iter().rev().copied().collect()),
                polls: AtomicU32::new(0),
                cancel_after: None,
                latency: None,
            }
        }
    }

    #[async_trait]
    impl Transport for JobServer {
        async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, Error> {
            let polls = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((limit, token)) = &self.cancel_after {
                if polls >= *limit {
                    token.cancel();
                }
            }
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            let state = {
                let mut states = self.states.lock();
                if states.len() > 1 {
                    states.pop().unwrap_or("pending")
                } else {
                    states.last().copied().unwrap_or("pending")
                }
            };
            let body = format!(
                r#"{{"data":{{"status":"{}","details":{{"created":3}},"errors":[{}]}}}}"#,
                state,
                if state == "failed" {
                    r#"{"status":400,"code":"bad","title":"Bad","detail":"nope"}"#
                } else {
                    ""
                }
            );
            Ok(HttpResponse::new(200).with_body(body))
        }
    }

    fn poller() -> JobPoller {
        JobPoller {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(400),
            max_attempts: 10,
            timeout: Duration::from_secs(5),
        }
    }

    fn client(server: Arc<JobServer>) -> CdsClient {
        CdsClient::new("https://cds.example.com", "token", server).with_secret("secret")
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_after_pending_polls() {
        let server = Arc::new(JobServer::new(&["pending", "processing", "completed"]));
        let status = poller()
            .run(&client(server.clone()), "/jobs/content/1", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(status.state, JobState::Completed);
        assert_eq!(status.details.created, 3);
        assert_eq!(server.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_job_carries_errors() {
        let server = Arc::new(JobServer::new(&["pending", "failed"]));
        let err = poller()
            .run(&client(server), "/jobs/content/1", &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            Error::JobFailed { reason, errors } => {
                assert_eq!(reason, JobFailure::Rejected);
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].code, "bad");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_past_timeout_times_out() {
        let server = Arc::new(JobServer::new(&["pending"]));
        let poller = JobPoller {
            timeout: Duration::from_secs(1),
            max_attempts: 1_000,
            ..poller()
        };
        let started = Instant::now();
        let err = poller
            .run(&client(server.clone()), "/jobs/content/1", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::JobFailed {
                reason: JobFailure::TimedOut,
                ..
            }
        ));
        assert!(Instant::now() - started <= Duration::from_secs(1));
        // 100 + 200 + 400 ms, then the remaining budget runs out
        assert_eq!(server.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_poll_stops_at_deadline() {
        let server = Arc::new(JobServer {
            latency: Some(Duration::from_secs(60)),
            ..JobServer::new(&["completed"])
        });
        let poller = JobPoller {
            timeout: Duration::from_secs(1),
            ..poller()
        };
        let started = Instant::now();
        let err = poller
            .run(&client(server.clone()), "/jobs/content/1", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::JobFailed {
                reason: JobFailure::TimedOut,
                ..
            }
        ));
        assert_eq!(Instant::now() - started, Duration::from_secs(1));
        assert_eq!(server.polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_budget_times_out() {
        let server = Arc::new(JobServer::new(&["pending"]));
        let poller = JobPoller {
            max_attempts: 2,
            ..poller()
        };
        let err = poller
            .run(&client(server.clone()), "/jobs/content/1", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::JobFailed {
                reason: JobFailure::TimedOut,
                ..
            }
        ));
        assert_eq!(server.polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_polls_after_cancellation() {
        let cancel = CancellationToken::new();
        let server = Arc::new(JobServer {
            cancel_after: Some((2, cancel.clone())),
            ..JobServer::new(&["pending"])
        });
        let err = poller()
            .run(&client(server.clone()), "/jobs/content/1", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::JobFailed {
                reason: JobFailure::Cancelled,
                ..
            }
        ));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(server.polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_first_poll() {
        let server = Arc::new(JobServer::new(&["completed"]));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = poller().run(&client(server.clone()), "/jobs/content/1", &cancel).await;
        assert!(matches!(
            result,
            Err(Error::JobFailed {
                reason: JobFailure::Cancelled,
                ..
            })
        ));
        assert_eq!(server.polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_error_aborts_polling() {
        struct Down;

        #[async_trait]
        impl Transport for Down {
            async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, Error> {
                Err(Error::network("connection refused"))
            }
        }

        let client = CdsClient::new("https://cds.example.com", "token", Arc::new(Down))
            .with_secret("secret");
        let result = poller().run(&client, "/jobs/content/1", &CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[test]
    fn test_terminal_states() {
        assert!(PollState::TimedOut.is_terminal());
        assert!(PollState::Cancelled.is_terminal());
        assert!(
            !PollState::Pending {
                attempts: 0,
                delay: Duration::ZERO
            }
            .is_terminal()
        );
    }
}
