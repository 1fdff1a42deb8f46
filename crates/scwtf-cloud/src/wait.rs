//! Waiters and retry loops
//!
//! Every mutation against the cloud is sandwiched between two waiters so that
//! the server-side state machine is settled before and after the call. Polling
//! and retrying share one backoff schedule ([`WaitConfig`]) and race every call
//! and every sleep against a [`CancellationToken`].

use crate::error::{CloudError, ErrorKind, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default poll interval for resources that don't define their own
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Default budget for a single waiter
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Polling schedule
#[derive(Debug, Clone, PartialEq)]
pub struct WaitConfig {
    /// Total budget before giving up
    pub timeout: Duration,

    /// Delay before the second attempt
    pub poll_interval: Duration,

    /// Upper bound for the delay between attempts
    pub max_interval: Duration,

    /// Growth factor between consecutive delays (1.0 keeps the interval constant)
    pub multiplier: f64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_POLL_INTERVAL)
    }
}

impl WaitConfig {
    /// Constant interval schedule
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
            max_interval: poll_interval,
            multiplier: 1.0,
        }
    }

    /// Zero-delay schedule for replayed tests
    pub fn for_test() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            poll_interval: Duration::ZERO,
            max_interval: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the interval, keeping the timeout
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.max_interval = self.max_interval.max(poll_interval);
        self
    }

    pub fn with_backoff(mut self, multiplier: f64, max_interval: Duration) -> Self {
        self.multiplier = multiplier;
        self.max_interval = max_interval;
        self
    }

    /// Delay to sleep after the given (zero-based) attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let delay = self.poll_interval.as_secs_f64() * factor;
        if !delay.is_finite() {
            return self.max_interval;
        }
        Duration::from_secs_f64(delay.max(0.0)).min(self.max_interval.max(self.poll_interval))
    }
}

/// Resources that report a lifecycle status
pub trait HasStatus {
    fn status(&self) -> &str;
}

/// Status partition of one resource kind
#[derive(Debug, Clone, Copy)]
pub struct StatusSet {
    pub pending: &'static [&'static str],
    pub success: &'static [&'static str],
    pub failure: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Pending,
    Success,
    Failure,
}

impl StatusSet {
    /// Unlisted statuses are treated as pending.
    pub fn classify(&self, status: &str) -> StatusClass {
        if self.success.contains(&status) {
            StatusClass::Success
        } else if self.failure.contains(&status) {
            StatusClass::Failure
        } else {
            if !self.pending.contains(&status) {
                debug!(status, "Unlisted status, still waiting");
            }
            StatusClass::Pending
        }
    }
}

/// Outcome of one poll
enum Step<R> {
    Done(Result<R>),
    Continue(String),
}

/// Run `fut` unless `cancel` fires first; an already-cancelled token never polls it
pub async fn call_or_cancel<T, Fut>(cancel: &CancellationToken, fut: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CloudError::Cancelled),
        res = fut => res,
    }
}

async fn sleep_or_cancel(cancel: &CancellationToken, delay: Duration) -> Result<()> {
    if delay.is_zero() {
        tokio::task::yield_now().await;
        return if cancel.is_cancelled() {
            Err(CloudError::Cancelled)
        } else {
            Ok(())
        };
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CloudError::Cancelled),
        _ = sleep(delay) => Ok(()),
    }
}

async fn poll_until<T, R, F, Fut, D>(
    resource: &str,
    config: &WaitConfig,
    cancel: &CancellationToken,
    mut get: F,
    mut decide: D,
) -> Result<R>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    D: FnMut(Result<T>) -> Step<R>,
{
    let start = Instant::now();
    let mut attempt = 0u32;
    let mut last_status = String::from("unknown");

    loop {
        if cancel.is_cancelled() {
            return Err(CloudError::Cancelled);
        }

        let outcome = call_or_cancel(cancel, get()).await;
        if matches!(outcome, Err(CloudError::Cancelled)) {
            return Err(CloudError::Cancelled);
        }

        match decide(outcome) {
            Step::Done(res) => return res,
            Step::Continue(status) => last_status = status,
        }

        if start.elapsed() >= config.timeout {
            warn!(resource, %last_status, "Timeout while waiting");
            return Err(CloudError::Timeout {
                resource: resource.to_string(),
                last_status,
            });
        }

        let delay = config.delay_for_attempt(attempt);
        debug!(resource, attempt, %last_status, delay_ms = delay.as_millis() as u64, "Waiting");
        sleep_or_cancel(cancel, delay).await?;
        attempt = attempt.saturating_add(1);
    }
}

/// Poll `get` until the resource reaches a success status.
///
/// A failure status ends the wait with [`CloudError::FailureStatus`]; running
/// out of budget ends it with [`CloudError::Timeout`]. Retryable errors from
/// `get` keep the loop going; any other error is returned as is.
pub async fn wait_for<T, F, Fut>(
    resource: &str,
    config: &WaitConfig,
    cancel: &CancellationToken,
    statuses: &StatusSet,
    get: F,
) -> Result<T>
where
    T: HasStatus,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    poll_until(resource, config, cancel, get, |outcome| match outcome {
        Ok(obj) => match statuses.classify(obj.status()) {
            StatusClass::Success => Step::Done(Ok(obj)),
            StatusClass::Failure => Step::Done(Err(CloudError::FailureStatus {
                resource: resource.to_string(),
                status: obj.status().to_string(),
            })),
            StatusClass::Pending => Step::Continue(obj.status().to_string()),
        },
        Err(e) if e.kind().is_retryable() => {
            debug!(resource, error = %e, "Retryable error while waiting");
            Step::Continue(e.to_string())
        }
        Err(e) => Step::Done(Err(e)),
    })
    .await
}

/// Poll `get` until the resource is gone. Not-found is the success outcome.
pub async fn wait_for_deletion<T, F, Fut>(
    resource: &str,
    config: &WaitConfig,
    cancel: &CancellationToken,
    statuses: &StatusSet,
    get: F,
) -> Result<()>
where
    T: HasStatus,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    poll_until(resource, config, cancel, get, |outcome| match outcome {
        Ok(obj) => match statuses.classify(obj.status()) {
            StatusClass::Failure => Step::Done(Err(CloudError::FailureStatus {
                resource: resource.to_string(),
                status: obj.status().to_string(),
            })),
            _ => Step::Continue(obj.status().to_string()),
        },
        Err(e) if e.kind() == ErrorKind::NotFound => Step::Done(Ok(())),
        Err(e) if e.kind().is_retryable() => Step::Continue(e.to_string()),
        Err(e) => Step::Done(Err(e)),
    })
    .await
}

/// Invoke `operation` until it succeeds, fails with an error `should_retry`
/// rejects, or the budget runs out. On timeout the last error is returned.
pub async fn retry<T, F, Fut, C>(
    name: &str,
    config: &WaitConfig,
    cancel: &CancellationToken,
    should_retry: C,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    C: Fn(&CloudError) -> bool,
{
    let start = Instant::now();
    let mut attempt = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(CloudError::Cancelled);
        }

        let err = match call_or_cancel(cancel, operation()).await {
            Ok(value) => return Ok(value),
            Err(CloudError::Cancelled) => return Err(CloudError::Cancelled),
            Err(e) if should_retry(&e) => e,
            Err(e) => return Err(e),
        };

        if start.elapsed() >= config.timeout {
            warn!(operation = name, error = %err, attempt, "Retry budget exhausted");
            return Err(err);
        }

        let delay = config.delay_for_attempt(attempt);
        debug!(operation = name, error = %err, attempt, "Retrying");
        sleep_or_cancel(cancel, delay).await?;
        attempt = attempt.saturating_add(1);
    }
}
