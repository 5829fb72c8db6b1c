use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::blocking;
use crate::linked::CallCancellation;

/// Errors that can occur when executing work through a [`Gate`].
///
/// Errors raised by the work itself never appear here, they are handed back to the
/// caller untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The call, or the whole gate, was cancelled before the work started.
    #[error("Execution was cancelled before the work started")]
    Cancelled,
    /// The gate has been disposed and no longer accepts work.
    #[error("The gate has been disposed")]
    Disposed,
    /// A gate cannot be built with a negative minimum interval.
    #[error("Minimum interval must not be negative, got {0}")]
    NegativeInterval(chrono::Duration),
}

/// Serializes work and enforces a minimum interval between executions.
///
/// The interval is measured from the moment one unit of work *finishes* to the moment
/// the next one is allowed to start, so long-running work pushes the next execution
/// back by its own duration plus the interval.
///
/// At most one unit of work runs at a time. Callers queue on a fair lock, and each
/// caller, once it holds the lock, sleeps off whatever remains of the interval before
/// running its work. Waiting can be aborted by a per-call [`CancellationToken`], by
/// [`Gate::cancel_execution`] or by [`Gate::dispose`].
///
/// Work is submitted through the [`Executor`](crate::Executor) trait (blocking) or the
/// [`AsyncExecutor`](crate::AsyncExecutor) trait (tokio).
#[derive(Debug)]
pub struct Gate {
    min_interval: Duration,
    last_completed: tokio::sync::Mutex<Option<Instant>>,
    cancellation: OnceLock<CancellationToken>,
    disposed: AtomicBool,
}

impl Gate {
    /// Creates a new gate with the specified minimum interval between executions.
    ///
    /// The first execution never waits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NegativeInterval`] if `min_interval` is negative.
    pub fn new(min_interval: chrono::Duration) -> Result<Self, Error> {
        Ok(Self::from_std(Self::interval_to_std(min_interval)?))
    }

    /// Creates a new gate from a [`std::time::Duration`].
    ///
    /// A zero interval still serializes executions, it just never waits between them.
    #[must_use]
    pub fn from_std(min_interval: Duration) -> Self {
        Self::with_last_completed(min_interval, None)
    }

    /// Creates a new gate that behaves as if an execution had just completed.
    ///
    /// The first call will wait the full `min_interval` before running.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NegativeInterval`] if `min_interval` is negative.
    pub fn new_exhausted(min_interval: chrono::Duration) -> Result<Self, Error> {
        Ok(Self::with_last_completed(
            Self::interval_to_std(min_interval)?,
            Some(Instant::now()),
        ))
    }

    fn with_last_completed(min_interval: Duration, last_completed: Option<Instant>) -> Self {
        Self {
            min_interval,
            last_completed: tokio::sync::Mutex::new(last_completed),
            cancellation: OnceLock::new(),
            disposed: AtomicBool::new(false),
        }
    }

    fn interval_to_std(min_interval: chrono::Duration) -> Result<Duration, Error> {
        min_interval
            .to_std()
            .map_err(|_| Error::NegativeInterval(min_interval))
    }

    /// The configured minimum interval between executions.
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Whether [`Gate::cancel_execution`] or [`Gate::dispose`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .get()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Whether [`Gate::dispose`] has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Cancels every pending and future execution without disposing the gate.
    ///
    /// Calls waiting for the lock or for the interval fail with [`Error::Cancelled`], as
    /// does every call made afterwards. Work that has already started keeps running; it
    /// can observe the cancellation through the token it was given.
    ///
    /// Before the first call there is nothing to cancel, and this does nothing.
    pub fn cancel_execution(&self) {
        match self.cancellation.get() {
            Some(token) => {
                tracing::debug!("Cancelling pending and future executions");
                token.cancel();
            }
            None => tracing::trace!("Nothing to cancel, no execution has been requested"),
        }
    }

    /// Shuts the gate down.
    ///
    /// Pending calls fail with [`Error::Cancelled`]; calls made after this returns fail
    /// with [`Error::Disposed`]. Calling this more than once has no further effect.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            tracing::trace!("Gate already disposed");
            return;
        }
        tracing::debug!("Disposing gate");
        self.root_token().cancel();
    }

    /// Shuts the gate down like [`Gate::dispose`], then waits until work that was
    /// already running has finished.
    ///
    /// Never await this from inside work running on the same gate, it waits for the
    /// lock that work is holding.
    #[cfg(feature = "async")]
    pub async fn dispose_async(&self) {
        self.dispose();
        let _drained = self.last_completed.lock().await;
        tracing::trace!("In-flight work drained");
    }

    /// The gate-wide token, created on first use.
    fn root_token(&self) -> &CancellationToken {
        self.cancellation.get_or_init(CancellationToken::new)
    }

    fn begin(&self, caller: Option<&CancellationToken>) -> Result<CallCancellation, Error> {
        if self.is_disposed() {
            tracing::debug!("Rejecting execution, gate is disposed");
            return Err(Error::Disposed);
        }
        let call = CallCancellation::link(self.root_token(), caller);
        if call.is_cancelled() {
            tracing::debug!("Rejecting execution, already cancelled");
            return Err(Error::Cancelled);
        }
        Ok(call)
    }

    /// How long a caller holding the lock at `now` still has to wait.
    fn remaining_delay(&self, last_completed: Option<Instant>, now: Instant) -> Option<Duration> {
        let elapsed = now.saturating_duration_since(last_completed?);
        let remaining = self.min_interval.saturating_sub(elapsed);
        (!remaining.is_zero()).then_some(remaining)
    }

    pub(crate) fn run_blocking<T, F>(
        &self,
        caller: Option<&CancellationToken>,
        work: F,
    ) -> Result<T, Error>
    where
        F: FnOnce(CancellationToken) -> T,
    {
        let call = self.begin(caller)?;

        let Some(mut last_completed) = blocking::wait(self.last_completed.lock(), call.token())
        else {
            tracing::debug!("Execution cancelled while waiting for the lock");
            return Err(Error::Cancelled);
        };
        tracing::trace!("Lock acquired");

        if let Some(delay) = self.remaining_delay(*last_completed, Instant::now()) {
            tracing::debug!("Waiting {delay:?} before next execution");
            if !blocking::sleep(delay, call.token()) {
                tracing::debug!("Execution cancelled while waiting out the interval");
                return Err(Error::Cancelled);
            }
        }
        if call.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let output = work(call.token().clone());
        *last_completed = Some(Instant::now());
        tracing::trace!("Execution completed");
        Ok(output)
    }

    #[cfg(feature = "async")]
    pub(crate) async fn run<T, F, Fut>(
        &self,
        caller: Option<&CancellationToken>,
        work: F,
    ) -> Result<T, Error>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let call = self.begin(caller)?;
        let token = call.token();

        let mut last_completed = tokio::select! {
            biased;
            () = token.cancelled() => {
                tracing::debug!("Execution cancelled while waiting for the lock");
                return Err(Error::Cancelled);
            }
            guard = self.last_completed.lock() => guard,
        };
        tracing::trace!("Lock acquired");

        if let Some(delay) = self.remaining_delay(*last_completed, Instant::now()) {
            tracing::debug!("Waiting {delay:?} before next execution");
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    tracing::debug!("Execution cancelled while waiting out the interval");
                    return Err(Error::Cancelled);
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let output = work(token.clone()).await;
        *last_completed = Some(Instant::now());
        tracing::trace!("Execution completed");
        Ok(output)
    }
}

impl crate::Executor for Gate {
    /// Runs `work` on the calling thread once the gate allows it.
    ///
    /// The thread blocks while waiting for the lock and for the interval. Do not call
    /// this from inside an async task; use [`AsyncExecutor`](crate::AsyncExecutor).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the gate was disposed, and [`Error::Cancelled`]
    /// if `cancellation` or the gate was cancelled before the work started.
    fn execute_with_cancellation<T, F>(
        &self,
        cancellation: Option<&CancellationToken>,
        work: F,
    ) -> Result<T, Error>
    where
        F: FnOnce(CancellationToken) -> T,
    {
        self.run_blocking(cancellation, work)
    }
}

#[cfg(feature = "async")]
impl crate::AsyncExecutor for Gate {
    /// Runs `work` once the gate allows it, suspending instead of blocking.
    ///
    /// Must be polled inside a tokio runtime with the time driver enabled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the gate was disposed, and [`Error::Cancelled`]
    /// if `cancellation` or the gate was cancelled before the work started.
    fn execute_async_with_cancellation<T, F, Fut>(
        &self,
        cancellation: Option<&CancellationToken>,
        work: F,
    ) -> impl std::future::Future<Output = Result<T, Error>> + Send
    where
        F: FnOnce(CancellationToken) -> Fut + Send,
        Fut: std::future::Future<Output = T> + Send,
        T: Send,
    {
        self.run(cancellation, work)
    }
}
