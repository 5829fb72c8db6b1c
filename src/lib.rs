//! # Paced
//!
//! `paced` serializes calls to an operation and enforces a minimum interval between
//! them, however many callers are waiting.
//!
//! The main type is [`Gate`]. Every unit of work submitted to a gate runs alone, and
//! the next one may only start once the configured interval has passed since the
//! previous one *finished*. This is useful for protecting an external API or any other
//! resource that must not be called faster than a given pace, where the cost of a call
//! is paid when it completes.
//!
//! Work can be submitted from plain threads through [`Executor`], or from tokio tasks
//! through [`AsyncExecutor`] (enabled by the default `async` feature). Both take an
//! optional [`CancellationToken`] per call, and hand the work a token that fires when
//! either that call or the whole gate is cancelled.

#[cfg(feature = "async")]
use std::future::Future;

mod blocking;
mod gate;
mod linked;

pub use gate::*;
pub use tokio_util::sync::CancellationToken;

/// Blocking call shapes.
///
/// Only [`Executor::execute_with_cancellation`] has to be implemented, the other
/// shapes forward to it.
pub trait Executor {
    /// Runs `work` once the rate limit allows it, blocking the calling thread.
    ///
    /// `work` receives the effective cancellation token of this call.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the work could not be started.
    fn execute_with_cancellation<T, F>(
        &self,
        cancellation: Option<&CancellationToken>,
        work: F,
    ) -> Result<T, Error>
    where
        F: FnOnce(CancellationToken) -> T;

    /// [`Executor::execute_with_cancellation`] without a per-call token.
    fn execute<T, F>(&self, work: F) -> Result<T, Error>
    where
        F: FnOnce(CancellationToken) -> T,
    {
        self.execute_with_cancellation(None, work)
    }

    /// Runs `work` with `argument` once the rate limit allows it.
    fn execute_with<A, T, F>(&self, argument: A, work: F) -> Result<T, Error>
    where
        F: FnOnce(CancellationToken, A) -> T,
    {
        self.execute(move |token| work(token, argument))
    }

    /// Runs fallible `work`, returning its error as is.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `work`, or the gate's own [`Error`] converted
    /// into `E` if the work could not be started.
    fn try_execute<T, E, F>(
        &self,
        cancellation: Option<&CancellationToken>,
        work: F,
    ) -> Result<T, E>
    where
        F: FnOnce(CancellationToken) -> Result<T, E>,
        E: From<Error>,
    {
        self.execute_with_cancellation(cancellation, work)?
    }
}

/// Suspending call shapes, for use inside a tokio runtime.
///
/// Only [`AsyncExecutor::execute_async_with_cancellation`] has to be implemented, the
/// other shapes forward to it.
#[cfg(feature = "async")]
pub trait AsyncExecutor {
    /// Runs `work` once the rate limit allows it, suspending the calling task.
    ///
    /// `work` receives the effective cancellation token of this call.
    ///
    /// # Errors
    ///
    /// Resolves to an [`Error`] if the work could not be started.
    fn execute_async_with_cancellation<T, F, Fut>(
        &self,
        cancellation: Option<&CancellationToken>,
        work: F,
    ) -> impl Future<Output = Result<T, Error>> + Send
    where
        F: FnOnce(CancellationToken) -> Fut + Send,
        Fut: Future<Output = T> + Send,
        T: Send;

    /// [`AsyncExecutor::execute_async_with_cancellation`] without a per-call token.
    fn execute_async<T, F, Fut>(&self, work: F) -> impl Future<Output = Result<T, Error>> + Send
    where
        F: FnOnce(CancellationToken) -> Fut + Send,
        Fut: Future<Output = T> + Send,
        T: Send,
    {
        self.execute_async_with_cancellation(None, work)
    }

    /// Runs `work` with `argument` once the rate limit allows it.
    fn execute_async_with<A, T, F, Fut>(
        &self,
        argument: A,
        work: F,
    ) -> impl Future<Output = Result<T, Error>> + Send
    where
        A: Send,
        F: FnOnce(CancellationToken, A) -> Fut + Send,
        Fut: Future<Output = T> + Send,
        T: Send,
    {
        self.execute_async(move |token| work(token, argument))
    }

    /// Runs fallible `work`, returning its error as is.
    ///
    /// # Errors
    ///
    /// Resolves to the error produced by `work`, or the gate's own [`Error`] converted
    /// into `E` if the work could not be started.
    fn try_execute_async<T, E, F, Fut>(
        &self,
        cancellation: Option<&CancellationToken>,
        work: F,
    ) -> impl Future<Output = Result<T, E>> + Send
    where
        F: FnOnce(CancellationToken) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: From<Error> + Send,
    {
        let execution = self.execute_async_with_cancellation(cancellation, work);
        async move { execution.await? }
    }
}
