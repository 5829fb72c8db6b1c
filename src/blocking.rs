//! Thread-blocking waits that can be interrupted by a [`CancellationToken`].
//!
//! The blocking call shapes never enter a tokio runtime. Futures from `tokio::sync` and
//! `tokio_util` only need a waker, so they are driven by the `futures` executor on the
//! calling thread and raced against the token.

use std::future::Future;
use std::pin::pin;
use std::time::Duration;

use futures::executor::block_on;
use futures::future::{self, Either};
use futures_timer::Delay;
use tokio_util::sync::CancellationToken;

/// Blocks the current thread until `future` completes, or returns `None` if `token`
/// is cancelled first.
///
/// The token is polled before the future, so a cancelled token wins even when the
/// future could also complete.
pub(crate) fn wait<F: Future>(future: F, token: &CancellationToken) -> Option<F::Output> {
    let cancelled = pin!(token.cancelled());
    let future = pin!(future);
    match block_on(future::select(cancelled, future)) {
        Either::Left(_) => None,
        Either::Right((output, _)) => Some(output),
    }
}

/// Blocks for `duration` unless `token` is cancelled first.
///
/// Returns `false` if the sleep was cut short by cancellation.
pub(crate) fn sleep(duration: Duration, token: &CancellationToken) -> bool {
    wait(Delay::new(duration), token).is_some()
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_ready_future_completes_immediately() {
        let token = CancellationToken::new();

        assert_eq!(wait(std::future::ready(42), &token), Some(42));
    }

    #[test]
    fn test_cancelled_token_wins_over_ready_future() {
        let token = CancellationToken::new();
        token.cancel();

        assert_eq!(wait(std::future::ready(42), &token), None);
    }

    #[test]
    fn test_sleep_runs_to_completion() {
        let token = CancellationToken::new();
        let start = Instant::now();

        assert!(sleep(Duration::from_millis(30), &token));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_sleep_is_interrupted_by_cancellation_from_another_thread() {
        let token = CancellationToken::new();
        let start = Instant::now();

        let completed = std::thread::scope(|scope| {
            scope.spawn(|| {
                std::thread::sleep(Duration::from_millis(10));
                token.cancel();
            });
            sleep(Duration::from_secs(5), &token)
        });

        assert!(!completed);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_wait_acquires_lock_released_by_another_thread() {
        let token = CancellationToken::new();
        let mutex = tokio::sync::Mutex::new(0_u32);

        std::thread::scope(|scope| {
            let Some(mut guard) = wait(mutex.lock(), &token) else {
                panic!("Expected the uncontended lock to be acquired");
            };
            let waiter = scope.spawn(|| wait(mutex.lock(), &token).map(|guard| *guard));
            std::thread::sleep(Duration::from_millis(20));
            *guard = 7;
            drop(guard);

            assert_eq!(waiter.join().unwrap(), Some(7));
        });
    }
}
