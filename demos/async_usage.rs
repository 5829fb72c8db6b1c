//! Example usage of a `Gate` in an async context.
//!
//! Several tasks hit a pretend API at once. The gate runs their requests one at a time
//! and keeps at least one second between the end of one request and the start of the
//! next. A per-call token with a deadline shows how timeouts are layered on top.

use std::sync::Arc;
use std::time::{Duration, Instant};

use paced::{AsyncExecutor, CancellationToken, Error, Gate};

async fn fetch(id: usize, token: CancellationToken) -> Result<String, &'static str> {
    tokio::select! {
        () = token.cancelled() => Err("request aborted"),
        () = tokio::time::sleep(Duration::from_millis(200)) => Ok(format!("response #{id}")),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let gate = Arc::new(
        Gate::new(chrono::Duration::seconds(1)).expect("Interval should be non-negative"),
    );
    let start = Instant::now();

    println!("--- Starting Async Example ---");

    let handles: Vec<_> = (0..3)
        .map(|id| {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                let response = gate.execute_async(|token| fetch(id, token)).await;
                println!("[{:>6.2?}] task {id}: {response:?}", start.elapsed());
            })
        })
        .collect();
    for handle in handles {
        handle.await.expect("Task should not panic");
    }

    // Give up on the next request if it cannot start within 300ms.
    let deadline = CancellationToken::new();
    let timer = deadline.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        timer.cancel();
    });
    match gate
        .execute_async_with_cancellation(Some(&deadline), |token| fetch(99, token))
        .await
    {
        Err(Error::Cancelled) => println!("Timed out waiting for the gate, as expected"),
        other => println!("Unexpected outcome: {other:?}"),
    }

    gate.dispose_async().await;
    match gate.execute_async(|token| fetch(100, token)).await {
        Err(Error::Disposed) => println!("Gate is disposed, no more requests"),
        other => println!("Unexpected outcome: {other:?}"),
    }
}
