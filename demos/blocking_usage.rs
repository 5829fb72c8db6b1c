//! Example usage of a `Gate` from plain threads.
//!
//! Worker threads share one gate. Each job runs alone and the next one starts no
//! sooner than 250ms after the previous job finished.

use std::time::{Duration, Instant};

use paced::{Executor, Gate};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let gate = Gate::from_std(Duration::from_millis(250));
    let start = Instant::now();

    println!("--- Starting Blocking Example ---");

    std::thread::scope(|scope| {
        for worker in 0..3 {
            let gate = &gate;
            scope.spawn(move || {
                for job in 0..2 {
                    let result = gate.execute_with(job, |_token, job| {
                        std::thread::sleep(Duration::from_millis(50));
                        job * 10
                    });
                    println!(
                        "[{:>6.2?}] worker {worker} job {job}: {result:?}",
                        start.elapsed()
                    );
                }
            });
        }
    });

    gate.cancel_execution();
    println!("After cancel_execution: {:?}", gate.execute(|_| ()));

    gate.dispose();
    println!("After dispose: {:?}", gate.execute(|_| ()));
}
