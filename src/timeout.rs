//! Bounded model calls with a visible countdown
//!
//! Wraps a backend future in a hard deadline and keeps the operator informed
//! while a slow provider is still thinking.

use std::future::Future;
use std::time::Duration;

/// Marker returned when the wrapped call did not finish in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutElapsed {
    pub seconds: u64,
}

impl std::fmt::Display for TimeoutElapsed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "call did not complete within {}s", self.seconds)
    }
}

impl std::error::Error for TimeoutElapsed {}

/// Run `fut` with a deadline of `seconds`, ticking a visible countdown
/// once per second while waiting.
pub async fn call_with_timeout<F, T>(
    seconds: u64,
    label: &str,
    fut: F,
) -> Result<T, TimeoutElapsed>
where
    F: Future<Output = T>,
{
    use std::io::Write;

    let label = label.to_string();
    let countdown = tokio::spawn(async move {
        let mut remaining = seconds;
        while remaining > 0 {
            eprint!("\rWaiting for {} response... {}s ", label, remaining);
            let _ = std::io::stderr().flush();
            tokio::time::sleep(Duration::from_secs(1)).await;
            remaining -= 1;
        }
        eprintln!("\r{} call timed out!                    ", label);
    });

    let result = tokio::time::timeout(Duration::from_secs(seconds), fut).await;
    countdown.abort();
    // Clear the countdown line before handing output back to the caller
    eprint!("\r{:50}\r", "");

    result.map_err(|_| TimeoutElapsed { seconds })
}
