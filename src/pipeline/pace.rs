//! Minimum-interval pacing for outbound calls.

use std::time::Duration;

use tokio::time::{Instant, sleep};

/// Spaces consecutive calls at least `interval` apart.
///
/// The first call never waits.
#[derive(Debug, Clone)]
pub struct Pacer {
    interval: Duration,
    last: Option<Instant>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Wait out the remainder of the interval since the previous call.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                sleep(self.interval - elapsed).await;
            }
        }
        self.last = Some(Instant::now());
    }
}
