use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::engine::{Engine, PollOutcome};

/// Periodic full refresh. The first tick fires immediately so the board is
/// rendered on start. Failed ticks are logged and the schedule continues
/// unchanged.
pub struct PollScheduler {
    engine: Arc<Engine>,
    interval: Duration,
}

impl PollScheduler {
    pub fn new(engine: Arc<Engine>, interval: Duration) -> Self {
        Self { engine, interval }
    }

    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(interval_secs = self.interval.as_secs(), "poll scheduler started");
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("poll scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    match self.engine.poll_once().await {
                        PollOutcome::Failed => warn!("poll tick failed; waiting for next tick"),
                        outcome => debug!(?outcome, "poll tick"),
                    }
                }
            }
        }
    }
}
