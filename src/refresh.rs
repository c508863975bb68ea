//! Periodic table refresh.
//!
//! Re-runs the record source on a fixed interval and swaps the result into
//! the resolution table. A failed run leaves the last good table in place.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::RecordSourceError;
use crate::source::{RecordSource, parse_records};
use crate::table::ResolutionTable;

/// Shortest accepted refresh interval; a zero period would make the timer panic.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

pub struct Refresher<S> {
    source: S,
    table: Arc<ResolutionTable>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl<S: RecordSource> Refresher<S> {
    pub fn new(source: S, table: Arc<ResolutionTable>, interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            warn!(
                min_secs = MIN_REFRESH_INTERVAL.as_secs(),
                "refresh interval of zero raised to minimum"
            );
            MIN_REFRESH_INTERVAL
        } else {
            interval
        };

        Self {
            source,
            table,
            interval,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Ask the refresh loop to exit instead of waiting for its next tick.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Run the source once and publish its records. Returns the number of
    /// hosts in the new table.
    pub async fn refresh(&self) -> Result<usize, RecordSourceError> {
        let text = self.source.fetch().await?;
        let hosts = parse_records(&text);
        let count = hosts.len();

        self.table.replace(hosts);
        Ok(count)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Like [`refresh`](Self::refresh), but failures are logged and absorbed.
    pub async fn refresh_or_keep(&self) {
        match self.refresh().await {
            Ok(hosts) => info!(hosts, "resolution table refreshed"),
            Err(e) => error!(error = %e, "refresh failed, keeping previous table"),
        }
    }

    /// Spawn the refresh loop. The first run happens one interval from now;
    /// callers populate the table up front with [`refresh_or_keep`](Self::refresh_or_keep).
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        info!(
            interval_secs = self.interval.as_secs(),
            "starting table refresh loop"
        );

        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval_at(Instant::now() + self.interval, self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => {
                        info!("refresh loop: shutdown requested");
                        break;
                    }
                    _ = interval.tick() => {
                        // Dropping an in-flight refresh kills the source process.
                        tokio::select! {
                            _ = self.shutdown.cancelled() => {
                                info!("refresh loop: shutdown requested during refresh");
                                break;
                            }
                            _ = self.refresh_or_keep() => {}
                        }
                    }
                }
            }
        })
    }
}
