//! DNS server orchestration.
//!
//! Populates the table, then runs the refresh loop and the UDP server side by
//! side until shutdown is requested.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::refresh::Refresher;
use crate::resolver::Resolver;
use crate::source::RecordSource;
use crate::stats::Stats;
use crate::table::ResolutionTable;
use crate::transport::udp::UdpServer;

/// Run the DNS server with the given configuration.
///
/// The record source is run once before the socket is bound so the first
/// query already sees data. Returns after `shutdown` is cancelled and both
/// the refresh loop and every in-flight request handler have finished.
pub async fn run<S: RecordSource>(config: ServerConfig, source: S, shutdown: CancellationToken) {
    let table = Arc::new(ResolutionTable::new());
    let refresher = Arc::new(Refresher::new(
        source,
        table.clone(),
        config.refresh_interval,
    ));

    // The source may hang; a shutdown request must not wait for it.
    tokio::select! {
        _ = shutdown.cancelled() => {
            info!("shutdown requested during initial refresh");
            return;
        }
        _ = refresher.refresh_or_keep() => {}
    }

    let resolver = Arc::new(Resolver::new(table));
    let stats = Arc::new(Stats::new());

    info!(
        addr = %config.bind_addr,
        hosts = resolver.host_count(),
        "starting DNS server"
    );

    let refresh_handle = refresher.clone().start();
    let stats_handle = spawn_stats_logger(
        stats.clone(),
        resolver.clone(),
        config.stats_interval,
        shutdown.clone(),
    );

    UdpServer::new(config.bind_addr, resolver, stats)
        .with_timeouts(config.read_timeout, config.rebind_backoff)
        .with_cancellation(shutdown)
        .run()
        .await;

    refresher.stop();
    let (refresh_result, stats_result) = futures::future::join(refresh_handle, stats_handle).await;
    if let Err(e) = refresh_result {
        error!(error = %e, "refresh loop ended abnormally");
    }
    if let Err(e) = stats_result {
        error!(error = %e, "stats logger ended abnormally");
    }

    info!("DNS server stopped");
}

fn spawn_stats_logger(
    stats: Arc<Stats>,
    resolver: Arc<Resolver>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await; // Skip first immediate tick
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let stats = stats.snapshot_and_reset();
                    info!(
                        hosts = resolver.host_count(),
                        requests = stats.requests,
                        answered = stats.answered,
                        empty = stats.empty,
                        dropped = stats.dropped,
                        send_failures = stats.send_failures,
                        avg_response_ms = stats.avg_response_ms,
                        "stats"
                    );
                }
            }
        }
    })
}
