use clap::Parser;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hostmap_dns::{CommandSource, ServerConfig, server};

#[derive(Parser)]
#[command(name = "hostmap-dns")]
#[command(about = "DNS A-record server fed by an external record source", long_about = None)]
struct Args {
    /// Local port to listen on
    #[arg(short, long, env = "HOSTMAP_DNS_PORT", default_value = "53")]
    port: u16,

    /// Bind address
    #[arg(short, long, env = "HOSTMAP_DNS_BIND", default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Seconds between record source runs
    #[arg(
        short,
        long,
        env = "HOSTMAP_DNS_REFRESH_INTERVAL",
        default_value = "120",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    refresh_interval: u64,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, env = "HOSTMAP_DNS_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Command printing `address;hostname` lines, followed by its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolve once SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

async fn run(config: ServerConfig, source: CommandSource) {
    info!(program = source.program(), "using record source");

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown requested");
        signal_token.cancel();
    });

    server::run(config, source, shutdown).await;
}

fn main() -> io::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let source = CommandSource::new(args.command).map_err(io::Error::other)?;
    let config = ServerConfig {
        bind_addr: SocketAddr::new(args.bind, args.port),
        refresh_interval: Duration::from_secs(args.refresh_interval),
        ..ServerConfig::default()
    };

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(run(config, source));
    info!("shutting down");

    Ok(())
}
