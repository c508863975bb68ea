//! UDP transport for DNS queries.
//!
//! The server moves between three states: acquiring a socket, serving on it,
//! and backing off after a bind failure or a fatal read error. Each datagram
//! is handed to its own task together with a private copy of its bytes.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::resolver::{QueryAction, Resolver};
use crate::stats::Stats;

use super::{
    MAX_DNS_PACKET_SIZE, ReadFailure, classify_read_error, log_answered, log_dropped, log_empty,
    log_send_failed,
};

enum State {
    Acquiring,
    Serving(Arc<UdpSocket>),
    BackingOff,
    Stopped,
}

/// UDP transport for the DNS server.
pub struct UdpServer {
    bind_addr: SocketAddr,
    read_timeout: Duration,
    rebind_backoff: Duration,
    resolver: Arc<Resolver>,
    stats: Arc<Stats>,
    handlers: TaskTracker,
    shutdown: CancellationToken,
}

impl UdpServer {
    pub fn new(bind_addr: SocketAddr, resolver: Arc<Resolver>, stats: Arc<Stats>) -> Self {
        Self {
            bind_addr,
            read_timeout: Duration::from_secs(1),
            rebind_backoff: Duration::from_secs(5),
            resolver,
            stats,
            handlers: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_timeouts(mut self, read_timeout: Duration, rebind_backoff: Duration) -> Self {
        self.read_timeout = read_timeout;
        self.rebind_backoff = rebind_backoff;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Serve until shutdown is requested, then wait for every in-flight
    /// handler to finish.
    pub async fn run(self) {
        let mut state = State::Acquiring;

        loop {
            state = match state {
                State::Acquiring => self.acquire().await,
                State::Serving(socket) => self.serve(socket).await,
                State::BackingOff => self.back_off().await,
                State::Stopped => break,
            };
        }

        self.handlers.close();
        info!(
            in_flight = self.handlers.len(),
            "UDP listener stopped, draining handlers"
        );
        self.handlers.wait().await;
    }

    async fn acquire(&self) -> State {
        if self.shutdown.is_cancelled() {
            return State::Stopped;
        }

        match UdpSocket::bind(self.bind_addr).await {
            Ok(socket) => {
                info!(addr = %self.bind_addr, "listening for UDP packets");
                State::Serving(Arc::new(socket))
            }
            Err(e) => {
                error!(addr = %self.bind_addr, error = %e, "failed to bind UDP socket");
                State::BackingOff
            }
        }
    }

    async fn back_off(&self) -> State {
        info!(
            backoff_secs = self.rebind_backoff.as_secs_f64(),
            "retrying UDP bind after backoff"
        );

        tokio::select! {
            _ = self.shutdown.cancelled() => State::Stopped,
            _ = tokio::time::sleep(self.rebind_backoff) => State::Acquiring,
        }
    }

    async fn serve(&self, socket: Arc<UdpSocket>) -> State {
        let mut buf = vec![0u8; MAX_DNS_PACKET_SIZE];

        loop {
            let read = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return State::Stopped,
                read = tokio::time::timeout(self.read_timeout, socket.recv_from(&mut buf)) => read,
            };

            match read {
                // Read deadline passed with no traffic.
                Err(_) => continue,
                Ok(Ok((len, src))) => {
                    let packet = buf[..len].to_vec();
                    self.handlers.spawn(handle_request(
                        socket.clone(),
                        self.resolver.clone(),
                        self.stats.clone(),
                        packet,
                        src,
                    ));
                }
                Ok(Err(e)) => {
                    if let Some(next) = self.on_read_error(&e) {
                        return next;
                    }
                }
            }
        }
    }

    /// State to leave `Serving` for after a failed read, or `None` to keep
    /// reading from the same socket.
    fn on_read_error(&self, err: &io::Error) -> Option<State> {
        match classify_read_error(err) {
            ReadFailure::Timeout => None,
            ReadFailure::Temporary => {
                warn!(error = %err, "temporary UDP read error");
                None
            }
            ReadFailure::Fatal => {
                error!(error = %err, "UDP read failed, abandoning socket");
                Some(State::BackingOff)
            }
        }
    }
}

/// Answer one datagram. No retries: a failed send is logged and the client
/// is left to retransmit.
async fn handle_request(
    socket: Arc<UdpSocket>,
    resolver: Arc<Resolver>,
    stats: Arc<Stats>,
    packet: Vec<u8>,
    src: SocketAddr,
) {
    let start_time = Instant::now();

    let (response, answered) = match resolver.process_query(&packet) {
        QueryAction::Drop(err) => {
            log_dropped(err, src);
            stats.record_dropped(elapsed_ms(start_time));
            return;
        }
        QueryAction::Answer {
            response,
            name,
            address,
        } => {
            log_answered(&name, address, src, elapsed_ms(start_time));
            (response, true)
        }
        QueryAction::Empty { response, name } => {
            log_empty(&name, src, elapsed_ms(start_time));
            (response, false)
        }
    };

    if let Err(e) = socket.send_to(&response, src).await {
        log_send_failed(&e, src);
        stats.record_send_failure();
    }

    let elapsed = elapsed_ms(start_time);
    if answered {
        stats.record_answered(elapsed);
    } else {
        stats.record_empty(elapsed);
    }
}

fn elapsed_ms(start_time: Instant) -> f64 {
    start_time.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{HostMap, ResolutionTable};
    use std::net::Ipv4Addr;

    fn query(id: u16, name: &str) -> Vec<u8> {
        let mut packet = Vec::new();
        packet.extend_from_slice(&id.to_be_bytes());
        packet.extend_from_slice(&[0x01, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);
        for label in name.split('.') {
            packet.push(label.len() as u8);
            packet.extend_from_slice(label.as_bytes());
        }
        packet.extend_from_slice(&[0x00, 0x00, 0x01, 0x00, 0x01]);
        packet
    }

    fn resolver() -> Arc<Resolver> {
        let table = Arc::new(ResolutionTable::new());
        let mut hosts = HostMap::default();
        hosts.insert("www".to_string(), Ipv4Addr::new(1, 2, 3, 4));
        table.replace(hosts);
        Arc::new(Resolver::new(table))
    }

    async fn socket_pair() -> (Arc<UdpSocket>, UdpSocket) {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.connect(server.local_addr().unwrap()).await.unwrap();
        (Arc::new(server), client)
    }

    #[tokio::test]
    async fn handle_request_answers_known_name() {
        let (server, client) = socket_pair().await;
        let stats = Arc::new(Stats::new());
        let src = client.local_addr().unwrap();

        handle_request(server, resolver(), stats.clone(), query(9, "www"), src).await;

        let mut buf = [0u8; 512];
        let len = client.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[0..2], &[0x00, 0x09]);
        assert_eq!(&buf[len - 4..len], &[1, 2, 3, 4]);
        assert_eq!(stats.snapshot_and_reset().answered, 1);
    }

    #[tokio::test]
    async fn handle_request_sends_empty_for_unknown_name() {
        let (server, client) = socket_pair().await;
        let stats = Arc::new(Stats::new());
        let src = client.local_addr().unwrap();
        let packet = query(10, "nope.example");

        handle_request(server, resolver(), stats.clone(), packet.clone(), src).await;

        let mut buf = [0u8; 512];
        let len = client.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[6..8], &[0x00, 0x00]);
        assert_eq!(&buf[12..len], &packet[12..]);
        assert_eq!(stats.snapshot_and_reset().empty, 1);
    }

    #[tokio::test]
    async fn handle_request_drops_garbage_silently() {
        let (server, client) = socket_pair().await;
        let stats = Arc::new(Stats::new());
        let src = client.local_addr().unwrap();

        handle_request(server, resolver(), stats.clone(), vec![0xFF; 5], src).await;

        let mut buf = [0u8; 512];
        let recv = tokio::time::timeout(Duration::from_millis(100), client.recv(&mut buf)).await;
        assert!(recv.is_err(), "no reply expected");
        assert_eq!(stats.snapshot_and_reset().dropped, 1);
    }

    fn test_server(bind_addr: SocketAddr, backoff: Duration) -> UdpServer {
        UdpServer::new(bind_addr, resolver(), Arc::new(Stats::new()))
            .with_timeouts(Duration::from_millis(50), backoff)
    }

    #[test]
    fn temporary_read_errors_keep_serving() {
        let server = test_server("127.0.0.1:0".parse().unwrap(), Duration::from_millis(10));

        for kind in [
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::ConnectionRefused,
            io::ErrorKind::Interrupted,
            io::ErrorKind::WouldBlock,
        ] {
            assert!(server.on_read_error(&io::Error::from(kind)).is_none());
        }
    }

    #[tokio::test]
    async fn fatal_read_error_rebinds_after_backoff() {
        let server = test_server("127.0.0.1:0".parse().unwrap(), Duration::from_millis(10));

        let next = server.on_read_error(&io::Error::other("socket closed"));
        assert!(matches!(next, Some(State::BackingOff)));

        let next = server.back_off().await;
        assert!(matches!(next, State::Acquiring));

        let next = server.acquire().await;
        assert!(matches!(next, State::Serving(_)));
    }

    #[tokio::test]
    async fn serving_keeps_socket_after_garbage() {
        let server = test_server("127.0.0.1:0".parse().unwrap(), Duration::from_secs(3600));
        let token = CancellationToken::new();
        let server = server.with_cancellation(token.clone());
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let addr = socket.local_addr().unwrap();

        let serving = tokio::spawn(async move { server.serve(socket).await });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(&[0u8; 3], addr).await.unwrap();
        client.send_to(&query(4, "www"), addr).await.unwrap();

        let mut buf = [0u8; 512];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
            .await
            .expect("no reply after garbage")
            .unwrap();
        assert_eq!(&buf[..2], &[0x00, 0x04]);
        assert_eq!(&buf[len - 4..len], &[1, 2, 3, 4]);
        assert!(!serving.is_finished());

        token.cancel();
        let next = serving.await.unwrap();
        assert!(matches!(next, State::Stopped));
    }

    #[tokio::test]
    async fn run_stops_on_cancellation() {
        let token = CancellationToken::new();
        let server = UdpServer::new(
            "127.0.0.1:0".parse().unwrap(),
            resolver(),
            Arc::new(Stats::new()),
        )
        .with_timeouts(Duration::from_millis(50), Duration::from_millis(50))
        .with_cancellation(token.clone());

        let handle = tokio::spawn(server.run());
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("server did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn bind_failure_backs_off_until_cancelled() {
        let taken = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let token = CancellationToken::new();
        let server = UdpServer::new(
            taken.local_addr().unwrap(),
            resolver(),
            Arc::new(Stats::new()),
        )
        .with_timeouts(Duration::from_millis(50), Duration::from_secs(3600))
        .with_cancellation(token.clone());

        let handle = tokio::spawn(server.run());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!handle.is_finished());

        token.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("server did not stop during backoff")
            .unwrap();
    }
}
