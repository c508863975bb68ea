//! Transport layer for the DNS server.
//!
//! Only UDP is served. This module holds what a transport needs besides its
//! socket loop: buffer sizing, read error classification and query logging.

pub mod udp;

/// Receive buffer size; datagrams beyond this are truncated by the kernel.
pub const MAX_DNS_PACKET_SIZE: usize = 4096;

use std::io;
use std::net::{Ipv4Addr, SocketAddr};

use tracing::{debug, warn};

use crate::error::DnsError;

/// How the serving loop reacts to a failed socket read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFailure {
    /// Nothing arrived before the deadline. Read again.
    Timeout,
    /// Transient condition on a healthy socket. Log and read again.
    Temporary,
    /// The socket is unusable. Drop it and rebind after a backoff.
    Fatal,
}

/// Classify a socket read error.
///
/// Connection reset/refused show up on UDP sockets as ICMP errors from an
/// earlier send and say nothing about the socket itself.
pub fn classify_read_error(err: &io::Error) -> ReadFailure {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ReadFailure::Timeout,
        io::ErrorKind::Interrupted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionRefused => ReadFailure::Temporary,
        _ => ReadFailure::Fatal,
    }
}

pub(crate) fn log_answered(name: &str, address: Ipv4Addr, from: SocketAddr, elapsed_ms: f64) {
    debug!(
        qname = name,
        %address,
        %from,
        total_ms = elapsed_ms,
        "answered"
    );
}

pub(crate) fn log_empty(name: &str, from: SocketAddr, elapsed_ms: f64) {
    debug!(qname = name, %from, total_ms = elapsed_ms, "no answer");
}

pub(crate) fn log_dropped(err: DnsError, from: SocketAddr) {
    debug!(code = err.code(), error = %err, %from, "dropping request");
}

pub(crate) fn log_send_failed(err: &io::Error, from: SocketAddr) {
    warn!(error = %err, %from, "failed to send response");
}
