//! Error types for hostmap-dns.

use std::io;
use std::process::ExitStatus;

use thiserror::Error;

/// Reasons an inbound datagram is rejected by the query parser.
///
/// Every kind is terminal for the request it came from: the datagram is
/// dropped without a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DnsError {
    #[error("request is not a query")]
    NotAQuestion,

    #[error("request is not a standard query")]
    NotAStandardQuery,

    #[error("request is truncated, which is not supported")]
    TruncationNotSupported,

    #[error("request has no questions")]
    NoQuestions,

    #[error("request has multiple questions")]
    MultipleQuestions,

    #[error("buffer too small")]
    MalformedBuffer,

    #[error("qclass is not IN")]
    QClassNotInet,

    #[error("qtype is not a host address (A)")]
    QTypeNotAddress,
}

impl DnsError {
    /// Stable numeric code, reported alongside the message in logs.
    pub fn code(self) -> i32 {
        match self {
            DnsError::NotAQuestion => 0,
            DnsError::NotAStandardQuery => 1,
            DnsError::TruncationNotSupported => 2,
            DnsError::NoQuestions => 3,
            DnsError::MultipleQuestions => 4,
            DnsError::MalformedBuffer => 5,
            DnsError::QClassNotInet => 6,
            DnsError::QTypeNotAddress => 7,
        }
    }
}

/// Failures of the external record source. A failed refresh keeps the
/// previous table.
#[derive(Debug, Error)]
pub enum RecordSourceError {
    #[error("no record source command given")]
    EmptyCommand,

    #[error("failed to run record source: {0}")]
    Spawn(#[from] io::Error),

    #[error("record source exited with {status}: {stderr}")]
    Exit { status: ExitStatus, stderr: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let all = [
            DnsError::NotAQuestion,
            DnsError::NotAStandardQuery,
            DnsError::TruncationNotSupported,
            DnsError::NoQuestions,
            DnsError::MultipleQuestions,
            DnsError::MalformedBuffer,
            DnsError::QClassNotInet,
            DnsError::QTypeNotAddress,
        ];

        let mut codes: Vec<i32> = all.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();

        assert_eq!(codes.len(), all.len());
    }

    #[test]
    fn display_is_human_readable() {
        assert_eq!(
            DnsError::MultipleQuestions.to_string(),
            "request has multiple questions"
        );
        assert_eq!(DnsError::MalformedBuffer.code(), 5);
    }
}
