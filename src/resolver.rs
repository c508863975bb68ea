//! DNS query resolution logic.
//!
//! Handles the per-datagram pipeline:
//! 1. Parse and validate the question
//! 2. Look the name up in the current table snapshot
//! 3. Encode an answer, or an empty response for unknown names
//!
//! Transports handle the actual I/O, resolver handles decisions.

use std::net::Ipv4Addr;
use std::sync::Arc;

use crate::dns::Question;
use crate::error::DnsError;
use crate::table::ResolutionTable;

/// Action to take for a DNS query.
#[derive(Debug)]
pub enum QueryAction {
    /// The name is known; send this answer.
    Answer {
        response: Vec<u8>,
        name: String,
        address: Ipv4Addr,
    },
    /// The name is not in the table; send this response with no answers.
    Empty { response: Vec<u8>, name: String },
    /// The datagram is not a query we serve. Nothing is sent back.
    Drop(DnsError),
}

/// Resolver turns raw queries into responses against the shared table.
pub struct Resolver {
    table: Arc<ResolutionTable>,
}

impl Resolver {
    pub fn new(table: Arc<ResolutionTable>) -> Self {
        Self { table }
    }

    /// Process a raw DNS query and decide what to send back.
    pub fn process_query(&self, query: &[u8]) -> QueryAction {
        let question = match Question::parse(query) {
            Ok(q) => q,
            Err(e) => return QueryAction::Drop(e),
        };

        match self.table.lookup(question.name()) {
            Some(address) => QueryAction::Answer {
                response: question.encode_answer(address),
                name: question.name().to_string(),
                address,
            },
            None => QueryAction::Empty {
                response: question.encode_empty(),
                name: question.name().to_string(),
            },
        }
    }

    /// Returns the number of names currently in the table.
    pub fn host_count(&self) -> usize {
        self.table.len()
    }
}
