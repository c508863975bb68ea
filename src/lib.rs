//! hostmap-dns - A DNS A-record responder driven by an external record source.
//!
//! The library exposes the codec, table and server pieces for testing and
//! benchmarking; `main.rs` wires them to the command line.

pub mod config;
pub mod dns;
pub mod error;
pub mod refresh;
pub mod resolver;
pub mod server;
pub mod source;
pub mod stats;
pub mod table;
pub mod transport;

pub use config::ServerConfig;
pub use dns::Question;
pub use error::{DnsError, RecordSourceError};
pub use source::{CommandSource, RecordSource};
pub use table::ResolutionTable;
