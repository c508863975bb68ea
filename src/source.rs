//! External record sources.
//!
//! A source produces text made of `address;hostname` lines. The command
//! source runs an operator-supplied program and reads its standard output.

use std::future::Future;
use std::net::Ipv4Addr;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::RecordSourceError;
use crate::table::HostMap;

/// Something that can be asked for the current set of records.
pub trait RecordSource: Send + Sync + 'static {
    /// Fetch the raw `address;hostname` text.
    fn fetch(&self) -> impl Future<Output = Result<String, RecordSourceError>> + Send;
}

/// Runs a program and treats its standard output as the record list.
#[derive(Debug, Clone)]
pub struct CommandSource {
    program: String,
    args: Vec<String>,
}

impl CommandSource {
    /// Build a source from a full invocation: program followed by its
    /// arguments.
    pub fn new(invocation: Vec<String>) -> Result<Self, RecordSourceError> {
        let mut parts = invocation.into_iter();
        let program = parts.next().ok_or(RecordSourceError::EmptyCommand)?;

        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl RecordSource for CommandSource {
    async fn fetch(&self) -> Result<String, RecordSourceError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(RecordSourceError::Exit {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Build a host map from `address;hostname` lines.
///
/// Lines split at the first `;`. Lines without one, or whose address is not
/// an IPv4 address, are skipped. A hostname seen twice keeps the last address.
pub fn parse_records(text: &str) -> HostMap {
    let mut hosts = HostMap::default();

    for line in text.lines() {
        let Some((address, hostname)) = line.split_once(';') else {
            if !line.is_empty() {
                debug!(line, "skipping malformed record");
            }
            continue;
        };

        let address: Ipv4Addr = match address.parse() {
            Ok(a) => a,
            Err(_) => {
                warn!(address, hostname, "skipping record with invalid IPv4 address");
                continue;
            }
        };

        debug!(%address, hostname, "got record");
        hosts.insert(hostname.to_string(), address);
    }

    hosts
}
