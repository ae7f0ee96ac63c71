//! Client for Goniec, the receiver that uploads changed files from the
//! tournament directory.
//!
//! The protocol is one-way: the working directory, one relative path per
//! line, then `bye`. Nothing is read back.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::BiddingError;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8090;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoniecTarget {
    pub host: String,
    pub port: u16,
}

impl Default for GoniecTarget {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl fmt::Display for GoniecTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for GoniecTarget {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let (host, port) = match value.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (value, None),
        };
        let host = if host.is_empty() { DEFAULT_HOST } else { host };
        let port = match port.map(str::trim).filter(|port| !port.is_empty()) {
            Some(port) => port
                .parse::<u16>()
                .map_err(|_| format!("invalid Goniec port '{port}'"))?,
            None => DEFAULT_PORT,
        };
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushState {
    Idle,
    Connecting,
    Sending,
    Closed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct PushClient {
    target: GoniecTarget,
    timeout: Duration,
    force_resend: bool,
    state: PushState,
}

impl PushClient {
    pub fn new(target: GoniecTarget, timeout: Duration, force_resend: bool) -> Self {
        Self {
            target,
            timeout,
            force_resend,
            state: PushState::Idle,
        }
    }

    pub fn state(&self) -> PushState {
        self.state
    }

    pub fn target(&self) -> &GoniecTarget {
        &self.target
    }

    /// Paths to announce, relative to `working_directory`: candidates that exist
    /// below it and changed (or everything, when resending is forced).
    pub fn prepare(
        &self,
        working_directory: &str,
        candidates: &[PathBuf],
        changed: &[PathBuf],
    ) -> Vec<String> {
        let mut files = Vec::new();
        for candidate in candidates {
            let Some(relative) = candidate
                .to_str()
                .and_then(|path| path.strip_prefix(working_directory))
            else {
                debug!(path = %candidate.display(), "Outside working directory, not sending");
                continue;
            };
            if !candidate.exists() {
                continue;
            }
            if self.force_resend || changed.contains(candidate) {
                files.push(relative.to_string());
            }
        }
        files.dedup();
        files
    }

    pub fn payload(working_directory: &str, files: &[String]) -> String {
        let mut lines = Vec::with_capacity(files.len() + 3);
        lines.push(working_directory);
        lines.extend(files.iter().map(String::as_str));
        lines.push("bye");
        lines.push("");
        lines.join("\n")
    }

    /// Send `files`; returns how many were announced.
    pub async fn push(
        &mut self,
        working_directory: &str,
        files: &[String],
    ) -> Result<usize, BiddingError> {
        if files.is_empty() {
            info!("Nothing to send");
            return Ok(0);
        }

        self.state = PushState::Connecting;
        let address = (self.target.host.as_str(), self.target.port);
        let mut stream = match timeout(self.timeout, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => return Err(self.fail(err.to_string())),
            Err(_) => return Err(self.fail(format!("connection timed out after {:?}", self.timeout))),
        };
        info!(receiver = %self.target, "Connected to Goniec");

        self.state = PushState::Sending;
        let payload = Self::payload(working_directory, files);
        let send = async {
            stream.write_all(payload.as_bytes()).await?;
            stream.shutdown().await
        };
        match timeout(self.timeout, send).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(self.fail(err.to_string())),
            Err(_) => return Err(self.fail(format!("sending timed out after {:?}", self.timeout))),
        }
        self.state = PushState::Closed;

        info!(working_directory, "Working directory sent to Goniec");
        for file in files {
            info!(file = %file, "Sent file to Goniec");
        }
        Ok(files.len())
    }

    fn fail(&mut self, reason: String) -> BiddingError {
        self.state = PushState::Failed;
        BiddingError::Push {
            target: self.target.to_string(),
            reason,
        }
    }
}
