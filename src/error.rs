use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the library can surface to a caller.
#[derive(Debug, Error)]
pub enum Error {
    #[error("network error talking to {endpoint}: {message}")]
    Network { endpoint: String, message: String },

    #[error("{endpoint} answered with an anti-bot challenge that could not be solved")]
    Challenge { endpoint: String },

    #[error("all {} proxies failed:{failures}", .failures.len())]
    ProxiesExhausted { failures: FailureReport },

    #[error("unrecognized page structure at {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no magnet link found on {0}")]
    Resolution(String),

    #[error("filesystem error at {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("cache error: {0}")]
    Cache(String),
}

/// One endpoint's failed attempt, kept for the exhaustion report.
#[derive(Debug)]
pub struct EndpointFailure {
    pub endpoint: String,
    pub error: Error,
}

/// Ordered per-endpoint failures of one logical request.
#[derive(Debug, Default)]
pub struct FailureReport(pub Vec<EndpointFailure>);

impl FailureReport {
    pub fn push(&mut self, endpoint: impl Into<String>, error: Error) {
        self.0.push(EndpointFailure {
            endpoint: endpoint.into(),
            error,
        });
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EndpointFailure> {
        self.0.iter()
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for failure in &self.0 {
            write!(f, "\n  {}: {}", failure.endpoint, failure.error)?;
        }
        Ok(())
    }
}

impl Error {
    pub fn parse(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for this error when it reaches the CLI boundary.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidInput(_) => 2,
            Error::Network { .. } | Error::Challenge { .. } | Error::ProxiesExhausted { .. } => 3,
            Error::Parse { .. } | Error::Resolution(_) => 4,
            Error::Filesystem { .. } => 5,
            Error::Config(_) | Error::Cache(_) => 1,
        }
    }

    /// Short user-facing suggestion shown under the error message.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Error::InvalidInput(_) => Some("Check the command arguments and try again."),
            Error::Network { .. } | Error::ProxiesExhausted { .. } => {
                Some("Check your internet connection or add mirrors to the [network] proxies list.")
            }
            Error::Challenge { .. } => {
                Some("The site is rate limiting this client. Wait a moment and try again.")
            }
            Error::Parse { .. } => {
                Some("The site layout may have changed. Try again with --no-cache.")
            }
            Error::Resolution(_) => Some("Open the torrent page in a browser to copy the magnet link."),
            Error::Filesystem { .. } => Some("Check that the download directory is writable."),
            Error::Config(_) | Error::Cache(_) => None,
        }
    }
}
