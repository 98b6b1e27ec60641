use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Network errors surfaced by the preconnect gateway.
///
/// Codes follow Chromium's `net_error_list.h` so they can be logged and
/// compared against browser traces.
#[derive(Debug, Error, Clone)]
pub enum NetError {
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Connection aborted")]
    ConnectionAborted,
    #[error("Connection failed")]
    ConnectionFailed,
    #[error("Connection to {host}:{port} failed: {source}")]
    ConnectionFailedTo {
        host: String,
        port: u16,
        #[source]
        source: Arc<io::Error>,
    },
    #[error("Name not resolved")]
    NameNotResolved,
    #[error("Name not resolved for {domain}: {source}")]
    NameNotResolvedFor {
        domain: String,
        #[source]
        source: Arc<io::Error>,
    },
    #[error("SSL protocol error")]
    SslProtocolError,
    #[error("Connection timed out")]
    ConnectionTimedOut,
    #[error("Preconnect max socket limit")]
    PreconnectMaxSocketLimit,
    #[error("Name resolution failed")]
    NameResolutionFailed,
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Disallowed URL scheme")]
    DisallowedUrlScheme,
    #[error("Network context shut down")]
    ContextShutDown,

    #[error("Unknown error: {0}")]
    Unknown(i32),
}

impl NetError {
    /// Builds a [`NetError::ConnectionFailedTo`] carrying the underlying IO error.
    pub fn connection_failed_to(host: impl Into<String>, port: u16, source: io::Error) -> Self {
        NetError::ConnectionFailedTo { host: host.into(), port, source: Arc::new(source) }
    }

    /// Builds a [`NetError::NameNotResolvedFor`] carrying the underlying IO error.
    pub fn dns_failed(domain: impl Into<String>, source: io::Error) -> Self {
        NetError::NameNotResolvedFor { domain: domain.into(), source: Arc::new(source) }
    }

    /// True for any variant produced by a failed host lookup.
    pub fn is_dns_error(&self) -> bool {
        matches!(
            self,
            NetError::NameNotResolved
                | NetError::NameNotResolvedFor { .. }
                | NetError::NameResolutionFailed
        )
    }

    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::ConnectionRefused => -102,
            NetError::ConnectionAborted => -103,
            NetError::ConnectionFailed | NetError::ConnectionFailedTo { .. } => -104,
            NetError::NameNotResolved | NetError::NameNotResolvedFor { .. } => -105,
            NetError::SslProtocolError => -107,
            NetError::ConnectionTimedOut => -118,
            NetError::PreconnectMaxSocketLimit => -133,
            NetError::NameResolutionFailed => -137,
            NetError::InvalidUrl => -300,
            NetError::DisallowedUrlScheme => -301,
            // Custom code outside Chromium's ranges.
            NetError::ContextShutDown => -10001,
            NetError::Unknown(code) => *code,
        }
    }
}

impl From<i32> for NetError {
    fn from(code: i32) -> Self {
        match code {
            -102 => NetError::ConnectionRefused,
            -103 => NetError::ConnectionAborted,
            -104 => NetError::ConnectionFailed,
            -105 => NetError::NameNotResolved,
            -107 => NetError::SslProtocolError,
            -118 => NetError::ConnectionTimedOut,
            -133 => NetError::PreconnectMaxSocketLimit,
            -137 => NetError::NameResolutionFailed,
            -300 => NetError::InvalidUrl,
            -301 => NetError::DisallowedUrlScheme,
            -10001 => NetError::ContextShutDown,
            _ => NetError::Unknown(code),
        }
    }
}
