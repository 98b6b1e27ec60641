//! IO error mapping for the connect and resolve paths.
//!
//! Raw `io::Error`s become [`NetError`]s that name the origin being warmed,
//! so a failed preconnect in the logs says which host it was for.

use crate::base::neterror::NetError;
use std::io;

pub trait IoResultExt<T> {
    /// TCP connect failures. Refusals and timeouts keep their own codes;
    /// anything else becomes [`NetError::ConnectionFailedTo`].
    fn connection_context(self, host: &str, port: u16) -> Result<T, NetError>;

    /// Host lookup failures, as [`NetError::NameNotResolvedFor`].
    fn dns_context(self, domain: &str) -> Result<T, NetError>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn connection_context(self, host: &str, port: u16) -> Result<T, NetError> {
        self.map_err(|e| match e.kind() {
            io::ErrorKind::ConnectionRefused => NetError::ConnectionRefused,
            io::ErrorKind::TimedOut => NetError::ConnectionTimedOut,
            _ => NetError::connection_failed_to(host, port, e),
        })
    }

    fn dns_context(self, domain: &str) -> Result<T, NetError> {
        self.map_err(|e| NetError::dns_failed(domain, e))
    }
}
