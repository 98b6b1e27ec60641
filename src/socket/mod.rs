//! Socket handling for pre-connection, mirroring Chromium's `net/socket/`:
//! - [`pool`]: warm-socket pool, partitioned by origin and privacy mode
//! - [`connectjob`]: DNS → TCP → TLS connection flow
//! - [`tls`]: TLS configuration with BoringSSL

pub mod client;
pub mod connectjob;
pub mod pool;
pub mod tls;
