//! Base types and error handling.
//!
//! Provides foundational types mirroring Chromium's `net/base/`:
//! - [`NetError`](neterror::NetError): Network error codes matching `net_error_list.h`
//! - [`LoadFlags`](loadflags::LoadFlags) and [`PrivacyMode`](loadflags::PrivacyMode)
//! - [`origin`]: Reducing URLs to scheme, host and port

pub mod context;
pub mod loadflags;
pub mod neterror;
pub mod origin;
