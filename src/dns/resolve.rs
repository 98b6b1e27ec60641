//! Core DNS resolution types and traits.

use crate::base::neterror::NetError;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use url::{Host, Url};

/// A hostname (or IP literal) to resolve.
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct Name {
    host: Box<str>,
}

impl Name {
    #[inline]
    pub fn new(host: impl Into<Box<str>>) -> Self {
        Self { host: host.into() }
    }

    /// Extracts the host of `url`. IPv6 literals lose their brackets.
    pub fn from_url(url: &Url) -> Option<Self> {
        match url.host()? {
            Host::Domain(domain) => Some(Name::new(domain)),
            Host::Ipv4(ip) => Some(Name::new(ip.to_string())),
            Host::Ipv6(ip) => Some(Name::new(ip.to_string())),
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.host
    }

    /// The address this name spells out, when it is an IP literal.
    pub fn ip_literal(&self) -> Option<IpAddr> {
        self.host.parse().ok()
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Name::new(value)
    }
}

impl From<String> for Name {
    fn from(value: String) -> Self {
        Name::new(value)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.host, f)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.host, f)
    }
}

/// Future returned by a resolver. Resolves to at least one address on success.
pub type Resolving = BoxFuture<'static, Result<Vec<IpAddr>, NetError>>;

/// Host resolution, equivalent to Chromium's `HostResolver`.
///
/// Implementations must be thread-safe; the returned future is spawned onto
/// the runtime by the network context.
pub trait Resolve: Send + Sync {
    fn resolve(&self, name: Name) -> Resolving;
}

impl<R: Resolve + ?Sized> Resolve for Arc<R> {
    fn resolve(&self, name: Name) -> Resolving {
        (**self).resolve(name)
    }
}

/// Resolver that answers a fixed set of hostnames itself and forwards the
/// rest to an inner resolver.
///
/// Handy for tests and for pinning hosts to local addresses.
pub struct OverrideResolver {
    inner: Arc<dyn Resolve>,
    overrides: Arc<HashMap<String, Vec<IpAddr>>>,
}

impl OverrideResolver {
    pub fn new(inner: Arc<dyn Resolve>, overrides: HashMap<String, Vec<IpAddr>>) -> Self {
        Self { inner, overrides: Arc::new(overrides) }
    }

    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }
}

impl Resolve for OverrideResolver {
    fn resolve(&self, name: Name) -> Resolving {
        match self.overrides.get(name.as_str()) {
            Some(addrs) if !addrs.is_empty() => {
                let addrs = addrs.clone();
                Box::pin(std::future::ready(Ok(addrs)))
            }
            _ => self.inner.resolve(name),
        }
    }
}

impl fmt::Debug for OverrideResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverrideResolver")
            .field("override_count", &self.overrides.len())
            .finish_non_exhaustive()
    }
}
