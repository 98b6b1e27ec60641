//! hickory-dns backend.
//!
//! Reads `/etc/resolv.conf` (or the platform equivalent) once and falls back
//! to hickory's public-resolver defaults when that fails.

use super::{Name, Resolve, Resolving};
use crate::base::neterror::NetError;
use hickory_resolver::config::{LookupIpStrategy, ResolverConfig};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use std::io;
use std::net::IpAddr;
use std::sync::{Arc, OnceLock};

fn system_resolver() -> Arc<TokioResolver> {
    static SHARED: OnceLock<Arc<TokioResolver>> = OnceLock::new();
    SHARED
        .get_or_init(|| {
            let mut builder = TokioResolver::builder_tokio().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "no usable system DNS config, using hickory defaults");
                TokioResolver::builder_with_config(
                    ResolverConfig::default(),
                    TokioConnectionProvider::default(),
                )
            });
            // Preresolution should warm both families; the connect job picks.
            builder.options_mut().ip_strategy = LookupIpStrategy::Ipv4AndIpv6;
            Arc::new(builder.build())
        })
        .clone()
}

/// Async resolver over a process-wide hickory `TokioResolver`.
#[derive(Clone)]
pub struct HickoryResolver {
    inner: Arc<TokioResolver>,
}

impl HickoryResolver {
    pub fn new() -> Self {
        Self { inner: system_resolver() }
    }
}

impl Default for HickoryResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HickoryResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HickoryResolver").finish_non_exhaustive()
    }
}

impl Resolve for HickoryResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            let not_found = |reason: String| {
                NetError::dns_failed(name.as_str(), io::Error::new(io::ErrorKind::NotFound, reason))
            };

            let answer = inner.lookup_ip(name.as_str()).await.map_err(|e| {
                tracing::debug!(host = %name, error = %e, "hickory lookup failed");
                not_found(e.to_string())
            })?;

            let addrs: Vec<IpAddr> = answer.iter().collect();
            if addrs.is_empty() {
                return Err(not_found("empty answer".into()));
            }
            tracing::trace!(host = %name, count = addrs.len(), "hickory lookup done");
            Ok(addrs)
        })
    }
}
