//! System DNS resolver using getaddrinfo.
//!
//! Runs `ToSocketAddrs` on tokio's blocking pool so the control loop and the
//! runtime workers never block on the OS resolver.

use super::{Name, Resolve, Resolving};
use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use std::io;
use std::net::{IpAddr, ToSocketAddrs};

/// System resolver honoring `/etc/hosts`, `nsswitch.conf` and friends.
#[derive(Clone, Debug, Default)]
pub struct GaiResolver;

impl GaiResolver {
    pub fn new() -> Self {
        Self
    }
}

impl Resolve for GaiResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(async move {
            let domain = name.as_str().to_string();
            let host = domain.clone();

            let joined = tokio::task::spawn_blocking(move || {
                tracing::trace!(host = %host, "resolving via getaddrinfo");
                (host.as_str(), 0u16).to_socket_addrs().map(|iter| {
                    let mut ips: Vec<IpAddr> = Vec::new();
                    for addr in iter {
                        if !ips.contains(&addr.ip()) {
                            ips.push(addr.ip());
                        }
                    }
                    ips
                })
            })
            .await;

            let ips = joined
                .map_err(|e| {
                    tracing::error!(error = %e, "getaddrinfo task failed");
                    NetError::NameResolutionFailed
                })?
                .dns_context(&domain)?;

            if ips.is_empty() {
                return Err(NetError::dns_failed(
                    domain,
                    io::Error::new(io::ErrorKind::NotFound, "getaddrinfo returned no addresses"),
                ));
            }

            tracing::debug!(domain = %domain, count = ips.len(), "getaddrinfo resolution complete");
            Ok(ips)
        })
    }
}
