//! TTL-bounded host cache and the resolver that fills it.
//!
//! The cache is what makes pre-resolution pay off: a later connect for the
//! same host finds its addresses here instead of going back to DNS.

use super::{Name, Resolve};
use crate::base::neterror::NetError;
use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default lifetime of a cached resolution.
pub const DEFAULT_HOST_CACHE_TTL: Duration = Duration::from_secs(60);

/// Default maximum number of cached hostnames.
pub const DEFAULT_HOST_CACHE_CAPACITY: usize = 1000;

#[derive(Debug, Clone)]
struct Entry {
    addrs: Vec<IpAddr>,
    expires_at: Instant,
}

/// Concurrent hostname → addresses cache.
#[derive(Debug)]
pub struct HostCache {
    entries: DashMap<String, Entry>,
    ttl: Duration,
    capacity: usize,
}

impl Default for HostCache {
    fn default() -> Self {
        Self::new(DEFAULT_HOST_CACHE_TTL, DEFAULT_HOST_CACHE_CAPACITY)
    }
}

impl HostCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self { entries: DashMap::new(), ttl, capacity: capacity.max(1) }
    }

    /// Returns the cached addresses for `host`, dropping the entry if stale.
    pub fn lookup(&self, host: &str) -> Option<Vec<IpAddr>> {
        let now = Instant::now();
        let entry = self.entries.get(host)?;
        if entry.expires_at > now {
            return Some(entry.addrs.clone());
        }
        drop(entry);
        self.entries.remove_if(host, |_, e| e.expires_at <= now);
        None
    }

    pub fn insert(&self, host: &str, addrs: Vec<IpAddr>) {
        if addrs.is_empty() {
            return;
        }
        if self.entries.len() >= self.capacity && !self.entries.contains_key(host) {
            self.evict_expired();
            if self.entries.len() >= self.capacity {
                self.evict_soonest_expiring();
            }
        }
        let expires_at = Instant::now() + self.ttl;
        self.entries.insert(host.to_string(), Entry { addrs, expires_at });
    }

    pub fn evict_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, e| e.expires_at > now);
    }

    fn evict_soonest_expiring(&self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|e| e.value().expires_at)
            .map(|e| e.key().clone());
        if let Some(host) = victim {
            self.entries.remove(&host);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// Resolver front end that consults a [`HostCache`] before the network.
pub struct CachingResolver {
    inner: Arc<dyn Resolve>,
    cache: HostCache,
}

impl CachingResolver {
    pub fn new(inner: Arc<dyn Resolve>, cache: HostCache) -> Self {
        Self { inner, cache }
    }

    /// Cached addresses for `name`, without touching the network.
    /// IP literals always hit.
    pub fn lookup_cached(&self, name: &Name) -> Option<Vec<IpAddr>> {
        if let Some(ip) = name.ip_literal() {
            return Some(vec![ip]);
        }
        self.cache.lookup(name.as_str())
    }

    /// Resolves `name`, returning the addresses and whether the cache answered.
    pub async fn resolve(&self, name: Name) -> Result<(Vec<IpAddr>, bool), NetError> {
        if let Some(addrs) = self.lookup_cached(&name) {
            return Ok((addrs, true));
        }
        let addrs = self.inner.resolve(name.clone()).await?;
        self.cache.insert(name.as_str(), addrs.clone());
        Ok((addrs, false))
    }

    pub fn cache(&self) -> &HostCache {
        &self.cache
    }
}

impl std::fmt::Debug for CachingResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingResolver").field("cache", &self.cache).finish_non_exhaustive()
    }
}
