//! DNS Module Tests
//!
//! Covers:
//! - `Name` parsing from URLs
//! - `OverrideResolver` using a mock resolver
//! - `CachingResolver` and `HostCache` expiry/capacity
//! - `GaiResolver` (system resolver)

use preconnect::base::neterror::NetError;
use preconnect::dns::{
    CachingResolver, GaiResolver, HostCache, Name, OverrideResolver, Resolve, Resolving,
};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

struct MockResolver {
    response: Vec<IpAddr>,
    calls: AtomicUsize,
}

impl MockResolver {
    fn new(response: Vec<IpAddr>) -> Arc<Self> {
        Arc::new(Self { response, calls: AtomicUsize::new(0) })
    }
}

impl Resolve for MockResolver {
    fn resolve(&self, name: Name) -> Resolving {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let addrs = self.response.clone();
        Box::pin(async move {
            if addrs.is_empty() {
                Err(NetError::dns_failed(name.as_str(), std::io::Error::other("no records")))
            } else {
                Ok(addrs)
            }
        })
    }
}

const EIGHTS: IpAddr = IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8));

#[test]
fn test_name_from_url() {
    let name = Name::from_url(&Url::parse("https://example.com:8443/").unwrap()).unwrap();
    assert_eq!(name.as_str(), "example.com");
    assert!(name.ip_literal().is_none());

    let v6 = Name::from_url(&Url::parse("http://[::1]:8080/").unwrap()).unwrap();
    assert_eq!(v6.as_str(), "::1");
    assert_eq!(v6.ip_literal(), Some(IpAddr::V6(Ipv6Addr::LOCALHOST)));
}

#[tokio::test]
async fn test_override_hit_and_passthrough() {
    let mock = MockResolver::new(vec![EIGHTS]);
    let mut overrides = HashMap::new();
    overrides.insert("local.override".to_string(), vec![IpAddr::V4(Ipv4Addr::LOCALHOST)]);
    let resolver = OverrideResolver::new(mock.clone(), overrides);

    let addrs = resolver.resolve(Name::new("local.override")).await.unwrap();
    assert_eq!(addrs, vec![IpAddr::V4(Ipv4Addr::LOCALHOST)]);
    assert_eq!(mock.calls.load(Ordering::SeqCst), 0);

    let addrs = resolver.resolve(Name::new("other.com")).await.unwrap();
    assert_eq!(addrs, vec![EIGHTS]);
    assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_caching_resolver_reports_cache_hits() {
    let mock = MockResolver::new(vec![EIGHTS]);
    let resolver = CachingResolver::new(mock.clone(), HostCache::default());

    let (addrs, cached) = resolver.resolve(Name::new("example.com")).await.unwrap();
    assert_eq!(addrs, vec![EIGHTS]);
    assert!(!cached);

    let (_, cached) = resolver.resolve(Name::new("example.com")).await.unwrap();
    assert!(cached);
    assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
    assert!(resolver.lookup_cached(&Name::new("example.com")).is_some());
}

#[tokio::test]
async fn test_caching_resolver_does_not_cache_failures() {
    let mock = MockResolver::new(Vec::new());
    let resolver = CachingResolver::new(mock.clone(), HostCache::default());

    let err = resolver.resolve(Name::new("missing.test")).await.unwrap_err();
    assert!(err.is_dns_error());
    assert!(resolver.resolve(Name::new("missing.test")).await.is_err());
    assert_eq!(mock.calls.load(Ordering::SeqCst), 2);
    assert!(resolver.cache().is_empty());
}

#[tokio::test]
async fn test_ip_literals_skip_resolution() {
    let mock = MockResolver::new(vec![EIGHTS]);
    let resolver = CachingResolver::new(mock.clone(), HostCache::default());

    let (addrs, cached) = resolver.resolve(Name::new("127.0.0.1")).await.unwrap();
    assert_eq!(addrs, vec![IpAddr::V4(Ipv4Addr::LOCALHOST)]);
    assert!(cached);
    assert_eq!(mock.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_host_cache_expiry() {
    let cache = HostCache::new(Duration::from_millis(20), 10);
    cache.insert("short.test", vec![EIGHTS]);
    assert_eq!(cache.lookup("short.test"), Some(vec![EIGHTS]));

    std::thread::sleep(Duration::from_millis(40));
    assert!(cache.lookup("short.test").is_none());
    assert!(cache.is_empty());
}

#[test]
fn test_host_cache_capacity() {
    let cache = HostCache::new(Duration::from_secs(60), 2);
    cache.insert("a.test", vec![EIGHTS]);
    std::thread::sleep(Duration::from_millis(2));
    cache.insert("b.test", vec![EIGHTS]);
    cache.insert("c.test", vec![EIGHTS]);

    assert_eq!(cache.len(), 2);
    assert!(cache.lookup("a.test").is_none());
    assert!(cache.lookup("c.test").is_some());

    // Refreshing an existing entry never evicts.
    cache.insert("c.test", vec![EIGHTS]);
    assert_eq!(cache.len(), 2);
}

#[tokio::test]
async fn test_gai_resolver_localhost() {
    let resolver = GaiResolver::new();
    let addrs = resolver.resolve(Name::new("localhost")).await.unwrap();
    assert!(addrs.iter().any(|ip| ip.is_loopback()));
}
