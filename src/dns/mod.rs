//! DNS Resolution Module
//!
//! Pluggable host resolution used by the network context:
//! - System resolver (getaddrinfo on the blocking pool)
//! - Async hickory-dns resolver
//! - Hostname-to-IP overrides
//! - A TTL host cache that records whether a lookup was already warm
//!
//! ```rust,ignore
//! use preconnect::dns::{CachingResolver, HickoryResolver, HostCache, Name};
//!
//! let resolver = CachingResolver::new(Arc::new(HickoryResolver::new()), HostCache::default());
//! let (addrs, was_cached) = resolver.resolve(Name::new("example.com")).await?;
//! ```

mod gai;
mod hickory;
mod hostcache;
mod resolve;

pub use gai::GaiResolver;
pub use hickory::HickoryResolver;
pub use hostcache::{
    CachingResolver, HostCache, DEFAULT_HOST_CACHE_CAPACITY, DEFAULT_HOST_CACHE_TTL,
};
pub use resolve::{Name, OverrideResolver, Resolve, Resolving};
