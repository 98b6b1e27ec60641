//! Network context: the concrete gateway behind the preconnect scheduler.
//!
//! Based on the slice of Chromium's `network::NetworkContext` that
//! speculative connections use: `ResolveHost` and `PreconnectSockets`.

use crate::base::loadflags::{LoadFlags, PrivacyMode};
use crate::dns::{
    CachingResolver, GaiResolver, HickoryResolver, HostCache, Name, OverrideResolver, Resolve,
    DEFAULT_HOST_CACHE_CAPACITY, DEFAULT_HOST_CACHE_TTL,
};
use crate::predictors::{NetworkGateway, ResolveCompletion, ResolveOutcome};
use crate::socket::client::SocketType;
use crate::socket::pool::PreconnectSocketPool;
use crate::socket::tls::TlsConfig;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use url::Url;

/// Which built-in resolver backs the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolverKind {
    /// Async hickory-dns with the system configuration.
    #[default]
    Hickory,
    /// getaddrinfo on the blocking pool.
    System,
}

/// Configuration options for [`NetworkContext`].
#[derive(Clone)]
pub struct NetworkContextConfig {
    /// Built-in resolver used when `dns_resolver` is unset.
    pub resolver: ResolverKind,

    /// Custom DNS resolver (takes precedence over `resolver`).
    pub dns_resolver: Option<Arc<dyn Resolve>>,

    /// Hostnames answered locally without DNS.
    pub dns_overrides: HashMap<String, Vec<IpAddr>>,

    pub host_cache_ttl: Duration,
    pub host_cache_capacity: usize,

    /// Cap on idle plus connecting sockets per group.
    pub max_sockets_per_group: usize,

    /// Upper bound for one connect job (DNS, TCP and TLS together).
    pub connect_timeout: Duration,

    /// How long a preconnected socket may sit unclaimed.
    pub unused_idle_socket_timeout: Duration,

    pub tls: TlsConfig,
}

impl Default for NetworkContextConfig {
    fn default() -> Self {
        Self {
            resolver: ResolverKind::default(),
            dns_resolver: None,
            dns_overrides: HashMap::new(),
            host_cache_ttl: DEFAULT_HOST_CACHE_TTL,
            host_cache_capacity: DEFAULT_HOST_CACHE_CAPACITY,
            max_sockets_per_group: 6,
            connect_timeout: Duration::from_secs(10),
            unused_idle_socket_timeout: Duration::from_secs(10),
            tls: TlsConfig::default(),
        }
    }
}

impl std::fmt::Debug for NetworkContextConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkContextConfig")
            .field("resolver", &self.resolver)
            .field("dns_resolver", &self.dns_resolver.is_some())
            .field("dns_overrides_count", &self.dns_overrides.len())
            .field("host_cache_ttl", &self.host_cache_ttl)
            .field("host_cache_capacity", &self.host_cache_capacity)
            .field("max_sockets_per_group", &self.max_sockets_per_group)
            .field("connect_timeout", &self.connect_timeout)
            .field("unused_idle_socket_timeout", &self.unused_idle_socket_timeout)
            .finish()
    }
}

/// Resolver, host cache and warm-socket pool bundled behind
/// [`NetworkGateway`].
///
/// Gateway calls spawn their work onto the ambient tokio runtime. Outside a
/// runtime, resolves fail and preconnects are skipped.
#[derive(Debug)]
pub struct NetworkContext {
    resolver: Arc<CachingResolver>,
    socket_pool: Arc<PreconnectSocketPool>,
}

impl NetworkContext {
    pub fn new() -> Self {
        Self::with_config(NetworkContextConfig::default())
    }

    pub fn with_config(config: NetworkContextConfig) -> Self {
        let base: Arc<dyn Resolve> = match (&config.dns_resolver, config.resolver) {
            (Some(custom), _) => Arc::clone(custom),
            (None, ResolverKind::Hickory) => Arc::new(HickoryResolver::new()),
            (None, ResolverKind::System) => Arc::new(GaiResolver::new()),
        };
        let base: Arc<dyn Resolve> = if config.dns_overrides.is_empty() {
            base
        } else {
            Arc::new(OverrideResolver::new(base, config.dns_overrides.clone()))
        };

        let resolver = Arc::new(CachingResolver::new(
            base,
            HostCache::new(config.host_cache_ttl, config.host_cache_capacity),
        ));
        let socket_pool = Arc::new(PreconnectSocketPool::new(
            Arc::clone(&resolver),
            config.tls.clone(),
            config.max_sockets_per_group,
            config.connect_timeout,
            config.unused_idle_socket_timeout,
        ));

        Self { resolver, socket_pool }
    }

    pub fn resolver(&self) -> &Arc<CachingResolver> {
        &self.resolver
    }

    pub fn socket_pool(&self) -> &Arc<PreconnectSocketPool> {
        &self.socket_pool
    }

    /// Claims a preconnected socket for `origin`, if one is warm.
    pub fn take_preconnected_socket(
        &self,
        origin: &Url,
        privacy_mode: PrivacyMode,
    ) -> Option<SocketType> {
        self.socket_pool.take_idle_socket(origin, privacy_mode)
    }
}

impl Default for NetworkContext {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkGateway for NetworkContext {
    fn resolve_host(&self, origin: &Url, completion: ResolveCompletion) {
        let Some(name) = Name::from_url(origin) else {
            tracing::debug!(origin = %origin, "cannot resolve origin without host");
            completion.complete(ResolveOutcome::failed());
            return;
        };

        if self.resolver.lookup_cached(&name).is_some() {
            tracing::trace!(host = %name, "host cache hit");
            completion.complete(ResolveOutcome::resolved(true));
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!(host = %name, "no tokio runtime, preresolve fails");
            completion.complete(ResolveOutcome::failed());
            return;
        };

        let resolver = Arc::clone(&self.resolver);
        runtime.spawn(async move {
            let outcome = match resolver.resolve(name.clone()).await {
                Ok((_, was_cached)) => ResolveOutcome::resolved(was_cached),
                Err(e) => {
                    tracing::debug!(host = %name, error = %e, "preresolve failed");
                    ResolveOutcome::failed()
                }
            };
            completion.complete(outcome);
        });
    }

    fn preconnect_sockets(
        &self,
        num_sockets: usize,
        origin: &Url,
        load_flags: LoadFlags,
        privacy_mode: PrivacyMode,
    ) {
        if Handle::try_current().is_err() {
            tracing::warn!(origin = %origin, "no tokio runtime, skipping preconnect");
            return;
        }
        self.socket_pool.preconnect(origin, num_sockets, load_flags, privacy_mode);
    }
}
