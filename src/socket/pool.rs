use crate::base::loadflags::{LoadFlags, PrivacyMode};
use crate::base::neterror::NetError;
use crate::dns::CachingResolver;
use crate::socket::client::SocketType;
use crate::socket::connectjob::ConnectJob;
use crate::socket::tls::TlsConfig;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Identifies a socket group (scheme, host, port, privacy mode).
///
/// Credentialed and uncredentialed sockets never share a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupId {
    scheme: String,
    host: String,
    port: u16,
    privacy_mode: PrivacyMode,
}

impl GroupId {
    pub fn new(origin: &Url, privacy_mode: PrivacyMode) -> Option<Self> {
        Some(GroupId {
            scheme: origin.scheme().to_string(),
            host: origin.host_str()?.to_string(),
            port: origin.port_or_known_default()?,
            privacy_mode,
        })
    }
}

struct IdleSocket {
    socket: SocketType,
    start_time: Instant,
}

#[derive(Default)]
struct Group {
    idle_sockets: VecDeque<IdleSocket>,
    connecting: usize,
}

impl Group {
    fn total_slots(&self) -> usize {
        self.idle_sockets.len() + self.connecting
    }
}

/// Pool of warm sockets opened ahead of use.
///
/// `preconnect` brings a group up to the requested number of sockets (capped
/// per group); finished sockets wait idle until `take_idle_socket` claims
/// them or they age out.
pub struct PreconnectSocketPool {
    max_sockets_per_group: usize,
    unused_idle_timeout: Duration,
    connect_timeout: Duration,
    tls: TlsConfig,
    resolver: Arc<CachingResolver>,
    groups: DashMap<GroupId, Group>,
}

impl std::fmt::Debug for PreconnectSocketPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreconnectSocketPool")
            .field("max_sockets_per_group", &self.max_sockets_per_group)
            .field("groups", &self.groups.len())
            .field("idle_sockets", &self.idle_socket_count())
            .finish()
    }
}

impl PreconnectSocketPool {
    pub fn new(
        resolver: Arc<CachingResolver>,
        tls: TlsConfig,
        max_sockets_per_group: usize,
        connect_timeout: Duration,
        unused_idle_timeout: Duration,
    ) -> Self {
        Self {
            max_sockets_per_group: max_sockets_per_group.max(1),
            unused_idle_timeout,
            connect_timeout,
            tls,
            resolver,
            groups: DashMap::new(),
        }
    }

    /// Starts enough connect jobs for the group of `origin` to hold
    /// `num_sockets` sockets. Returns how many jobs were started.
    ///
    /// Must be called from within a tokio runtime.
    pub fn preconnect(
        self: &Arc<Self>,
        origin: &Url,
        num_sockets: usize,
        load_flags: LoadFlags,
        privacy_mode: PrivacyMode,
    ) -> usize {
        let Some(group_id) = GroupId::new(origin, privacy_mode) else {
            tracing::warn!(origin = %origin, "cannot preconnect to origin without host/port");
            return 0;
        };

        if num_sockets > self.max_sockets_per_group {
            let err = NetError::PreconnectMaxSocketLimit;
            tracing::debug!(
                origin = %origin,
                requested = num_sockets,
                max = self.max_sockets_per_group,
                code = err.as_i32(),
                "{err}, clamping"
            );
        }

        let to_start = {
            let mut group = self.groups.entry(group_id.clone()).or_default();
            let target = num_sockets.min(self.max_sockets_per_group);
            let to_start = target.saturating_sub(group.total_slots());
            group.connecting += to_start;
            to_start
        };

        tracing::debug!(
            origin = %origin,
            requested = num_sockets,
            starting = to_start,
            ?load_flags,
            privacy = privacy_mode.is_enabled(),
            "preconnecting sockets"
        );

        for _ in 0..to_start {
            let pool = Arc::clone(self);
            let origin = origin.clone();
            let group_id = group_id.clone();
            tokio::spawn(async move { pool.run_connect_job(group_id, origin).await });
        }
        to_start
    }

    async fn run_connect_job(&self, group_id: GroupId, origin: Url) {
        let result = match ConnectJob::new(&origin, self.tls.clone(), self.connect_timeout) {
            Ok(job) => job.connect(&self.resolver).await,
            Err(e) => Err(e),
        };

        let mut group = self.groups.entry(group_id).or_default();
        group.connecting = group.connecting.saturating_sub(1);
        match result {
            Ok(socket) => {
                tracing::debug!(
                    origin = %origin,
                    tls = socket.is_tls(),
                    "preconnected socket ready"
                );
                group.idle_sockets.push_back(IdleSocket { socket, start_time: Instant::now() });
            }
            Err(e) => {
                tracing::debug!(
                    origin = %origin,
                    error = %e,
                    code = e.as_i32(),
                    "preconnect failed"
                );
            }
        }
    }

    /// Claims a warm socket for `origin`, skipping any that died while idle.
    pub fn take_idle_socket(&self, origin: &Url, privacy_mode: PrivacyMode) -> Option<SocketType> {
        let group_id = GroupId::new(origin, privacy_mode)?;
        let mut group = self.groups.get_mut(&group_id)?;
        while let Some(idle) = group.idle_sockets.pop_front() {
            if idle.socket.is_connected() {
                return Some(idle.socket);
            }
        }
        None
    }

    pub fn idle_socket_count(&self) -> usize {
        self.groups.iter().map(|g| g.idle_sockets.len()).sum()
    }

    pub fn connecting_count(&self) -> usize {
        self.groups.iter().map(|g| g.connecting).sum()
    }

    /// Idle sockets in the group of `origin`.
    pub fn idle_count_for(&self, origin: &Url, privacy_mode: PrivacyMode) -> usize {
        GroupId::new(origin, privacy_mode)
            .and_then(|gid| self.groups.get(&gid).map(|g| g.idle_sockets.len()))
            .unwrap_or(0)
    }

    /// Drops idle sockets that were never claimed within the unused-socket
    /// timeout or that the peer closed, then forgets empty groups.
    pub fn cleanup_idle_sockets(&self) {
        let now = Instant::now();
        let timeout = self.unused_idle_timeout;
        for mut entry in self.groups.iter_mut() {
            entry.idle_sockets.retain(|idle| {
                now.duration_since(idle.start_time) < timeout && idle.socket.is_connected()
            });
        }
        self.groups.retain(|_, g| g.total_slots() > 0);
    }

    /// Spawns a task that runs [`cleanup_idle_sockets`](Self::cleanup_idle_sockets)
    /// periodically for as long as the pool is alive.
    pub fn start_cleanup_task(self: &Arc<Self>, interval: Duration) {
        let pool = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(pool) = pool.upgrade() else { break };
                pool.cleanup_idle_sockets();
            }
        });
    }
}
