//! Per-`start` batch bookkeeping and the statistics handed to the delegate.

use crate::base::origin::host_key;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use url::Url;

/// Outcome of one successfully resolved job of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreconnectedRequestStats {
    pub origin: Url,
    pub was_preresolve_cached: bool,
    pub was_preconnected: bool,
}

impl PreconnectedRequestStats {
    pub fn new(origin: Url, was_preresolve_cached: bool, was_preconnected: bool) -> Self {
        Self { origin, was_preresolve_cached, was_preconnected }
    }
}

/// Everything a finished batch reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreconnectStats {
    pub url: Url,
    #[serde(skip)]
    pub start_time: Instant,
    pub requests_stats: Vec<PreconnectedRequestStats>,
    /// Time from `start` to the last job finishing. Zero until finalized.
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl PreconnectStats {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            start_time: Instant::now(),
            requests_stats: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

/// Stable handle of a live batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchId(u64);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch#{}", self.0)
    }
}

/// Aggregate state of the jobs issued by one `start` call.
#[derive(Debug)]
pub struct PreresolveInfo {
    pub url: Url,
    pub queued_count: usize,
    pub inflight_count: usize,
    pub was_canceled: bool,
    pub stats: PreconnectStats,
}

impl PreresolveInfo {
    pub fn new(url: Url, count: usize) -> Self {
        Self {
            stats: PreconnectStats::new(url.clone()),
            url,
            queued_count: count,
            inflight_count: 0,
            was_canceled: false,
        }
    }

    pub fn is_done(&self) -> bool {
        self.queued_count == 0 && self.inflight_count == 0
    }
}

/// Live batches, reachable by id and by host.
///
/// At most one batch exists per host key.
#[derive(Debug, Default)]
pub struct BatchRegistry {
    batches: HashMap<BatchId, PreresolveInfo>,
    by_host: HashMap<String, BatchId>,
    next_id: u64,
}

impl BatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a batch for the host of `url`. Returns `None` when that host
    /// already has a live batch.
    pub fn insert(&mut self, url: Url, count: usize) -> Option<BatchId> {
        let host = host_key(&url).to_string();
        if self.by_host.contains_key(&host) {
            return None;
        }
        let id = BatchId(self.next_id);
        self.next_id += 1;
        self.by_host.insert(host, id);
        self.batches.insert(id, PreresolveInfo::new(url, count));
        Some(id)
    }

    pub fn get(&self, id: BatchId) -> Option<&PreresolveInfo> {
        self.batches.get(&id)
    }

    pub fn get_mut(&mut self, id: BatchId) -> Option<&mut PreresolveInfo> {
        self.batches.get_mut(&id)
    }

    pub fn find_by_host(&self, host: &str) -> Option<BatchId> {
        self.by_host.get(host).copied()
    }

    pub fn contains_host(&self, host: &str) -> bool {
        self.by_host.contains_key(host)
    }

    pub fn remove(&mut self, id: BatchId) -> Option<PreresolveInfo> {
        let info = self.batches.remove(&id)?;
        self.by_host.remove(host_key(&info.url));
        Some(info)
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}
