//! Preresolve jobs and the id-keyed registry that owns them.

use crate::predictors::batch::BatchId;
use std::collections::HashMap;
use std::fmt;
use url::Url;

/// Stable handle of a live job. Ids are never reused within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

/// One unit of speculative work: resolve `url`, then optionally open
/// `num_sockets` connections to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreresolveJob {
    pub url: Url,
    pub num_sockets: usize,
    pub allow_credentials: bool,
    /// Batch this job reports to. `None` for standalone hints.
    pub info: Option<BatchId>,
}

impl PreresolveJob {
    pub fn new(
        url: Url,
        num_sockets: usize,
        allow_credentials: bool,
        info: Option<BatchId>,
    ) -> Self {
        Self { url, num_sockets, allow_credentials, info }
    }

    pub fn need_preconnect(&self) -> bool {
        self.num_sockets > 0
    }
}

/// Live jobs keyed by [`JobId`].
///
/// Removing one job never disturbs the handles of the others, so a job can
/// be removed from inside its own completion while its siblings stay valid.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: HashMap<JobId, PreresolveJob>,
    next_id: u64,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, job: PreresolveJob) -> JobId {
        let id = JobId(self.next_id);
        self.next_id += 1;
        self.jobs.insert(id, job);
        id
    }

    pub fn lookup(&self, id: JobId) -> Option<&PreresolveJob> {
        self.jobs.get(&id)
    }

    pub fn remove(&mut self, id: JobId) -> Option<PreresolveJob> {
        self.jobs.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(host: &str, num_sockets: usize) -> PreresolveJob {
        PreresolveJob::new(Url::parse(host).unwrap(), num_sockets, true, None)
    }

    #[test]
    fn test_ids_are_unique_and_monotonic() {
        let mut registry = JobRegistry::new();
        let a = registry.add(job("https://a.com", 0));
        let b = registry.add(job("https://b.com", 1));
        assert!(a < b);

        registry.remove(a);
        let c = registry.add(job("https://c.com", 0));
        assert!(b < c);
        assert!(registry.lookup(a).is_none());
    }

    #[test]
    fn test_remove_keeps_other_handles_valid() {
        let mut registry = JobRegistry::new();
        let a = registry.add(job("https://a.com", 0));
        let b = registry.add(job("https://b.com", 2));

        assert_eq!(registry.remove(a).unwrap().url.host_str(), Some("a.com"));
        assert!(registry.remove(a).is_none());
        assert_eq!(registry.lookup(b).unwrap().num_sockets, 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_need_preconnect() {
        assert!(!job("https://a.com", 0).need_preconnect());
        assert!(job("https://a.com", 1).need_preconnect());
    }
}
