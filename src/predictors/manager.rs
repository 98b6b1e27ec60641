//! The preconnect scheduler.
//!
//! [`PreconnectManager`] queues preresolve jobs, dispatches at most
//! `max_inflight_preresolves` of them to the network gateway at a time, and
//! on each completion decides whether to open sockets, updates its batch and
//! reports finished batches to the delegate.
//!
//! The manager is a plain single-owner state machine. Its owner calls the
//! `start*`/`stop` entry points and feeds every [`ResolveResult`] received on
//! the completion channel back into [`on_preresolve_finished`]. Both happen on
//! one logical thread; [`PreconnectService`] is the ready-made owner.
//!
//! [`on_preresolve_finished`]: PreconnectManager::on_preresolve_finished
//! [`PreconnectService`]: crate::predictors::PreconnectService

use crate::base::loadflags::connection_flags;
use crate::base::origin::{host_key, is_http_or_https, is_origin, origin_of};
use crate::predictors::batch::{BatchId, BatchRegistry, PreconnectedRequestStats};
use crate::predictors::config::PreconnectConfig;
use crate::predictors::gateway::{
    CompletionSender, GatewayProvider, Generation, NetworkGateway, ResolveCompletion,
    ResolveOutcome, ResolveResult,
};
use crate::predictors::job::{JobId, JobRegistry, PreresolveJob};
use crate::predictors::observer::{PreconnectDelegate, PreconnectObserver};
use std::collections::VecDeque;
use std::sync::Arc;
use url::Url;

/// Standalone preresolve hints attach credentials to their eventual
/// connection.
pub const ALLOW_CREDENTIALS_ON_PRECONNECT_BY_DEFAULT: bool = true;

/// One origin to warm up as part of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreconnectRequest {
    /// Must be in origin form (scheme, host, port; path `/`).
    pub origin: Url,
    /// Sockets to open after a successful resolve. `0` resolves only.
    pub num_sockets: usize,
    pub allow_credentials: bool,
}

impl PreconnectRequest {
    pub fn new(origin: Url, num_sockets: usize, allow_credentials: bool) -> Self {
        Self { origin, num_sockets, allow_credentials }
    }
}

/// Speculative DNS / connection scheduler.
pub struct PreconnectManager {
    max_inflight_preresolves: usize,
    delegate: Option<Arc<dyn PreconnectDelegate>>,
    observer: Option<Arc<dyn PreconnectObserver>>,
    gateway_provider: Option<Arc<dyn GatewayProvider>>,
    network_gateway: Option<Arc<dyn NetworkGateway>>,
    completions: CompletionSender,
    generation: Generation,
    /// Outstanding completions hold a weak reference; dropping the manager
    /// revokes them.
    alive: Arc<()>,

    jobs: JobRegistry,
    batches: BatchRegistry,
    queued_jobs: VecDeque<JobId>,
    inflight_preresolves_count: usize,
}

impl std::fmt::Debug for PreconnectManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreconnectManager")
            .field("generation", &self.generation)
            .field("max_inflight_preresolves", &self.max_inflight_preresolves)
            .field("inflight", &self.inflight_preresolves_count)
            .field("queued", &self.queued_jobs.len())
            .field("jobs", &self.jobs.len())
            .field("batches", &self.batches.len())
            .field("has_gateway", &self.network_gateway.is_some())
            .finish_non_exhaustive()
    }
}

impl PreconnectManager {
    /// Creates a manager whose resolve results arrive on the receiving end
    /// of `completions`.
    pub fn new(config: PreconnectConfig, completions: CompletionSender) -> Self {
        if config.max_inflight_preresolves == 0 {
            tracing::warn!("max_inflight_preresolves is 0, using 1");
        }
        Self {
            max_inflight_preresolves: config.max_inflight_preresolves.max(1),
            delegate: None,
            observer: None,
            gateway_provider: None,
            network_gateway: None,
            completions,
            generation: Generation::next(),
            alive: Arc::new(()),
            jobs: JobRegistry::new(),
            batches: BatchRegistry::new(),
            queued_jobs: VecDeque::new(),
            inflight_preresolves_count: 0,
        }
    }

    pub fn with_delegate(mut self, delegate: Arc<dyn PreconnectDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PreconnectObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Source consulted for a gateway whenever none is installed directly.
    pub fn with_gateway_provider(mut self, provider: Arc<dyn GatewayProvider>) -> Self {
        self.gateway_provider = Some(provider);
        self
    }

    /// Installs a gateway that takes precedence over the provider.
    pub fn set_network_gateway(&mut self, gateway: Arc<dyn NetworkGateway>) {
        self.network_gateway = Some(gateway);
    }

    pub fn set_observer(&mut self, observer: Option<Arc<dyn PreconnectObserver>>) {
        self.observer = observer;
    }

    /// Preresolves and preconnects `requests` as one batch keyed by the host
    /// of `url`. A no-op while a batch for that host is still running.
    ///
    /// # Panics
    ///
    /// If a request origin is not in origin form.
    pub fn start(&mut self, url: &Url, requests: Vec<PreconnectRequest>) {
        for request in &requests {
            assert!(
                is_origin(&request.origin),
                "preconnect request origin must be an origin, got {}",
                request.origin
            );
        }

        let Some(batch_id) = self.batches.insert(url.clone(), requests.len()) else {
            tracing::debug!(host = host_key(url), "preconnect batch already running for host");
            return;
        };
        tracing::debug!(
            url = %url,
            batch = %batch_id,
            jobs = requests.len(),
            "starting preconnect batch"
        );

        for request in requests {
            let job_id = self.jobs.add(PreresolveJob::new(
                request.origin,
                request.num_sockets,
                request.allow_credentials,
                Some(batch_id),
            ));
            self.queued_jobs.push_back(job_id);
        }

        // An empty batch is already done and would otherwise pin its host.
        self.finish_batch_if_done(batch_id);
        self.try_to_launch_preresolve_jobs();
    }

    /// Queues a high-priority resolve of the origin of `url`.
    /// Non-HTTP(S) URLs are ignored.
    pub fn start_preresolve_host(&mut self, url: &Url) {
        let Some(origin) = hint_origin(url) else { return };
        let job_id = self.jobs.add(PreresolveJob::new(
            origin,
            0,
            ALLOW_CREDENTIALS_ON_PRECONNECT_BY_DEFAULT,
            None,
        ));
        self.queued_jobs.push_front(job_id);

        self.try_to_launch_preresolve_jobs();
    }

    /// Queues high-priority resolves of `http://<host>` for each hostname.
    /// The first hostname ends up at the very front of the queue.
    pub fn start_preresolve_hosts<S: AsRef<str>>(&mut self, hostnames: &[S]) {
        for hostname in hostnames.iter().rev() {
            let hostname = hostname.as_ref();
            let Some(origin) =
                Url::parse(&format!("http://{hostname}")).ok().as_ref().and_then(origin_of)
            else {
                tracing::debug!(hostname, "skipping unparsable preresolve hostname");
                continue;
            };
            let job_id = self.jobs.add(PreresolveJob::new(
                origin,
                0,
                ALLOW_CREDENTIALS_ON_PRECONNECT_BY_DEFAULT,
                None,
            ));
            self.queued_jobs.push_front(job_id);
        }

        self.try_to_launch_preresolve_jobs();
    }

    /// Queues a high-priority resolve of the origin of `url` followed by one
    /// preconnected socket. Non-HTTP(S) URLs are ignored.
    pub fn start_preconnect_url(&mut self, url: &Url, allow_credentials: bool) {
        let Some(origin) = hint_origin(url) else { return };
        let job_id = self.jobs.add(PreresolveJob::new(origin, 1, allow_credentials, None));
        self.queued_jobs.push_front(job_id);

        self.try_to_launch_preresolve_jobs();
    }

    /// Cancels the batch for the host of `url`, if any.
    ///
    /// Resolves already handed to the gateway keep running; cancellation
    /// only stops queued jobs from dispatching and suppresses preconnects
    /// after later successful resolves.
    pub fn stop(&mut self, url: &Url) {
        let Some(batch_id) = self.batches.find_by_host(host_key(url)) else { return };
        if let Some(info) = self.batches.get_mut(batch_id) {
            tracing::debug!(url = %url, batch = %batch_id, "canceling preconnect batch");
            info.was_canceled = true;
        }
    }

    /// Applies a resolve result received on the completion channel.
    ///
    /// Results issued by another manager sharing the channel are ignored.
    pub fn on_preresolve_finished(&mut self, result: ResolveResult) {
        let ResolveResult { generation, job_id, outcome } = result;
        if generation != self.generation {
            tracing::trace!(%generation, job_id = %job_id, "ignoring result of another manager");
            return;
        }
        let Some(job) = self.jobs.lookup(job_id) else {
            tracing::warn!(job_id = %job_id, "resolve result for unknown job");
            debug_assert!(false, "resolve result for unknown job {job_id}");
            return;
        };
        let info_id = job.info;

        if let Some(observer) = &self.observer {
            observer.on_preresolve_finished(&job.url, outcome.success);
        }
        tracing::trace!(
            job_id = %job_id,
            url = %job.url,
            success = outcome.success,
            "preresolve finished"
        );

        self.finish_preresolve(job_id, outcome);
        self.inflight_preresolves_count -= 1;
        if let Some(batch_id) = info_id {
            if let Some(info) = self.batches.get_mut(batch_id) {
                info.inflight_count -= 1;
            }
            self.finish_batch_if_done(batch_id);
        }
        self.try_to_launch_preresolve_jobs();
    }

    /// Resolves currently handed to the gateway.
    pub fn inflight_count(&self) -> usize {
        self.inflight_preresolves_count
    }

    /// Jobs waiting for a free slot.
    pub fn queued_len(&self) -> usize {
        self.queued_jobs.len()
    }

    pub fn live_job_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn live_batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn has_batch_for(&self, host: &str) -> bool {
        self.batches.contains_host(host)
    }

    fn try_to_launch_preresolve_jobs(&mut self) {
        while self.inflight_preresolves_count < self.max_inflight_preresolves {
            let Some(job_id) = self.queued_jobs.pop_front() else { break };
            let Some(job) = self.jobs.lookup(job_id) else {
                debug_assert!(false, "queued job {job_id} missing from registry");
                continue;
            };
            let info_id = job.info;
            let canceled = info_id
                .and_then(|id| self.batches.get(id))
                .is_some_and(|info| info.was_canceled);

            if canceled {
                tracing::trace!(job_id = %job_id, "dropping job of canceled batch");
                self.jobs.remove(job_id);
            } else {
                let url = job.url.clone();
                self.preresolve_url(job_id, &url);
                if let Some(info) = info_id.and_then(|id| self.batches.get_mut(id)) {
                    info.inflight_count += 1;
                }
                self.inflight_preresolves_count += 1;
            }

            if let Some(batch_id) = info_id {
                if let Some(info) = self.batches.get_mut(batch_id) {
                    info.queued_count -= 1;
                }
                if canceled {
                    self.finish_batch_if_done(batch_id);
                }
            }
        }
    }

    fn preresolve_url(&self, job_id: JobId, url: &Url) {
        debug_assert!(is_origin(url) && is_http_or_https(url));
        if let Some(observer) = &self.observer {
            observer.on_preresolve_url(url);
        }

        let completion = ResolveCompletion::new(
            self.generation,
            Arc::downgrade(&self.alive),
            job_id,
            self.completions.clone(),
        );
        match self.current_gateway() {
            Some(gateway) => {
                tracing::trace!(job_id = %job_id, url = %url, "dispatching preresolve");
                gateway.resolve_host(url, completion);
            }
            None => {
                // Goes through the channel, so the failure lands on a later turn.
                tracing::debug!(url = %url, "no network gateway, preresolve fails");
                completion.complete(ResolveOutcome::failed());
            }
        }
    }

    fn finish_preresolve(&mut self, job_id: JobId, outcome: ResolveOutcome) {
        let Some(job) = self.jobs.remove(job_id) else { return };
        let info_id = job.info;
        let canceled =
            info_id.and_then(|id| self.batches.get(id)).is_some_and(|info| info.was_canceled);

        let need_preconnect = outcome.success && job.need_preconnect() && !canceled;
        if need_preconnect {
            self.preconnect_url(&job.url, job.num_sockets, job.allow_credentials);
        }

        if outcome.success {
            if let Some(info) = info_id.and_then(|id| self.batches.get_mut(id)) {
                info.stats.requests_stats.push(PreconnectedRequestStats::new(
                    job.url,
                    outcome.was_cached,
                    need_preconnect,
                ));
            }
        }
    }

    fn preconnect_url(&self, url: &Url, num_sockets: usize, allow_credentials: bool) {
        debug_assert!(is_origin(url) && is_http_or_https(url));
        if let Some(observer) = &self.observer {
            observer.on_preconnect_url(url, num_sockets, allow_credentials);
        }

        let Some(gateway) = self.current_gateway() else { return };
        let (load_flags, privacy_mode) = connection_flags(allow_credentials);
        tracing::trace!(url = %url, num_sockets, allow_credentials, "dispatching preconnect");
        gateway.preconnect_sockets(num_sockets, url, load_flags, privacy_mode);
    }

    /// Reports a done batch to the delegate, then forgets it.
    fn finish_batch_if_done(&mut self, batch_id: BatchId) {
        let Some(info) = self.batches.get_mut(batch_id).filter(|info| info.is_done()) else {
            return;
        };

        info.stats.duration = info.stats.start_time.elapsed();
        tracing::debug!(
            url = %info.url,
            batch = %batch_id,
            resolved = info.stats.requests_stats.len(),
            canceled = info.was_canceled,
            elapsed_ms = u64::try_from(info.stats.duration.as_millis()).unwrap_or(u64::MAX),
            "preconnect batch finished"
        );
        if let Some(delegate) = &self.delegate {
            delegate.preconnect_finished(info.stats.clone());
        }
        self.batches.remove(batch_id);
    }

    fn current_gateway(&self) -> Option<Arc<dyn NetworkGateway>> {
        self.network_gateway
            .clone()
            .or_else(|| self.gateway_provider.as_ref().and_then(|p| p.network_gateway()))
    }
}

/// Origin of a standalone hint, or `None` when the URL is not HTTP(S).
fn hint_origin(url: &Url) -> Option<Url> {
    if !is_http_or_https(url) {
        return None;
    }
    origin_of(url)
}
