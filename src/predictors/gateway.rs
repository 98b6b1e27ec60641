//! Boundary between the scheduler and whatever performs real network work.
//!
//! Resolve requests are handed a [`ResolveCompletion`]. Completing it sends
//! a [`ResolveResult`] over the manager's completion channel, so results are
//! always applied later by the manager's owner and never re-enter the
//! manager from inside a gateway call. Once the issuing manager or the
//! receiving side is gone the completion is a silent no-op.

use crate::base::loadflags::{LoadFlags, PrivacyMode};
use crate::predictors::job::JobId;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use url::Url;

/// What a resolve produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOutcome {
    pub success: bool,
    /// The answer came from a cache rather than a fresh lookup.
    pub was_cached: bool,
}

impl ResolveOutcome {
    pub const fn resolved(was_cached: bool) -> Self {
        Self { success: true, was_cached }
    }

    pub const fn failed() -> Self {
        Self { success: false, was_cached: false }
    }
}

/// Identifies one manager instance. Job ids are only unique within a
/// generation, so results carry both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Generation(u64);

impl Generation {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Generation(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen#{}", self.0)
    }
}

/// A finished resolve, addressed to the job that requested it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveResult {
    pub generation: Generation,
    pub job_id: JobId,
    pub outcome: ResolveOutcome,
}

pub type CompletionSender = mpsc::UnboundedSender<ResolveResult>;
pub type CompletionReceiver = mpsc::UnboundedReceiver<ResolveResult>;

/// Channel carrying resolve results back to the manager's control loop.
pub fn completion_channel() -> (CompletionSender, CompletionReceiver) {
    mpsc::unbounded_channel()
}

/// One-shot completion for a resolve request.
///
/// Dropping it without calling [`complete`](Self::complete) reports a
/// failure, so every dispatched resolve is answered exactly once.
#[derive(Debug)]
pub struct ResolveCompletion {
    generation: Generation,
    job_id: JobId,
    /// Dead once the issuing manager is dropped.
    owner: Weak<()>,
    sender: Option<CompletionSender>,
}

impl ResolveCompletion {
    pub(crate) fn new(
        generation: Generation,
        owner: Weak<()>,
        job_id: JobId,
        sender: CompletionSender,
    ) -> Self {
        Self { generation, job_id, owner, sender: Some(sender) }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn complete(mut self, outcome: ResolveOutcome) {
        self.send(outcome);
    }

    /// True once the manager that issued this completion, or the receiver
    /// it reports to, is gone.
    pub fn is_revoked(&self) -> bool {
        self.owner.strong_count() == 0 || self.sender.as_ref().map_or(true, |tx| tx.is_closed())
    }

    fn send(&mut self, outcome: ResolveOutcome) {
        let Some(sender) = self.sender.take() else { return };
        if self.owner.strong_count() == 0 {
            tracing::trace!(job_id = %self.job_id, "preconnect manager gone, dropping result");
            return;
        }
        let result = ResolveResult { generation: self.generation, job_id: self.job_id, outcome };
        if sender.send(result).is_err() {
            tracing::trace!(job_id = %self.job_id, "completion receiver gone, dropping result");
        }
    }
}

impl Drop for ResolveCompletion {
    fn drop(&mut self) {
        if self.sender.is_some() {
            tracing::trace!(job_id = %self.job_id, "resolve completion dropped unanswered");
            self.send(ResolveOutcome::failed());
        }
    }
}

/// Network operations the scheduler needs, equivalent to the subset of
/// Chromium's `NetworkContext` used for speculative connections.
pub trait NetworkGateway: Send + Sync {
    /// Starts resolving the host of `origin`. Must eventually complete
    /// `completion` (dropping it counts as failure).
    fn resolve_host(&self, origin: &Url, completion: ResolveCompletion);

    /// Opens up to `num_sockets` connections to `origin`. Fire-and-forget.
    fn preconnect_sockets(
        &self,
        num_sockets: usize,
        origin: &Url,
        load_flags: LoadFlags,
        privacy_mode: PrivacyMode,
    );
}

impl<G: NetworkGateway + ?Sized> NetworkGateway for Arc<G> {
    fn resolve_host(&self, origin: &Url, completion: ResolveCompletion) {
        (**self).resolve_host(origin, completion)
    }

    fn preconnect_sockets(
        &self,
        num_sockets: usize,
        origin: &Url,
        load_flags: LoadFlags,
        privacy_mode: PrivacyMode,
    ) {
        (**self).preconnect_sockets(num_sockets, origin, load_flags, privacy_mode)
    }
}

/// Lazily supplies the gateway, e.g. from a session that may not exist yet.
/// `None` means the network is unavailable right now.
pub trait GatewayProvider: Send + Sync {
    fn network_gateway(&self) -> Option<Arc<dyn NetworkGateway>>;
}

impl<F> GatewayProvider for F
where
    F: Fn() -> Option<Arc<dyn NetworkGateway>> + Send + Sync,
{
    fn network_gateway(&self) -> Option<Arc<dyn NetworkGateway>> {
        self()
    }
}
