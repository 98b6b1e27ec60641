//! Hooks exposed to the code that drives the manager.

use crate::predictors::batch::PreconnectStats;
use tokio::sync::mpsc;
use url::Url;

/// Receives the statistics of every finished batch.
pub trait PreconnectDelegate: Send + Sync {
    /// Called exactly once per `start` that created a batch, after all of
    /// its jobs have finished or been dropped.
    fn preconnect_finished(&self, stats: PreconnectStats);
}

/// Forwards finished batches into a channel. Sends after the receiver is
/// gone are ignored.
impl PreconnectDelegate for mpsc::UnboundedSender<PreconnectStats> {
    fn preconnect_finished(&self, stats: PreconnectStats) {
        let _ = self.send(stats);
    }
}

/// Instrumentation hooks. Purely observational: implementations cannot
/// influence scheduling, and every method defaults to a no-op.
pub trait PreconnectObserver: Send + Sync {
    fn on_preresolve_url(&self, _url: &Url) {}

    fn on_preconnect_url(&self, _url: &Url, _num_sockets: usize, _allow_credentials: bool) {}

    fn on_preresolve_finished(&self, _url: &Url, _success: bool) {}
}
