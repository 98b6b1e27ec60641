//! Actor that owns a [`PreconnectManager`] and serializes all access to it.
//!
//! Commands from any number of [`PreconnectHandle`] clones and resolve
//! results from the gateway arrive on two channels; one task applies them to
//! the manager one at a time. When the task ends the manager and the
//! completion receiver are dropped, which revokes every outstanding
//! [`ResolveCompletion`](crate::predictors::ResolveCompletion).

use crate::base::neterror::NetError;
use crate::base::origin::is_origin;
use crate::predictors::gateway::CompletionReceiver;
use crate::predictors::manager::{PreconnectManager, PreconnectRequest};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use url::Url;

/// Point-in-time counters of the managed scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ManagerStatus {
    pub inflight: usize,
    pub queued: usize,
    pub live_jobs: usize,
    pub live_batches: usize,
}

impl ManagerStatus {
    fn of(manager: &PreconnectManager) -> Self {
        Self {
            inflight: manager.inflight_count(),
            queued: manager.queued_len(),
            live_jobs: manager.live_job_count(),
            live_batches: manager.live_batch_count(),
        }
    }

    /// Nothing queued, nothing in flight.
    pub fn is_idle(&self) -> bool {
        self.inflight == 0 && self.queued == 0 && self.live_jobs == 0
    }
}

#[derive(Debug)]
enum Command {
    Start { url: Url, requests: Vec<PreconnectRequest> },
    PreresolveHost(Url),
    PreresolveHosts(Vec<String>),
    PreconnectUrl { url: Url, allow_credentials: bool },
    Stop(Url),
    Status(oneshot::Sender<ManagerStatus>),
    Shutdown(oneshot::Sender<()>),
}

/// Runs a [`PreconnectManager`] on its own tokio task.
pub struct PreconnectService {
    manager: PreconnectManager,
    commands: mpsc::UnboundedReceiver<Command>,
    completions: CompletionReceiver,
}

impl PreconnectService {
    /// Spawns the service. `completions` must be the receiver paired with the
    /// sender the manager was built with.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(manager: PreconnectManager, completions: CompletionReceiver) -> PreconnectHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let service = Self { manager, commands: rx, completions };
        let task = tokio::spawn(service.run());
        PreconnectHandle { commands: tx, task: std::sync::Arc::new(task) }
    }

    async fn run(mut self) {
        tracing::debug!("preconnect service started");
        loop {
            tokio::select! {
                biased;
                Some(result) = self.completions.recv() => {
                    self.manager.on_preresolve_finished(result);
                }
                command = self.commands.recv() => {
                    let Some(command) = command else { break };
                    if !self.apply(command) {
                        break;
                    }
                }
            }
        }
        tracing::debug!(manager = ?self.manager, "preconnect service stopped");
    }

    /// Returns `false` once the loop should exit.
    fn apply(&mut self, command: Command) -> bool {
        match command {
            Command::Start { url, requests } => self.manager.start(&url, requests),
            Command::PreresolveHost(url) => self.manager.start_preresolve_host(&url),
            Command::PreresolveHosts(hosts) => self.manager.start_preresolve_hosts(&hosts),
            Command::PreconnectUrl { url, allow_credentials } => {
                self.manager.start_preconnect_url(&url, allow_credentials)
            }
            Command::Stop(url) => self.manager.stop(&url),
            Command::Status(reply) => {
                let _ = reply.send(ManagerStatus::of(&self.manager));
            }
            Command::Shutdown(ack) => {
                let _ = ack.send(());
                return false;
            }
        }
        true
    }
}

/// Cloneable front end of a running [`PreconnectService`].
///
/// Every method fails with [`NetError::ContextShutDown`] once the service has
/// stopped.
#[derive(Debug, Clone)]
pub struct PreconnectHandle {
    commands: mpsc::UnboundedSender<Command>,
    task: std::sync::Arc<JoinHandle<()>>,
}

impl PreconnectHandle {
    /// See [`PreconnectManager::start`]. Requests whose origin is not in
    /// origin form are rejected here with [`NetError::InvalidUrl`] instead of
    /// reaching the manager.
    pub fn start(&self, url: Url, requests: Vec<PreconnectRequest>) -> Result<(), NetError> {
        if let Some(bad) = requests.iter().find(|r| !is_origin(&r.origin)) {
            tracing::warn!(origin = %bad.origin, "rejecting non-origin preconnect request");
            return Err(NetError::InvalidUrl);
        }
        self.send(Command::Start { url, requests })
    }

    pub fn start_preresolve_host(&self, url: Url) -> Result<(), NetError> {
        self.send(Command::PreresolveHost(url))
    }

    pub fn start_preresolve_hosts(&self, hostnames: Vec<String>) -> Result<(), NetError> {
        self.send(Command::PreresolveHosts(hostnames))
    }

    pub fn start_preconnect_url(&self, url: Url, allow_credentials: bool) -> Result<(), NetError> {
        self.send(Command::PreconnectUrl { url, allow_credentials })
    }

    pub fn stop(&self, url: Url) -> Result<(), NetError> {
        self.send(Command::Stop(url))
    }

    pub async fn status(&self) -> Result<ManagerStatus, NetError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Status(tx))?;
        rx.await.map_err(|_| NetError::ContextShutDown)
    }

    /// Stops the service after the commands already sent have been applied.
    pub async fn shutdown(&self) -> Result<(), NetError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Shutdown(tx))?;
        rx.await.map_err(|_| NetError::ContextShutDown)
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed() || self.task.is_finished()
    }

    fn send(&self, command: Command) -> Result<(), NetError> {
        self.commands.send(command).map_err(|_| NetError::ContextShutDown)
    }
}
