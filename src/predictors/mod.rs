//! Speculative connection scheduling, after Chromium's
//! `chrome/browser/predictors/preconnect_manager`.
//!
//! - [`PreconnectManager`]: queue, concurrency cap, batches and completions
//! - [`PreconnectService`] / [`PreconnectHandle`]: the manager on its own task
//! - [`NetworkGateway`]: the boundary that performs resolves and preconnects
//! - [`PreconnectDelegate`] / [`PreconnectObserver`]: reporting hooks

mod batch;
mod config;
mod gateway;
mod job;
mod manager;
mod observer;
mod service;

pub use batch::{
    BatchId, BatchRegistry, PreconnectStats, PreconnectedRequestStats, PreresolveInfo,
};
pub use config::{PreconnectConfig, MAX_INFLIGHT_PRERESOLVES};
pub use gateway::{
    completion_channel, CompletionReceiver, CompletionSender, GatewayProvider, Generation,
    NetworkGateway, ResolveCompletion, ResolveOutcome, ResolveResult,
};
pub use job::{JobId, JobRegistry, PreresolveJob};
pub use manager::{
    PreconnectManager, PreconnectRequest, ALLOW_CREDENTIALS_ON_PRECONNECT_BY_DEFAULT,
};
pub use observer::{PreconnectDelegate, PreconnectObserver};
pub use service::{ManagerStatus, PreconnectHandle, PreconnectService};
