//! Concrete network stack behind the scheduler.
//!
//! [`NetworkContext`] implements [`NetworkGateway`](crate::predictors::NetworkGateway)
//! on top of the [`dns`](crate::dns) and [`socket`](crate::socket) modules.

pub mod context;

pub use context::{NetworkContext, NetworkContextConfig, ResolverKind};
