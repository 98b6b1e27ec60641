//! Preconnect Manager Tests
//!
//! Covers:
//! - Concurrency cap and queue draining
//! - Batch statistics and the delegate contract
//! - Cancellation (`stop`) before and after dispatch
//! - Priority hints jumping the queue
//! - Duplicate batches, missing gateway, credentials and privacy mode

use preconnect::base::loadflags::{LoadFlags, PrivacyMode};
use preconnect::predictors::{
    completion_channel, CompletionReceiver, GatewayProvider, NetworkGateway, PreconnectConfig,
    PreconnectDelegate, PreconnectManager, PreconnectObserver, PreconnectRequest, PreconnectStats,
    ResolveCompletion, ResolveOutcome,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use url::Url;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Resolve(String),
    Preconnect {
        host: String,
        num_sockets: usize,
        load_flags: LoadFlags,
        privacy_mode: PrivacyMode,
    },
}

/// Records every call and parks resolve completions until the test answers them.
#[derive(Default)]
struct FakeGateway {
    calls: Mutex<Vec<Call>>,
    pending: Mutex<Vec<(Url, ResolveCompletion)>>,
    max_pending: AtomicUsize,
}

impl NetworkGateway for FakeGateway {
    fn resolve_host(&self, origin: &Url, completion: ResolveCompletion) {
        self.calls.lock().unwrap().push(Call::Resolve(host(origin)));
        let mut pending = self.pending.lock().unwrap();
        pending.push((origin.clone(), completion));
        self.max_pending.fetch_max(pending.len(), Ordering::SeqCst);
    }

    fn preconnect_sockets(
        &self,
        num_sockets: usize,
        origin: &Url,
        load_flags: LoadFlags,
        privacy_mode: PrivacyMode,
    ) {
        self.calls.lock().unwrap().push(Call::Preconnect {
            host: host(origin),
            num_sockets,
            load_flags,
            privacy_mode,
        });
    }
}

impl FakeGateway {
    fn take(&self, host_name: &str) -> ResolveCompletion {
        let mut pending = self.pending.lock().unwrap();
        let idx = pending
            .iter()
            .position(|(url, _)| url.host_str() == Some(host_name))
            .unwrap_or_else(|| panic!("no pending resolve for {host_name}"));
        pending.remove(idx).1
    }

    fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    fn resolved_hosts(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                Call::Resolve(h) => Some(h.clone()),
                _ => None,
            })
            .collect()
    }

    fn preconnects(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, Call::Preconnect { .. }))
            .cloned()
            .collect()
    }
}

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl PreconnectObserver for RecordingObserver {
    fn on_preresolve_url(&self, url: &Url) {
        self.events.lock().unwrap().push(format!("resolve {}", host(url)));
    }

    fn on_preconnect_url(&self, url: &Url, num_sockets: usize, allow_credentials: bool) {
        self.events
            .lock()
            .unwrap()
            .push(format!("connect {} {num_sockets} {allow_credentials}", host(url)));
    }

    fn on_preresolve_finished(&self, url: &Url, success: bool) {
        self.events.lock().unwrap().push(format!("finished {} {success}", host(url)));
    }
}

fn host(url: &Url) -> String {
    url.host_str().unwrap_or_default().to_string()
}

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

fn request(origin: &str, num_sockets: usize) -> PreconnectRequest {
    PreconnectRequest::new(url(origin), num_sockets, true)
}

struct Harness {
    manager: PreconnectManager,
    completions: CompletionReceiver,
    gateway: Arc<FakeGateway>,
    finished: mpsc::UnboundedReceiver<PreconnectStats>,
    _delegate: Arc<dyn PreconnectDelegate>,
}

impl Harness {
    fn new(max_inflight: usize) -> Self {
        let (tx, completions) = completion_channel();
        let (stats_tx, finished) = mpsc::unbounded_channel();
        let delegate: Arc<dyn PreconnectDelegate> = Arc::new(stats_tx);
        let gateway = Arc::new(FakeGateway::default());
        let config = PreconnectConfig::default().with_max_inflight_preresolves(max_inflight);
        let mut manager = PreconnectManager::new(config, tx).with_delegate(Arc::clone(&delegate));
        manager.set_network_gateway(gateway.clone());
        Self { manager, completions, gateway, finished, _delegate: delegate }
    }

    /// Answers the pending resolve for `host_name` and applies every queued result.
    fn complete(&mut self, host_name: &str, outcome: ResolveOutcome) {
        self.gateway.take(host_name).complete(outcome);
        self.pump();
    }

    fn pump(&mut self) {
        while let Ok(result) = self.completions.try_recv() {
            self.manager.on_preresolve_finished(result);
        }
    }

    fn finished(&mut self) -> Vec<PreconnectStats> {
        let mut out = Vec::new();
        while let Ok(stats) = self.finished.try_recv() {
            out.push(stats);
        }
        out
    }
}

#[test]
fn test_cap_limits_dispatch_and_queue_drains_in_order() {
    let mut h = Harness::new(2);
    h.manager.start(
        &url("https://a.com/"),
        vec![
            request("https://r0.com", 0),
            request("https://r1.com", 0),
            request("https://r2.com", 0),
        ],
    );

    assert_eq!(h.gateway.resolved_hosts(), vec!["r0.com", "r1.com"]);
    assert_eq!(h.manager.inflight_count(), 2);
    assert_eq!(h.manager.queued_len(), 1);

    h.complete("r0.com", ResolveOutcome::resolved(false));
    assert_eq!(h.gateway.resolved_hosts(), vec!["r0.com", "r1.com", "r2.com"]);
    assert_eq!(h.manager.inflight_count(), 2);
    assert_eq!(h.manager.queued_len(), 0);
    assert!(h.finished().is_empty());

    h.complete("r1.com", ResolveOutcome::resolved(false));
    h.complete("r2.com", ResolveOutcome::resolved(false));

    let finished = h.finished();
    assert_eq!(finished.len(), 1);
    let stats = &finished[0];
    assert_eq!(stats.url, url("https://a.com/"));
    let origins: Vec<_> = stats.requests_stats.iter().map(|r| host(&r.origin)).collect();
    assert_eq!(origins, vec!["r0.com", "r1.com", "r2.com"]);
    assert_eq!(h.manager.live_job_count(), 0);
    assert_eq!(h.manager.live_batch_count(), 0);
    assert_eq!(h.manager.inflight_count(), 0);
}

#[test]
fn test_stop_before_launch_drops_every_job() {
    let mut h = Harness::new(2);
    // Occupy both slots with another batch so A's jobs stay queued.
    h.manager.start(
        &url("https://busy.com/"),
        vec![request("https://busy0.com", 0), request("https://busy1.com", 0)],
    );
    h.manager.start(
        &url("https://a.com/"),
        vec![
            request("https://r0.com", 1),
            request("https://r1.com", 1),
            request("https://r2.com", 1),
        ],
    );
    h.manager.stop(&url("https://a.com/anything"));

    h.complete("busy0.com", ResolveOutcome::resolved(false));
    h.complete("busy1.com", ResolveOutcome::resolved(false));

    let resolved = h.gateway.resolved_hosts();
    assert!(resolved.iter().all(|host| host.starts_with("busy")), "{resolved:?}");
    assert!(h.gateway.preconnects().is_empty());

    let finished = h.finished();
    assert_eq!(finished.len(), 2);
    let a = finished.iter().find(|s| s.url.host_str() == Some("a.com")).unwrap();
    assert!(a.requests_stats.is_empty());
    assert!(!h.manager.has_batch_for("a.com"));
    assert_eq!(h.manager.live_job_count(), 0);
}

#[test]
fn test_stop_after_dispatch_suppresses_preconnect_only() {
    let mut h = Harness::new(2);
    h.manager.start(
        &url("https://a.com/"),
        vec![
            request("https://r0.com", 1),
            request("https://r1.com", 1),
            request("https://r2.com", 1),
        ],
    );
    h.manager.stop(&url("https://a.com/"));
    assert_eq!(h.gateway.resolved_hosts(), vec!["r0.com", "r1.com"]);

    h.complete("r0.com", ResolveOutcome::resolved(false));
    h.complete("r1.com", ResolveOutcome::resolved(false));

    // r2 was dropped without reaching the gateway.
    assert_eq!(h.gateway.resolved_hosts(), vec!["r0.com", "r1.com"]);
    assert!(h.gateway.preconnects().is_empty());

    let finished = h.finished();
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].requests_stats.len(), 2);
    assert!(finished[0].requests_stats.iter().all(|r| !r.was_preconnected));
}

#[test]
fn test_priority_hint_jumps_queue() {
    let mut h = Harness::new(1);
    h.manager.start(
        &url("https://b.com/"),
        vec![
            request("https://b0.com", 0),
            request("https://b1.com", 0),
            request("https://b2.com", 0),
        ],
    );
    h.manager.start_preresolve_host(&url("https://x.com/some/page?q=1"));
    assert_eq!(h.manager.queued_len(), 3);

    h.complete("b0.com", ResolveOutcome::resolved(false));
    assert_eq!(h.gateway.resolved_hosts(), vec!["b0.com", "x.com"]);

    h.complete("x.com", ResolveOutcome::resolved(false));
    h.complete("b1.com", ResolveOutcome::resolved(false));
    h.complete("b2.com", ResolveOutcome::resolved(false));
    assert_eq!(h.gateway.resolved_hosts(), vec!["b0.com", "x.com", "b1.com", "b2.com"]);

    // The hint reports nothing; only the batch does.
    let finished = h.finished();
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].requests_stats.len(), 3);
}

#[test]
fn test_preresolve_hosts_keep_their_order_at_front() {
    let mut h = Harness::new(1);
    h.manager.start(
        &url("https://b.com/"),
        vec![request("https://b0.com", 0), request("https://b1.com", 0)],
    );
    h.manager.start_preresolve_hosts(&["h1.com", "h2.com", "h3.com"]);

    for next in ["b0.com", "h1.com", "h2.com", "h3.com", "b1.com"] {
        h.complete(next, ResolveOutcome::resolved(false));
    }
    assert_eq!(
        h.gateway.resolved_hosts(),
        vec!["b0.com", "h1.com", "h2.com", "h3.com", "b1.com"]
    );
}

#[test]
fn test_duplicate_start_is_noop() {
    let mut h = Harness::new(3);
    h.manager.start(&url("https://c.com/"), vec![request("https://c0.com", 0)]);
    h.manager.start(
        &url("https://c.com/other"),
        vec![request("https://c1.com", 0), request("https://c2.com", 0)],
    );

    assert_eq!(h.gateway.resolved_hosts(), vec!["c0.com"]);
    assert_eq!(h.manager.live_job_count(), 1);

    h.complete("c0.com", ResolveOutcome::resolved(false));
    assert_eq!(h.finished().len(), 1);

    // Once finished, the host may start again.
    h.manager.start(&url("https://c.com/"), vec![request("https://c1.com", 0)]);
    assert_eq!(h.gateway.resolved_hosts(), vec!["c0.com", "c1.com"]);
}

#[test]
fn test_resolve_only_job_never_connects() {
    let mut h = Harness::new(3);
    h.manager.start(&url("https://a.com/"), vec![request("https://r0.com", 0)]);
    h.manager.start_preresolve_host(&url("https://hint.com/"));

    h.complete("r0.com", ResolveOutcome::resolved(false));
    h.complete("hint.com", ResolveOutcome::resolved(false));

    assert!(h.gateway.preconnects().is_empty());
    let finished = h.finished();
    assert!(!finished[0].requests_stats[0].was_preconnected);
}

#[test]
fn test_successful_resolve_preconnects_with_credentials() {
    let mut h = Harness::new(3);
    h.manager.start(&url("https://a.com/"), vec![request("https://r0.com", 2)]);
    h.complete("r0.com", ResolveOutcome::resolved(true));

    assert_eq!(
        h.gateway.preconnects(),
        vec![Call::Preconnect {
            host: "r0.com".into(),
            num_sockets: 2,
            load_flags: LoadFlags::NORMAL,
            privacy_mode: PrivacyMode::Disabled,
        }]
    );
    let stats = &h.finished()[0].requests_stats[0];
    assert!(stats.was_preconnected);
    assert!(stats.was_preresolve_cached);
}

#[test]
fn test_preconnect_url_without_credentials_uses_privacy_mode() {
    let mut h = Harness::new(3);
    h.manager.start_preconnect_url(&url("https://cdn.example.com/lib.js"), false);
    assert_eq!(h.gateway.resolved_hosts(), vec!["cdn.example.com"]);

    h.complete("cdn.example.com", ResolveOutcome::resolved(false));
    assert_eq!(
        h.gateway.preconnects(),
        vec![Call::Preconnect {
            host: "cdn.example.com".into(),
            num_sockets: 1,
            load_flags: LoadFlags::without_credentials(),
            privacy_mode: PrivacyMode::Enabled,
        }]
    );
    assert!(h.finished().is_empty());
}

#[test]
fn test_failed_resolve_is_not_recorded_or_connected() {
    let mut h = Harness::new(3);
    h.manager.start(
        &url("https://a.com/"),
        vec![request("https://r0.com", 1), request("https://r1.com", 1)],
    );
    h.complete("r0.com", ResolveOutcome::failed());
    h.complete("r1.com", ResolveOutcome::resolved(false));

    assert_eq!(h.gateway.preconnects().len(), 1);
    let finished = h.finished();
    assert_eq!(finished[0].requests_stats.len(), 1);
    assert_eq!(host(&finished[0].requests_stats[0].origin), "r1.com");
}

#[test]
fn test_non_http_hints_are_ignored() {
    let mut h = Harness::new(3);
    h.manager.start_preresolve_host(&url("ftp://files.example.com/"));
    h.manager.start_preconnect_url(&url("wss://socket.example.com/"), true);
    assert_eq!(h.manager.live_job_count(), 0);
    assert!(h.gateway.resolved_hosts().is_empty());
}

#[test]
fn test_stop_ignores_unknown_hosts_and_hints() {
    let mut h = Harness::new(3);
    h.manager.start_preconnect_url(&url("https://hint.com/"), true);
    h.manager.stop(&url("https://hint.com/"));
    h.manager.stop(&url("https://nobody.com/"));

    h.complete("hint.com", ResolveOutcome::resolved(false));
    assert_eq!(h.gateway.preconnects().len(), 1);
}

#[test]
fn test_empty_batch_finishes_immediately() {
    let mut h = Harness::new(3);
    h.manager.start(&url("https://empty.com/"), Vec::new());

    let finished = h.finished();
    assert_eq!(finished.len(), 1);
    assert!(finished[0].requests_stats.is_empty());
    assert!(!h.manager.has_batch_for("empty.com"));
}

#[test]
#[should_panic(expected = "must be an origin")]
fn test_start_rejects_non_origin_request() {
    let mut h = Harness::new(3);
    h.manager.start(&url("https://a.com/"), vec![request("https://r0.com/path", 0)]);
}

#[test]
fn test_missing_gateway_fails_on_a_later_turn() {
    let (tx, mut completions) = completion_channel();
    let (stats_tx, mut finished) = mpsc::unbounded_channel::<PreconnectStats>();
    let mut manager =
        PreconnectManager::new(PreconnectConfig::default(), tx).with_delegate(Arc::new(stats_tx));

    manager.start(&url("https://a.com/"), vec![request("https://r0.com", 1)]);
    // Not failed inline: the job is still in flight until the result is applied.
    assert_eq!(manager.inflight_count(), 1);
    assert!(finished.try_recv().is_err());

    let result = completions.try_recv().unwrap();
    assert!(!result.outcome.success);
    manager.on_preresolve_finished(result);

    let stats = finished.try_recv().unwrap();
    assert!(stats.requests_stats.is_empty());
    assert_eq!(manager.inflight_count(), 0);
}

#[test]
fn test_gateway_provider_is_consulted_lazily() {
    let (tx, mut completions) = completion_channel();
    let gateway = Arc::new(FakeGateway::default());
    let available = Arc::new(AtomicBool::new(false));

    let provider = {
        let gateway = gateway.clone();
        let available = available.clone();
        move || -> Option<Arc<dyn NetworkGateway>> {
            available.load(Ordering::SeqCst).then(|| gateway.clone() as Arc<dyn NetworkGateway>)
        }
    };
    let provider: Arc<dyn GatewayProvider> = Arc::new(provider);
    let mut manager =
        PreconnectManager::new(PreconnectConfig::default(), tx).with_gateway_provider(provider);

    manager.start_preresolve_host(&url("https://early.com/"));
    assert!(gateway.resolved_hosts().is_empty());
    manager.on_preresolve_finished(completions.try_recv().unwrap());

    available.store(true, Ordering::SeqCst);
    manager.start_preresolve_host(&url("https://late.com/"));
    assert_eq!(gateway.resolved_hosts(), vec!["late.com"]);
}

#[test]
fn test_inflight_never_exceeds_cap() {
    let mut h = Harness::new(3);
    for batch in 0..4 {
        let requests =
            (0..5).map(|i| request(&format!("https://b{batch}-{i}.com"), i % 2)).collect();
        h.manager.start(&url(&format!("https://page{batch}.com/")), requests);
        h.manager.start_preresolve_host(&url(&format!("https://hint{batch}.com/")));
    }
    h.manager.stop(&url("https://page2.com/"));

    while h.gateway.pending_count() > 0 {
        assert!(h.manager.inflight_count() <= 3);
        let next = {
            let pending = h.gateway.pending.lock().unwrap();
            host(&pending[pending.len() - 1].0)
        };
        let outcome = if next.ends_with("-3.com") {
            ResolveOutcome::failed()
        } else {
            ResolveOutcome::resolved(false)
        };
        h.complete(&next, outcome);
    }

    assert!(h.gateway.max_pending.load(Ordering::SeqCst) <= 3);
    assert_eq!(h.finished().len(), 4);
    assert_eq!(h.manager.live_job_count(), 0);
    assert_eq!(h.manager.live_batch_count(), 0);
    assert_eq!(h.manager.queued_len(), 0);
}

#[test]
fn test_observer_sees_canceled_work() {
    let mut h = Harness::new(3);
    let observer = Arc::new(RecordingObserver::default());
    h.manager.set_observer(Some(observer.clone()));

    h.manager.start(&url("https://a.com/"), vec![request("https://r0.com", 1)]);
    h.manager.stop(&url("https://a.com/"));
    h.complete("r0.com", ResolveOutcome::resolved(false));
    h.manager.start_preconnect_url(&url("https://hint.com/"), false);
    h.complete("hint.com", ResolveOutcome::resolved(false));

    assert_eq!(
        *observer.events.lock().unwrap(),
        vec![
            "resolve r0.com",
            "finished r0.com true",
            "resolve hint.com",
            "finished hint.com true",
            "connect hint.com 1 false",
        ]
    );
}

#[test]
fn test_late_completion_after_teardown_is_ignored() {
    let h = Harness::new(3);
    let Harness { mut manager, completions, gateway, .. } = h;
    manager.start(&url("https://a.com/"), vec![request("https://r0.com", 1)]);

    drop(manager);
    drop(completions);

    let completion = gateway.take("r0.com");
    assert!(completion.is_revoked());
    completion.complete(ResolveOutcome::resolved(false));
    assert!(gateway.preconnects().is_empty());
}

#[test]
fn test_manager_drop_revokes_completions_while_receiver_lives() {
    let Harness { mut manager, mut completions, gateway, .. } = Harness::new(3);
    manager.start(&url("https://a.com/"), vec![request("https://r0.com", 1)]);

    drop(manager);
    let completion = gateway.take("r0.com");
    assert!(completion.is_revoked());

    completion.complete(ResolveOutcome::resolved(false));
    assert!(completions.try_recv().is_err());
}

#[test]
fn test_result_from_previous_manager_on_shared_channel_is_ignored() {
    let (tx, mut rx) = completion_channel();
    let gateway = Arc::new(FakeGateway::default());
    let config = PreconnectConfig::default().with_max_inflight_preresolves(1);

    let mut old = PreconnectManager::new(config.clone(), tx.clone());
    old.set_network_gateway(gateway.clone());
    old.start_preresolve_host(&url("https://old.com/"));
    // Answered while the old manager is alive, applied after it is gone.
    gateway.take("old.com").complete(ResolveOutcome::resolved(false));
    drop(old);

    let mut current = PreconnectManager::new(config, tx);
    current.set_network_gateway(gateway.clone());
    current.start_preresolve_host(&url("https://new.com/"));
    current.start_preresolve_host(&url("https://queued.com/"));
    assert_eq!((current.inflight_count(), current.queued_len()), (1, 1));

    current.on_preresolve_finished(rx.try_recv().unwrap());
    assert_eq!((current.inflight_count(), current.queued_len()), (1, 1));
    assert_eq!(gateway.pending_count(), 1);

    gateway.take("new.com").complete(ResolveOutcome::resolved(false));
    current.on_preresolve_finished(rx.try_recv().unwrap());
    assert_eq!(gateway.resolved_hosts(), vec!["old.com", "new.com", "queued.com"]);
    assert_eq!(gateway.max_pending.load(Ordering::SeqCst), 1);
}
