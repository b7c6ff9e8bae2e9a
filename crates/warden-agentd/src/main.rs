mod config;
mod signal;
mod tasks;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info, warn};
use warden_api::{HttpApi, SupervisorHealthAdapter, serve};
use warden_core::{
    ConnectivityProber, CoreError, EventBus, HealthReporter, MemoryCache, RequestTracker,
    Scheduler, SharedCache, ShutdownCoordinator, StateStore, Subscribe, TokioTimer,
    probe::HttpProbe, system,
};
use warden_observe::{Journal, install_panic_hook, logger_init};
use warden_prometheus::PrometheusMetrics;

use crate::{config::AgentConfig, signal::shutdown_signal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    system::init_uptime();

    let cfg = AgentConfig::from_env()?;
    logger_init(&cfg.logger)?;
    install_panic_hook();

    let metrics = PrometheusMetrics::new()?;
    let subscribers: Vec<Arc<dyn Subscribe>> =
        vec![Arc::new(Journal::new()), Arc::new(metrics.clone())];
    let bus = EventBus::new(subscribers);

    let memory = Arc::new(MemoryCache::new());
    let cache = SharedCache::new(memory.clone());
    let registry = tasks::load_registry(&cfg.tasks_file, reqwest::Client::new(), cache.clone())?;
    info!(
        tasks = registry.len(),
        file = %cfg.tasks_file.display(),
        "task registry loaded"
    );

    let timer = TokioTimer::shared();
    let store = StateStore::new();
    let scheduler = Arc::new(
        Scheduler::new(Arc::clone(&timer), store.clone(), bus.clone())
            .with_anchor(cfg.supervisor.anchor),
    );

    let probe = Arc::new(HttpProbe::new(
        cfg.supervisor.probe.url.clone(),
        cfg.supervisor.probe.timeout,
    )?);
    let prober = ConnectivityProber::new(probe, timer, &cfg.supervisor.probe, bus.clone());

    let tracker = RequestTracker::new();
    let coordinator = Arc::new(
        ShutdownCoordinator::new(
            Arc::clone(&scheduler),
            tracker.clone(),
            cfg.supervisor.drain.clone(),
            bus,
        )
        .with_prober(Arc::clone(&prober))
        .with_resource(memory),
    );

    let reporter = HealthReporter::new(store, tracker.clone())
        .with_prober(Arc::clone(&prober))
        .with_cache(cache)
        .with_phase(coordinator.subscribe_phase());
    let adapter = SupervisorHealthAdapter::new(reporter).with_metrics(metrics);
    let router = HttpApi::new(Arc::new(adapter), tracker).router();

    let listener = TcpListener::bind((cfg.host.as_str(), cfg.port)).await?;
    let accept = coordinator.accept_token();
    tokio::spawn(async move {
        if let Err(e) = serve(listener, router, accept).await {
            error!(error = %e, "http server failed");
        }
    });

    let gate = Arc::clone(&prober);
    tokio::spawn(async move {
        gate.wait_until_online(move || match scheduler.start(&registry) {
            Ok(()) => {}
            Err(CoreError::Stopped) => warn!("connectivity established after shutdown; not starting"),
            Err(e) => error!(error = %e, "failed to start scheduler"),
        })
        .await;
    });

    let received = shutdown_signal().await;
    info!(signal = received, "termination signal received");

    let repeat = Arc::clone(&coordinator);
    tokio::spawn(async move {
        loop {
            let received = shutdown_signal().await;
            if repeat.trigger().await.is_none() {
                warn!(signal = received, "shutdown already in progress; signal ignored");
            }
        }
    });

    if let Some(report) = coordinator.trigger().await {
        info!(
            drained = report.drained,
            remaining = report.remaining,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "exiting"
        );
    }
    Ok(())
}
