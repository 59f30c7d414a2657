//! Component construction and the daemon's run loop (§5/§6): opens the
//! store, wires the router's collaborators, starts the spawner, and
//! serves the dashboard/health/metrics HTTP surfaces until a shutdown
//! signal arrives.

use std::sync::Arc;

use anyhow::Result;
use relay_consensus::ConsensusEngine;
use relay_router::{AlwaysValid, EnvelopeSink, Router, RouterConfig};
use relay_spawner::{DeathCallback, Spawner, SpawnerConfig};
use relay_storage::{DeadLetterStore, MessageStore};
use relay_sync::SyncQueue;
use relay_web::{dashboard_routes, DashboardState};
use tracing::{info, warn};

use crate::backend::Backend;
use crate::config::DaemonConfig;
use crate::health::{health_routes, HealthState};
use crate::observability;
use crate::sinks::{CompositeEnvelopeSink, StoreDeadLetterSink, StoreEnvelopeSink, StoreSessionSink};

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Announces a dead agent on the router's own event stream, rather than
/// through a side channel, so the dashboard's live feed and any attached
/// agent see it the same way they'd see any other system notice (§4.4).
struct DeathNotifier {
    router: Arc<Router>,
}

#[async_trait::async_trait]
impl DeathCallback for DeathNotifier {
    async fn on_agent_death(&self, event: relay_spawner::AgentDeathEvent) {
        warn!(
            agent = %event.agent_name,
            cli = %event.cli,
            exit_code = event.exit_code,
            "agent process exited non-zero"
        );
        let body = match &event.resume_hint {
            Some(hint) => format!(
                "{} ({}) exited with code {}; resume hint: {hint}",
                event.agent_name, event.cli, event.exit_code
            ),
            None => format!(
                "{} ({}) exited with code {}",
                event.agent_name, event.cli, event.exit_code
            ),
        };
        let envelope = match relay_types::Envelope::new(
            "daemon",
            relay_types::BROADCAST_TARGET,
            relay_types::EnvelopeKind::System,
            body,
        ) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(%err, "failed to build agent-death system envelope");
                return;
            }
        };
        if let Err(err) = self.router.route(envelope).await {
            warn!(%err, agent = %event.agent_name, "failed to broadcast agent-death notice");
        }
    }
}

/// Builds every component and runs the daemon until a shutdown signal
/// (`ctrl_c`, or the dashboard listener failing) arrives.
pub async fn run(config: DaemonConfig) -> Result<()> {
    let health = HealthState::new();

    let backend = Arc::new(Backend::open(&config.store)?);
    let store = Arc::new(MessageStore::new(backend.clone(), config.store.message_retention_ms));
    let dlq = Arc::new(DeadLetterStore::new(backend));
    health.set_store_healthy(true);

    let spill_dir = config.store.data_dir.join("spill");
    let sync = match config.sync.to_sync_config(spill_dir) {
        Some(sync_config) => {
            let recovery_config = sync_config.clone();
            let queue = SyncQueue::spawn(sync_config);
            let client = reqwest::Client::new();
            queue.recover_spilled(&client, &recovery_config).await;
            health.set_sync_state(true, true);
            info!(endpoint = %recovery_config.endpoint_url, "cloud sync enabled");
            Some(queue)
        }
        None => {
            health.set_sync_state(false, true);
            None
        }
    };

    let consensus = Arc::new(ConsensusEngine::new(config.consensus.to_consensus_config()));

    let mut envelope_sinks: Vec<Arc<dyn EnvelopeSink>> =
        vec![Arc::new(StoreEnvelopeSink::new(store.clone()))];
    if let Some(sync) = &sync {
        envelope_sinks.push(sync.clone());
    }

    let router_config = RouterConfig {
        envelope_sink: Arc::new(CompositeEnvelopeSink::new(envelope_sinks)),
        dead_letter_sink: Arc::new(StoreDeadLetterSink::new(dlq.clone())),
        signature_verifier: Arc::new(AlwaysValid),
        interceptor: consensus.clone(),
        session_sink: Arc::new(StoreSessionSink::new(store.clone())),
        require_signatures: false,
    };
    let router = Arc::new(Router::new(router_config));
    consensus.attach_router(&router);

    let mut spawner_config = SpawnerConfig::new(config.store.logs_dir(), config.store.workers_file());
    spawner_config.dashboard_base_url = Some(format!("http://{}", config.dashboard.addr));
    let spawner = Spawner::new(router.clone(), config.pty.to_pty_config(), spawner_config)?
        .with_death_callback(Arc::new(DeathNotifier {
            router: router.clone(),
        }));

    health.set_router_state(router.get_agents().len());

    let dashboard_state = DashboardState::new(
        router.clone(),
        store.clone(),
        dlq,
        spawner.clone(),
        consensus.clone(),
        sync.clone(),
    );

    let mut app = dashboard_routes(dashboard_state)
        .layer(axum::middleware::from_fn(observability::metrics_middleware))
        .layer(axum::middleware::from_fn(observability::request_id_middleware));
    if config.dashboard.cors_enabled {
        app = app.layer(tower_http::cors::CorsLayer::permissive());
    }
    let app = app.merge(health_routes(health.clone()));

    let event_metrics_task = spawn_event_metrics_task(router.clone(), consensus.clone());
    let sweep_task = spawn_sweep_task(store.clone(), health.clone(), config.store.cleanup_interval_ms);

    health.set_ready(true);

    let dashboard_listener = tokio::net::TcpListener::bind(config.dashboard.addr).await?;
    info!(addr = %config.dashboard.addr, "dashboard listening");
    let dashboard_server = axum::serve(dashboard_listener, app.into_make_service());

    if config.metrics.enabled {
        let metrics_listener = tokio::net::TcpListener::bind(config.metrics.addr).await?;
        info!(addr = %config.metrics.addr, "metrics listening");
        let metrics_app =
            axum::Router::new().route("/metrics", axum::routing::get(observability::metrics_handler));
        let metrics_server = axum::serve(metrics_listener, metrics_app.into_make_service());

        tokio::select! {
            result = dashboard_server => { result?; }
            result = metrics_server => { result?; }
            _ = tokio::signal::ctrl_c() => { info!("shutdown signal received"); }
        }
    } else {
        tokio::select! {
            result = dashboard_server => { result?; }
            _ = tokio::signal::ctrl_c() => { info!("shutdown signal received"); }
        }
    }

    event_metrics_task.abort();
    sweep_task.abort();

    info!("shutting down, releasing live agents");
    for name in spawner.agent_names() {
        if let Err(err) = spawner.release(&name).await {
            warn!(%err, agent = %name, "failed to release agent during shutdown");
        }
    }
    if let Some(sync) = sync {
        sync.close().await;
    }
    consensus.shutdown();

    Ok(())
}

/// Keeps the Prometheus business gauges/counters in step with the
/// router's and consensus engine's own event streams, the same streams
/// `relay-web`'s `/ws` endpoint consumes.
fn spawn_event_metrics_task(
    router: Arc<Router>,
    consensus: Arc<ConsensusEngine>,
) -> tokio::task::JoinHandle<()> {
    let mut router_events = router.subscribe_events();
    let mut consensus_events = consensus.subscribe_events();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = router_events.recv() => match event {
                    Ok(event) => {
                        observability::METRICS.envelopes_routed_total.inc();
                        if matches!(event.outcome, relay_router::LegOutcome::DeadLettered { .. }) {
                            observability::METRICS.envelopes_dead_lettered_total.inc();
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
                event = consensus_events.recv() => match event {
                    Ok(relay_consensus::ConsensusEvent::Resolved(_) | relay_consensus::ConsensusEvent::Cancelled(_)) => {
                        observability::METRICS.proposals_resolved_total.inc();
                    }
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    })
}

/// Periodically sweeps expired messages and refreshes the router-attached
/// gauge (§4.5 retention).
fn spawn_sweep_task(
    store: Arc<MessageStore<Backend>>,
    health: HealthState,
    interval_ms: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_millis(interval_ms));
        loop {
            ticker.tick().await;
            match store.cleanup_expired_messages(now_ms()) {
                Ok(0) => {}
                Ok(deleted) => info!(deleted, "retention sweep removed expired messages"),
                Err(err) => warn!(%err, "retention sweep failed"),
            }
            health.set_store_healthy(true);
        }
    })
}
