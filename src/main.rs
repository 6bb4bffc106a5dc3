use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};

mod api;
mod broker;
mod bulk;
mod classify;
mod config;
mod controller;
mod error;
mod events;
mod orchestrator;
mod router;

pub use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // When invoked as a Docker HEALTHCHECK, hit /healthz and exit immediately.
    // This avoids needing any external tool (curl/wget) in the container image.
    if std::env::args().nth(1).as_deref() == Some("--healthcheck") {
        return healthcheck().await;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "cost_router=info,tower_http=warn".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "configuration error at startup");
            std::process::exit(1);
        }
    };
    let config = Arc::new(config);

    info!(
        orchestrator_namespace = %config.orchestrator_namespace,
        admin_bind_addr = %config.admin_bind_addr,
        managed_pairs = config.managed_pairs.len(),
        "cost-router starting"
    );

    let broker = match broker::open_with_retry(&config.broker_url, config.limits.max_retries, config.limits.retry_delay).await {
        Ok(b) => Arc::new(b),
        Err(e) => {
            error!(error = %e, "broker connection retries exhausted at startup");
            std::process::exit(1);
        }
    };

    let orchestrator = match orchestrator::KubeOrchestrator::connect(&config.orchestrator_namespace).await {
        Ok(o) => Arc::new(orchestrator::OrchestratorClient::Kube(o)),
        Err(e) => {
            error!(error = %e, "failed to connect to orchestrator");
            std::process::exit(1);
        }
    };

    let bulk = match bulk::BulkComputeAdapter::from_env() {
        Ok(adapter) => adapter.map(Arc::new),
        Err(e) => {
            error!(error = %e, "failed to construct bulk-compute adapter");
            std::process::exit(1);
        }
    };
    info!(bulk_available = bulk.is_some(), "bulk-compute dispatch availability resolved");

    let events = Arc::new(events::RoutingEventLog::new(config.routing_event_log_capacity));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let router_alive = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let controller_alive = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let router_task = {
        let router = router::Router::new(
            Arc::clone(&broker),
            bulk,
            Arc::clone(&events),
            classify::ClassifierThresholds::default(),
            config.limits.receive_max_wait,
        );
        let shutdown_rx = shutdown_rx.clone();
        let alive = Arc::clone(&router_alive);
        tokio::spawn(async move { router.run(shutdown_rx, alive).await })
    };

    let controller_task = {
        let controller = controller::Controller::new(
            Arc::clone(&broker),
            Arc::clone(&orchestrator),
            config.managed_pairs.clone(),
            config.limits,
        );
        let shutdown_rx = shutdown_rx.clone();
        let alive = Arc::clone(&controller_alive);
        tokio::spawn(async move { controller.run(shutdown_rx, alive).await })
    };

    let admin_addr: std::net::SocketAddr = config.admin_bind_addr.parse()?;
    let admin_state = Arc::new(
        api::AppState::new(Arc::clone(&config), broker as Arc<dyn broker::BrokerAdapter>, Arc::clone(&events))
            .with_liveness_flags(router_alive, controller_alive),
    );
    let admin_app = api::router(admin_state).layer(
        tower_http::trace::TraceLayer::new_for_http()
            .make_span_with(tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO))
            .on_response(tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO)),
    );

    info!(%admin_addr, "admin HTTP surface listening");
    let admin_listener = tokio::net::TcpListener::bind(admin_addr).await?;

    tokio::select! {
        result = axum::serve(admin_listener, admin_app) => {
            result?;
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received — draining in-flight work");
            let _ = shutdown_tx.send(true);
        }
    }

    // Wait for both loops to reach a terminal point before exiting — no
    // forced cancellation of in-flight broker operations (§5).
    let _ = tokio::join!(router_task, controller_task);
    info!("cost-router shut down cleanly");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Lightweight healthcheck: GET /healthz and exit 0 on 200, 1 otherwise.
/// Invoked via `cost-router --healthcheck` from a Docker HEALTHCHECK.
async fn healthcheck() -> anyhow::Result<()> {
    let addr = std::env::var("ADMIN_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8081".into());
    let port = addr.rsplit(':').next().and_then(|p| p.parse::<u16>().ok()).unwrap_or(8081);

    let url = format!("http://127.0.0.1:{port}/healthz");
    let resp = reqwest::get(&url).await?;

    if resp.status().is_success() {
        std::process::exit(0);
    } else {
        std::process::exit(1);
    }
}
