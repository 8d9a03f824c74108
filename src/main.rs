use clap::Parser;
use nordvaer::tools::{McpServer, ToolDeps};
use nordvaer::{CliOptions, Settings, SETTINGS_EXIT_CODE};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let options = CliOptions::parse();
    let settings = match Settings::load(&options) {
        Ok(settings) => settings,
        Err(error) => {
            eprintln!("configuration error: {error}");
            std::process::exit(SETTINGS_EXIT_CODE);
        },
    };

    let subscriber =
        nordvaer::setup_tracing::get_tracing_subscriber(settings.log_level.as_directive());
    nordvaer::setup_tracing::init_subscriber(subscriber);
    tracing::info!(?settings, "settings loaded");

    let deps = Arc::new(ToolDeps::from_settings(&settings).await?);
    report_upstream_health(&deps).await;

    match settings.http_port {
        Some(_) => http_transport(deps, &settings).await,
        None => stdio_transport(deps).await,
    }
}

async fn report_upstream_health(deps: &ToolDeps) {
    let proxy_reachable = deps.proxy.probe_health().await;
    let stations_reachable = deps.stations.probe_health().await;
    tracing::info!(proxy_reachable, stations_reachable, "upstream health probes");
}

async fn http_transport(deps: Arc<ToolDeps>, settings: &Settings) -> anyhow::Result<()> {
    let server = nordvaer::server::Server::build(deps, settings).await?;
    tracing::info!(port = server.port(), "starting HTTP transport");

    let task_tracker = TaskTracker::new();
    task_tracker.spawn(async move { server.run_until_stopped().await });
    task_tracker.close();
    task_tracker.wait().await;
    Ok(())
}

async fn stdio_transport(deps: Arc<ToolDeps>) -> anyhow::Result<()> {
    use rmcp::transport::stdio;
    use rmcp::ServiceExt;

    tracing::info!("starting stream transport on stdio");
    let service = McpServer::new(deps).serve(stdio()).await?;

    let waiting = service.waiting();
    tokio::pin!(waiting);
    tokio::select! {
        quit = &mut waiting => {
            let _ = quit?;
        },
        _ = shutdown_signal() => {
            tracing::info!("signal received, draining in-flight calls");
            let _ = tokio::time::timeout(Duration::from_secs(5), &mut waiting).await;
        },
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
