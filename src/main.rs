use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use folio_pulse::config::Settings;
use folio_pulse::storage::EventStore;
use folio_pulse::web::{self, state::AppState};

/// 作品集站点的访客统计服务
#[derive(Debug, Parser)]
#[command(name = "folio-pulse", version)]
struct Cli {
    /// 配置文件路径（不带扩展名亦可）
    #[arg(long, env = "FOLIO_CONFIG")]
    config: Option<String>,

    /// 覆盖监听端口
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio_pulse=info,tower_http=debug".into()),
        )
        .init();

    info!("[Startup] folio-pulse initializing...");

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    info!(
        "[Config] Binding at {}:{} (backend: {:?}, cap: {})",
        settings.server.host,
        settings.server.port,
        settings.analytics.backend,
        settings.analytics.max_events
    );

    let store = EventStore::open(&settings.analytics)?;
    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let state = Arc::new(AppState::new(store, settings));

    let app = web::router(state.clone());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("[Startup] Service ready at http://{}", addr);
    info!("[Startup] Dashboard at http://{}/analytics", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    state.store.flush();
    info!(
        "[Shutdown] Flushed {} events via {} backend",
        state.store.len(),
        state.store.backend_name()
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("[Shutdown] Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("[Shutdown] Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("[Shutdown] Signal received, draining connections...");
}
