use mimalloc::MiMalloc;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use visiongate::api::ModelServerApi;
use visiongate::config::Config;
use visiongate::db::AccountsStorage;
use visiongate::router::{GateState, gate_router_with_limit};
use visiongate::service::{
    AccountService, HttpImageFetcher, InferenceAdapter, LabelSet, PasswordHashing,
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Config::load()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.basic.database_url,
        classifier = %cfg.classifier.endpoint,
        labels = %cfg.classifier.labels_path.display(),
        proxy = %cfg.fetch.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        loglevel = %cfg.basic.loglevel,
        admin_key_len = cfg.basic.admin_key.len()
    );

    let storage = AccountsStorage::connect(&cfg.basic.database_url).await?;
    let labels = Arc::new(LabelSet::load(&cfg.classifier.labels_path)?);
    let backend = Arc::new(ModelServerApi::new(&cfg.classifier)?);
    let adapter = InferenceAdapter::new(
        backend,
        labels,
        cfg.classifier.input_size,
        cfg.classifier.top_k,
    )?;

    let accounts = AccountService::new(
        Arc::new(storage.clone()),
        PasswordHashing::new(&cfg.security)?,
        Arc::new(HttpImageFetcher::new(&cfg.fetch)?),
        Arc::new(adapter),
        cfg.basic.admin_key.as_str(),
    )
    .with_initial_credits(cfg.basic.initial_credits);

    let state = GateState::new(accounts);
    let app = gate_router_with_limit(state, cfg.basic.max_request_bytes);

    let listener = TcpListener::bind(&cfg.basic.listen_addr).await?;
    info!("HTTP server listening on {}", cfg.basic.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    storage.close().await;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
