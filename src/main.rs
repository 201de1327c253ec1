use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::{net::TcpListener, signal};
use tracing_subscriber::EnvFilter;

use compliance_backend::auth::jwt::JwtService;
use compliance_backend::config::AppConfig;
use compliance_backend::db;
use compliance_backend::routes;
use compliance_backend::state::{AppState, Buckets};
use compliance_backend::storage::{build_s3_client, S3Storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "api",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        server_host = %config.server_host,
        server_port = config.server_port,
        documents_bucket = %config.s3_documents_bucket,
        policies_bucket = %config.s3_policies_bucket,
        max_upload_bytes = config.max_upload_bytes,
        "loaded backend configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    let migrations_pool = pool.clone();
    let applied = tokio::task::spawn_blocking(move || db::run_migrations(&migrations_pool))
        .await
        .map_err(|err| anyhow!("migration task panicked: {err}"))??;
    tracing::info!(applied, "database migrations up to date");

    let s3_client = build_s3_client(&config).await?;
    let buckets = Buckets {
        documents: Arc::new(S3Storage::new(
            s3_client.clone(),
            config.s3_documents_bucket.clone(),
        )),
        policies: Arc::new(S3Storage::new(s3_client, config.s3_policies_bucket.clone())),
    };
    let jwt = JwtService::from_config(&config)?;

    let listen_addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    let state = AppState::new(pool, config, buckets, jwt);
    let router = routes::create_router(state).map_err(|err| anyhow!(err.to_string()))?;

    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!("listening on {}", listen_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            tracing::info!("received shutdown signal");
        })
        .await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
