use anyhow::{Context, Result};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{fs, io::ErrorKind, path::Path, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use config::{AppConfig, StorageBackend};
use services::{
    auth::{AdminAuth, MediaTokens},
    local_store::LocalObjectStore,
    object_store::ObjectStore,
    s3_store::{S3Config, S3ObjectStore},
    sheets::{DisabledSheet, GoogleSheet, ReviewSheet, ServiceAccountKey},
};
use state::AppState;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;

const MIGRATION_SQL: &str = include_str!("../migrations/0001_init.sql");

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting photo-collector with config: {:?}", cfg);

    // --- Initialize SQLite connection ---
    let db_url = &cfg.database_url;
    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:");
    tracing::debug!("Interpreted SQLite path => {}", db_path);

    // Create parent directory if needed
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let options = SqliteConnectOptions::from_str(db_url)
        .with_context(|| format!("invalid database url `{}`", db_url))?
        .create_if_missing(true)
        .foreign_keys(true);
    let db: Arc<SqlitePool> = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?,
    );

    run_migrations(&db).await?;
    if migrate {
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Initialize object storage ---
    let (store, local_store) = build_store(&cfg).await?;
    tracing::info!("Object storage backend: {}", store.kind());

    // --- Review spreadsheet ---
    let sheet = build_sheet(&cfg);

    let auth = AdminAuth::new(cfg.admin_password.clone(), &cfg.secret_key);
    let state = AppState::new(db, store, local_store, sheet, auth);

    // --- Build router ---
    let app = routes::routes::routes(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_store(
    cfg: &AppConfig,
) -> Result<(Arc<dyn ObjectStore>, Option<Arc<LocalObjectStore>>)> {
    match cfg.storage {
        StorageBackend::Local => {
            if !Path::new(&cfg.storage_dir).exists() {
                fs::create_dir_all(&cfg.storage_dir)?;
                tracing::info!("Created storage directory at {}", cfg.storage_dir);
            }
            let tokens = MediaTokens::new(&cfg.public_url, &cfg.secret_key);
            let local = Arc::new(LocalObjectStore::new(&cfg.storage_dir, tokens));
            let store: Arc<dyn ObjectStore> = local.clone();
            Ok((store, Some(local)))
        }
        StorageBackend::S3 => {
            let bucket = cfg
                .s3_bucket
                .clone()
                .context("S3_BUCKET_NAME is required for the s3 backend")?;
            let store: Arc<dyn ObjectStore> = Arc::new(
                S3ObjectStore::new(S3Config {
                    bucket,
                    region: cfg.s3_region.clone(),
                    endpoint: cfg.s3_endpoint.clone(),
                })
                .await,
            );
            Ok((store, None))
        }
    }
}

/// A broken spreadsheet setup leaves the service up with review forwarding off.
fn build_sheet(cfg: &AppConfig) -> Arc<dyn ReviewSheet> {
    let (Some(credentials), Some(sheet_id)) = (&cfg.google_credentials, &cfg.sheets_id) else {
        tracing::warn!("Google Sheets not configured; reviews will not be recorded");
        return Arc::new(DisabledSheet);
    };

    let sheet = ServiceAccountKey::from_json(credentials)
        .and_then(|key| GoogleSheet::new(key, sheet_id.as_str(), cfg.sheets_range.as_str()));
    match sheet {
        Ok(sheet) => {
            let sheet = match &cfg.sheets_api_url {
                Some(url) => sheet.with_api_base(url.as_str()),
                None => sheet,
            };
            Arc::new(sheet)
        }
        Err(err) => {
            tracing::warn!("Google Sheets disabled: {}", err);
            Arc::new(DisabledSheet)
        }
    }
}

/// Apply the embedded schema. Every statement is idempotent.
pub(crate) async fn run_migrations(db: &SqlitePool) -> Result<()> {
    let statements = MIGRATION_SQL
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        tracing::debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }

    Ok(())
}
