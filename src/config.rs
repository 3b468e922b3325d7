use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{env, fmt};

/// Where photo payloads are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackend {
    /// Sharded directory on local disk.
    Local,
    /// S3 or an S3-compatible service.
    S3,
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub storage: StorageBackend,
    pub storage_dir: String,
    /// Base URL clients use to reach this service (for local presigned URLs).
    pub public_url: String,
    pub s3_bucket: Option<String>,
    pub s3_region: String,
    pub s3_endpoint: Option<String>,
    pub admin_password: String,
    pub secret_key: String,
    /// Service-account key JSON for the review spreadsheet.
    pub google_credentials: Option<String>,
    pub sheets_id: Option<String>,
    pub sheets_range: String,
    /// Overrides the Sheets API root, e.g. for an emulator.
    pub sheets_api_url: Option<String>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Photo and review collection service")]
pub struct Args {
    /// Host to bind to (overrides PHOTO_COLLECTOR_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PHOTO_COLLECTOR_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides PHOTO_COLLECTOR_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Object storage backend (overrides PHOTO_COLLECTOR_STORAGE)
    #[arg(long, value_enum)]
    pub storage: Option<StorageBackend>,

    /// Directory for the local backend (overrides PHOTO_COLLECTOR_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Public base URL (overrides PHOTO_COLLECTOR_PUBLIC_URL)
    #[arg(long)]
    pub public_url: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::resolve(args, |name| env::var(name).ok())?;
        Ok((cfg, migrate))
    }

    /// Merge CLI arguments over values looked up with `lookup`.
    pub fn resolve(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let or = |name: &str, default: &str| var(name).unwrap_or_else(|| default.to_string());

        let env_port = match var("PHOTO_COLLECTOR_PORT") {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing PHOTO_COLLECTOR_PORT value `{}`", value))?,
            None => 5000,
        };
        let env_storage = match var("PHOTO_COLLECTOR_STORAGE") {
            Some(value) => StorageBackend::from_str(&value, true).map_err(|_| {
                anyhow::anyhow!("PHOTO_COLLECTOR_STORAGE must be `local` or `s3`, got `{}`", value)
            })?,
            None => StorageBackend::Local,
        };

        // --- Merge ---
        let cfg = Self {
            host: args
                .host
                .unwrap_or_else(|| or("PHOTO_COLLECTOR_HOST", "0.0.0.0")),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or_else(|| {
                or(
                    "PHOTO_COLLECTOR_DATABASE_URL",
                    "sqlite://./data/photo_collector.db",
                )
            }),
            storage: args.storage.unwrap_or(env_storage),
            storage_dir: args
                .storage_dir
                .unwrap_or_else(|| or("PHOTO_COLLECTOR_STORAGE_DIR", "./data/objects")),
            public_url: args
                .public_url
                .unwrap_or_else(|| or("PHOTO_COLLECTOR_PUBLIC_URL", "http://localhost:5000")),
            s3_bucket: var("S3_BUCKET_NAME"),
            s3_region: or("AWS_REGION", "ap-northeast-2"),
            s3_endpoint: var("S3_ENDPOINT"),
            admin_password: or("ADMIN_PASSWORD", "admin1234"),
            secret_key: or("SECRET_KEY", "dev-secret-key"),
            google_credentials: var("GOOGLE_CREDENTIALS"),
            sheets_id: var("GOOGLE_SHEETS_ID"),
            sheets_range: or("GOOGLE_SHEETS_RANGE", "A1"),
            sheets_api_url: var("GOOGLE_SHEETS_API_URL"),
        };

        if cfg.storage == StorageBackend::S3 && cfg.s3_bucket.is_none() {
            bail!("S3_BUCKET_NAME is required when the s3 storage backend is selected");
        }

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url)
            .field("storage", &self.storage)
            .field("storage_dir", &self.storage_dir)
            .field("public_url", &self.public_url)
            .field("s3_bucket", &self.s3_bucket)
            .field("s3_region", &self.s3_region)
            .field("s3_endpoint", &self.s3_endpoint)
            .field("admin_password", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .field(
                "google_credentials",
                &self.google_credentials.as_ref().map(|_| "<redacted>"),
            )
            .field("sheets_id", &self.sheets_id)
            .field("sheets_range", &self.sheets_range)
            .field("sheets_api_url", &self.sheets_api_url)
            .finish()
    }
}
