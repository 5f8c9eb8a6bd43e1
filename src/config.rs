use anyhow::{Context, Result};
use clap::Parser;
use std::{env, fmt};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,

    /// Raw `{"Maps": {...}}` JSON. Empty means no identities are configured.
    pub identity_map_json: String,

    pub upload_bucket: String,
    pub download_bucket: String,

    pub s3_endpoint: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,

    pub log_group_name: String,
    /// Create the audit log group and daily stream on demand.
    pub audit_setup: bool,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url)
            .field(
                "identity_map_json",
                &format_args!("<{} bytes>", self.identity_map_json.len()),
            )
            .field("upload_bucket", &self.upload_bucket)
            .field("download_bucket", &self.download_bucket)
            .field("s3_endpoint", &self.s3_endpoint)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .field("log_group_name", &self.log_group_name)
            .field("audit_setup", &self.audit_setup)
            .finish()
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Presigned URL gateway for members-only files")]
pub struct Args {
    /// Host to bind to (overrides GATEWAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides GATEWAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides GATEWAY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Identity map JSON (overrides USER_TOKEN_MAP_JSON)
    #[arg(long)]
    pub user_token_map_json: Option<String>,

    /// Bucket for uploads (overrides UL_BUCKET_NAME)
    #[arg(long)]
    pub upload_bucket: Option<String>,

    /// Bucket for downloads (overrides DL_BUCKET_NAME)
    #[arg(long)]
    pub download_bucket: Option<String>,

    /// Object store endpoint (overrides S3_ENDPOINT)
    #[arg(long)]
    pub s3_endpoint: Option<String>,

    /// Object store region (overrides AWS_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Audit log group (overrides CLOUD_WATCH_LOG_GROUP_NAME)
    #[arg(long)]
    pub log_group_name: Option<String>,

    /// Create audit log group and streams on demand (overrides CLOUD_WATCH_ENABLE_SETUP)
    #[arg(long)]
    pub audit_setup: bool,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::merge(args)?, migrate))
    }

    fn merge(args: Args) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = env::var("GATEWAY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("GATEWAY_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing GATEWAY_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading GATEWAY_PORT"),
        };
        let env_db = env::var("GATEWAY_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/gateway.db".into());
        let region = args
            .region
            .or_else(|| env::var("AWS_REGION").ok())
            .unwrap_or_else(|| "us-east-1".into());
        let s3_endpoint = args
            .s3_endpoint
            .or_else(|| env::var("S3_ENDPOINT").ok())
            .unwrap_or_else(|| default_endpoint(&region));

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            identity_map_json: args
                .user_token_map_json
                .unwrap_or_else(|| env::var("USER_TOKEN_MAP_JSON").unwrap_or_default()),
            upload_bucket: args
                .upload_bucket
                .unwrap_or_else(|| env::var("UL_BUCKET_NAME").unwrap_or_default()),
            download_bucket: args
                .download_bucket
                .unwrap_or_else(|| env::var("DL_BUCKET_NAME").unwrap_or_default()),
            s3_endpoint,
            region,
            access_key_id: env::var("AWS_ACCESS_KEY_ID").unwrap_or_default(),
            secret_access_key: env::var("AWS_SECRET_ACCESS_KEY").unwrap_or_default(),
            session_token: env::var("AWS_SESSION_TOKEN")
                .ok()
                .filter(|token| !token.is_empty()),
            log_group_name: args
                .log_group_name
                .or_else(|| env::var("CLOUD_WATCH_LOG_GROUP_NAME").ok())
                .unwrap_or_else(|| "members-only-cdn".into()),
            audit_setup: args.audit_setup
                || env::var("CLOUD_WATCH_ENABLE_SETUP").is_ok_and(|v| v == "true"),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_endpoint(region: &str) -> String {
    format!("https://s3.{}.amazonaws.com", region)
}
