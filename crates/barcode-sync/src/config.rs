//! Configuration management
//!
//! Everything a run needs is collected into one [`SyncConfig`] and handed to
//! each component's constructor. Values come from the environment (optionally
//! seeded from a `.env` file) with the defaults below.

use crate::error::{Result, SyncError};
use sqlx::postgres::PgConnectOptions;
use std::path::PathBuf;
use std::str::FromStr;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default location of the UHTT reference data checkout.
pub const DEFAULT_DATA_DIR: &str = "./uhtt-barcode-reference/csv";

/// Files in the data directory that are not barcode tables.
pub const DEFAULT_EXCLUDED_FILES: &[&str] = &["README.md", "LICENSE"];

/// Source column holding the barcode.
pub const DEFAULT_BARCODE_COLUMN: &str = "UPCEAN";

/// Source column holding the product name.
pub const DEFAULT_NAME_COLUMN: &str = "Name";

/// Owner tag attached to every row loaded from the reference data.
pub const DEFAULT_OWNER: i32 = 100;

/// Directory holding `current_commit_hash` and `last_commit_hash`.
pub const DEFAULT_MARKER_DIR: &str = ".";

pub const DEFAULT_DB_HOST: &str = "localhost";
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_DB_USER: &str = "postgres";
pub const DEFAULT_DB_NAME: &str = "barcodes";
pub const DEFAULT_DB_SCHEMA: &str = "public";
pub const DEFAULT_DB_TABLE: &str = "uhtt_barcode_reference";

/// Default database connect timeout in seconds.
pub const DEFAULT_DB_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Rows per INSERT statement.
pub const DEFAULT_BATCH_SIZE: usize = 20_000;

/// Postgres caps a statement at 65535 bind parameters; each row binds three.
pub const MAX_BATCH_SIZE: usize = 65_535 / 3;

/// Top-level configuration for one sync run
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub source: SourceConfig,
    pub marker_dir: PathBuf,
    pub database: DatabaseConfig,
}

/// Where and how to read the local reference files
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub data_dir: PathBuf,
    /// File names (not paths) to ignore in `data_dir`
    pub excluded_files: Vec<String>,
    pub barcode_column: String,
    pub name_column: String,
    pub owner: i32,
}

/// Remote table and connection parameters
#[derive(Clone)]
pub struct DatabaseConfig {
    /// Full connection URL; when set the discrete fields are ignored
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
    pub schema: String,
    pub table: String,
    pub connect_timeout_secs: u64,
    pub batch_size: usize,
}

impl SyncConfig {
    /// Load configuration from `.env`, the environment and defaults, then validate it
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Read configuration from environment variables without touching `.env`
    pub fn from_env() -> Result<Self> {
        let excluded_files = match std::env::var("BARCODE_EXCLUDED_FILES") {
            Ok(list) => list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => DEFAULT_EXCLUDED_FILES.iter().map(|s| s.to_string()).collect(),
        };

        Ok(Self {
            source: SourceConfig {
                data_dir: PathBuf::from(env_or("BARCODE_DATA_DIR", DEFAULT_DATA_DIR)),
                excluded_files,
                barcode_column: env_or("BARCODE_COLUMN", DEFAULT_BARCODE_COLUMN),
                name_column: env_or("BARCODE_NAME_COLUMN", DEFAULT_NAME_COLUMN),
                owner: env_parse("BARCODE_OWNER", DEFAULT_OWNER)?,
            },
            marker_dir: PathBuf::from(env_or("BARCODE_MARKER_DIR", DEFAULT_MARKER_DIR)),
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
                host: env_or("DB_HOST", DEFAULT_DB_HOST),
                port: env_parse("DB_PORT", DEFAULT_DB_PORT)?,
                user: env_or("DB_USER", DEFAULT_DB_USER),
                password: std::env::var("DB_PASSWORD").ok(),
                database: env_or("DB_NAME", DEFAULT_DB_NAME),
                schema: env_or("DB_SCHEMA", DEFAULT_DB_SCHEMA),
                table: env_or("DB_TABLE", DEFAULT_DB_TABLE),
                connect_timeout_secs: env_parse(
                    "DB_CONNECT_TIMEOUT",
                    DEFAULT_DB_CONNECT_TIMEOUT_SECS,
                )?,
                batch_size: env_parse("BARCODE_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.source.barcode_column.trim().is_empty() {
            return Err(SyncError::config("Barcode column name cannot be empty"));
        }

        if self.source.name_column.trim().is_empty() {
            return Err(SyncError::config("Name column name cannot be empty"));
        }

        if self.source.barcode_column == self.source.name_column {
            return Err(SyncError::config(format!(
                "Barcode and name columns must differ (both are '{}')",
                self.source.barcode_column
            )));
        }

        crate::remote::TableRef::new(&self.database.schema, &self.database.table)?;

        if self.database.batch_size == 0 || self.database.batch_size > MAX_BATCH_SIZE {
            return Err(SyncError::config(format!(
                "Batch size must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, self.database.batch_size
            )));
        }

        if self.database.connect_timeout_secs == 0 {
            return Err(SyncError::config("Database connect timeout must be greater than 0"));
        }

        Ok(())
    }

    pub fn current_marker_path(&self) -> PathBuf {
        self.marker_dir.join(crate::marker::CURRENT_MARKER_FILE)
    }

    pub fn last_marker_path(&self) -> PathBuf {
        self.marker_dir.join(crate::marker::LAST_MARKER_FILE)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            marker_dir: PathBuf::from(DEFAULT_MARKER_DIR),
            database: DatabaseConfig::default(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            excluded_files: DEFAULT_EXCLUDED_FILES.iter().map(|s| s.to_string()).collect(),
            barcode_column: DEFAULT_BARCODE_COLUMN.to_string(),
            name_column: DEFAULT_NAME_COLUMN.to_string(),
            owner: DEFAULT_OWNER,
        }
    }
}

impl SourceConfig {
    /// Source config for `data_dir` with every other field defaulted
    pub fn for_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn is_excluded(&self, file_name: &str) -> bool {
        self.excluded_files.iter().any(|f| f == file_name)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: DEFAULT_DB_HOST.to_string(),
            port: DEFAULT_DB_PORT,
            user: DEFAULT_DB_USER.to_string(),
            password: None,
            database: DEFAULT_DB_NAME.to_string(),
            schema: DEFAULT_DB_SCHEMA.to_string(),
            table: DEFAULT_DB_TABLE.to_string(),
            connect_timeout_secs: DEFAULT_DB_CONNECT_TIMEOUT_SECS,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl DatabaseConfig {
    /// Build driver connect options from the URL or the discrete fields
    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        if let Some(ref url) = self.url {
            return PgConnectOptions::from_str(url)
                .map_err(|e| SyncError::config(format!("Invalid DATABASE_URL: {}", e)));
        }

        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.database);

        if let Some(ref password) = self.password {
            options = options.password(password);
        }

        Ok(options)
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("table", &self.table)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| SyncError::config(format!("{}='{}' is invalid: {}", key, raw, e))),
        Err(_) => Ok(default),
    }
}
