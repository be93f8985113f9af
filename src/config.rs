//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable
//! overrides. The configuration file path defaults to `config.yaml` but can
//! be specified via the `-f` flag or the `PLATTER_CONFIG` environment
//! variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources
//! override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `PLATTER_` override YAML values
//! 3. **DATABASE_URL** - Special case: overrides `database.url` if set
//!
//! For nested config values, use double underscores in environment variables.
//! For example, `PLATTER_IMAGES__COMPRESS=false` sets the `images.compress`
//! field.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use platter::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Server will bind to {}", config.bind_address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use url::Url;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "PLATTER_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment
/// variables. All fields have sensible defaults defined in the `Default`
/// implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Optional: database URL override via environment variable.
    /// Use DATABASE_URL or PLATTER_DATABASE_URL to set this.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// PostgreSQL connection settings
    pub database: DatabaseConfig,
    /// Image upload/storage settings
    pub images: ImagesConfig,
    /// Category names inserted idempotently at startup. This is how the
    /// category catalog is defined; there is no category CRUD surface.
    pub seed_categories: Vec<String>,
    /// CORS configuration for browser clients
    pub cors: CorsConfig,
}

/// PostgreSQL connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Connection string for the database
    pub url: String,
    /// Connection pool settings
    pub pool: PoolSettings,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost:5432/platter".to_string(),
            pool: PoolSettings::default(),
        }
    }
}

/// Connection pool configuration with all SQLx parameters.
///
/// These settings control connection pool behavior for optimal performance.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections to maintain
    pub min_connections: u32,
    /// Maximum time to wait for a connection (seconds)
    pub acquire_timeout_secs: u64,
    /// Time before idle connections are closed (seconds, 0 = never)
    pub idle_timeout_secs: u64,
}

impl Default for PoolSettings {
    /// Production defaults: balanced for reliability and resource usage
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600, // 10 minutes
        }
    }
}

/// Image upload and storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Where image payloads live. Exactly one backend per deployment;
    /// backends are never mixed.
    pub storage: ImageStorageBackend,
    /// Prefix used to build image locators for the filesystem backend
    /// (e.g., "http://localhost:2000/api/v1/images/")
    pub public_base_url: Url,
    /// Store-wide compression policy. What was actually done is recorded
    /// per image on the owning product row.
    pub compress: bool,
    /// Maximum accepted upload body size in bytes
    pub max_upload_bytes: u64,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            storage: ImageStorageBackend::default(),
            public_base_url: Url::parse("http://localhost:2000/api/v1/images/").unwrap(),
            compress: true,
            max_upload_bytes: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Where image payloads are persisted.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum ImageStorageBackend {
    /// One file per storage key under a local directory
    Filesystem {
        /// Directory where image files will be stored
        path: PathBuf,
    },
    /// Payloads stored as byte columns in the main database
    Database,
}

impl Default for ImageStorageBackend {
    fn default() -> Self {
        ImageStorageBackend::Filesystem {
            path: PathBuf::from("./uploads"),
        }
    }
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Allow credentials (cookies) in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Wildcard],
            allow_credentials: false,
            max_age: Some(3600), // Cache preflight for 1 hour
        }
    }
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 2000,
            database_url: None,
            database: DatabaseConfig::default(),
            images: ImagesConfig::default(),
            seed_categories: vec![],
            cors: CorsConfig::default(),
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        // if database_url is set, use it (preserving pool settings)
        if let Some(url) = config.database_url.take() {
            config.database.url = url;
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// The figment used by [`Config::load`]; split out so tests can build a
    /// config without touching process state.
    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            // PLATTER_CONFIG belongs to the CLI (config file path), not to
            // the config structure itself.
            .merge(Env::prefixed("PLATTER_").ignore(&["config"]).split("__"))
            .merge(Env::raw().only(&["DATABASE_URL"]))
    }

    /// Validate configuration consistency beyond what serde enforces.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.url.is_empty() {
            anyhow::bail!("database.url must not be empty");
        }

        if let ImageStorageBackend::Filesystem { path } = &self.images.storage
            && path.as_os_str().is_empty()
        {
            anyhow::bail!("images.storage.path must not be empty for the filesystem backend");
        }

        if self.seed_categories.iter().any(|name| name.trim().is_empty()) {
            anyhow::bail!("seed_categories must not contain empty names");
        }

        Ok(())
    }

    /// The socket address to bind the HTTP server to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.bind_address(), "0.0.0.0:2000");
        assert!(config.images.compress);
        assert!(matches!(config.images.storage, ImageStorageBackend::Filesystem { .. }));
        config.validate().expect("defaults must validate");
    }

    #[test]
    fn test_yaml_and_env_override() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
                port: 8080
                images:
                  compress: false
                  storage:
                    backend: database
                seed_categories:
                  - Beverage
                  - Snack
                "#,
            )?;
            jail.set_env("PLATTER_PORT", "9090");
            jail.set_env("DATABASE_URL", "postgres://db.internal:5432/catalog");

            let args = Args {
                config: "config.yaml".to_string(),
                validate: false,
            };
            let config = Config::load(&args).expect("config loads");

            // Env beats YAML; DATABASE_URL beats database.url
            assert_eq!(config.port, 9090);
            assert_eq!(config.database.url, "postgres://db.internal:5432/catalog");
            assert!(!config.images.compress);
            assert!(matches!(config.images.storage, ImageStorageBackend::Database));
            assert_eq!(config.seed_categories, vec!["Beverage", "Snack"]);
            Ok(())
        });
    }

    #[test]
    fn test_empty_seed_category_rejected() {
        let config = Config {
            seed_categories: vec!["Beverage".to_string(), "  ".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_filesystem_path_rejected() {
        let config = Config {
            images: ImagesConfig {
                storage: ImageStorageBackend::Filesystem { path: PathBuf::new() },
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
