// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Server configuration module
//!
//! This module provides configuration structures and logic for the API server.
//! Configuration is read once at process start from defaults, optional JSON files
//! and environment variables, validated into typed values, and then shared as an
//! immutable [`ServerConfig`] with every component that needs it.

use std::{
    fmt,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    str::FromStr,
    time::Duration,
};

use anyhow::{Result, anyhow, ensure};
use axum::http::HeaderValue;
use config::{Config, ConfigError, Environment as ConfigEnv, File, Map};
use serde::{Deserialize, Deserializer, Serialize, de};
use url::Url;
use utoipa::ToSchema;

use crate::error::{ServerError, ServerResult};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_API_PREFIX: &str = "/api/v1";
const DEFAULT_API_URL: &str = "http://localhost:3000";
const DEFAULT_SUPPORT_EMAIL: &str = "support@example.com";
const DEFAULT_RATE_LIMIT_WINDOW_SECONDS: u64 = 15 * 60;
const PRODUCTION_RATE_LIMIT_MAX: u32 = 100;
const DEFAULT_RATE_LIMIT_MAX: u32 = 1000;

/// A validated server port that ensures the value is appropriate for the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServerPort {
    port: u16,
    environment: Environment,
}

impl ServerPort {
    /// Create a new `ServerPort`, ensuring it's valid for the given environment
    ///
    /// # Errors
    ///
    /// Returns an error if the port is 0 outside the test environment
    pub fn new(port: u16, environment: Environment) -> Result<Self> {
        if port == 0 && environment != Environment::Test {
            return Err(anyhow!("port cannot be 0 outside the test environment"));
        }
        Ok(Self { port, environment })
    }

    /// Create a safe default port for development
    pub const fn default_development() -> Self {
        Self {
            port: DEFAULT_PORT,
            environment: Environment::Development,
        }
    }

    /// Create a safe testing port (port 0)
    pub const fn testing() -> Self {
        Self {
            port: 0,
            environment: Environment::Test,
        }
    }

    /// Get the port value
    pub fn value(&self) -> u16 {
        self.port
    }
}

/// A validated timeout duration in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeoutSeconds(Duration);

impl TimeoutSeconds {
    /// Create a new `TimeoutSeconds`, ensuring the value is within valid bounds
    ///
    /// # Errors
    ///
    /// Returns an error if timeout is 0 or greater than 300 seconds
    pub fn new(seconds: u64) -> Result<Self> {
        ensure!(seconds != 0, "timeout must be greater than 0");
        ensure!(seconds <= 300, "timeout cannot exceed 300");
        Ok(Self(Duration::from_secs(seconds)))
    }

    /// Create a safe default timeout (30 seconds)
    pub const fn default_value() -> Self {
        Self(Duration::from_secs(30))
    }

    /// Create a safe testing timeout (5 seconds)
    pub const fn testing() -> Self {
        Self(Duration::from_secs(5))
    }

    /// Get the timeout value
    pub fn value(&self) -> Duration {
        self.0
    }
}

impl<'de> Deserialize<'de> for TimeoutSeconds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seconds = u64::deserialize(deserializer)?;
        Self::new(seconds).map_err(|e| de::Error::custom(e.to_string()))
    }
}

impl Default for TimeoutSeconds {
    fn default() -> Self {
        Self::default_value()
    }
}

/// Path prefix under which the API route group is mounted
///
/// Must start with `/`, must not end with `/` and cannot be the root path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiPrefix(String);

impl ApiPrefix {
    /// Create a new `ApiPrefix`
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix is not an absolute, non-root path without
    /// a trailing slash or route wildcards
    pub fn new(prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        ensure!(
            prefix.starts_with('/'),
            "API prefix must start with '/': {prefix}"
        );
        ensure!(prefix.len() > 1, "API prefix cannot be the root path");
        ensure!(
            !prefix.ends_with('/'),
            "API prefix must not end with '/': {prefix}"
        );
        ensure!(
            !prefix.contains(['{', '}', '*']),
            "API prefix cannot contain route parameters: {prefix}"
        );
        Ok(Self(prefix))
    }

    /// Get the prefix as a path string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ApiPrefix {
    fn default() -> Self {
        Self(DEFAULT_API_PREFIX.to_string())
    }
}

impl fmt::Display for ApiPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Runtime environment, read from `NODE_ENV`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Production environment
    Production,
    /// Development environment
    Development,
    /// Test environment; disables rate limiting and listener startup
    Test,
}

impl Environment {
    /// Whether this is the production environment
    pub fn is_production(self) -> bool {
        self == Self::Production
    }

    /// Whether this is the designated test environment
    pub fn is_test(self) -> bool {
        self == Self::Test
    }

    /// Capitalized name used in human-facing descriptions
    pub fn label(self) -> &'static str {
        match self {
            Self::Production => "Production",
            Self::Development => "Development",
            Self::Test => "Test",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Production => write!(f, "production"),
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitingConfig {
    /// Whether requests are counted at all
    pub enabled: bool,
    /// Maximum requests per client within one window
    pub max_requests: u32,
    /// Length of the counting window
    pub window: Duration,
    /// Identify clients by the first `X-Forwarded-For` hop instead of the peer address
    pub trust_proxy: bool,
}

impl RateLimitingConfig {
    /// Default policy for the given environment
    ///
    /// Production gets the stricter threshold and trusts one proxy hop; the
    /// test environment disables limiting entirely.
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            enabled: !environment.is_test(),
            max_requests: if environment.is_production() {
                PRODUCTION_RATE_LIMIT_MAX
            } else {
                DEFAULT_RATE_LIMIT_MAX
            },
            window: Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECONDS),
            trust_proxy: environment.is_production(),
        }
    }
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self::for_environment(Environment::Development)
    }
}

/// Origins allowed by the CORS policy
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CorsOrigins {
    /// Any origin is allowed
    #[default]
    Any,
    /// Only the listed origins are allowed
    List(Vec<HeaderValue>),
}

impl FromStr for CorsOrigins {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let origins: Vec<&str> = value
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .collect();

        if origins.is_empty() || origins.contains(&"*") {
            return Ok(Self::Any);
        }

        origins
            .into_iter()
            .map(|origin| {
                Url::parse(origin).map_err(|e| anyhow!("invalid CORS origin '{origin}': {e}"))?;
                HeaderValue::from_str(origin)
                    .map_err(|e| anyhow!("invalid CORS origin '{origin}': {e}"))
            })
            .collect::<Result<Vec<_>>>()
            .map(Self::List)
    }
}

/// CORS policy configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorsConfig {
    /// Allowed origins
    pub origins: CorsOrigins,
}

/// Security header configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityHeadersConfig {
    /// Emit `Strict-Transport-Security`
    pub hsts_enabled: bool,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self { hsts_enabled: true }
    }
}

/// Server configuration for different environments
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server host address
    pub host: IpAddr,
    /// Server port (validated for environment compatibility)
    pub port: ServerPort,
    /// Mount point of the API route group
    pub api_prefix: ApiPrefix,
    /// Environment type
    pub environment: Environment,
    /// Public base URL advertised in the API documentation
    pub api_url: Url,
    /// Support contact advertised in the API documentation
    pub support_email: String,
    /// Request timeout in seconds (validated range: 1-300)
    pub timeout_seconds: TimeoutSeconds,
    /// Rate limiting policy
    pub rate_limiting: RateLimitingConfig,
    /// CORS policy
    pub cors: CorsConfig,
    /// Security header policy
    pub security_headers: SecurityHeadersConfig,
}

/// Flat view of the recognised environment variables
#[derive(Debug, Deserialize)]
struct EnvironmentSettings {
    bind_address: IpAddr,
    port: u16,
    api_prefix: String,
    node_env: Environment,
    api_url: Url,
    support_email: String,
    request_timeout_seconds: u64,
    #[serde(default)]
    rate_limit_max: Option<u32>,
    rate_limit_window_seconds: u64,
    cors_origins: String,
    hsts_enabled: bool,
    #[serde(default)]
    trust_proxy: Option<bool>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: ServerPort::default_development(),
            api_prefix: ApiPrefix::default(),
            environment: Environment::Development,
            api_url: default_api_url(),
            support_email: DEFAULT_SUPPORT_EMAIL.to_string(),
            timeout_seconds: TimeoutSeconds::default(),
            rate_limiting: RateLimitingConfig::default(),
            cors: CorsConfig::default(),
            security_headers: SecurityHeadersConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create configuration from process environment variables and optional configuration files
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` if configuration is invalid or cannot be loaded.
    pub fn from_env() -> ServerResult<Self> {
        Self::load(None).map_err(|e| ServerError::Config {
            message: format!("failed to load configuration: {e}"),
        })
    }

    /// Create configuration from an explicit set of variables instead of the process environment
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` if configuration is invalid.
    pub fn from_vars<I, K, V>(vars: I) -> ServerResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let source = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();

        Self::load(Some(source)).map_err(|e| ServerError::Config {
            message: format!("failed to load configuration: {e}"),
        })
    }

    /// Load configuration using the config crate with hierarchical sources
    ///
    /// Configuration is loaded in the following order (later sources override earlier ones):
    /// 1. Default values
    /// 2. Configuration file (config.json)
    /// 3. Environment-specific files (config.{env}.json)
    /// 4. Environment variables (`PORT`, `API_PREFIX`, `NODE_ENV`, ...); empty values are ignored
    ///
    /// When `source` is `None` the process environment is read.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or is invalid.
    pub fn load(source: Option<Map<String, String>>) -> Result<Self, ConfigError> {
        let env_name = match &source {
            Some(vars) => vars.get("NODE_ENV").cloned(),
            None => std::env::var("NODE_ENV").ok(),
        }
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| Environment::Development.to_string());

        let settings: EnvironmentSettings = Config::builder()
            .set_default("bind_address", "0.0.0.0")?
            .set_default("port", 3000)?
            .set_default("api_prefix", DEFAULT_API_PREFIX)?
            .set_default("node_env", "development")?
            .set_default("api_url", DEFAULT_API_URL)?
            .set_default("support_email", DEFAULT_SUPPORT_EMAIL)?
            .set_default("request_timeout_seconds", 30)?
            .set_default("rate_limit_window_seconds", 900)?
            .set_default("cors_origins", "*")?
            .set_default("hsts_enabled", true)?
            .add_source(File::with_name("config.json").required(false))
            .add_source(
                File::with_name(&format!("config.{}.json", env_name.to_lowercase()))
                    .required(false),
            )
            .add_source(
                ConfigEnv::default()
                    .ignore_empty(true)
                    .try_parsing(true)
                    .source(source),
            )
            .build()?
            .try_deserialize()?;

        Self::from_settings(settings)
            .map_err(|e| ConfigError::Message(format!("invalid configuration: {e}")))
    }

    fn from_settings(settings: EnvironmentSettings) -> Result<Self> {
        let environment = settings.node_env;

        ensure!(
            !settings.support_email.trim().is_empty(),
            "support email cannot be empty"
        );
        ensure!(
            settings.rate_limit_window_seconds != 0,
            "rate limit window must be greater than 0"
        );

        let mut rate_limiting = RateLimitingConfig::for_environment(environment);
        if let Some(max_requests) = settings.rate_limit_max {
            ensure!(max_requests != 0, "rate limit maximum must be greater than 0");
            rate_limiting.max_requests = max_requests;
        }
        rate_limiting.window = Duration::from_secs(settings.rate_limit_window_seconds);
        if let Some(trust_proxy) = settings.trust_proxy {
            rate_limiting.trust_proxy = trust_proxy;
        }

        Ok(Self {
            host: settings.bind_address,
            port: ServerPort::new(settings.port, environment)?,
            api_prefix: ApiPrefix::new(settings.api_prefix)?,
            environment,
            api_url: settings.api_url,
            support_email: settings.support_email,
            timeout_seconds: TimeoutSeconds::new(settings.request_timeout_seconds)?,
            rate_limiting,
            cors: CorsConfig {
                origins: settings.cors_origins.parse()?,
            },
            security_headers: SecurityHeadersConfig {
                hsts_enabled: settings.hsts_enabled,
            },
        })
    }

    /// Create configuration optimized for testing
    pub fn for_testing() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: ServerPort::testing(), // let OS choose available port
            timeout_seconds: TimeoutSeconds::testing(),
            environment: Environment::Test,
            rate_limiting: RateLimitingConfig::for_environment(Environment::Test),
            ..Self::default()
        }
    }

    /// Get socket address for binding
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port.value())
    }
}

#[allow(clippy::expect_used)]
fn default_api_url() -> Url {
    Url::parse(DEFAULT_API_URL).expect("default API URL is valid")
}
