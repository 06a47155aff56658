//! qscale.toml configuration parser.
//!
//! The file mirrors the sections below. Every field is optional in the
//! file itself; `QscaleConfig::resolve` applies CLI overrides and
//! defaults, then rejects anything the controller cannot start without.
//!
//! ```toml
//! [scaler]
//! queue_name = "work"
//! application_name = "consumer"
//! poll_interval_ms = 1000
//! threshold = 5
//!
//! [rabbitmq]
//! management_url = "http://localhost:15672"
//!
//! [platform]
//! api = "api.sys.example.com"
//! org = "acme"
//! space = "prod"
//! token = "..."
//! ```

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::types::{DEFAULT_POLL_INTERVAL_MS, DEFAULT_THRESHOLD};

const DEFAULT_MANAGEMENT_URL: &str = "http://localhost:15672";
const DEFAULT_VHOST: &str = "/";
const DEFAULT_RABBIT_USER: &str = "guest";
const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5000;

// ── File layout ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub scaler: Option<ScalerSection>,
    pub rabbitmq: Option<RabbitMqSection>,
    pub platform: Option<PlatformSection>,
    pub http: Option<HttpSection>,
    pub server: Option<ServerSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScalerSection {
    pub queue_name: Option<String>,
    pub application_name: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub threshold: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RabbitMqSection {
    pub management_url: Option<String>,
    pub vhost: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformSection {
    pub api: Option<String>,
    pub org: Option<String>,
    pub space: Option<String>,
    pub token: Option<String>,
    pub skip_ssl_validation: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpSection {
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSection {
    pub listen: Option<String>,
}

/// Values supplied on the command line or environment. Set fields win
/// over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub queue_name: Option<String>,
    pub application_name: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub threshold: Option<u64>,
    pub listen: Option<String>,
    pub platform_token: Option<String>,
}

// ── Resolved config ────────────────────────────────────────────────

/// Fully validated configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QscaleConfig {
    pub scaler: ScalerConfig,
    pub rabbitmq: RabbitMqConfig,
    pub platform: PlatformConfig,
    pub http: HttpConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScalerConfig {
    pub queue_name: String,
    pub application_name: String,
    pub poll_interval_ms: u64,
    pub threshold: u64,
}

impl ScalerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RabbitMqConfig {
    pub management_url: String,
    pub vhost: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformConfig {
    /// Base URL of the platform API, always with a scheme.
    pub api: String,
    /// Organization and space that scope every application lookup.
    pub org: String,
    pub space: String,
    pub token: String,
    pub skip_ssl_validation: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpConfig {
    pub timeout_ms: u64,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerConfig {
    pub listen: Option<SocketAddr>,
}

impl QscaleConfig {
    pub fn from_file(path: &Path, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content, overrides)
    }

    pub fn from_toml_str(content: &str, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        Self::resolve(file, overrides)
    }

    /// Merge overrides onto the file, fill defaults, and validate.
    pub fn resolve(file: ConfigFile, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let scaler = file.scaler.unwrap_or_default();
        let rabbitmq = file.rabbitmq.unwrap_or_default();
        let platform = file.platform.unwrap_or_default();
        let http = file.http.unwrap_or_default();
        let server = file.server.unwrap_or_default();

        let queue_name = required(
            overrides.queue_name.or(scaler.queue_name),
            "scaler.queue_name",
        )?;
        let application_name = required(
            overrides.application_name.or(scaler.application_name),
            "scaler.application_name",
        )?;

        let poll_interval_ms = overrides
            .poll_interval_ms
            .or(scaler.poll_interval_ms)
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS);
        if poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "scaler.poll_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }

        let threshold = overrides
            .threshold
            .or(scaler.threshold)
            .unwrap_or(DEFAULT_THRESHOLD);

        let api = required(platform.api, "platform.api")?;
        let org = required(platform.org, "platform.org")?;
        let space = required(platform.space, "platform.space")?;
        let token = required(overrides.platform_token.or(platform.token), "platform.token")?;

        let timeout_ms = http.timeout_ms.unwrap_or(DEFAULT_HTTP_TIMEOUT_MS);
        if timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "http.timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }

        let listen = match overrides.listen.or(server.listen) {
            Some(addr) => Some(addr.trim().parse::<SocketAddr>().map_err(|e| {
                ConfigError::Invalid {
                    key: "server.listen",
                    reason: format!("{addr:?}: {e}"),
                }
            })?),
            None => None,
        };

        Ok(QscaleConfig {
            scaler: ScalerConfig {
                queue_name,
                application_name,
                poll_interval_ms,
                threshold,
            },
            rabbitmq: RabbitMqConfig {
                management_url: trim_base_url(
                    rabbitmq
                        .management_url
                        .as_deref()
                        .unwrap_or(DEFAULT_MANAGEMENT_URL),
                ),
                vhost: rabbitmq.vhost.unwrap_or_else(|| DEFAULT_VHOST.to_string()),
                username: rabbitmq
                    .username
                    .unwrap_or_else(|| DEFAULT_RABBIT_USER.to_string()),
                password: rabbitmq
                    .password
                    .unwrap_or_else(|| DEFAULT_RABBIT_USER.to_string()),
            },
            platform: PlatformConfig {
                api: normalize_api_url(&api),
                org,
                space,
                token,
                skip_ssl_validation: platform.skip_ssl_validation.unwrap_or(false),
            },
            http: HttpConfig { timeout_ms },
            server: ServerConfig { listen },
        })
    }

    /// Render the effective settings with secrets masked.
    pub fn to_redacted_toml(&self) -> Result<String, toml::ser::Error> {
        let mut shown = self.clone();
        shown.platform.token = "***".to_string();
        shown.rabbitmq.password = "***".to_string();
        toml::to_string_pretty(&shown)
    }
}

fn required(value: Option<String>, key: &'static str) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Accept `api.example.com` or a full URL; bare hosts default to https.
fn normalize_api_url(api: &str) -> String {
    let api = trim_base_url(api);
    if api.contains("://") {
        api
    } else {
        format!("https://{api}")
    }
}
