use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_SYNC_INTERVAL_MINUTES: u64 = 60;
/// Longest leave request, in calendar days, accepted by default.
pub const DEFAULT_MAX_SPAN_DAYS: u32 = 366;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub sync: SyncConfig,
    pub leave: LeaveConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let interval_minutes = match env::var("SYNC_INTERVAL_MINUTES") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|minutes| *minutes > 0)
                .ok_or(ConfigError::InvalidSyncInterval)?,
            Err(_) => DEFAULT_SYNC_INTERVAL_MINUTES,
        };

        let export_dir = env::var("HR_EXPORT_DIR")
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from);

        let sync = SyncConfig {
            enabled: flag("HR_SYNC_ENABLED", export_dir.is_some())?,
            export_dir,
            interval: interval_minutes
                .checked_mul(60)
                .map(Duration::from_secs)
                .ok_or(ConfigError::InvalidSyncInterval)?,
        };
        if sync.enabled && sync.export_dir.is_none() {
            return Err(ConfigError::MissingExportDir);
        }

        let max_span_days = match env::var("LEAVE_MAX_SPAN_DAYS") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|days| *days > 0)
                .ok_or(ConfigError::InvalidMaxSpan)?,
            Err(_) => DEFAULT_MAX_SPAN_DAYS,
        };

        let leave = LeaveConfig {
            prevent_overlap: flag("LEAVE_PREVENT_OVERLAP", false)?,
            max_span_days,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            sync,
            leave,
        })
    }
}

fn flag(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag { name }),
        },
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// HR export synchronization schedule.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub enabled: bool,
    pub export_dir: Option<PathBuf>,
    pub interval: Duration,
}

/// Lifecycle rules that deployments may switch on.
#[derive(Debug, Clone)]
pub struct LeaveConfig {
    pub prevent_overlap: bool,
    pub max_span_days: u32,
}

impl Default for LeaveConfig {
    fn default() -> Self {
        Self {
            prevent_overlap: false,
            max_span_days: DEFAULT_MAX_SPAN_DAYS,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidSyncInterval,
    InvalidMaxSpan,
    InvalidFlag { name: &'static str },
    MissingExportDir,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidSyncInterval => {
                write!(f, "SYNC_INTERVAL_MINUTES must be a positive whole number")
            }
            ConfigError::InvalidMaxSpan => {
                write!(f, "LEAVE_MAX_SPAN_DAYS must be a positive whole number")
            }
            ConfigError::InvalidFlag { name } => {
                write!(f, "{name} must be one of true/false/1/0/yes/no/on/off")
            }
            ConfigError::MissingExportDir => {
                write!(f, "HR_EXPORT_DIR must be set when HR sync is enabled")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidSyncInterval
            | ConfigError::InvalidMaxSpan
            | ConfigError::InvalidFlag { .. }
            | ConfigError::MissingExportDir => None,
        }
    }
}
