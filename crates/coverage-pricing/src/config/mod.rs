use rust_decimal::Decimal;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use crate::workflows::quotation::{CopayPolicy, DentalFallback, PricingConfig};

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
    pub pricing: PricingConfig,
    pub catalog_csv: Option<PathBuf>,
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

        let pricing = load_pricing()?;
        let catalog_csv = env::var("PRICING_CATALOG_CSV")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            pricing,
            catalog_csv,
        })
    }
}

fn load_pricing() -> Result<PricingConfig, ConfigError> {
    let defaults = PricingConfig::default();

    let copay_policy = match env::var("PRICING_COPAY_POLICY") {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "complementary" => CopayPolicy::ComplementaryOnly,
            "collective" => CopayPolicy::AnyCollective,
            "disabled" | "off" => CopayPolicy::Disabled,
            _ => return Err(ConfigError::InvalidCopayPolicy(raw)),
        },
        Err(_) => defaults.copay_policy,
    };

    let dental_fallback = match env::var("PRICING_DENTAL_FALLBACK") {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "highest" => DentalFallback::HighestTier,
            "none" => DentalFallback::NoSelection,
            _ => return Err(ConfigError::InvalidDentalFallback(raw)),
        },
        Err(_) => defaults.dental_fallback,
    };

    let copay_price_tolerance =
        decimal_var("PRICING_COPAY_TOLERANCE")?.unwrap_or(defaults.copay_price_tolerance);
    let dental_price_tolerance =
        decimal_var("PRICING_DENTAL_TOLERANCE")?.unwrap_or(defaults.dental_price_tolerance);

    Ok(PricingConfig {
        copay_policy,
        copay_price_tolerance,
        dental_price_tolerance,
        dental_fallback,
    })
}

fn decimal_var(name: &'static str) -> Result<Option<Decimal>, ConfigError> {
    match env::var(name) {
        Ok(raw) => Decimal::from_str(raw.trim())
            .ok()
            .filter(|value| !value.is_sign_negative())
            .map(Some)
            .ok_or(ConfigError::InvalidTolerance { variable: name }),
        Err(_) => Ok(None),
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

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidCopayPolicy(String),
    InvalidDentalFallback(String),
    InvalidTolerance { variable: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidCopayPolicy(value) => write!(
                f,
                "PRICING_COPAY_POLICY must be complementary, collective or disabled (found '{}')",
                value
            ),
            ConfigError::InvalidDentalFallback(value) => write!(
                f,
                "PRICING_DENTAL_FALLBACK must be highest or none (found '{}')",
                value
            ),
            ConfigError::InvalidTolerance { variable } => {
                write!(f, "{variable} must be a non-negative decimal")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
