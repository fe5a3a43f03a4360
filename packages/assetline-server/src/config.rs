//! Service configuration.
//!
//! Plain structs with defaults, plus a `clap` command line whose flags fall
//! back to `ASSETLINE_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

/// Top-level configuration for the `assetline` service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Name reported by the tracer and in logs.
    pub service_name: String,
    pub bus: BusConfig,
    pub admin: AdminConfig,
    pub lifecycle: LifecycleConfig,
    pub log: LogConfig,
    pub tracing: TracingConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_name: "asset-service".to_string(),
            bus: BusConfig::default(),
            admin: AdminConfig::default(),
            lifecycle: LifecycleConfig::default(),
            log: LogConfig::default(),
            tracing: TracingConfig::default(),
        }
    }
}

/// Message bus connection and RPC subject settings.
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub url: String,
    /// Subject the dispatcher serves requests on.
    pub subject: String,
    /// Queue group shared by all instances of the service.
    pub queue_group: String,
    /// Connection name reported to the broker.
    pub client_name: String,
    /// Upper bound for a client request/reply round trip.
    pub request_timeout: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            url: "nats://127.0.0.1:4222".to_string(),
            subject: "asset-service".to_string(),
            queue_group: "asset-service".to_string(),
            client_name: "assetline".to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Admin HTTP listener settings.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub host: String,
    /// 0 means OS-assigned.
    pub port: u16,
    pub tls: Option<TlsConfig>,
    /// Maximum time to wait for a request to complete.
    pub request_timeout: Duration,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            tls: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// TLS certificate configuration.
///
/// No `Default` impl because certificate paths have no sensible defaults.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Coordinator settings.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Shared deadline for stopping every listener and closer.
    pub shutdown_timeout: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// `EnvFilter` directive used when no environment override is set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Span export settings.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// OTLP/gRPC collector endpoint. `None` keeps spans in-process only.
    pub otlp_endpoint: Option<String>,
    pub export_timeout: Duration,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            export_timeout: Duration::from_secs(10),
        }
    }
}

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

/// assetline - asset service RPC over NATS
#[derive(Debug, Parser)]
#[command(name = "assetline", version)]
pub struct Cli {
    /// Service name for traces and logs
    #[arg(long, env = "ASSETLINE_SERVICE_NAME", default_value = "asset-service")]
    pub service_name: String,

    /// NATS server URL
    #[arg(long, env = "ASSETLINE_NATS_URL", default_value = "nats://127.0.0.1:4222")]
    pub nats_url: String,

    /// Subject the RPC dispatcher listens on
    #[arg(long, env = "ASSETLINE_SUBJECT", default_value = "asset-service")]
    pub subject: String,

    /// Queue group shared by service instances (defaults to the subject)
    #[arg(long, env = "ASSETLINE_QUEUE_GROUP")]
    pub queue_group: Option<String>,

    /// Admin HTTP bind address
    #[arg(long, env = "ASSETLINE_ADMIN_HOST", default_value = "0.0.0.0")]
    pub admin_host: String,

    /// Admin HTTP port
    #[arg(long, env = "ASSETLINE_ADMIN_PORT", default_value_t = 9090)]
    pub admin_port: u16,

    /// PEM certificate for the admin listener (enables TLS with --tls-key)
    #[arg(long, env = "ASSETLINE_TLS_CERT", requires = "tls_key")]
    pub tls_cert: Option<PathBuf>,

    /// PEM private key for the admin listener
    #[arg(long, env = "ASSETLINE_TLS_KEY", requires = "tls_cert")]
    pub tls_key: Option<PathBuf>,

    /// Seconds allowed for graceful shutdown
    #[arg(long, env = "ASSETLINE_SHUTDOWN_TIMEOUT", default_value_t = 30)]
    pub shutdown_timeout_secs: u64,

    /// Default log filter (RUST_LOG / ASSETLINE_LOG take precedence)
    #[arg(long, env = "ASSETLINE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "ASSETLINE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// OTLP/gRPC collector for spans, e.g. http://otel-collector:4317
    #[arg(long, env = "ASSETLINE_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

impl Cli {
    /// Converts parsed flags into a [`ServiceConfig`].
    #[must_use]
    pub fn into_config(self) -> ServiceConfig {
        let tls = match (self.tls_cert, self.tls_key) {
            (Some(cert_path), Some(key_path)) => Some(TlsConfig {
                cert_path,
                key_path,
            }),
            _ => None,
        };
        let queue_group = self.queue_group.unwrap_or_else(|| self.subject.clone());

        ServiceConfig {
            bus: BusConfig {
                url: self.nats_url,
                subject: self.subject,
                queue_group,
                client_name: self.service_name.clone(),
                ..BusConfig::default()
            },
            admin: AdminConfig {
                host: self.admin_host,
                port: self.admin_port,
                tls,
                ..AdminConfig::default()
            },
            lifecycle: LifecycleConfig {
                shutdown_timeout: Duration::from_secs(self.shutdown_timeout_secs),
            },
            log: LogConfig {
                level: self.log_level,
                format: self.log_format,
            },
            tracing: TracingConfig {
                otlp_endpoint: self.otlp_endpoint,
                ..TracingConfig::default()
            },
            service_name: self.service_name,
        }
    }
}
