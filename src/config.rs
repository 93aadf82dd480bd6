use clap::{Args, Parser, ValueEnum};

pub const PRODUCTION_URI: &str = "https://api.push.apple.com:443";
pub const DEVELOPMENT_URI: &str = "https://api.development.push.apple.com:443";

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Send through the development gateway instead of production
    #[arg(long, env = "APNS_DEVELOPMENT", default_value_t = false)]
    pub development: bool,

    #[command(flatten)]
    pub connection: ConnectionOptions,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,

    #[command(flatten)]
    pub message: MessageArgs,
}

/// Options accepted by [`Connection::new`](crate::Connection::new).
#[derive(Clone, Debug, PartialEq, Eq, Args)]
pub struct ConnectionOptions {
    /// Gateway address, defaults to the production gateway
    #[arg(long, env = "APNS_URI")]
    pub uri: Option<String>,

    /// Path to the PEM file holding the client certificate and its private key
    #[arg(long, env = "APNS_CERT_PATH")]
    pub cert_path: String,

    /// Passphrase for an encrypted private key
    #[arg(long, env = "APNS_CERT_PASS", default_value = "", hide_env_values = true)]
    pub cert_pass: String,

    /// How long to wait for the TCP and TLS handshakes
    #[arg(long, env = "APNS_CONNECT_TIMEOUT_SECS", default_value_t = 30)]
    pub connect_timeout_secs: u64,
}

impl ConnectionOptions {
    pub fn new(cert_path: impl Into<String>, cert_pass: impl Into<String>) -> Self {
        Self {
            uri: None,
            cert_path: cert_path.into(),
            cert_pass: cert_pass.into(),
            connect_timeout_secs: 30,
        }
    }

    #[must_use]
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }
}

/// The notification sent by the `apns-push` binary.
#[derive(Clone, Debug, Args)]
pub struct MessageArgs {
    /// Device token to deliver to
    #[arg(long)]
    pub token: String,

    /// Alert text shown on the device
    #[arg(long)]
    pub alert: Option<String>,

    /// Bundle identifier of the target app
    #[arg(long, env = "APNS_TOPIC")]
    pub topic: Option<String>,

    /// Delivery priority, 10 for immediate and 5 for power-considerate
    #[arg(long)]
    pub priority: Option<u64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Default, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long, env = "APNS_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP collector endpoint; traces and metrics are only exported when set
    #[arg(long, env = "APNS_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

impl Config {
    pub fn load() -> Self {
        Self::parse()
    }
}
