#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(missing_debug_implementations)]
#![deny(unused_must_use)]

use apns_h2::config::Config;
use apns_h2::{Connection, Notification, PushOptions, telemetry};
use tracing::Instrument;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    let _telemetry_guard = telemetry::init_telemetry(&config.telemetry)?;

    let connection = if config.development {
        Connection::development(config.connection.clone())?
    } else {
        Connection::new(config.connection.clone())?
    };

    let mut notification = Notification::new(config.message.token.clone());
    notification.alert = config.message.alert.clone().map(Into::into);
    notification.topic.clone_from(&config.message.topic);
    notification.priority = config.message.priority;

    let span = tracing::info_span!("push", gateway = %connection.uri());
    let result = async { connection.push(&notification, PushOptions::default()).await?.await }.instrument(span).await;
    connection.close().await;

    let response = result?;
    if response.ok() {
        tracing::info!(apns_id = ?response.apns_id(), "Notification accepted");
        Ok(())
    } else {
        let reason = response.reason().unwrap_or_default();
        tracing::error!(status = %response.status, reason = %reason, "Notification rejected");
        anyhow::bail!("gateway rejected notification: {} {reason}", response.status)
    }
}
