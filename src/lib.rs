#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

//! Delivers push notifications to APNs over HTTP/2.
//!
//! A [`Connection`] validates the gateway address and client certificate up
//! front, then sends each [`Notification`] on its own stream of one shared
//! HTTP/2 connection:
//!
//! ```rust,no_run
//! use apns_h2::{Connection, ConnectionOptions, Notification, PushOptions};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let connection = Connection::new(ConnectionOptions::new("/certs/apns.pem", ""))?;
//!
//! let mut notification = Notification::new("device-token");
//! notification.alert = Some("Hello".into());
//! notification.topic = Some("com.example.myapp".into());
//!
//! let response = connection.push(&notification, PushOptions::default()).await?.await?;
//! assert!(response.ok());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod headers;
pub mod notification;
pub mod response;
pub mod telemetry;
pub mod transport;

pub use config::{ConnectionOptions, DEVELOPMENT_URI, PRODUCTION_URI};
pub use connection::Connection;
pub use error::{Error, Result};
pub use headers::{HeaderValue, Headers};
pub use notification::{Message, Notification};
pub use response::{Rejection, Response};
pub use transport::{PushOptions, Stream, Transport, TransportError};
