//! eslmon: FreeSWITCH event socket monitor
//!
//! A [`Monitor`] connects to the event socket, authenticates, subscribes to
//! the union of what its subscribers want and then fans every event out to
//! the matching subscriber channels until the run is cancelled or fails.
//!
//! ```ignore
//! let (tx, mut rx) = tokio::sync::mpsc::channel(64);
//! let mut monitor = Monitor::new("10.10.1.5", "ClueCon")?;
//! monitor.subscribe(tx, ["HEARTBEAT", "CUSTOM sofia::register"])?;
//!
//! let shutdown = Shutdown::new();
//! tokio::spawn(async move { while let Some(event) = rx.recv().await { /* ... */ } });
//! let reason = monitor.run(&shutdown).await.unwrap_err();
//! ```

pub mod config;
pub mod connection;
pub mod dialer;
pub mod error;
pub mod handshake;
pub mod monitor;
pub mod output;
pub mod shutdown;
pub mod subscriber;
pub mod timeout;

pub use config::MonitorConfig;
pub use dialer::{Dialer, TcpDialer};
pub use error::{CommandError, ConfigError, MonitorError};
pub use esl_protocol::{ContentType, Event, Response};
pub use monitor::Monitor;
pub use shutdown::{CancelCause, Shutdown};
pub use subscriber::Subscriber;
