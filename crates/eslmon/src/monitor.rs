//! Monitor run loop
//!
//! A run walks `dialing -> authenticating -> subscribing -> streaming` and
//! always ends with a [`MonitorError`] naming why. There is no reconnect;
//! callers that want one loop around [`Monitor::run`].

use std::convert::Infallible;
use std::time::Duration;

use esl_protocol::{ContentType, Event};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::config::{
    with_default_port, MonitorConfig, DEFAULT_COMMAND_TIMEOUT, DEFAULT_DIAL_TIMEOUT, DEFAULT_PORT,
};
use crate::connection::Connection;
use crate::dialer::{Dialer, TcpDialer};
use crate::error::{ConfigError, MonitorError};
use crate::handshake::authenticate;
use crate::shutdown::{CancelCause, Shutdown};
use crate::subscriber::{subscription_command, Subscriber};
use crate::timeout::with_timeout;

/// Event socket monitor
///
/// Holds the peer address, credentials, timeouts and the registered
/// subscribers. Configure it, then call [`Monitor::run`].
#[derive(Debug, Clone)]
pub struct Monitor {
    address: String,
    password: String,
    dial_timeout: Duration,
    command_timeout: Duration,
    subscribers: Vec<Subscriber>,
}

impl Monitor {
    /// Create a monitor for `address`, adding the default port if it has none
    pub fn new(address: &str, password: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            address: with_default_port(address, DEFAULT_PORT)?,
            password: password.into(),
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            subscribers: Vec::new(),
        })
    }

    /// Create a monitor from loaded settings
    ///
    /// Subscribers are not created here: they need a channel, which only
    /// the caller can provide.
    pub fn from_config(config: &MonitorConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(&config.address, config.password.clone())?
            .with_dial_timeout(config.dial_timeout)
            .with_command_timeout(config.command_timeout))
    }

    /// Set the connection timeout; zero disables it
    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Set the timeout of each command exchange; zero disables it
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Register a subscriber for `events`
    ///
    /// See [`Subscriber::new`] for how names are interpreted. Events reach
    /// subscribers in registration order.
    pub fn subscribe<I>(
        &mut self,
        sender: mpsc::Sender<Event>,
        events: I,
    ) -> Result<&mut Self, ConfigError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.subscribers.push(Subscriber::new(sender, events)?);
        Ok(self)
    }

    /// Peer address in `host:port` form
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Registered subscribers
    pub fn subscribers(&self) -> &[Subscriber] {
        &self.subscribers
    }

    /// Command sent after authentication, `None` without subscribers
    pub fn subscription_command(&self) -> Option<String> {
        subscription_command(&self.subscribers)
    }

    /// Connect over TCP and stream events until something ends the run
    pub async fn run(&self, shutdown: &Shutdown) -> Result<Infallible, MonitorError> {
        self.run_with(&TcpDialer, shutdown).await
    }

    /// Like [`Monitor::run`], connecting through `dialer`
    pub async fn run_with<D>(&self, dialer: &D, shutdown: &Shutdown) -> Result<Infallible, MonitorError>
    where
        D: Dialer,
    {
        tracing::debug!(address = %self.address, "dialing");

        let dial = async {
            let dial = dialer.dial(&self.address);
            let result = match enabled(self.dial_timeout) {
                Some(timeout) => match tokio::time::timeout(timeout, dial).await {
                    Ok(result) => result,
                    Err(_) => {
                        return Err(MonitorError::DialTimeout {
                            address: self.address.clone(),
                            timeout,
                        })
                    }
                },
                None => dial.await,
            };
            result.map_err(|source| MonitorError::Dial {
                address: self.address.clone(),
                source,
            })
        };

        let stream = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Err(cancelled(shutdown)),
            stream = dial => stream?,
        };

        tracing::debug!(address = %self.address, "connected");
        self.run_on(stream, shutdown).await
    }

    /// Run the session over an already connected stream
    ///
    /// The stream is dropped, and so closed, when this returns.
    pub async fn run_on<S>(&self, stream: S, shutdown: &Shutdown) -> Result<Infallible, MonitorError>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin,
    {
        let mut conn = Connection::new(stream);
        let command_timeout = enabled(self.command_timeout);

        with_timeout(shutdown, command_timeout, authenticate(&mut conn, &self.password))
            .await
            .map_err(MonitorError::Authenticate)?;

        if let Some(command) = self.subscription_command() {
            let reply = with_timeout(shutdown, command_timeout, conn.send(&command))
                .await
                .map_err(MonitorError::Subscribe)?;
            if let Some(err) = reply.as_err() {
                return Err(MonitorError::SubscribeRejected(err));
            }
            tracing::debug!(command = %command, "subscribed");
        }

        loop {
            let response = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Err(cancelled(shutdown)),
                response = conn.read() => match response {
                    Ok(response) => response,
                    // a read broken by cancellation reports the cause
                    Err(err) => return Err(match shutdown.cause() {
                        Some(cause) => MonitorError::Cancelled(cause),
                        None => MonitorError::Read(err),
                    }),
                },
            };

            match response.kind() {
                ContentType::EventPlain => {
                    let event = Event::from_json(response.body()).map_err(MonitorError::EventDecode)?;
                    event.log_dispatched();

                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => return Err(cancelled(shutdown)),
                        _ = self.dispatch(&event) => {}
                    }
                }
                ContentType::DisconnectNotice => return Err(MonitorError::ServerClosed),
                kind if kind.is_event() => {
                    tracing::debug!(r#type = %kind, "event encoding not decoded, skipped");
                }
                _ => {}
            }
        }
    }

    async fn dispatch(&self, event: &Event) {
        for subscriber in &self.subscribers {
            subscriber.handle(event).await;
        }
    }
}

fn enabled(timeout: Duration) -> Option<Duration> {
    (!timeout.is_zero()).then_some(timeout)
}

fn cancelled(shutdown: &Shutdown) -> MonitorError {
    MonitorError::Cancelled(shutdown.cause().unwrap_or_else(CancelCause::canceled))
}
