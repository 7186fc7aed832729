//! Event subscribers and the subscription command

use std::collections::HashSet;

use esl_protocol::{is_builtin_event, Event};
use tokio::sync::mpsc;

use crate::error::ConfigError;

/// Prefix marking a custom event name in a filter (`CUSTOM sofia::register`)
pub const CUSTOM_PREFIX: &str = "CUSTOM ";

/// Filter name meaning "every event"
pub const WILDCARD: &str = "*";

/// Subscription command used when any subscriber wants every event
pub const SUBSCRIBE_ALL: &str = "event plain ALL";

const SUBSCRIBE_COMMAND: &str = "event plain";
const CUSTOM_MARKER: &str = "CUSTOM";

/// Receives the events whose resolved name matches its filter
#[derive(Debug, Clone)]
pub struct Subscriber {
    /// Deliver every event regardless of `names`
    wildcard: bool,
    names: HashSet<String>,
    sender: mpsc::Sender<Event>,
}

impl Subscriber {
    /// Create a subscriber
    ///
    /// No names, or any name that is empty, `*` or `all` (any case), makes
    /// a wildcard subscriber. A leading `CUSTOM ` is stripped from each
    /// name so it compares against the event's resolved name; a name left
    /// empty by that is ignored.
    pub fn new<I>(sender: mpsc::Sender<Event>, events: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        if sender.is_closed() {
            return Err(ConfigError::ClosedChannel);
        }

        let mut events = events.into_iter().peekable();
        if events.peek().is_none() {
            return Ok(Self::all(sender));
        }

        let mut names = HashSet::new();
        for name in events {
            let name = name.as_ref();
            if is_wildcard(name) {
                return Ok(Self::all(sender));
            }

            let name = name.strip_prefix(CUSTOM_PREFIX).unwrap_or(name);
            if !name.is_empty() {
                names.insert(name.to_string());
            }
        }

        Ok(Self {
            wildcard: false,
            names,
            sender,
        })
    }

    fn all(sender: mpsc::Sender<Event>) -> Self {
        Self {
            wildcard: true,
            names: HashSet::new(),
            sender,
        }
    }

    /// Whether every event is delivered
    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// Stored filter names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Whether `event` passes the filter
    pub fn matches(&self, event: &Event) -> bool {
        self.is_wildcard() || self.names.contains(event.name())
    }

    /// Deliver `event` if it passes the filter
    ///
    /// Waits for channel capacity: a subscriber that stops draining its
    /// channel stalls delivery. Returns `true` if the event was delivered.
    /// A dropped receiver is skipped.
    pub async fn handle(&self, event: &Event) -> bool {
        if !self.matches(event) {
            return false;
        }

        match self.sender.send(event.clone()).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(name = event.name(), "subscriber receiver dropped, event skipped");
                false
            }
        }
    }
}

fn is_wildcard(name: &str) -> bool {
    name.is_empty() || name == WILDCARD || name.eq_ignore_ascii_case("all")
}

/// Build the command that subscribes to what every subscriber needs
///
/// Returns `None` when there is nothing to subscribe to. Built-in names follow
/// `event plain`; custom names follow a single `CUSTOM` marker. Name order
/// is unspecified.
pub fn subscription_command(subscribers: &[Subscriber]) -> Option<String> {
    let mut events: HashSet<&str> = HashSet::new();
    for subscriber in subscribers {
        if subscriber.is_wildcard() {
            return Some(SUBSCRIBE_ALL.to_string());
        }
        events.extend(subscriber.names());
    }
    if events.is_empty() {
        return None;
    }

    let mut command = String::from(SUBSCRIBE_COMMAND);
    let mut custom = String::new();
    for name in events {
        let target = if is_builtin_event(name) {
            &mut command
        } else {
            &mut custom
        };
        target.push(' ');
        target.push_str(name);
    }

    if !custom.is_empty() {
        command.push(' ');
        command.push_str(CUSTOM_MARKER);
        command.push_str(&custom);
    }

    Some(command)
}
