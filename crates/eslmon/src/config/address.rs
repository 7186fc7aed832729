//! Peer address normalization

use std::net::Ipv6Addr;

use crate::error::ConfigError;

/// Event socket port used when the address has none
pub const DEFAULT_PORT: u16 = 8021;

/// Return `address` as `host:port`, appending `default_port` if needed
///
/// Accepts `host`, `host:port`, `[v6]`, `[v6]:port` and a bare IPv6
/// literal. Anything else is rejected rather than guessed at.
pub fn with_default_port(address: &str, default_port: u16) -> Result<String, ConfigError> {
    let invalid = |reason| ConfigError::InvalidAddress {
        address: address.to_string(),
        reason,
    };

    if address.is_empty() {
        return Err(invalid("empty address"));
    }

    if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| invalid("missing ']' in address"))?;
        if host.is_empty() {
            return Err(invalid("missing host in address"));
        }
        return match tail {
            "" => Ok(format!("[{host}]:{default_port}")),
            _ => {
                let port = tail
                    .strip_prefix(':')
                    .ok_or_else(|| invalid("unexpected text after ']'"))?;
                check_port(port).map_err(invalid)?;
                Ok(address.to_string())
            }
        };
    }

    match address.split_once(':') {
        None => Ok(format!("{address}:{default_port}")),
        Some((host, port)) if !port.contains(':') => {
            if host.is_empty() {
                return Err(invalid("missing host in address"));
            }
            check_port(port).map_err(invalid)?;
            Ok(address.to_string())
        }
        Some(_) if address.parse::<Ipv6Addr>().is_ok() => {
            Ok(format!("[{address}]:{default_port}"))
        }
        Some(_) => Err(invalid("too many colons in address")),
    }
}

fn check_port(port: &str) -> Result<(), &'static str> {
    if port.is_empty() {
        return Err("missing port after ':'");
    }
    port.parse::<u16>().map(|_| ()).map_err(|_| "invalid port")
}
