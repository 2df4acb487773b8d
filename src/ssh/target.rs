//! `[user@]host[:port]` targets

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::error::{EasySshError, Result};

pub const DEFAULT_USER: &str = "root";
pub const DEFAULT_PORT: u16 = 22;

/// Where to connect and as whom
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub user: String,
    pub host: IpAddr,
    pub port: u16,
}

impl Target {
    pub fn new(user: impl Into<String>, host: IpAddr, port: u16) -> Self {
        Self {
            user: user.into(),
            host,
            port,
        }
    }

    /// Canonical registry alias: `user@host:port`, IPv6 hosts in brackets
    pub fn alias(&self) -> String {
        format!("{}@{}", self.user, self.socket_addr())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.alias())
    }
}

/// Parse `[user@]host[:port]`
///
/// - `user` defaults to `root`
/// - `port` defaults to 22 and must be in `1..=65535`. Port 0 is rejected
///   even though the literal grammar admits it, since it cannot be dialed.
/// - `host` must be an IPv4 or IPv6 literal; hostnames are rejected.
///   IPv6 with a port is written `[addr]:port`; a bare `addr` is taken whole.
pub fn parse_target_literal(input: &str) -> Result<Target> {
    let s = input.trim();

    let (user, rest) = match s.split_once('@') {
        Some((user, rest)) => (user, rest),
        None => (DEFAULT_USER, s),
    };

    if user.is_empty() {
        return Err(EasySshError::invalid_target(input, "user is empty"));
    }

    let (host, port) = split_host_port(input, rest)?;

    let host: IpAddr = host
        .parse()
        .map_err(|_| EasySshError::invalid_target(input, "address is not an IPv4 or IPv6 literal"))?;

    let port = match port {
        Some(p) => parse_port(input, p)?,
        None => DEFAULT_PORT,
    };

    Ok(Target::new(user, host, port))
}

fn split_host_port<'a>(input: &str, rest: &'a str) -> Result<(&'a str, Option<&'a str>)> {
    if let Some(bracketed) = rest.strip_prefix('[') {
        let (host, after) = bracketed
            .split_once(']')
            .ok_or_else(|| EasySshError::invalid_target(input, "missing ']'"))?;
        return match after {
            "" => Ok((host, None)),
            _ => match after.strip_prefix(':') {
                Some(port) => Ok((host, Some(port))),
                None => Err(EasySshError::invalid_target(input, "unexpected text after ']'")),
            },
        };
    }

    // A bare IPv6 literal contains colons of its own
    if rest.parse::<IpAddr>().is_ok() {
        return Ok((rest, None));
    }

    match rest.rsplit_once(':') {
        Some((host, port)) => Ok((host, Some(port))),
        None => Ok((rest, None)),
    }
}

fn parse_port(input: &str, port: &str) -> Result<u16> {
    let value: u32 = port
        .parse()
        .map_err(|_| EasySshError::invalid_target(input, format!("port '{}' is not a number", port)))?;

    match u16::try_from(value) {
        Ok(p) if p != 0 => Ok(p),
        _ => Err(EasySshError::invalid_target(
            input,
            format!("port {} is out of range 1-65535", value),
        )),
    }
}
