//! URI parsing and runtime-wide configuration, generalizing the
//! teacher's `TransportConfig`/`cli::Args` pattern (spec §6.1, ambient
//! config layer per `SPEC_FULL.md` §2).

use crate::error::{IocError, IocResult};
use std::time::Duration;

/// Sentinel host selecting the in-process FIFO transport (spec §6.1).
pub const LOCAL_PROCESS_HOST: &str = "LocalProcess";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Auto,
    Fifo,
    Tcp,
}

impl Protocol {
    fn parse(s: &str) -> IocResult<Self> {
        match s {
            "auto" => Ok(Protocol::Auto),
            "fifo" => Ok(Protocol::Fifo),
            "tcp" => Ok(Protocol::Tcp),
            _ => Err(IocError::InvalidParam("unknown URI protocol")),
        }
    }
}

/// `protocol://host[:port]/path` (spec §6.1). Two services with the
/// same URI cannot be online simultaneously (enforced by the registry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUri {
    pub protocol: ProtocolResolved,
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolResolved {
    Fifo,
    Tcp,
}

impl ServiceUri {
    pub fn parse(uri: &str) -> IocResult<Self> {
        let (scheme, rest) = uri
            .split_once("://")
            .ok_or(IocError::InvalidParam("URI missing scheme separator"))?;
        let protocol = Protocol::parse(scheme)?;

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };
        if authority.is_empty() {
            return Err(IocError::InvalidParam("URI missing host"));
        }

        let (host, port) = match authority.split_once(':') {
            Some((h, p)) => {
                let port: u16 = p
                    .parse()
                    .map_err(|_| IocError::InvalidParam("URI port is not numeric"))?;
                (h.to_string(), Some(port))
            }
            None => (authority.to_string(), None),
        };

        let resolved = match protocol {
            Protocol::Fifo => ProtocolResolved::Fifo,
            Protocol::Tcp => ProtocolResolved::Tcp,
            Protocol::Auto => {
                if host == LOCAL_PROCESS_HOST {
                    ProtocolResolved::Fifo
                } else {
                    ProtocolResolved::Tcp
                }
            }
        };

        if resolved == ProtocolResolved::Tcp && port.is_none() {
            return Err(IocError::InvalidParam("TCP URI requires a port"));
        }

        Ok(ServiceUri {
            protocol: resolved,
            host,
            port,
            path: path.to_string(),
        })
    }

    /// Canonical string used as the registry's uniqueness key (spec
    /// §6.1: "Two services with the same URI cannot be online
    /// simultaneously").
    pub fn canonical(&self) -> String {
        match self.port {
            Some(p) => format!("{:?}://{}:{}{}", self.protocol, self.host, p, self.path),
            None => format!("{:?}://{}{}", self.protocol, self.host, self.path),
        }
    }
}

/// Capability set a service/link may exercise (spec §3.2). A small,
/// closed set of flags — hand-rolled rather than pulling in a bitflags
/// crate the rest of the stack has no other use for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u16);

impl Capabilities {
    pub const NONE: Capabilities = Capabilities(0);
    pub const EVT_PRODUCER: Capabilities = Capabilities(1 << 0);
    pub const EVT_CONSUMER: Capabilities = Capabilities(1 << 1);
    pub const CMD_INITIATOR: Capabilities = Capabilities(1 << 2);
    pub const CMD_EXECUTOR: Capabilities = Capabilities(1 << 3);
    pub const DAT_SENDER: Capabilities = Capabilities(1 << 4);
    pub const DAT_RECEIVER: Capabilities = Capabilities(1 << 5);

    pub const fn contains(&self, other: Capabilities) -> bool {
        (self.0 & other.0) == other.0
    }

    pub const fn union(self, other: Capabilities) -> Capabilities {
        Capabilities(self.0 | other.0)
    }
}

impl std::ops::BitOr for Capabilities {
    type Output = Capabilities;
    fn bitor(self, rhs: Capabilities) -> Capabilities {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for Capabilities {
    fn bitor_assign(&mut self, rhs: Capabilities) {
        self.0 |= rhs.0;
    }
}

/// Service-level flags (spec §3.2).
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceFlags {
    pub auto_accept: bool,
    pub broadcast: bool,
}

/// Tunables that are implementation-defined by spec.md and fixed here
/// (spec §4.3, §4.4, §9 open question 2).
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub fifo_queue_depth: usize,
    pub tcp_accept_backlog: usize,
    pub tcp_max_frame_bytes: u32,
    pub conles_queue_capacity: usize,
    pub default_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            fifo_queue_depth: 64,
            tcp_accept_backlog: 128,
            tcp_max_frame_bytes: 16 * 1024 * 1024,
            conles_queue_capacity: 1024,
            default_timeout: Duration::from_secs(5),
        }
    }
}

pub fn runtime_config() -> &'static RuntimeConfig {
    use std::sync::OnceLock;
    static CONFIG: OnceLock<RuntimeConfig> = OnceLock::new();
    CONFIG.get_or_init(RuntimeConfig::default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_protocol_resolves_fifo_for_local_process() {
        let uri = ServiceUri::parse("auto://LocalProcess/SingleSrv").unwrap();
        assert_eq!(uri.protocol, ProtocolResolved::Fifo);
    }

    #[test]
    fn auto_protocol_resolves_tcp_otherwise() {
        let uri = ServiceUri::parse("auto://127.0.0.1:9000/svc").unwrap();
        assert_eq!(uri.protocol, ProtocolResolved::Tcp);
        assert_eq!(uri.port, Some(9000));
    }

    #[test]
    fn tcp_without_port_is_invalid() {
        assert!(ServiceUri::parse("tcp://127.0.0.1/svc").is_err());
    }
}
