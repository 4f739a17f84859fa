//! Relay address literal (`A.B.C.D:PORT`).

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;

use thiserror::Error;

/// Malformed relay address literal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("malformed address {input:?}: expected A.B.C.D:PORT")]
pub struct AddressParseError {
    /// The rejected input.
    pub input: String,
}

/// IPv4 address and port of a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerAddress {
    /// IPv4 address.
    pub address: Ipv4Addr,
    /// TCP port.
    pub port: u16,
}

impl PeerAddress {
    /// Create from parts.
    pub fn new(address: Ipv4Addr, port: u16) -> Self {
        Self { address, port }
    }

    /// As a socket address for connecting.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.address, self.port))
    }
}

impl FromStr for PeerAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = SocketAddrV4::from_str(s).map_err(|_| AddressParseError {
            input: s.to_string(),
        })?;
        Ok(Self::new(*parsed.ip(), parsed.port()))
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

impl From<SocketAddrV4> for PeerAddress {
    fn from(addr: SocketAddrV4) -> Self {
        Self::new(*addr.ip(), addr.port())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let addr: PeerAddress = "192.168.1.20:4040".parse().unwrap();
        assert_eq!(addr.address, Ipv4Addr::new(192, 168, 1, 20));
        assert_eq!(addr.port, 4040);
        assert_eq!(addr.to_string(), "192.168.1.20:4040");

        let edge: PeerAddress = "0.0.0.0:65535".parse().unwrap();
        assert_eq!(edge.port, u16::MAX);
        assert_eq!(edge.socket_addr(), "0.0.0.0:65535".parse().unwrap());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for input in [
            "",
            "localhost:80",
            "1.2.3.4",
            "1.2.3:80",
            "256.1.1.1:80",
            "1.2.3.4:65536",
            "1.2.3.4:-1",
            "1.2.3.4:port",
            "[::1]:80",
            " 1.2.3.4:80",
        ] {
            let err = input.parse::<PeerAddress>().unwrap_err();
            assert_eq!(err.input, input);
        }
    }
}
