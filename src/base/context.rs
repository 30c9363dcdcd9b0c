//! `Result` adapters that turn `io::Error` into `NetError`.
//!
//! The native engine's connect path is the only caller: DNS lookups map to
//! `NameNotResolved`, socket failures to `ConnectionFailed`.

use crate::base::neterror::NetError;
use std::io;

pub trait IoResultExt<T> {
    /// Tag a socket failure with the peer it was aimed at.
    ///
    /// ```ignore
    /// let addrs = resolve(host, port).await?;
    /// let stream = TcpStream::connect(addrs[0]).await.connection_context(host, port)?;
    /// // Err(ConnectionFailed { host: "example.com", port: 443, reason: "connection refused" })
    /// ```
    fn connection_context(self, host: &str, port: u16) -> Result<T, NetError>;

    /// Collapse a lookup failure into `NameNotResolved`; the cause is only logged.
    fn dns_context(self, host: &str) -> Result<T, NetError>;
}

impl<T> IoResultExt<T> for Result<T, io::Error> {
    fn connection_context(self, host: &str, port: u16) -> Result<T, NetError> {
        self.map_err(|e| NetError::ConnectionFailed {
            host: host.to_string(),
            port,
            reason: e.to_string(),
        })
    }

    fn dns_context(self, host: &str) -> Result<T, NetError> {
        self.map_err(|e| {
            tracing::debug!(host = %host, error = %e, "DNS resolution failed");
            NetError::NameNotResolved {
                host: host.to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_connection_context() {
        let result: Result<(), io::Error> =
            Err(Error::new(ErrorKind::ConnectionRefused, "refused"));
        let err = result.connection_context("example.com", 443).unwrap_err();

        match err {
            NetError::ConnectionFailed { host, port, reason } => {
                assert_eq!(host, "example.com");
                assert_eq!(port, 443);
                assert_eq!(reason, "refused");
            }
            _ => panic!("Expected ConnectionFailed"),
        }
    }

    #[test]
    fn test_dns_context() {
        let result: Result<(), io::Error> = Err(Error::new(ErrorKind::NotFound, "no such host"));
        let err = result.dns_context("unknown.example.com").unwrap_err();

        match err {
            NetError::NameNotResolved { host } => {
                assert_eq!(host, "unknown.example.com");
            }
            _ => panic!("Expected NameNotResolved"),
        }
    }
}
