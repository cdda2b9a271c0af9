//! Endpoint URL handling
//!
//! Only the `opc.tcp` scheme is supported. The path, if any, is not
//! interpreted; the full URL string is echoed to the server in Hello.

use crate::error::{Error, Result};

pub const SCHEME: &str = "opc.tcp://";
pub const DEFAULT_PORT: u16 = 4840;

/// A parsed `opc.tcp://host:port[/path]` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointUrl {
    pub host: String,
    pub port: u16,
    /// The verbatim URL as given, sent in Hello.
    pub as_given: String,
}

impl EndpointUrl {
    pub fn parse(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix(SCHEME)
            .ok_or_else(|| Error::Transport(format!("endpoint url must start with {SCHEME}: {url}")))?;

        let authority = rest.split('/').next().unwrap_or("");
        if authority.is_empty() {
            return Err(Error::Transport(format!("endpoint url has no host: {url}")));
        }

        // IPv6 literals come bracketed: opc.tcp://[::1]:4840
        let (host, port_str) = if let Some(end) = authority.strip_prefix('[') {
            let Some((host, after)) = end.split_once(']') else {
                return Err(Error::Transport(format!("unterminated IPv6 literal: {url}")));
            };
            (host.to_owned(), after.strip_prefix(':'))
        } else {
            match authority.rsplit_once(':') {
                Some((host, port)) => (host.to_owned(), Some(port)),
                None => (authority.to_owned(), None),
            }
        };

        let port = match port_str {
            Some(p) => p
                .parse::<u16>()
                .map_err(|_| Error::Transport(format!("invalid port in endpoint url: {url}")))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            host,
            port,
            as_given: url.to_owned(),
        })
    }

    /// The `host:port` pair for the socket connect.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_port_path() {
        let url = EndpointUrl::parse("opc.tcp://plc.example:4841/core/server").unwrap();
        assert_eq!(url.host, "plc.example");
        assert_eq!(url.port, 4841);
        assert_eq!(url.as_given, "opc.tcp://plc.example:4841/core/server");
        assert_eq!(url.socket_addr(), "plc.example:4841");
    }

    #[test]
    fn default_port_applies() {
        let url = EndpointUrl::parse("opc.tcp://plc").unwrap();
        assert_eq!(url.port, DEFAULT_PORT);
    }

    #[test]
    fn ipv6_literal() {
        let url = EndpointUrl::parse("opc.tcp://[::1]:4840").unwrap();
        assert_eq!(url.host, "::1");
        assert_eq!(url.port, 4840);
    }

    #[test]
    fn rejects_other_schemes() {
        assert!(EndpointUrl::parse("http://plc:4840").is_err());
        assert!(EndpointUrl::parse("opc.udp://plc:4840").is_err());
        assert!(EndpointUrl::parse("opc.tcp://").is_err());
    }

    #[test]
    fn rejects_bad_port() {
        assert!(EndpointUrl::parse("opc.tcp://plc:notaport").is_err());
        assert!(EndpointUrl::parse("opc.tcp://plc:99999").is_err());
    }
}
