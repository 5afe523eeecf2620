//! Configuration types.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use crate::error::ConfigError;

/// Paging defaults for inbox and search listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageConfig {
    /// Page size used when the client sends none (or garbage).
    pub default_limit: u32,
    /// Upper bound on any requested page size.
    pub max_limit: u32,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
        }
    }
}

/// HTTP server configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub db_path: PathBuf,
    pub paging: PageConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 4000,
            db_path: PathBuf::from("./data/support-inbox.db"),
            paging: PageConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Build config from `INBOX_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind = match lookup("INBOX_BIND") {
            Some(raw) => raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: "INBOX_BIND".into(),
                message: format!("{raw:?} is not an IP address: {e}"),
            })?,
            None => defaults.bind,
        };

        let port: u16 = lookup("INBOX_PORT")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.port);

        let db_path = lookup("INBOX_DB_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let default_limit: u32 = lookup("INBOX_PAGE_LIMIT")
            .and_then(|s| s.trim().parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.paging.default_limit);

        let max_limit: u32 = lookup("INBOX_MAX_PAGE_LIMIT")
            .and_then(|s| s.trim().parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.paging.max_limit);

        if default_limit > max_limit {
            return Err(ConfigError::InvalidValue {
                key: "INBOX_PAGE_LIMIT".into(),
                message: format!("{default_limit} exceeds INBOX_MAX_PAGE_LIMIT ({max_limit})"),
            });
        }

        Ok(Self {
            bind,
            port,
            db_path,
            paging: PageConfig {
                default_limit,
                max_limit,
            },
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.db_path, PathBuf::from("./data/support-inbox.db"));
        assert_eq!(config.paging, PageConfig::default());
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:4000");
    }

    #[test]
    fn reads_overrides() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("INBOX_BIND", "127.0.0.1"),
            ("INBOX_PORT", "8088"),
            ("INBOX_DB_PATH", "/tmp/inbox.db"),
            ("INBOX_PAGE_LIMIT", "50"),
            ("INBOX_MAX_PAGE_LIMIT", "200"),
        ]))
        .unwrap();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8088");
        assert_eq!(config.db_path, PathBuf::from("/tmp/inbox.db"));
        assert_eq!(config.paging.default_limit, 50);
        assert_eq!(config.paging.max_limit, 200);
    }

    #[test]
    fn unparsable_numbers_fall_back() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("INBOX_PORT", "not-a-port"),
            ("INBOX_PAGE_LIMIT", "0"),
        ]))
        .unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.paging.default_limit, 20);
    }

    #[test]
    fn invalid_bind_is_an_error() {
        let result = ServerConfig::from_lookup(lookup_from(&[("INBOX_BIND", "localhost:80")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn default_limit_above_max_is_an_error() {
        let result = ServerConfig::from_lookup(lookup_from(&[
            ("INBOX_PAGE_LIMIT", "500"),
            ("INBOX_MAX_PAGE_LIMIT", "100"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
