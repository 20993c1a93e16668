//! Gateway configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::policy::ContentPolicy;

/// Default bind address
pub const DEFAULT_LISTEN: SocketAddr = SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080);

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address the HTTP listener binds to
    pub listen: SocketAddr,
    /// Upper bound for one origin fetch, body included
    pub fetch_timeout: Duration,
    /// Upper bound for establishing the origin connection
    pub connect_timeout: Duration,
    /// How long in-flight requests may drain after shutdown starts
    pub shutdown_grace: Duration,
    /// Replaces the default image allowlist when set
    pub content_types: Option<Vec<String>>,
    /// Allowed on top of the (default or replaced) allowlist
    pub extra_content_types: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN,
            fetch_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(5),
            content_types: None,
            extra_content_types: Vec::new(),
        }
    }
}

impl GatewayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listen(mut self, listen: SocketAddr) -> Self {
        self.listen = listen;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn with_content_types<I, S>(mut self, content_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.content_types = Some(content_types.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_extra_content_types<I, S>(mut self, content_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_content_types
            .extend(content_types.into_iter().map(Into::into));
        self
    }

    /// Content policy described by this configuration
    pub fn content_policy(&self) -> ContentPolicy {
        let policy = match &self.content_types {
            Some(types) => ContentPolicy::new().with_content_types(types.iter().cloned()),
            None => ContentPolicy::new(),
        };
        policy.with_extra_content_types(self.extra_content_types.iter().cloned())
    }
}
