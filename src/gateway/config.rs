//! Gateway configuration

use std::net::SocketAddr;

use crate::bus::topics;

/// Gateway server configuration options
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Topics whose envelopes are delivered back to every connected client
    pub delivery_topics: Vec<String>,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:7878".parse().unwrap(),
            max_connections: 0, // Unlimited
            delivery_topics: vec![topics::ASSISTANT_RESPONSE.to_string()],
            tcp_nodelay: true,
        }
    }
}

impl GatewayConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Replace the outbound delivery topics
    pub fn delivery_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.delivery_topics = topics.into_iter().map(Into::into).collect();
        self
    }

    /// Add one outbound delivery topic
    pub fn delivery_topic(mut self, topic: impl Into<String>) -> Self {
        self.delivery_topics.push(topic.into());
        self
    }
}
