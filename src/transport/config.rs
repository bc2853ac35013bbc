//! Link configuration.

use std::time::Duration;

use crate::core::{
    DEFAULT_LOCAL_PORT_BASE, DEFAULT_MAX_BIND_ATTEMPTS, DEFAULT_REMOTE_PORT, KEEP_ALIVE_THRESHOLD,
    READ_TIMEOUT, RECV_BUFFER_SIZE,
};

/// UDP link configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Port the peer listens on.
    pub remote_port: u16,

    /// First local port tried; later attempts increment it.
    pub local_port_base: u16,

    /// Local ports tried before connect fails.
    pub max_bind_attempts: u32,

    /// Read timeout of the receive loop. Each expiry is reported to the
    /// error callback.
    pub read_timeout: Duration,

    /// Inbound packets without an application send before the receive loop
    /// sends a keep-alive.
    pub keep_alive_threshold: u32,

    /// Receive buffer size.
    pub recv_buffer_size: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            remote_port: DEFAULT_REMOTE_PORT,
            local_port_base: DEFAULT_LOCAL_PORT_BASE,
            max_bind_attempts: DEFAULT_MAX_BIND_ATTEMPTS,
            read_timeout: READ_TIMEOUT,
            keep_alive_threshold: KEEP_ALIVE_THRESHOLD,
            recv_buffer_size: RECV_BUFFER_SIZE,
        }
    }
}

/// Builder for [`LinkConfig`].
#[derive(Debug, Default)]
pub struct LinkConfigBuilder {
    config: LinkConfig,
}

impl LinkConfigBuilder {
    /// Start from the protocol defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the peer port.
    pub fn remote_port(mut self, port: u16) -> Self {
        self.config.remote_port = port;
        self
    }

    /// Set the first local port tried.
    pub fn local_port_base(mut self, port: u16) -> Self {
        self.config.local_port_base = port;
        self
    }

    /// Set the number of local ports tried.
    pub fn max_bind_attempts(mut self, attempts: u32) -> Self {
        self.config.max_bind_attempts = attempts;
        self
    }

    /// Set the receive loop read timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Set the keep-alive threshold.
    pub fn keep_alive_threshold(mut self, packets: u32) -> Self {
        self.config.keep_alive_threshold = packets;
        self
    }

    /// Set the receive buffer size.
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.config.recv_buffer_size = size;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> LinkConfig {
        self.config
    }
}
