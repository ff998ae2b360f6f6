//! Error types
//!
//! Two layers of failure exist in the server. [`ServerError`] covers the
//! process-level conditions that abort startup or the event loop.
//! [`ConnectionError`] covers everything that can go wrong while serving a
//! single client; those are logged and end in teardown of that connection only.

use std::fmt;
use std::io;

use crate::config::ConfigError;

/// Fatal, process-level failures.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration failed validation
    Config(ConfigError),
    /// The listening socket could not be created, bound or put in listen mode
    Listen(io::Error),
    /// The readiness multiplexer could not be created
    Poller(io::Error),
    /// The kernel asynchronous I/O context could not be created
    Aio(io::Error),
    /// Registering the listener or waiting for events failed
    EventLoop(io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Config(e) => write!(f, "invalid configuration: {}", e),
            ServerError::Listen(e) => write!(f, "failed to create listening socket: {}", e),
            ServerError::Poller(e) => write!(f, "failed to create epoll instance: {}", e),
            ServerError::Aio(e) => write!(f, "failed to set up aio context: {}", e),
            ServerError::EventLoop(e) => write!(f, "event loop failure: {}", e),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Config(e) => Some(e),
            ServerError::Listen(e)
            | ServerError::Poller(e)
            | ServerError::Aio(e)
            | ServerError::EventLoop(e) => Some(e),
        }
    }
}

impl From<ConfigError> for ServerError {
    fn from(e: ConfigError) -> Self {
        ServerError::Config(e)
    }
}

/// Failures scoped to one client connection.
#[derive(Debug)]
pub enum ConnectionError {
    /// Peer closed the socket before a full request arrived
    PeerClosed,
    /// Reading the request failed
    Receive(io::Error),
    /// Querying the size of the backing file failed
    Stat(io::Error),
    /// Writing the header or a static body failed
    Send(io::Error),
    /// Submitting or reaping an overlapped request failed
    Aio(io::Error),
    /// An overlapped transfer completed with fewer bytes than requested
    ShortTransfer { expected: usize, actual: usize },
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::PeerClosed => write!(f, "peer closed connection"),
            ConnectionError::Receive(e) => write!(f, "receive failed: {}", e),
            ConnectionError::Stat(e) => write!(f, "cannot stat backing file: {}", e),
            ConnectionError::Send(e) => write!(f, "send failed: {}", e),
            ConnectionError::Aio(e) => write!(f, "async io failed: {}", e),
            ConnectionError::ShortTransfer { expected, actual } => {
                write!(f, "short transfer: expected {} bytes, got {}", expected, actual)
            }
        }
    }
}

impl std::error::Error for ConnectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConnectionError::Receive(e)
            | ConnectionError::Stat(e)
            | ConnectionError::Send(e)
            | ConnectionError::Aio(e) => Some(e),
            _ => None,
        }
    }
}
