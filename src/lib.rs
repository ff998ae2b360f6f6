//! Tideway - event-driven static and dynamic file server
//!
//! One thread, one epoll instance, many connections. Files under the static
//! folder go out with `sendfile(2)`; files under the dynamic folder are read
//! and written in fixed-size chunks through the Linux kernel AIO interface.
//!
//! Linux only.

pub mod aio;
pub mod config;
pub mod error;
pub mod http;
pub mod resource;
pub mod server;

pub use config::Config;
pub use error::{ConnectionError, ServerError};
pub use server::Server;
