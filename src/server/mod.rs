//! Network side of the server: listening socket, epoll poller and the event
//! loop tying them to the connection state machine.

pub mod listener;
pub mod poller;
pub mod reactor;

pub use reactor::Server;
