use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, SocketAddrV4, TcpListener, TcpStream};
use std::os::fd::AsRawFd;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::aio::{AioContext, AioStats};
use crate::config::Config;
use crate::error::ServerError;
use crate::http::connection::{Connection, Next, ServeContext};
use crate::resource::Classifier;
use crate::server::listener::bind_listener;
use crate::server::poller::{Event, Interest, Poller};

/// Token of the listening socket; connection tokens never take this value.
const LISTENER_TOKEN: usize = 0;

struct Entry {
    connection: Connection,
    interest: Interest,
}

/// The single-threaded file server.
///
/// Owns the listening socket, the epoll instance, the AIO context and every
/// live connection. Nothing is shared with other threads.
pub struct Server {
    config: Config,
    classifier: Classifier,
    listener: TcpListener,
    poller: Poller,
    aio: AioContext,
    registry: HashMap<usize, Entry>,
    next_token: usize,
    events: Vec<Event>,
}

impl Server {
    /// Sets up the AIO context, the poller and the listening socket.
    ///
    /// Any failure here is fatal for the process.
    pub fn bind(config: Config) -> Result<Self, ServerError> {
        config.validate()?;

        let aio = AioContext::new(config.aio_max_events).map_err(ServerError::Aio)?;
        let poller = Poller::new().map_err(ServerError::Poller)?;

        let addr = SocketAddrV4::new(config.listen_ip()?, config.listen_port);
        let listener = bind_listener(addr, config.backlog).map_err(ServerError::Listen)?;
        poller
            .register(listener.as_raw_fd(), LISTENER_TOKEN, Interest::Read)
            .map_err(ServerError::EventLoop)?;

        info!(
            addr = %listener.local_addr().map_err(ServerError::Listen)?,
            root = %config.document_root.display(),
            static_folder = %config.static_folder,
            dynamic_folder = %config.dynamic_folder,
            "server waiting for connections"
        );

        let classifier = Classifier::new(&config.static_folder, &config.dynamic_folder);

        Ok(Self {
            config,
            classifier,
            listener,
            poller,
            aio,
            registry: HashMap::new(),
            next_token: LISTENER_TOKEN + 1,
            events: Vec::with_capacity(64),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Connections accepted and not yet torn down.
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    pub fn aio_stats(&self) -> AioStats {
        self.aio.stats()
    }

    /// Serves forever. Returns only on a fatal event loop error.
    pub fn run(&mut self) -> Result<(), ServerError> {
        loop {
            self.run_once(None)?;
        }
    }

    /// Waits for one batch of readiness events and dispatches all of them.
    ///
    /// Returns the number of events handled, zero when `timeout` expired.
    pub fn run_once(&mut self, timeout: Option<Duration>) -> Result<usize, ServerError> {
        let mut events = std::mem::take(&mut self.events);
        self.poller
            .poll(&mut events, timeout)
            .map_err(ServerError::EventLoop)?;

        for event in &events {
            if event.token == LISTENER_TOKEN {
                self.accept_connections();
            } else {
                self.dispatch(*event);
            }
        }

        let handled = events.len();
        self.events = events;
        Ok(handled)
    }

    fn accept_connections(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((socket, peer)) => self.register_connection(socket, peer),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    return;
                }
            }
        }
    }

    fn register_connection(&mut self, socket: TcpStream, peer: SocketAddr) {
        if let Err(e) = socket.set_nonblocking(true) {
            warn!(peer = %peer, error = %e, "cannot make socket non-blocking");
            return;
        }

        let token = self.allocate_token();
        if let Err(e) = self.poller.register(socket.as_raw_fd(), token, Interest::Read) {
            warn!(peer = %peer, error = %e, "cannot register connection");
            return;
        }

        info!(token, peer = %peer, fd = socket.as_raw_fd(), "new connection");

        let entry = Entry {
            connection: Connection::new(token, socket, peer),
            interest: Interest::Read,
        };
        self.registry.insert(token, entry);
    }

    fn allocate_token(&mut self) -> usize {
        loop {
            let token = self.next_token;
            self.next_token = self.next_token.wrapping_add(1);

            if token != LISTENER_TOKEN && !self.registry.contains_key(&token) {
                return token;
            }
        }
    }

    fn dispatch(&mut self, event: Event) {
        let Some(entry) = self.registry.get_mut(&event.token) else {
            // torn down earlier in this batch
            return;
        };

        let mut ctx = ServeContext {
            config: &self.config,
            classifier: &self.classifier,
            aio: &mut self.aio,
        };

        let mut next = None;
        if event.readable || event.hangup {
            next = Some(entry.connection.on_readable(&mut ctx, event.hangup));
        }
        if event.writable && next != Some(Next::Close) {
            next = Some(entry.connection.on_writable(&mut ctx));
        }

        let interest = match next {
            None => return,
            Some(Next::Close) => {
                self.teardown(event.token);
                return;
            }
            Some(Next::Read) => Interest::Read,
            Some(Next::Write) => Interest::Write,
        };

        if interest == entry.interest {
            return;
        }

        match self
            .poller
            .reregister(entry.connection.raw_fd(), event.token, interest)
        {
            Ok(()) => entry.interest = interest,
            Err(e) => {
                warn!(token = event.token, error = %e, "cannot rearm connection");
                self.teardown(event.token);
            }
        }
    }

    /// Removes a connection for good. Dropping the record closes its socket
    /// and backing file.
    fn teardown(&mut self, token: usize) {
        let Some(mut entry) = self.registry.remove(&token) else {
            return;
        };

        if let Err(e) = self.poller.deregister(entry.connection.raw_fd()) {
            debug!(token, error = %e, "deregister failed");
        }
        entry.connection.close();
    }
}
