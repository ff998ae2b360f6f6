use bytes::BytesMut;
use std::fs::File;
use std::io::{self, Read};
use std::net::{SocketAddr, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use std::path::Path;

use tracing::{debug, trace, warn};

use crate::aio::AioContext;
use crate::config::Config;
use crate::error::ConnectionError;
use crate::http::parser::{find_headers_end, parse_request_head};
use crate::http::response::{ResponseHeader, StatusCode};
use crate::http::writer::{Progress, SendBuffer, send_file};
use crate::resource::{Classifier, ResourceType};

/// Bytes pulled from the socket per `read` call while receiving.
const READ_CHUNK: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted, nothing read yet
    Initial,
    /// Accumulating the request head
    Receiving,
    /// Full head buffered, waiting to be parsed
    RequestReceived,
    /// 404 header about to be built
    SendingNotFound,
    /// 200 header about to be built
    SendingHeader,
    /// Flushing the header, then the body if it is sent with sendfile
    SendingData,
    /// Body moving through the AIO engine one chunk per writable event
    AsyncOngoing,
    /// 200 header and a non-empty body fully sent
    DataSent,
    /// 200 header sent, body was empty
    HeaderSent,
    /// 404 header and body fully sent
    NotFoundSent,
    Closed,
}

impl ConnectionState {
    /// True once the response is complete and only teardown remains.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConnectionState::DataSent
                | ConnectionState::HeaderSent
                | ConnectionState::NotFoundSent
                | ConnectionState::Closed
        )
    }
}

/// What a handler wants the reactor to do with the socket next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Read,
    Write,
    /// Tear the connection down
    Close,
}

/// Shared state the handlers consult.
pub struct ServeContext<'a> {
    pub config: &'a Config,
    pub classifier: &'a Classifier,
    pub aio: &'a mut AioContext,
}

/// One accepted client and everything needed to answer it.
///
/// Dropping the record closes the socket and the backing file.
pub struct Connection {
    token: usize,
    peer: SocketAddr,
    socket: TcpStream,
    state: ConnectionState,
    recv: BytesMut,
    send: SendBuffer,
    request_path: Option<String>,
    resource_type: ResourceType,
    status: StatusCode,
    backing_file: Option<File>,
    /// Body bytes not yet sent
    file_size: u64,
    /// Body bytes already sent
    file_offset: u64,
    body_length: u64,
    chunk: Vec<u8>,
    chunks_sent: u64,
}

impl Connection {
    /// Wraps an accepted socket. The socket must already be non-blocking.
    pub fn new(token: usize, socket: TcpStream, peer: SocketAddr) -> Self {
        Self {
            token,
            peer,
            socket,
            state: ConnectionState::Initial,
            recv: BytesMut::with_capacity(READ_CHUNK),
            send: SendBuffer::new(),
            request_path: None,
            resource_type: ResourceType::None,
            status: StatusCode::Ok,
            backing_file: None,
            file_size: 0,
            file_offset: 0,
            body_length: 0,
            chunk: Vec::new(),
            chunks_sent: 0,
        }
    }

    pub fn token(&self) -> usize {
        self.token
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn request_path(&self) -> Option<&str> {
        self.request_path.as_deref()
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Value of the announced `Content-Length`.
    pub fn body_length(&self) -> u64 {
        self.body_length
    }

    /// Body bytes delivered so far.
    pub fn body_sent(&self) -> u64 {
        self.file_offset
    }

    /// Completed read+write pairs of a dynamic resource.
    pub fn chunks_sent(&self) -> u64 {
        self.chunks_sent
    }

    pub fn has_backing_file(&self) -> bool {
        self.backing_file.is_some()
    }

    /// Input half of the state machine.
    ///
    /// `hangup` is set when the poller reported an error or hang-up along with
    /// (or instead of) readability.
    pub fn on_readable(&mut self, ctx: &mut ServeContext<'_>, hangup: bool) -> Next {
        let result = match self.state {
            ConnectionState::Initial => {
                self.transition(ConnectionState::Receiving);
                self.receive(ctx.config.max_request_size)
            }
            ConnectionState::Receiving => self.receive(ctx.config.max_request_size),
            ConnectionState::Closed => Ok(Next::Close),
            _ if hangup => {
                debug!(token = self.token, state = ?self.state, "peer hung up mid-response");
                Ok(Next::Close)
            }
            // the request is buffered; progress only needs output readiness
            _ => Ok(Next::Write),
        };

        self.finish(result)
    }

    /// Output half of the state machine.
    pub fn on_writable(&mut self, ctx: &mut ServeContext<'_>) -> Next {
        let result = match self.state {
            ConnectionState::Initial | ConnectionState::Receiving => Ok(Next::Read),
            ConnectionState::RequestReceived => {
                self.process_request(ctx.config, ctx.classifier);
                Ok(Next::Write)
            }
            ConnectionState::SendingNotFound => {
                self.prepare_not_found(&ctx.config.not_found_path());
                Ok(Next::Write)
            }
            ConnectionState::SendingHeader => self.prepare_header(),
            ConnectionState::SendingData => self.send_data(),
            ConnectionState::AsyncOngoing => self.send_dynamic_chunk(ctx.aio, ctx.config.chunk_size),
            ConnectionState::DataSent
            | ConnectionState::HeaderSent
            | ConnectionState::NotFoundSent
            | ConnectionState::Closed => Ok(Next::Close),
        };

        self.finish(result)
    }

    /// Marks the record closed. The reactor drops it right after.
    pub fn close(&mut self) {
        debug!(
            token = self.token,
            peer = %self.peer,
            state = ?self.state,
            status = self.status.as_u16(),
            sent = self.file_offset,
            announced = self.body_length,
            "closing connection"
        );
        self.state = ConnectionState::Closed;
    }

    fn transition(&mut self, next: ConnectionState) {
        trace!(token = self.token, from = ?self.state, to = ?next, "state transition");
        self.state = next;
    }

    fn finish(&mut self, result: Result<Next, ConnectionError>) -> Next {
        match result {
            Ok(next) => next,
            Err(ConnectionError::PeerClosed) => {
                debug!(token = self.token, peer = %self.peer, state = ?self.state, "peer closed early");
                Next::Close
            }
            Err(e) => {
                warn!(
                    token = self.token,
                    peer = %self.peer,
                    state = ?self.state,
                    error = %e,
                    "connection failed"
                );
                Next::Close
            }
        }
    }

    fn receive(&mut self, limit: usize) -> Result<Next, ConnectionError> {
        let mut buf = [0u8; READ_CHUNK];

        loop {
            let room = limit.saturating_sub(self.recv.len());
            if room == 0 {
                debug!(token = self.token, limit, "request head hit size limit");
                self.transition(ConnectionState::RequestReceived);
                return Ok(Next::Write);
            }

            let want = room.min(READ_CHUNK);
            match self.socket.read(&mut buf[..want]) {
                Ok(0) => return Err(ConnectionError::PeerClosed),
                Ok(n) => {
                    // the terminator may straddle the previous read
                    let search_from = self.recv.len().saturating_sub(3);
                    self.recv.extend_from_slice(&buf[..n]);
                    trace!(token = self.token, bytes = n, "received");

                    if find_headers_end(&self.recv[search_from..]).is_some() {
                        self.transition(ConnectionState::RequestReceived);
                        return Ok(Next::Write);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Next::Read),
                Err(e) => return Err(ConnectionError::Receive(e)),
            }
        }
    }

    fn process_request(&mut self, config: &Config, classifier: &Classifier) {
        let head = match parse_request_head(&self.recv) {
            Ok((head, consumed)) if consumed == self.recv.len() => head,
            Ok((_, consumed)) => {
                debug!(
                    token = self.token,
                    consumed,
                    buffered = self.recv.len(),
                    "bytes after request head"
                );
                self.transition(ConnectionState::SendingNotFound);
                return;
            }
            Err(e) => {
                debug!(token = self.token, error = %e, "unparsable request");
                self.transition(ConnectionState::SendingNotFound);
                return;
            }
        };

        self.resource_type = classifier.classify(&head.path);
        debug!(
            token = self.token,
            method = %head.method,
            path = %head.path,
            resource = ?self.resource_type,
            "request received"
        );

        let file = match self.resource_type {
            ResourceType::None => None,
            _ => classifier
                .resolve(&config.document_root, &head.path)
                .and_then(|path| match open_regular(&path) {
                    Ok(file) => Some(file),
                    Err(e) => {
                        debug!(token = self.token, path = %path.display(), error = %e, "cannot open resource");
                        None
                    }
                }),
        };
        self.request_path = Some(head.path);

        match file {
            Some(file) => {
                self.backing_file = Some(file);
                self.transition(ConnectionState::SendingHeader);
            }
            None => self.transition(ConnectionState::SendingNotFound),
        }
    }

    fn prepare_not_found(&mut self, page: &Path) {
        self.status = StatusCode::NotFound;
        self.backing_file = None;

        // a missing 404 page just means an empty body
        let length = match open_regular(page).and_then(|f| f.metadata().map(|m| (f, m.len()))) {
            Ok((file, len)) => {
                self.backing_file = Some(file);
                len
            }
            Err(e) => {
                debug!(token = self.token, page = %page.display(), error = %e, "no not-found page");
                0
            }
        };

        self.start_body(ResponseHeader::not_found(length));
    }

    fn prepare_header(&mut self) -> Result<Next, ConnectionError> {
        let length = match &self.backing_file {
            Some(file) => file.metadata().map_err(ConnectionError::Stat)?.len(),
            None => 0,
        };

        self.status = StatusCode::Ok;
        self.start_body(ResponseHeader::ok(length));
        Ok(Next::Write)
    }

    fn start_body(&mut self, header: ResponseHeader) {
        self.send.prepare(&header);
        self.body_length = header.content_length;
        self.file_size = header.content_length;
        self.file_offset = 0;
        debug!(
            token = self.token,
            status = header.status.as_u16(),
            content_length = header.content_length,
            "sending header"
        );
        self.transition(ConnectionState::SendingData);
    }

    fn send_data(&mut self) -> Result<Next, ConnectionError> {
        if self.send.flush_to(&mut self.socket).map_err(ConnectionError::Send)? == Progress::Blocked {
            return Ok(Next::Write);
        }

        let file = match self.backing_file.as_ref().map(|f| f.as_raw_fd()) {
            Some(fd) if self.file_size > 0 => fd,
            _ => {
                self.transition(self.completed_state());
                return Ok(Next::Write);
            }
        };

        if self.status == StatusCode::NotFound || self.resource_type == ResourceType::Static {
            let socket = self.socket.as_raw_fd();
            let progress = send_file(socket, file, &mut self.file_offset, &mut self.file_size)
                .map_err(ConnectionError::Send)?;

            if progress == Progress::Done {
                self.transition(self.completed_state());
            }
        } else {
            self.transition(ConnectionState::AsyncOngoing);
        }

        Ok(Next::Write)
    }

    /// Moves one chunk: overlapped read at `file_offset`, then overlapped
    /// write of exactly the bytes read. Both are reaped before returning.
    fn send_dynamic_chunk(
        &mut self,
        aio: &mut AioContext,
        chunk_size: usize,
    ) -> Result<Next, ConnectionError> {
        let Some(file) = self.backing_file.as_ref().map(|f| f.as_raw_fd()) else {
            self.transition(self.completed_state());
            return Ok(Next::Write);
        };
        let socket = self.socket.as_raw_fd();

        let len = (chunk_size as u64).min(self.file_size) as usize;
        if self.chunk.len() < len {
            self.chunk.resize(len, 0);
        }
        let buf = &mut self.chunk[..len];

        let read = aio
            .read_at(file, buf, self.file_offset)
            .map_err(ConnectionError::Aio)?;
        if read != len {
            return Err(ConnectionError::ShortTransfer {
                expected: len,
                actual: read,
            });
        }

        let written = aio.write_from(socket, buf).map_err(ConnectionError::Aio)?;
        if written != len {
            return Err(ConnectionError::ShortTransfer {
                expected: len,
                actual: written,
            });
        }

        self.file_offset += len as u64;
        self.file_size -= len as u64;
        self.chunks_sent += 1;
        trace!(
            token = self.token,
            chunk = self.chunks_sent,
            bytes = len,
            remaining = self.file_size,
            "dynamic chunk sent"
        );

        if self.file_size == 0 {
            self.transition(ConnectionState::DataSent);
        }

        Ok(Next::Write)
    }

    fn completed_state(&self) -> ConnectionState {
        if self.status == StatusCode::NotFound {
            ConnectionState::NotFoundSent
        } else if self.body_length == 0 {
            ConnectionState::HeaderSent
        } else {
            ConnectionState::DataSent
        }
    }
}

/// Opens `path` read-only, refusing anything that is not a regular file.
fn open_regular(path: &Path) -> io::Result<File> {
    let file = File::open(path)?;
    if !file.metadata()?.is_file() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"));
    }
    Ok(file)
}
