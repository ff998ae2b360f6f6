use bytes::BytesMut;
use std::io::{self, Write};
use std::os::fd::RawFd;

use crate::http::response::ResponseHeader;

/// Outcome of pushing bytes at a non-blocking socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Everything that was asked for has been written
    Done,
    /// The socket buffer filled up; retry on the next writable event
    Blocked,
}

/// Outbound header bytes and how much of them has reached the socket.
#[derive(Debug, Default)]
pub struct SendBuffer {
    buffer: BytesMut,
    written: usize,
}

impl SendBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the buffer content with a serialized header.
    pub fn prepare(&mut self, header: &ResponseHeader) {
        self.buffer.clear();
        self.written = 0;
        header.write_to(&mut self.buffer);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Bytes not yet written.
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.written
    }

    /// Writes as much of the buffer as the socket takes.
    ///
    /// Short writes are retried; `WouldBlock` returns [`Progress::Blocked`]
    /// with the offset kept for the next call. Any other error is returned.
    pub fn flush_to<W: Write>(&mut self, stream: &mut W) -> io::Result<Progress> {
        while self.written < self.buffer.len() {
            match stream.write(&self.buffer[self.written..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "connection closed while writing",
                    ));
                }
                Ok(n) => self.written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Progress::Blocked),
                Err(e) => return Err(e),
            }
        }

        Ok(Progress::Done)
    }
}

/// Copies `*remaining` bytes of `file` starting at `*offset` into `socket`
/// without going through user space.
///
/// Both counters are updated as bytes leave, so a [`Progress::Blocked`] call
/// can be resumed later.
pub fn send_file(
    socket: RawFd,
    file: RawFd,
    offset: &mut u64,
    remaining: &mut u64,
) -> io::Result<Progress> {
    while *remaining > 0 {
        let mut off = *offset as libc::off_t;
        let count = (*remaining).min(isize::MAX as u64) as usize;

        let rc = unsafe { libc::sendfile(socket, file, &mut off, count) };

        if rc < 0 {
            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::Interrupted => continue,
                io::ErrorKind::WouldBlock => return Ok(Progress::Blocked),
                _ => return Err(err),
            }
        }

        if rc == 0 {
            // file shrank under us
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "file ended before announced length",
            ));
        }

        *offset += rc as u64;
        *remaining -= rc as u64;
    }

    Ok(Progress::Done)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Accepts at most `limit` bytes per write, then blocks.
    struct Trickle {
        out: Vec<u8>,
        per_write: usize,
        limit: usize,
    }

    impl Write for Trickle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.out.len() >= self.limit {
                return Err(io::ErrorKind::WouldBlock.into());
            }
            let n = buf.len().min(self.per_write).min(self.limit - self.out.len());
            self.out.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn short_writes_are_retried() {
        let mut buf = SendBuffer::new();
        buf.prepare(&ResponseHeader::ok(5));
        let mut sink = Trickle {
            out: Vec::new(),
            per_write: 3,
            limit: usize::MAX,
        };

        assert_eq!(buf.flush_to(&mut sink).unwrap(), Progress::Done);
        assert_eq!(sink.out, ResponseHeader::ok(5).to_bytes());
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn would_block_keeps_offset() {
        let mut buf = SendBuffer::new();
        buf.prepare(&ResponseHeader::not_found(12));
        let total = buf.len();
        let mut sink = Trickle {
            out: Vec::new(),
            per_write: 4,
            limit: 10,
        };

        assert_eq!(buf.flush_to(&mut sink).unwrap(), Progress::Blocked);
        assert_eq!(buf.remaining(), total - 10);

        sink.limit = usize::MAX;
        assert_eq!(buf.flush_to(&mut sink).unwrap(), Progress::Done);
        assert_eq!(sink.out, ResponseHeader::not_found(12).to_bytes());
    }
}
