//! Overlapped disk I/O engine
//!
//! A thin owner of one kernel AIO context (`io_setup`). Requests are described
//! with [`IoControlBlock`], handed to the kernel with [`AioContext::submit`] and
//! collected with [`AioContext::reap`].
//!
//! The reap blocks the calling thread. Since the server runs a single reactor
//! thread, a dynamic chunk therefore stalls every other connection for one
//! read plus one socket write. The safe helpers [`AioContext::read_at`] and
//! [`AioContext::write_from`] wrap a submit and its matching reap, so no
//! request is ever left in flight once they return.

pub(crate) mod sys;

use std::io;
use std::marker::PhantomData;
use std::os::fd::RawFd;

use tracing::{trace, warn};

/// Request counters, cumulative over the lifetime of the context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AioStats {
    pub submitted: u64,
    pub completed: u64,
}

/// One read or write request, borrowing the buffer it transfers.
pub struct IoControlBlock<'a> {
    raw: sys::iocb,
    _buffer: PhantomData<&'a mut [u8]>,
}

impl<'a> IoControlBlock<'a> {
    /// Reads up to `buf.len()` bytes of `fd` at `offset` into `buf`.
    pub fn pread(fd: RawFd, buf: &'a mut [u8], offset: u64) -> Self {
        Self::new(sys::IOCB_CMD_PREAD, fd, buf.as_mut_ptr() as u64, buf.len(), offset)
    }

    /// Writes `buf` to `fd` at `offset`. Sockets ignore the offset.
    pub fn pwrite(fd: RawFd, buf: &'a [u8], offset: u64) -> Self {
        Self::new(sys::IOCB_CMD_PWRITE, fd, buf.as_ptr() as u64, buf.len(), offset)
    }

    fn new(opcode: u16, fd: RawFd, buf: u64, len: usize, offset: u64) -> Self {
        Self {
            raw: sys::iocb {
                aio_lio_opcode: opcode,
                aio_fildes: fd as u32,
                aio_buf: buf,
                aio_nbytes: len as u64,
                aio_offset: offset as i64,
                ..Default::default()
            },
            _buffer: PhantomData,
        }
    }

    /// Tags the request; the tag comes back in [`IoEvent::user_data`].
    pub fn with_user_data(mut self, data: u64) -> Self {
        self.raw.aio_data = data;
        self
    }

    pub fn user_data(&self) -> u64 {
        self.raw.aio_data
    }

    pub fn len(&self) -> usize {
        self.raw.aio_nbytes as usize
    }

    pub fn is_empty(&self) -> bool {
        self.raw.aio_nbytes == 0
    }
}

/// A reaped completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct IoEvent(sys::io_event);

impl IoEvent {
    pub fn user_data(&self) -> u64 {
        self.0.data
    }

    /// Bytes transferred, or the errno the request failed with.
    pub fn result(&self) -> io::Result<usize> {
        if self.0.res < 0 {
            Err(io::Error::from_raw_os_error(-self.0.res as i32))
        } else {
            Ok(self.0.res as usize)
        }
    }
}

/// Process-wide kernel AIO context.
pub struct AioContext {
    id: sys::AioContextId,
    next_tag: u64,
    stats: AioStats,
}

impl AioContext {
    /// Creates a context able to hold `max_events` requests in flight.
    pub fn new(max_events: u32) -> io::Result<Self> {
        let id = sys::io_setup(max_events)?;

        Ok(Self {
            id,
            next_tag: 1,
            stats: AioStats::default(),
        })
    }

    pub fn stats(&self) -> AioStats {
        self.stats
    }

    /// Hands `blocks` to the kernel. Fails unless all of them were accepted.
    ///
    /// # Safety
    ///
    /// Each block and the buffer it borrows must stay alive and unmoved until
    /// its completion has been returned by [`AioContext::reap`].
    pub unsafe fn submit(&mut self, blocks: &mut [&mut IoControlBlock<'_>]) -> io::Result<usize> {
        let mut raw: Vec<*mut sys::iocb> = blocks
            .iter_mut()
            .map(|block| &mut block.raw as *mut sys::iocb)
            .collect();

        let accepted = unsafe { sys::io_submit(self.id, &mut raw)? };
        self.stats.submitted += accepted as u64;

        if accepted != blocks.len() {
            return Err(io::Error::other(format!(
                "io_submit accepted {} of {} requests",
                accepted,
                blocks.len()
            )));
        }

        Ok(accepted)
    }

    /// Blocks until at least `min` completions are available and copies up to
    /// `events.len()` of them into `events`.
    pub fn reap(&mut self, min: usize, events: &mut [IoEvent]) -> io::Result<usize> {
        let min = min.min(events.len());
        let mut raw = vec![sys::io_event::default(); events.len()];

        let reaped = loop {
            match sys::io_getevents(self.id, min, &mut raw) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => break other?,
            }
        };

        for (slot, event) in events.iter_mut().zip(&raw[..reaped]) {
            *slot = IoEvent(*event);
        }
        self.stats.completed += reaped as u64;

        Ok(reaped)
    }

    /// Overlapped read of `buf.len()` bytes at `offset`; returns the bytes read.
    pub fn read_at(&mut self, fd: RawFd, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let tag = self.tag();
        let mut block = IoControlBlock::pread(fd, buf, offset).with_user_data(tag);
        self.run_one(&mut block)
    }

    /// Overlapped write of `buf` to `fd`; returns the bytes written.
    pub fn write_from(&mut self, fd: RawFd, buf: &[u8]) -> io::Result<usize> {
        let tag = self.tag();
        let mut block = IoControlBlock::pwrite(fd, buf, 0).with_user_data(tag);
        self.run_one(&mut block)
    }

    fn tag(&mut self) -> u64 {
        let tag = self.next_tag;
        self.next_tag = self.next_tag.wrapping_add(1).max(1);
        tag
    }

    /// Submits one block and reaps until its own completion shows up.
    fn run_one(&mut self, block: &mut IoControlBlock<'_>) -> io::Result<usize> {
        let tag = block.user_data();

        // SAFETY: the block lives on the caller's stack and is not released
        // before the loop below has reaped its completion.
        unsafe { self.submit(&mut [&mut *block])? };
        trace!(tag, bytes = block.len(), "aio request submitted");

        let mut events = [IoEvent::default(); 1];
        loop {
            self.reap(1, &mut events)?;

            if events[0].user_data() == tag {
                return events[0].result();
            }

            warn!(
                tag = events[0].user_data(),
                "dropping completion of a request submitted elsewhere"
            );
        }
    }
}

impl Drop for AioContext {
    fn drop(&mut self) {
        if let Err(e) = sys::io_destroy(self.id) {
            warn!(error = %e, "io_destroy failed");
        }
    }
}
