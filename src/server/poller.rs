//! Linux `epoll` readiness poller.
//!
//! Level triggered. Each registration carries a `usize` token that comes back
//! with every event, so the reactor never has to map file descriptors back
//! to connections.

use libc::{
    EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL, EPOLL_CTL_MOD, EPOLLERR, EPOLLHUP, EPOLLIN,
    EPOLLOUT, epoll_create1, epoll_ctl, epoll_event, epoll_wait,
};
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

const EVENT_CAPACITY: usize = 64;

/// Readiness a registration waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Read,
    Write,
}

impl Interest {
    fn flags(self) -> u32 {
        match self {
            Interest::Read => EPOLLIN as u32,
            Interest::Write => EPOLLOUT as u32,
        }
    }
}

/// An I/O event reported by the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// Token given at registration
    pub token: usize,
    pub readable: bool,
    pub writable: bool,
    /// Peer hung up or the socket is in an error state
    pub hangup: bool,
}

pub struct Poller {
    epoll: OwnedFd,
    events: Vec<epoll_event>,
}

impl Poller {
    pub fn new() -> io::Result<Self> {
        let fd = unsafe { epoll_create1(EPOLL_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            // SAFETY: freshly created descriptor owned by nobody else
            epoll: unsafe { OwnedFd::from_raw_fd(fd) },
            events: Vec::with_capacity(EVENT_CAPACITY),
        })
    }

    pub fn register(&self, fd: RawFd, token: usize, interest: Interest) -> io::Result<()> {
        self.ctl(EPOLL_CTL_ADD, fd, token, interest)
    }

    /// Replaces the interest of an already registered descriptor.
    pub fn reregister(&self, fd: RawFd, token: usize, interest: Interest) -> io::Result<()> {
        self.ctl(EPOLL_CTL_MOD, fd, token, interest)
    }

    pub fn deregister(&self, fd: RawFd) -> io::Result<()> {
        let rc = unsafe {
            epoll_ctl(
                self.epoll.as_raw_fd(),
                EPOLL_CTL_DEL,
                fd,
                std::ptr::null_mut(),
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn ctl(&self, op: i32, fd: RawFd, token: usize, interest: Interest) -> io::Result<()> {
        let mut event = epoll_event {
            events: interest.flags(),
            u64: token as u64,
        };

        let rc = unsafe { epoll_ctl(self.epoll.as_raw_fd(), op, fd, &mut event) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Blocks until at least one registration is ready or `timeout` expires.
    ///
    /// `events` is cleared first. An interrupted wait returns with no events.
    pub fn poll(&mut self, events: &mut Vec<Event>, timeout: Option<Duration>) -> io::Result<()> {
        let timeout_ms = timeout
            .map(|t| t.as_millis().min(i32::MAX as u128) as i32)
            .unwrap_or(-1);

        events.clear();

        let n = unsafe {
            epoll_wait(
                self.epoll.as_raw_fd(),
                self.events.as_mut_ptr(),
                EVENT_CAPACITY as i32,
                timeout_ms,
            )
        };

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(err);
        }

        // SAFETY: epoll_wait initialised the first n entries
        unsafe { self.events.set_len(n as usize) };

        for ev in &self.events {
            let bits = ev.events;
            events.push(Event {
                token: ev.u64 as usize,
                readable: bits & (EPOLLIN as u32) != 0,
                writable: bits & (EPOLLOUT as u32) != 0,
                hangup: bits & ((EPOLLHUP | EPOLLERR) as u32) != 0,
            });
        }

        unsafe { self.events.set_len(0) };

        Ok(())
    }
}
