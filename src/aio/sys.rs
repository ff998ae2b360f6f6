//! Raw Linux kernel AIO ABI (`linux/aio_abi.h`).
//!
//! glibc does not wrap these calls and `libc` does not define the structs, so
//! they are laid out here and invoked through `libc::syscall`.

#![allow(non_camel_case_types)]

use std::io;
use std::ptr;

pub(crate) type AioContextId = libc::c_ulong;

pub(crate) const IOCB_CMD_PREAD: u16 = 0;
pub(crate) const IOCB_CMD_PWRITE: u16 = 1;

/// `struct iocb`. Field order of `aio_key` / `aio_rw_flags` assumes a
/// little-endian target.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct iocb {
    pub aio_data: u64,
    pub aio_key: u32,
    pub aio_rw_flags: i32,
    pub aio_lio_opcode: u16,
    pub aio_reqprio: i16,
    pub aio_fildes: u32,
    pub aio_buf: u64,
    pub aio_nbytes: u64,
    pub aio_offset: i64,
    pub aio_reserved2: u64,
    pub aio_flags: u32,
    pub aio_resfd: u32,
}

/// `struct io_event`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct io_event {
    pub data: u64,
    pub obj: u64,
    pub res: i64,
    pub res2: i64,
}

fn check(rc: libc::c_long) -> io::Result<libc::c_long> {
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc)
    }
}

pub(crate) fn io_setup(nr_events: u32) -> io::Result<AioContextId> {
    let mut ctx: AioContextId = 0;
    check(unsafe { libc::syscall(libc::SYS_io_setup, nr_events, &mut ctx as *mut AioContextId) })?;
    Ok(ctx)
}

pub(crate) fn io_destroy(ctx: AioContextId) -> io::Result<()> {
    check(unsafe { libc::syscall(libc::SYS_io_destroy, ctx) })?;
    Ok(())
}

/// # Safety
///
/// Every control block and the buffer it points at must stay valid and
/// unmoved until its completion has been reaped.
pub(crate) unsafe fn io_submit(ctx: AioContextId, iocbs: &mut [*mut iocb]) -> io::Result<usize> {
    let rc = check(unsafe {
        libc::syscall(
            libc::SYS_io_submit,
            ctx,
            iocbs.len() as libc::c_long,
            iocbs.as_mut_ptr(),
        )
    })?;
    Ok(rc as usize)
}

/// Blocks until at least `min_nr` completions are available, returning how
/// many were written into `events`.
pub(crate) fn io_getevents(
    ctx: AioContextId,
    min_nr: usize,
    events: &mut [io_event],
) -> io::Result<usize> {
    let rc = check(unsafe {
        libc::syscall(
            libc::SYS_io_getevents,
            ctx,
            min_nr as libc::c_long,
            events.len() as libc::c_long,
            events.as_mut_ptr(),
            ptr::null_mut::<libc::timespec>(),
        )
    })?;
    Ok(rc as usize)
}
