mod common;

use std::fs::{File, OpenOptions};
use std::io::Read;
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;

use common::{DocRoot, pattern};
use tideway::aio::{AioContext, AioStats, IoControlBlock, IoEvent};

#[test]
fn test_read_at_offset() {
    let root = DocRoot::new("aio-read");
    let data = pattern(10_000);
    root.write("dynamic/data.bin", &data);
    let file = File::open(root.file("dynamic/data.bin")).unwrap();

    let mut aio = AioContext::new(8).unwrap();
    let mut buf = vec![0u8; 4096];
    let n = aio.read_at(file.as_raw_fd(), &mut buf, 4096).unwrap();

    assert_eq!(n, 4096);
    assert_eq!(buf, data[4096..8192]);
    assert_eq!(
        aio.stats(),
        AioStats {
            submitted: 1,
            completed: 1
        }
    );
}

#[test]
fn test_read_past_end_is_short() {
    let root = DocRoot::new("aio-short");
    root.write("dynamic/small.bin", &pattern(100));
    let file = File::open(root.file("dynamic/small.bin")).unwrap();

    let mut aio = AioContext::new(8).unwrap();
    let mut buf = vec![0u8; 4096];

    assert_eq!(aio.read_at(file.as_raw_fd(), &mut buf, 60).unwrap(), 40);
    assert_eq!(aio.read_at(file.as_raw_fd(), &mut buf, 100).unwrap(), 0);
}

#[test]
fn test_write_from_to_socket() {
    let (ours, mut theirs) = UnixStream::pair().unwrap();
    let mut aio = AioContext::new(8).unwrap();
    let data = pattern(2048);

    let n = aio.write_from(ours.as_raw_fd(), &data).unwrap();
    assert_eq!(n, data.len());

    drop(ours);
    let mut received = Vec::new();
    theirs.read_to_end(&mut received).unwrap();
    assert_eq!(received, data);
}

#[test]
fn test_write_from_to_file() {
    let root = DocRoot::new("aio-write");
    let path = root.file("dynamic/out.bin");
    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&path)
        .unwrap();

    let mut aio = AioContext::new(8).unwrap();
    assert_eq!(aio.write_from(file.as_raw_fd(), b"overlapped").unwrap(), 10);

    assert_eq!(std::fs::read(&path).unwrap(), b"overlapped");
}

#[test]
fn test_bad_descriptor_fails() {
    let mut aio = AioContext::new(8).unwrap();
    let mut buf = [0u8; 16];

    assert!(aio.read_at(-1, &mut buf, 0).is_err());
}

#[test]
fn test_submit_batch_and_reap_by_tag() {
    let root = DocRoot::new("aio-batch");
    let data = pattern(8192);
    root.write("dynamic/data.bin", &data);
    let file = File::open(root.file("dynamic/data.bin")).unwrap();
    let fd = file.as_raw_fd();

    let mut aio = AioContext::new(8).unwrap();
    let mut first = vec![0u8; 4096];
    let mut second = vec![0u8; 4096];
    {
        let mut a = IoControlBlock::pread(fd, &mut first, 0).with_user_data(7);
        let mut b = IoControlBlock::pread(fd, &mut second, 4096).with_user_data(9);
        assert_eq!(a.len(), 4096);

        let submitted = unsafe { aio.submit(&mut [&mut a, &mut b]).unwrap() };
        assert_eq!(submitted, 2);

        let mut events = [IoEvent::default(); 2];
        let mut reaped = 0;
        while reaped < 2 {
            reaped += aio.reap(2 - reaped, &mut events[reaped..]).unwrap();
        }

        let mut tags: Vec<u64> = events.iter().map(|e| e.user_data()).collect();
        tags.sort();
        assert_eq!(tags, vec![7, 9]);
        assert!(events.iter().all(|e| e.result().unwrap() == 4096));
    }

    assert_eq!(first, data[..4096]);
    assert_eq!(second, data[4096..]);
    assert_eq!(aio.stats().submitted, 2);
    assert_eq!(aio.stats().completed, 2);
}
