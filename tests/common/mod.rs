#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use tideway::Config;

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

/// A throwaway document root with `static/` and `dynamic/` folders.
pub struct DocRoot {
    pub path: PathBuf,
}

impl DocRoot {
    pub fn new(name: &str) -> Self {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!(
            "tideway-{}-{}-{}",
            name,
            std::process::id(),
            id
        ));

        let _ = std::fs::remove_dir_all(&path);
        std::fs::create_dir_all(path.join("static")).unwrap();
        std::fs::create_dir_all(path.join("dynamic")).unwrap();

        Self { path }
    }

    pub fn write(&self, relative: &str, contents: &[u8]) -> &Self {
        let target = self.path.join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(target, contents).unwrap();
        self
    }

    pub fn file(&self, relative: &str) -> PathBuf {
        self.path.join(relative)
    }

    /// Loopback config on an ephemeral port rooted here.
    pub fn config(&self) -> Config {
        Config {
            listen_addr: "127.0.0.1".to_string(),
            listen_port: 0,
            document_root: self.path.clone(),
            ..Config::default()
        }
    }

    pub fn root(&self) -> &Path {
        &self.path
    }
}

impl Drop for DocRoot {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

/// Deterministic, non-repeating-per-chunk content.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub fn get(path: &str) -> Vec<u8> {
    format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path).into_bytes()
}

/// Splits a raw response into its header text and body bytes.
pub fn split_response(raw: &[u8]) -> (String, Vec<u8>) {
    let end = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response has no header terminator");

    (
        String::from_utf8(raw[..end + 4].to_vec()).unwrap(),
        raw[end + 4..].to_vec(),
    )
}

pub fn ok_header(len: usize) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        len
    )
}

pub fn not_found_header(len: usize) -> String {
    format!(
        "HTTP/1.1 404 Not Found\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        len
    )
}
