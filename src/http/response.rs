use bytes::{BufMut, BytesMut};

const HTTP_VERSION: &str = "HTTP/1.1";

/// Status codes the file server produces.
///
/// - `Ok` (200): resource found, body follows
/// - `NotFound` (404): anything else, body is the configured not-found page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 404 Not Found
    NotFound,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use tideway::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::NotFound => 404,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::NotFound => "Not Found",
        }
    }
}

/// Header of a response whose body is streamed separately.
///
/// Every response announces its exact length and closes the connection, so
/// the header is fully determined by the status and the body size:
///
/// ```text
/// HTTP/1.1 200 OK\r\n
/// Content-Length: 1024\r\n
/// Connection: close\r\n
/// \r\n
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub status: StatusCode,
    pub content_length: u64,
}

impl ResponseHeader {
    pub fn ok(content_length: u64) -> Self {
        Self {
            status: StatusCode::Ok,
            content_length,
        }
    }

    pub fn not_found(content_length: u64) -> Self {
        Self {
            status: StatusCode::NotFound,
            content_length,
        }
    }

    /// Appends the serialized header to `buf`.
    pub fn write_to(&self, buf: &mut BytesMut) {
        let head = format!(
            "{} {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            HTTP_VERSION,
            self.status.as_u16(),
            self.status.reason_phrase(),
            self.content_length
        );
        buf.put_slice(head.as_bytes());
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(64);
        self.write_to(&mut buf);
        buf.to_vec()
    }
}
