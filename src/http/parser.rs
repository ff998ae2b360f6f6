use url::Url;

/// Upper bound on headers in a request head; more is a parse error.
const MAX_HEADERS: usize = 32;

/// Base used to resolve origin-form request targets.
const BASE_URL: &str = "http://localhost/";

#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    /// Terminator not seen yet
    Incomplete,
    InvalidRequest,
    TooManyHeaders,
    /// Request target is not a usable origin-form path
    InvalidPath,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Incomplete => write!(f, "incomplete request head"),
            ParseError::InvalidRequest => write!(f, "malformed request line or header"),
            ParseError::TooManyHeaders => write!(f, "more than {} headers", MAX_HEADERS),
            ParseError::InvalidPath => write!(f, "invalid request path"),
        }
    }
}

impl std::error::Error for ParseError {}

/// The parts of the request line the server looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    /// Decoded path with query and fragment removed
    pub path: String,
    /// Minor HTTP version (`1` for HTTP/1.1)
    pub version: u8,
}

/// Parses a request head and returns it together with the number of bytes it
/// occupies in `buf`.
///
/// Only the request target is interpreted: dot segments are resolved, the
/// query and fragment dropped and percent escapes decoded.
pub fn parse_request_head(buf: &[u8]) -> Result<(RequestHead, usize), ParseError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut request = httparse::Request::new(&mut headers);

    let consumed = match request.parse(buf) {
        Ok(httparse::Status::Complete(n)) => n,
        Ok(httparse::Status::Partial) => return Err(ParseError::Incomplete),
        Err(httparse::Error::TooManyHeaders) => return Err(ParseError::TooManyHeaders),
        Err(_) => return Err(ParseError::InvalidRequest),
    };

    let method = request.method.ok_or(ParseError::InvalidRequest)?;
    let target = request.path.ok_or(ParseError::InvalidRequest)?;
    let version = request.version.ok_or(ParseError::InvalidRequest)?;

    let head = RequestHead {
        method: method.to_string(),
        path: decode_path(target)?,
        version,
    };

    Ok((head, consumed))
}

/// Decodes an origin-form request target into a filesystem-style path.
pub fn decode_path(target: &str) -> Result<String, ParseError> {
    // "//host/x" would be taken as a network-path reference by join()
    if !target.starts_with('/') || target.starts_with("//") {
        return Err(ParseError::InvalidPath);
    }

    let url = Url::parse(BASE_URL)
        .and_then(|base| base.join(target))
        .map_err(|_| ParseError::InvalidPath)?;

    let decoded = urlencoding::decode(url.path()).map_err(|_| ParseError::InvalidPath)?;
    if decoded.contains('\0') {
        return Err(ParseError::InvalidPath);
    }

    Ok(decoded.into_owned())
}

/// Offset of the `\r\n\r\n` terminating the request head, if present.
pub fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}
