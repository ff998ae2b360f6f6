use bytes::BytesMut;
use tideway::http::response::{ResponseHeader, StatusCode};

#[test]
fn test_status_code_as_u16() {
    assert_eq!(StatusCode::Ok.as_u16(), 200);
    assert_eq!(StatusCode::NotFound.as_u16(), 404);
}

#[test]
fn test_status_code_reason_phrase() {
    assert_eq!(StatusCode::Ok.reason_phrase(), "OK");
    assert_eq!(StatusCode::NotFound.reason_phrase(), "Not Found");
}

#[test]
fn test_ok_header_bytes() {
    let header = ResponseHeader::ok(1024);

    assert_eq!(header.status, StatusCode::Ok);
    assert_eq!(header.content_length, 1024);
    assert_eq!(
        header.to_bytes(),
        b"HTTP/1.1 200 OK\r\nContent-Length: 1024\r\nConnection: close\r\n\r\n"
    );
}

#[test]
fn test_not_found_header_bytes() {
    assert_eq!(
        ResponseHeader::not_found(13).to_bytes(),
        b"HTTP/1.1 404 Not Found\r\nContent-Length: 13\r\nConnection: close\r\n\r\n"
    );
}

#[test]
fn test_large_content_length_is_decimal() {
    let bytes = ResponseHeader::ok(5_000_000_000).to_bytes();
    let text = String::from_utf8(bytes).unwrap();

    assert!(text.contains("Content-Length: 5000000000\r\n"));
}

#[test]
fn test_write_to_appends() {
    let mut buf = BytesMut::from(&b"prefix"[..]);
    ResponseHeader::ok(0).write_to(&mut buf);

    assert!(buf.starts_with(b"prefixHTTP/1.1 200 OK\r\n"));
    assert!(buf.ends_with(b"\r\n\r\n"));
}
