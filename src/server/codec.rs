// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! # Wire Codec
//!
//! Reads requests off a connection and serializes responses back. The head
//! is taken in a single receive of up to 2 KiB; whatever follows the blank
//! line in that buffer seeds the body, and the rest of the body (when a
//! `Content-Length` announces one) is drained in 1 KiB chunks.

use crate::{
    collections::headers::Headers,
    fail::Fail,
    http::{
        request::{Request, RequestBuilder},
        response::Response,
        Method,
    },
    io::Connection,
};

//==============================================================================
// Constants & Structures
//==============================================================================

/// Size of the buffer the request head is received into.
pub(crate) const HEAD_BUFFER_SIZE: usize = 2048;

/// Chunk size for draining a request body.
pub(crate) const BODY_CHUNK_SIZE: usize = 1024;

/// A parsed request head: everything up to the blank line, plus where the
/// body bytes start in the head buffer.
pub(crate) struct ParsedHead {
    pub method: Method,
    pub target: String,
    pub headers: Headers,
    pub body_start: usize,
}

//==============================================================================
// Parsing
//==============================================================================

/// Parses the request line and header lines out of a head buffer.
pub(crate) fn parse_head(buf: &[u8]) -> Result<ParsedHead, Fail> {
    let (head, body_start) = match buf.windows(4).position(|window| window == b"\r\n\r\n") {
        Some(position) => (&buf[..position], position + 4),
        None => (buf, buf.len()),
    };
    let head = std::str::from_utf8(head).map_err(|_| Fail::BadRequestLine {})?;

    let mut lines = head.split("\r\n");
    let request_line = lines.next().ok_or(Fail::BadRequestLine {})?;

    let mut tokens = request_line.split_whitespace();
    let method = tokens
        .next()
        .and_then(Method::parse)
        .ok_or(Fail::BadRequestLine {})?;
    let target = tokens.next().ok_or(Fail::BadRequestLine {})?;
    // the version token must be present, but its value is not interpreted
    tokens.next().ok_or(Fail::BadRequestLine {})?;

    let target = if target.starts_with('/') {
        target.to_string()
    } else {
        format!("/{}", target)
    };

    let mut headers = Headers::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        let (key, value) = match line.find(':') {
            Some(position) => (&line[..position], &line[position + 1..]),
            None => (line, ""),
        };
        headers.insert(key.trim(), value.trim());
    }

    Ok(ParsedHead {
        method,
        target,
        headers,
        body_start,
    })
}

/// Reads one request off the connection.
pub(crate) async fn read_request(conn: &Connection) -> Result<Request, Fail> {
    let mut head = vec![0u8; HEAD_BUFFER_SIZE];
    let nread = conn
        .recv(&mut head)
        .await
        .map_err(|errno| Fail::Io { errno })?;
    head.truncate(nread);

    let parsed = parse_head(&head)?;
    let mut body = head.split_off(parsed.body_start);

    let content_length = match parsed.headers.get("Content-Length") {
        Some(value) => Some(
            value
                .trim()
                .parse::<usize>()
                .map_err(|_| Fail::BadContentLength {})?,
        ),
        None => None,
    };

    // A payload method, a Content-Length, or a Content-Type all announce a
    // body; anything else has none.
    let expects_body = parsed.method.allows_body()
        || content_length.is_some()
        || parsed.headers.contains("Content-Type");

    if !expects_body {
        body.clear();
    } else if let Some(length) = content_length {
        let mut chunk = [0u8; BODY_CHUNK_SIZE];
        while body.len() < length {
            let nbytes = conn
                .recv(&mut chunk)
                .await
                .map_err(|errno| Fail::Io { errno })?;
            if nbytes == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..nbytes]);
        }
        body.truncate(length);
    }
    // without a content length, the remainder of the head buffer is the body

    Ok(RequestBuilder::new(parsed.method, parsed.target)
        .headers(parsed.headers)
        .body(body)
        .build())
}

//==============================================================================
// Serialization
//==============================================================================

/// Serializes a response: status line, headers in insertion order, blank
/// line, body. `Connection: Close` is always set and `Content-Length` is set
/// whenever a body is present, overriding any handler-supplied values.
pub(crate) fn serialize_response(mut response: Response) -> Vec<u8> {
    let body_len = response.body().map(|body| body.len());
    {
        let headers = response.headers_mut();
        headers.insert("Connection", "Close");
        if let Some(length) = body_len {
            headers.insert("Content-Length", length.to_string());
        }
    }

    let mut buf = Vec::with_capacity(HEAD_BUFFER_SIZE);
    buf.extend_from_slice(format!("HTTP/1.1 {}\r\n", response.status()).as_bytes());
    for (key, value) in response.headers().iter() {
        buf.extend_from_slice(key.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    // the blank line is required even when there is no body
    buf.extend_from_slice(b"\r\n");
    if let Some(body) = response.body() {
        buf.extend_from_slice(body);
    }
    buf
}

/// Serializes a response and writes it out, looping on partial sends.
pub(crate) async fn write_response(conn: &Connection, response: Response) -> Result<(), Fail> {
    let buf = serialize_response(response);
    conn.send_all(&buf)
        .await
        .map_err(|errno| Fail::Io { errno })
}

//==============================================================================
// Unit Tests
//==============================================================================

#[cfg(test)]
mod tests {
    use super::{parse_head, serialize_response};

    use crate::{
        fail::Fail,
        http::{content_type, response::Response, Method, StatusCode},
    };

    /// Tests parsing a complete head.
    #[test]
    fn parse_basic_head() {
        let head = b"POST /echo HTTP/1.1\r\nContent-Length: 5\r\nContent-Type: text/plain\r\n\r\nhello";
        let parsed = parse_head(head).unwrap();

        assert_eq!(parsed.method, Method::Post);
        assert_eq!(parsed.target, "/echo");
        assert_eq!(parsed.headers.get("content-length"), Some("5"));
        assert_eq!(parsed.headers.get("CONTENT-TYPE"), Some("text/plain"));
        assert_eq!(&head[parsed.body_start..], b"hello");
    }

    /// Tests that header values are trimmed and repeated keys are
    /// last-writer-wins.
    #[test]
    fn parse_header_lines() {
        let head = b"GET / HTTP/1.1\r\nX-Tag:   spaced out   \r\nx-tag: second\r\n\r\n";
        let parsed = parse_head(head).unwrap();

        assert_eq!(parsed.headers.len(), 1);
        assert_eq!(parsed.headers.get("X-Tag"), Some("second"));
    }

    /// Tests that a target without a leading slash gets one.
    #[test]
    fn parse_target_without_slash() {
        let parsed = parse_head(b"GET hello HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(parsed.target, "/hello");
    }

    /// Tests request-line rejection: unknown method, missing tokens, empty
    /// input.
    #[test]
    fn parse_rejects_bad_request_line() {
        for head in &[
            &b"BREW / HTTP/1.1\r\n\r\n"[..],
            &b"GET /\r\n\r\n"[..],
            &b"GET\r\n\r\n"[..],
            &b""[..],
        ] {
            let result = parse_head(head);
            assert!(
                matches!(result, Err(Fail::BadRequestLine {})),
                "expected BadRequestLine for {:?}",
                String::from_utf8_lossy(head)
            );
        }
    }

    /// Tests that a request line built from a method's wire form parses back
    /// to the same method and target.
    #[test]
    fn request_line_round_trip() {
        let methods = [Method::Get, Method::Post, Method::Delete, Method::Options];
        for method in &methods {
            let head = format!("{} /some/target HTTP/1.1\r\n\r\n", method);
            let parsed = parse_head(head.as_bytes()).unwrap();
            assert_eq!(parsed.method, *method);
            assert_eq!(parsed.target, "/some/target");
        }
    }

    /// Tests serialization of a response with a body: status line, header
    /// order, forced `Connection` and `Content-Length`.
    #[test]
    fn serialize_with_body() {
        let response = Response::builder(StatusCode::Ok)
            .content_type(content_type::PLAINTEXT)
            .body("Hello world!")
            .build();
        let buf = serialize_response(response);
        let text = String::from_utf8(buf).unwrap();

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Type: text/plain\r\n"));
        assert!(text.contains("Connection: Close\r\n"));
        assert!(text.contains("Content-Length: 12\r\n"));
        assert!(text.ends_with("\r\n\r\nHello world!"));
    }

    /// Tests serialization of a bodyless response: no `Content-Length`, one
    /// `Connection: Close` even if the handler supplied its own.
    #[test]
    fn serialize_without_body() {
        let response = Response::builder(StatusCode::NotFound)
            .header("connection", "keep-alive")
            .build();
        let buf = serialize_response(response);
        let text = String::from_utf8(buf).unwrap();

        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(!text.contains("Content-Length"));
        assert_eq!(text.matches("Connection: Close").count(), 1);
        assert!(!text.contains("keep-alive"));
        assert!(text.ends_with("\r\n\r\n"));
    }
}
