//! Minimal `multipart/form-data` codec
//!
//! Parses request bodies into parts and encodes the single-file bodies the
//! client sends. Only what form uploads use is supported: no nested
//! multipart, no transfer encodings.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Longest boundary allowed by RFC 2046
const MAX_BOUNDARY_LEN: usize = 70;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MultipartError {
    #[error("content type is not multipart/form-data")]
    NotMultipart,

    #[error("missing or invalid multipart boundary")]
    MissingBoundary,

    #[error("multipart body has no opening delimiter")]
    MissingDelimiter,

    #[error("multipart body has no closing delimiter")]
    MissingTerminator,

    #[error("invalid part: {0}")]
    InvalidPart(String),
}

/// One decoded form field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl Part {
    /// A part is a file upload when it carries a filename
    pub fn is_file(&self) -> bool {
        self.filename.is_some()
    }
}

/// Extract the boundary from a `multipart/form-data` content type
pub fn boundary_from_content_type(content_type: &str) -> Result<String, MultipartError> {
    let (media_type, params) = match content_type.split_once(';') {
        Some((media_type, params)) => (media_type, params),
        None => (content_type, ""),
    };

    if !media_type.trim().eq_ignore_ascii_case("multipart/form-data") {
        return Err(MultipartError::NotMultipart);
    }

    let boundary = parse_params(params)
        .into_iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value)
        .ok_or(MultipartError::MissingBoundary)?;

    if boundary.is_empty() || boundary.len() > MAX_BOUNDARY_LEN {
        return Err(MultipartError::MissingBoundary);
    }
    Ok(boundary)
}

/// Split a multipart body into its parts
pub fn parse(body: &[u8], boundary: &str) -> Result<Vec<Part>, MultipartError> {
    let delimiter = format!("--{}", boundary).into_bytes();
    let mut separator = b"\r\n".to_vec();
    separator.extend_from_slice(&delimiter);

    // The first delimiter may open the body or follow a preamble line
    let mut pos = if body.starts_with(&delimiter) {
        delimiter.len()
    } else {
        find(body, &separator, 0).ok_or(MultipartError::MissingDelimiter)? + separator.len()
    };

    let mut parts = Vec::new();

    loop {
        if body[pos..].starts_with(b"--") {
            return Ok(parts);
        }
        pos = skip_line_end(body, pos)?;

        let end = find(body, &separator, pos).ok_or(MultipartError::MissingTerminator)?;
        parts.push(parse_part(&body[pos..end])?);
        pos = end + separator.len();
    }
}

/// Encode a body holding one file field. Returns the request content type
/// and the body bytes.
pub fn encode_file(field: &str, filename: &str, content_type: &str, data: &[u8]) -> (String, Vec<u8>) {
    let boundary = unique_boundary(data);

    let mut body = Vec::with_capacity(data.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            escape_quoted(field),
            escape_quoted(filename)
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    (format!("multipart/form-data; boundary={}", boundary), body)
}

fn unique_boundary(data: &[u8]) -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);

    loop {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let boundary = format!("----CognisightBoundary{:016x}{:04x}", nanos, n & 0xffff);
        if find(data, boundary.as_bytes(), 0).is_none() {
            return boundary;
        }
    }
}

fn skip_line_end(body: &[u8], mut pos: usize) -> Result<usize, MultipartError> {
    // Transport padding after a delimiter is allowed
    while matches!(body.get(pos), Some(b' ') | Some(b'\t')) {
        pos += 1;
    }
    if body[pos..].starts_with(b"\r\n") {
        Ok(pos + 2)
    } else {
        Err(MultipartError::InvalidPart("delimiter not followed by CRLF".into()))
    }
}

fn parse_part(raw: &[u8]) -> Result<Part, MultipartError> {
    let (head, data) = if raw.starts_with(b"\r\n") {
        (&raw[..0], &raw[2..])
    } else {
        let split = find(raw, b"\r\n\r\n", 0)
            .ok_or_else(|| MultipartError::InvalidPart("unterminated headers".into()))?;
        (&raw[..split], &raw[split + 4..])
    };

    let head = String::from_utf8_lossy(head);
    let mut disposition = None;
    let mut content_type = None;

    for line in head.split("\r\n").filter(|l| !l.is_empty()) {
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| MultipartError::InvalidPart(format!("bad header line: {}", line)))?;
        let key = key.trim();
        if key.eq_ignore_ascii_case("content-disposition") {
            disposition = Some(value.trim().to_string());
        } else if key.eq_ignore_ascii_case("content-type") {
            content_type = Some(value.trim().to_string());
        }
    }

    let disposition = disposition
        .ok_or_else(|| MultipartError::InvalidPart("missing Content-Disposition".into()))?;
    let (kind, params) = disposition
        .split_once(';')
        .unwrap_or((disposition.as_str(), ""));
    if !kind.trim().eq_ignore_ascii_case("form-data") {
        return Err(MultipartError::InvalidPart(format!("unsupported disposition: {}", kind)));
    }

    let params = parse_params(params);
    let param = |key: &str| {
        params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.clone())
    };

    let name = param("name").ok_or_else(|| MultipartError::InvalidPart("missing name".into()))?;
    let filename = param("filename*")
        .and_then(|v| decode_ext_value(&v))
        .or_else(|| param("filename"));

    Ok(Part {
        name,
        filename,
        content_type,
        data: data.to_vec(),
    })
}

/// Parse `; key=value; key="quoted value"` parameter lists
fn parse_params(input: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if *c == ';' || c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c == ';' {
                break;
            }
            key.push(c);
            chars.next();
        }

        let mut value = String::new();
        if chars.peek() == Some(&'=') {
            chars.next();
            if chars.peek() == Some(&'"') {
                chars.next();
                while let Some(c) = chars.next() {
                    match c {
                        '"' => break,
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                value.push(escaped);
                            }
                        }
                        _ => value.push(c),
                    }
                }
            } else {
                while let Some(&c) = chars.peek() {
                    if c == ';' {
                        break;
                    }
                    value.push(c);
                    chars.next();
                }
                value = value.trim().to_string();
            }
        }

        let key = key.trim();
        if !key.is_empty() {
            params.push((key.to_string(), value));
        }
    }

    params
}

/// Decode an RFC 5987 `charset'lang'percent-encoded` value. Only UTF-8 is
/// accepted.
fn decode_ext_value(value: &str) -> Option<String> {
    let mut pieces = value.splitn(3, '\'');
    let charset = pieces.next()?;
    let _language = pieces.next()?;
    let encoded = pieces.next()?;

    if !charset.eq_ignore_ascii_case("utf-8") {
        return None;
    }
    urlencoding::decode(encoded).ok().map(|s| s.into_owned())
}

fn escape_quoted(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace(['\r', '\n'], " ")
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn browser_body(boundary: &str) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"note\"\r\n\r\n");
        body.extend_from_slice(b"hello\r\n");
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"audio\"; filename=\"sample.webm\"\r\n",
        );
        body.extend_from_slice(b"Content-Type: audio/webm\r\n\r\n");
        body.extend_from_slice(&[0, 1, 2, b'\r', b'\n', 3]);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
        body
    }

    #[test]
    fn test_boundary_from_content_type() {
        assert_eq!(
            boundary_from_content_type("multipart/form-data; boundary=abc123").unwrap(),
            "abc123"
        );
        assert_eq!(
            boundary_from_content_type("Multipart/Form-Data; charset=utf-8; boundary=\"a b;c\"")
                .unwrap(),
            "a b;c"
        );
        assert_eq!(
            boundary_from_content_type("application/json"),
            Err(MultipartError::NotMultipart)
        );
        assert_eq!(
            boundary_from_content_type("multipart/form-data"),
            Err(MultipartError::MissingBoundary)
        );
        assert_eq!(
            boundary_from_content_type("multipart/form-data; boundary="),
            Err(MultipartError::MissingBoundary)
        );
    }

    #[test]
    fn test_parse_fields_and_files() {
        let parts = parse(&browser_body("XyZ"), "XyZ").unwrap();
        assert_eq!(parts.len(), 2);

        assert_eq!(parts[0].name, "note");
        assert!(!parts[0].is_file());
        assert_eq!(parts[0].data, b"hello");

        assert_eq!(parts[1].name, "audio");
        assert_eq!(parts[1].filename.as_deref(), Some("sample.webm"));
        assert_eq!(parts[1].content_type.as_deref(), Some("audio/webm"));
        // CRLF inside the payload is kept
        assert_eq!(parts[1].data, vec![0, 1, 2, b'\r', b'\n', 3]);
    }

    #[test]
    fn test_parse_with_preamble() {
        let mut body = b"ignored preamble".to_vec();
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(&browser_body("b"));
        let parts = parse(&body, "b").unwrap();
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn test_parse_empty_form() {
        assert_eq!(parse(b"--b--\r\n", "b").unwrap(), vec![]);
    }

    #[test]
    fn test_parse_rejects_truncated_body() {
        let body = browser_body("b");
        let truncated = &body[..body.len() - 12];
        assert_eq!(parse(truncated, "b"), Err(MultipartError::MissingTerminator));
        assert_eq!(parse(b"no delimiter here", "b"), Err(MultipartError::MissingDelimiter));
    }

    #[test]
    fn test_parse_rejects_part_without_name() {
        let body = b"--b\r\nContent-Disposition: form-data\r\n\r\nx\r\n--b--";
        assert!(matches!(parse(body, "b"), Err(MultipartError::InvalidPart(_))));
    }

    #[test]
    fn test_extended_filename() {
        let body = "--b\r\nContent-Disposition: form-data; name=\"audio\"; \
                    filename=\"fallback.wav\"; filename*=UTF-8''d%C3%A9mo%20healthy.wav\r\n\r\n\
                    x\r\n--b--";
        let parts = parse(body.as_bytes(), "b").unwrap();
        assert_eq!(parts[0].filename.as_deref(), Some("démo healthy.wav"));
    }

    #[test]
    fn test_empty_filename_is_still_a_file() {
        let body = b"--b\r\nContent-Disposition: form-data; name=\"audio\"; filename=\"\"\r\n\r\n\r\n--b--";
        let parts = parse(body, "b").unwrap();
        assert!(parts[0].is_file());
        assert!(parts[0].data.is_empty());
    }

    #[test]
    fn test_encode_then_parse() {
        let data = vec![7u8; 300];
        let (content_type, body) = encode_file("audio", "my \"clip\".wav", "audio/wav", &data);

        let boundary = boundary_from_content_type(&content_type).unwrap();
        let parts = parse(&body, &boundary).unwrap();

        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].name, "audio");
        assert_eq!(parts[0].filename.as_deref(), Some("my \"clip\".wav"));
        assert_eq!(parts[0].content_type.as_deref(), Some("audio/wav"));
        assert_eq!(parts[0].data, data);
    }

    #[test]
    fn test_boundary_avoids_payload() {
        let (content_type, _) = encode_file("audio", "a.wav", "audio/wav", b"");
        let boundary = boundary_from_content_type(&content_type).unwrap();
        let payload = format!("xx{}xx", boundary).into_bytes();

        let (content_type, body) = encode_file("audio", "a.wav", "audio/wav", &payload);
        let fresh = boundary_from_content_type(&content_type).unwrap();
        assert!(!payload
            .windows(fresh.len())
            .any(|w| w == fresh.as_bytes()));
        assert_eq!(parse(&body, &fresh).unwrap()[0].data, payload);
    }
}
