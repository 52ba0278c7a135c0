//! Line-protocol request parsing (spec §4.5, §6).
//!
//! A request is one line, `<url>\r\n`. No `percent-encoding` crate sits in
//! this workspace's dependency graph, so percent-decoding is hand-rolled
//! here the same way `tootik-core::engine::mentions` hand-rolls its
//! hashtag/mention scanner: plain character iteration, no external parser.

use tootik_common::{AppError, AppResult};

/// Which scheme a request line used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Gemini,
    Titan,
}

/// The Titan upload parameters carried as `;key=value` segments appended to
/// the path (spec §6 "same listener, `titan://` scheme ... `;mime=<t>;size=<n>`").
#[derive(Debug, Clone)]
pub struct TitanParams {
    pub mime: String,
    pub size: u64,
}

/// A fully-parsed request line.
#[derive(Debug, Clone)]
pub struct Request {
    pub scheme: Scheme,
    /// Raw (not percent-decoded) path, always starting with `/`. Decoding
    /// happens per-segment in [`Request::segments`] so a `%2F` inside one
    /// segment (an id embedded in the path, e.g. an actor or object URL)
    /// can never be mistaken for a path separator.
    pub path: String,
    /// Decoded query string, if any (the part after `?`).
    pub query: Option<String>,
    pub titan: Option<TitanParams>,
}

impl Request {
    /// Path segments, each percent-decoded individually, with empty
    /// segments (leading/trailing/doubled slashes) dropped.
    ///
    /// # Errors
    /// Returns [`AppError::BadInput`] if any segment contains a malformed
    /// percent-escape.
    pub fn segments(&self) -> AppResult<Vec<String>> {
        self.path.split('/').filter(|s| !s.is_empty()).map(percent_decode).collect()
    }
}

/// Parse one request line, already stripped of its trailing `\r\n`.
///
/// # Errors
/// Returns [`AppError::BadInput`] for an empty line, an unrecognized
/// scheme, or a malformed percent-escape anywhere in the path, params or
/// query.
pub fn parse_request_line(line: &str) -> AppResult<Request> {
    if line.is_empty() {
        return Err(AppError::BadInput("empty request line".to_string()));
    }
    if line.len() > 1024 {
        return Err(AppError::BadInput("request line too long".to_string()));
    }

    let (scheme, rest) = if let Some(rest) = line.strip_prefix("gemini://") {
        (Scheme::Gemini, rest)
    } else if let Some(rest) = line.strip_prefix("titan://") {
        (Scheme::Titan, rest)
    } else if line.starts_with('/') {
        (Scheme::Gemini, line)
    } else {
        return Err(AppError::BadInput("unrecognized scheme".to_string()));
    };

    // Drop a `host[:port]` authority when the line carried a full URL.
    let path_and_rest = match rest.find('/') {
        Some(idx) if !line.starts_with('/') => &rest[idx..],
        _ => rest,
    };

    let (before_query, query) = match path_and_rest.split_once('?') {
        Some((p, q)) => (p, Some(percent_decode(q)?)),
        None => (path_and_rest, None),
    };

    let (raw_path, titan) = split_titan_params(before_query)?;
    let path = if raw_path.starts_with('/') { raw_path.to_string() } else { format!("/{raw_path}") };

    if scheme == Scheme::Titan && titan.is_none() {
        return Err(AppError::BadInput("titan request missing ;mime=/;size= params".to_string()));
    }

    Ok(Request { scheme, path, query, titan })
}

/// Split `;mime=<t>;size=<n>` parameters off the tail of a path, decoding
/// each value.
fn split_titan_params(path: &str) -> AppResult<(&str, Option<TitanParams>)> {
    let Some(semi) = path.find(';') else {
        return Ok((path, None));
    };
    let (base, params_str) = path.split_at(semi);
    let mut mime = None;
    let mut size = None;
    for part in params_str.trim_start_matches(';').split(';') {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| AppError::BadInput(format!("malformed parameter: {part}")))?;
        match key {
            "mime" => mime = Some(percent_decode(value)?),
            "size" => {
                let decoded = percent_decode(value)?;
                size = Some(decoded.parse::<u64>().map_err(|_| AppError::BadInput("non-numeric size".to_string()))?);
            }
            _ => {}
        }
    }
    match (mime, size) {
        (Some(mime), Some(size)) => Ok((base, Some(TitanParams { mime, size }))),
        _ => Ok((base, None)),
    }
}

/// Decode `%XX` escapes in `s`. `+` is left as a literal plus: this is a
/// URL path/query, not an `application/x-www-form-urlencoded` body.
///
/// # Errors
/// Returns [`AppError::BadInput`] for a trailing/malformed `%` escape or a
/// decoded byte sequence that isn't valid UTF-8.
pub fn percent_decode(s: &str) -> AppResult<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .ok_or_else(|| AppError::BadInput("truncated percent-escape".to_string()))?;
            let hex_str = std::str::from_utf8(hex).map_err(|_| AppError::BadInput("malformed percent-escape".to_string()))?;
            let byte = u8::from_str_radix(hex_str, 16).map_err(|_| AppError::BadInput("malformed percent-escape".to_string()))?;
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| AppError::BadInput("escape sequence decodes to invalid UTF-8".to_string()))
}

/// Parse a non-negative integer offset from an optional query string,
/// treating an absent query as offset zero (spec §4.5 feed pagination).
///
/// # Errors
/// Returns [`AppError::BadInput`] for a non-numeric query, and a caller is
/// expected to separately reject an in-range-but-too-large value against
/// `max_offset`.
pub fn parse_offset(query: Option<&str>) -> AppResult<u64> {
    match query {
        None | Some("") => Ok(0),
        Some(q) => q.parse::<u64>().map_err(|_| AppError::BadInput("Invalid query".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_path() {
        let req = parse_request_line("/users/say?hello%20world").unwrap();
        assert_eq!(req.path, "/users/say");
        assert_eq!(req.query.as_deref(), Some("hello world"));
    }

    #[test]
    fn parses_full_gemini_url() {
        let req = parse_request_line("gemini://example.com/users/view/abc").unwrap();
        assert_eq!(req.path, "/users/view/abc");
        assert_eq!(req.scheme, Scheme::Gemini);
    }

    #[test]
    fn rejects_malformed_escape() {
        assert!(parse_request_line("/users/fts?bad%2").is_err());
    }

    #[test]
    fn parses_titan_params() {
        let req = parse_request_line("titan://example.com/users/upload/avatar;mime=image/png;size=12").unwrap();
        assert_eq!(req.path, "/users/upload/avatar");
        let titan = req.titan.unwrap();
        assert_eq!(titan.mime, "image/png");
        assert_eq!(titan.size, 12);
    }

    #[test]
    fn rejects_empty_line() {
        assert!(parse_request_line("").is_err());
    }

    #[test]
    fn segment_containing_encoded_slash_stays_one_segment() {
        let req = parse_request_line("/users/view/https%3A%2F%2Fexample.com%2Fobject%2Fabc").unwrap();
        let segments = req.segments().unwrap();
        assert_eq!(segments, vec!["users", "view", "https://example.com/object/abc"]);
    }
}
