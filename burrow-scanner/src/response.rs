use reqwest::header::{HeaderMap, LOCATION};
use std::borrow::Cow;
use std::time::Duration;
use url::Url;

/// A fully-read HTTP response.
///
/// The body is buffered eagerly so that it can be compared against a host's
/// soft-404 baseline and handed to link extraction without re-reading the
/// network stream.
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub method: String,
    pub url: Url,
    pub status_code: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub response_time: Duration,
}

impl ProbeResponse {
    /// Length of the buffered body. Chunked responses report no
    /// `Content-Length`, so this is always derived from what was read.
    pub fn content_length(&self) -> usize {
        self.body.len()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status_code)
    }

    /// Status line in the `200 OK` form.
    pub fn status_line(&self) -> String {
        match reqwest::StatusCode::from_u16(self.status_code)
            .ok()
            .and_then(|s| s.canonical_reason())
        {
            Some(reason) => format!("{} {}", self.status_code, reason),
            None => self.status_code.to_string(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn response_with_body(status_code: u16, body: &str) -> ProbeResponse {
        ProbeResponse {
            method: "GET".to_string(),
            url: Url::parse("http://example.com/").unwrap(),
            status_code,
            headers: HeaderMap::new(),
            body: body.as_bytes().to_vec(),
            response_time: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_status_line() {
        assert_eq!(response_with_body(200, "").status_line(), "200 OK");
        assert_eq!(response_with_body(404, "").status_line(), "404 Not Found");
        assert_eq!(response_with_body(666, "").status_line(), "666");
    }

    #[test]
    fn test_content_length_uses_body() {
        let r = response_with_body(200, "hello");
        assert_eq!(r.content_length(), 5);
        assert!(!r.is_redirect());
    }
}
