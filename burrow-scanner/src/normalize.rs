use crate::error::{Result, ScanError};
use url::{Position, Url};

/// Schemes that look like `name:digits` but must never be read as host:port.
const OPAQUE_SCHEMES: &[&str] = &["mailto", "tel", "javascript", "data", "about", "blob"];

/// Resolve a discovered link against the page it was found on and reduce it
/// to its canonical form.
///
/// The result is always an absolute http(s) URL with a cleaned path, no
/// query and no fragment. A trailing slash survives cleaning. Applying the
/// function to its own output returns the same string.
pub fn normalize_url(candidate: &str, reference: &Url) -> Result<String> {
    let raw = candidate.trim();
    if raw.is_empty() {
        return Err(ScanError::InvalidUrl("empty URL".to_string()));
    }

    // "://host/path" has lost its scheme; treat it as scheme-relative.
    let raw = match raw.strip_prefix("://") {
        Some(rest) => format!("//{}", rest),
        None => raw.to_string(),
    };

    let mut resolved = match Url::parse(&raw) {
        Ok(url) if is_web_scheme(url.scheme()) => url,
        Ok(url) if url.has_host() => {
            // Foreign scheme with an authority: keep the authority and path,
            // inherit the scheme of the page it was found on.
            reference.join(&format!("//{}", &url[Position::BeforeUsername..]))?
        }
        Ok(url) if looks_like_host_port(&raw, url.scheme()) => {
            reference.join(&format!("//{}", raw))?
        }
        Ok(url) => return Err(ScanError::UnsupportedScheme(url.scheme().to_string())),
        Err(url::ParseError::RelativeUrlWithoutBase) => reference.join(&raw)?,
        Err(e) => return Err(ScanError::InvalidUrl(format!("{}: {}", raw, e))),
    };

    if !is_web_scheme(resolved.scheme()) {
        return Err(ScanError::UnsupportedScheme(resolved.scheme().to_string()));
    }
    if resolved.host_str().is_none_or(str::is_empty) {
        return Err(ScanError::InvalidUrl(format!("{}: missing host", raw)));
    }

    let cleaned = clean_path(resolved.path());
    resolved.set_path(&cleaned);
    resolved.set_query(None);
    resolved.set_fragment(None);

    Ok(resolved.to_string())
}

/// Lexically clean a URL path: collapse repeated slashes and resolve `.` and
/// `..` segments. The result is rooted, and a trailing slash on the input is
/// kept on the output.
pub fn clean_path(path: &str) -> String {
    let trailing = path.ends_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut out = String::with_capacity(path.len() + 1);
    out.push('/');
    out.push_str(&segments.join("/"));
    if trailing && !out.ends_with('/') {
        out.push('/');
    }
    out
}

/// Registry key for a URL's host: `host` or `host:port` when a non-default
/// port is present.
pub fn host_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

fn is_web_scheme(scheme: &str) -> bool {
    scheme == "http" || scheme == "https"
}

// "localhost:2001/path" parses as scheme "localhost" with an opaque path.
fn looks_like_host_port(raw: &str, scheme: &str) -> bool {
    if OPAQUE_SCHEMES.contains(&scheme.to_ascii_lowercase().as_str()) {
        return false;
    }
    let Some((_, rest)) = raw.split_once(':') else {
        return false;
    };
    let port: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if port.is_empty() {
        return false;
    }
    matches!(rest[port.len()..].chars().next(), None | Some('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> Url {
        Url::parse("http://localhost/").unwrap()
    }

    #[test]
    fn test_normalize_known_forms() {
        let r = reference();
        let cases = [
            ("http://localhost/spider", "http://localhost/spider"),
            ("/spider", "http://localhost/spider"),
            ("spider", "http://localhost/spider"),
            ("http://localhost///////////spider", "http://localhost/spider"),
            ("://localhost/spider", "http://localhost/spider"),
            ("//localhost/spider", "http://localhost/spider"),
            ("xx://localhost/spider", "http://localhost/spider"),
            ("localhost:2001/spideronly", "http://localhost:2001/spideronly"),
            ("/a/./b/../c/", "http://localhost/a/c/"),
            ("/page?x=1#frag", "http://localhost/page"),
        ];
        for (input, expected) in cases {
            assert_eq!(normalize_url(input, &r).unwrap(), expected, "input: {}", input);
        }
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let r = reference();
        for input in ["/a//b/", "http://localhost:8080/x/../y", "https://h/q?z#f", "dir/"] {
            let once = normalize_url(input, &r).unwrap();
            let twice = normalize_url(&once, &r).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_relative_to_nested_reference() {
        let r = Url::parse("https://example.com/a/b/page").unwrap();
        assert_eq!(normalize_url("c", &r).unwrap(), "https://example.com/a/b/c");
        assert_eq!(normalize_url("../up/", &r).unwrap(), "https://example.com/a/up/");
    }

    #[test]
    fn test_non_web_schemes_rejected() {
        let r = reference();
        assert!(matches!(
            normalize_url("mailto:someone@example.com", &r),
            Err(ScanError::UnsupportedScheme(_))
        ));
        assert!(normalize_url("javascript:void(0)", &r).is_err());
        assert!(normalize_url("tel:5551234", &r).is_err());
        assert!(normalize_url("   ", &r).is_err());
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path(""), "/");
        assert_eq!(clean_path("/"), "/");
        assert_eq!(clean_path("//a///b"), "/a/b");
        assert_eq!(clean_path("/a/b/.."), "/a");
        assert_eq!(clean_path("/a/b/../"), "/a/");
        assert_eq!(clean_path("/../../x"), "/x");
    }

    #[test]
    fn test_host_key() {
        let with_port = Url::parse("http://localhost:2001/x").unwrap();
        let default_port = Url::parse("https://example.com:443/").unwrap();
        assert_eq!(host_key(&with_port), "localhost:2001");
        assert_eq!(host_key(&default_port), "example.com");
    }
}
