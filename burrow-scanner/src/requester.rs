use crate::error::{Result, ScanError};
use crate::response::ProbeResponse;
use reqwest::header::{AUTHORIZATION, COOKIE, HOST, HeaderName, HeaderValue};
use reqwest::{Client, Method, Proxy};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

/// Transport-level settings shared by every request a client sends.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub proxy: Option<String>,
    pub follow_redirects: bool,
    pub ignore_tls_errors: bool,
    pub max_idle_per_host: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            proxy: None,
            follow_redirects: false,
            ignore_tls_errors: false,
            max_idle_per_host: 50,
        }
    }
}

/// Build an HTTP client. Proxy addresses without an `http` prefix are
/// treated as SOCKS5 endpoints.
pub fn build_client(options: &ClientOptions) -> Result<Client> {
    let redirect = if options.follow_redirects {
        reqwest::redirect::Policy::limited(10)
    } else {
        reqwest::redirect::Policy::none()
    };

    let mut builder = Client::builder()
        .timeout(options.timeout)
        .connect_timeout(options.timeout)
        .pool_max_idle_per_host(options.max_idle_per_host)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .danger_accept_invalid_certs(options.ignore_tls_errors)
        .redirect(redirect);

    if let Some(addr) = options.proxy.as_deref().filter(|p| !p.is_empty()) {
        let proxy = if addr.starts_with("http") {
            Proxy::all(addr)?
        } else {
            Proxy::all(format!("socks5://{}", addr))?
        };
        builder = builder.proxy(proxy);
    }

    Ok(builder.build()?)
}

/// Sends probes with the per-request decorations configured for a run.
#[derive(Clone)]
pub struct Requester {
    client: Client,
    user_agent: Option<String>,
    cookies: Option<String>,
    auth: Option<String>,
    vhost: Option<String>,
    body: Option<String>,
    headers: Vec<(HeaderName, HeaderValue)>,
    blacklist: HashSet<String>,
}

impl Requester {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            user_agent: None,
            cookies: None,
            auth: None,
            vhost: None,
            body: None,
            headers: Vec::new(),
            blacklist: HashSet::new(),
        }
    }

    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into()).filter(|s: &String| !s.is_empty());
        self
    }

    pub fn with_cookies(mut self, cookies: impl Into<String>) -> Self {
        self.cookies = Some(cookies.into()).filter(|s: &String| !s.is_empty());
        self
    }

    /// Base64 credentials, sent as `Authorization: Basic <auth>`.
    pub fn with_basic_auth(mut self, auth: impl Into<String>) -> Self {
        self.auth = Some(auth.into()).filter(|s: &String| !s.is_empty());
        self
    }

    pub fn with_vhost(mut self, vhost: impl Into<String>) -> Self {
        self.vhost = Some(vhost.into()).filter(|s: &String| !s.is_empty());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into()).filter(|s: &String| !s.is_empty());
        self
    }

    /// Extra headers in `Name: value` form. Entries without a colon or with
    /// an invalid name or value are rejected.
    pub fn with_headers<S: AsRef<str>>(mut self, headers: &[S]) -> Result<Self> {
        for raw in headers {
            let raw = raw.as_ref();
            let (name, value) = raw
                .split_once(':')
                .ok_or_else(|| ScanError::Other(format!("malformed header: {}", raw)))?;
            let name = HeaderName::from_bytes(name.trim().as_bytes())
                .map_err(|e| ScanError::Other(format!("bad header name {:?}: {}", name, e)))?;
            let value = HeaderValue::from_str(value.trim())
                .map_err(|e| ScanError::Other(format!("bad header value {:?}: {}", value, e)))?;
            self.headers.push((name, value));
        }
        Ok(self)
    }

    /// These exact URLs are never requested.
    pub fn with_blacklist<I>(mut self, blacklist: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.blacklist = blacklist
            .into_iter()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .collect();
        self
    }

    pub fn is_blacklisted(&self, url: &str) -> bool {
        self.blacklist.contains(url)
    }

    /// Send a single request and buffer the full response.
    pub async fn send(&self, method: &str, url: &str) -> Result<ProbeResponse> {
        if self.is_blacklisted(url) {
            return Err(ScanError::Blacklisted(url.to_string()));
        }

        let parsed = Url::parse(url)?;
        let method_value = Method::from_bytes(method.as_bytes())
            .map_err(|_| ScanError::InvalidMethod(method.to_string()))?;

        let mut request = self.client.request(method_value, parsed);
        if let Some(agent) = &self.user_agent {
            request = request.header(reqwest::header::USER_AGENT, agent);
        }
        if let Some(cookies) = &self.cookies {
            request = request.header(COOKIE, cookies);
        }
        if let Some(auth) = &self.auth {
            request = request.header(AUTHORIZATION, format!("Basic {}", auth));
        }
        for (name, value) in &self.headers {
            request = request.header(name.clone(), value.clone());
        }
        if let Some(vhost) = &self.vhost {
            request = request.header(HOST, vhost);
        }
        if let Some(body) = &self.body {
            request = request.body(body.clone());
        }

        let start = Instant::now();
        let response = request.send().await?;
        let status_code = response.status().as_u16();
        let final_url = response.url().clone();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        let response_time = start.elapsed();

        debug!("{} {} -> {} ({} bytes)", method, url, status_code, body.len());

        Ok(ProbeResponse {
            method: method.to_string(),
            url: final_url,
            status_code,
            headers,
            body,
            response_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blacklist_is_exact() {
        let requester = Requester::new(Client::new())
            .with_blacklist(vec!["http://x/a".to_string(), String::new()]);
        assert!(requester.is_blacklisted("http://x/a"));
        assert!(!requester.is_blacklisted("http://x/ab"));
        assert!(!requester.is_blacklisted("http://x/a/"));
        assert!(!requester.is_blacklisted(""));
    }

    #[test]
    fn test_malformed_header_rejected() {
        let result = Requester::new(Client::new()).with_headers(&["NoColonHere"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_build_client_with_socks_proxy() {
        let options = ClientOptions {
            proxy: Some("127.0.0.1:1080".to_string()),
            ..Default::default()
        };
        assert!(build_client(&options).is_ok());
    }

    #[tokio::test]
    async fn test_blacklisted_url_is_not_sent() {
        let requester = Requester::new(Client::new())
            .with_blacklist(vec!["http://127.0.0.1:9/admin/panel".to_string()]);
        let err = requester
            .send("GET", "http://127.0.0.1:9/admin/panel")
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Blacklisted(_)));
    }
}
