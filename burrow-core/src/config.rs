use crate::error::{EngineError, Result};
use burrow_scanner::ClientOptions;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;

/// Which status codes count as good. The two modes never combine.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub enum StatusFilter {
    /// Every status except these is good.
    Deny(HashSet<u16>),
    /// Only these statuses are good.
    Allow(HashSet<u16>),
}

impl StatusFilter {
    pub fn is_good(&self, status: u16) -> bool {
        match self {
            StatusFilter::Deny(codes) => !codes.contains(&status),
            StatusFilter::Allow(codes) => codes.contains(&status),
        }
    }
}

impl Default for StatusFilter {
    fn default() -> Self {
        StatusFilter::Deny(HashSet::from([404]))
    }
}

/// Run parameters. Read-only once a run starts.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub threads: usize,
    pub wordlist: Vec<String>,
    pub extensions: Vec<String>,
    pub methods: Vec<String>,
    pub status_filter: StatusFilter,
    /// `Name: prefix` rules; a response carrying a matching header is bad.
    pub bad_headers: Vec<String>,
    pub bad_body: Option<String>,
    pub ratio_404: f64,
    pub timeout: Duration,
    pub proxy: Option<String>,
    /// Send good requests a second time through `proxy` instead of routing
    /// all traffic through it.
    pub mirror_to_proxy: bool,
    pub follow_redirects: bool,
    pub ignore_tls: bool,
    pub user_agent: String,
    pub auth: Option<String>,
    pub cookies: Option<String>,
    /// `Name: value` pairs added to every request.
    pub headers: Vec<String>,
    pub body: Option<String>,
    pub vhost: Option<String>,
    pub canary: Option<String>,
    pub blacklist: HashSet<String>,
    pub whitelist: HashSet<String>,
    /// Several seeds were loaded from a list; a dead host is skipped rather
    /// than ending the run.
    pub input_list: bool,
    pub no_head: bool,
    pub no_get: bool,
    pub no_base: bool,
    pub no_spider: bool,
    pub no_recursion: bool,
    pub no_wildcard_checks: bool,
    pub append_slash: bool,
    pub no_robots: bool,
    pub no_encode: bool,
    pub ajax: bool,
    pub show_all: bool,
    pub no_start_stop: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threads: 1,
            wordlist: Vec::new(),
            extensions: Vec::new(),
            methods: vec!["GET".to_string()],
            status_filter: StatusFilter::default(),
            bad_headers: Vec::new(),
            bad_body: None,
            ratio_404: 0.95,
            timeout: Duration::from_secs(20),
            proxy: None,
            mirror_to_proxy: false,
            follow_redirects: false,
            ignore_tls: false,
            user_agent: format!("burrow/{}", env!("CARGO_PKG_VERSION")),
            auth: None,
            cookies: None,
            headers: Vec::new(),
            body: None,
            vhost: None,
            canary: None,
            blacklist: HashSet::new(),
            whitelist: HashSet::new(),
            input_list: false,
            no_head: false,
            no_get: false,
            no_base: false,
            no_spider: false,
            no_recursion: false,
            no_wildcard_checks: false,
            append_slash: false,
            no_robots: false,
            no_encode: false,
            ajax: false,
            show_all: false,
            no_start_stop: false,
        }
    }
}

impl Config {
    /// Parse a comma separated list of status codes such as `404,500`.
    pub fn parse_status_codes(input: &str) -> Result<HashSet<u16>> {
        Self::parse_list(input)
            .into_iter()
            .map(|code| {
                code.parse::<u16>()
                    .map_err(|_| EngineError::Config(format!("invalid status code: {}", code)))
            })
            .collect()
    }

    /// Split a comma separated list, dropping empty entries.
    pub fn parse_list(input: &str) -> Vec<String> {
        input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(EngineError::Config("thread count must be at least 1".into()));
        }
        if self.methods.is_empty() {
            return Err(EngineError::Config("at least one HTTP method is required".into()));
        }
        if !(0.0..=1.0).contains(&self.ratio_404) {
            return Err(EngineError::Config(format!(
                "similarity ratio {} is outside 0..=1",
                self.ratio_404
            )));
        }
        if self.mirror_to_proxy && self.proxy.is_none() {
            return Err(EngineError::Config("mirroring requires a proxy".into()));
        }
        Ok(())
    }

    /// Headers sent with every request, including the ajax marker.
    pub fn request_headers(&self) -> Vec<String> {
        let mut headers = self.headers.clone();
        if self.ajax {
            headers.push("X-Requested-With: XMLHttpRequest".to_string());
        }
        headers
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            timeout: self.timeout,
            proxy: if self.mirror_to_proxy {
                None
            } else {
                self.proxy.clone()
            },
            follow_redirects: self.follow_redirects,
            ignore_tls_errors: self.ignore_tls,
            max_idle_per_host: self.threads.max(1),
        }
    }

    /// Client used for mirrored requests, if mirroring is on.
    pub fn mirror_client_options(&self) -> Option<ClientOptions> {
        if !self.mirror_to_proxy {
            return None;
        }
        Some(ClientOptions {
            proxy: self.proxy.clone(),
            ..self.client_options()
        })
    }

    /// Whether recursion into discovered directories is on.
    pub fn recursive(&self) -> bool {
        !self.no_recursion
    }

    /// Whether links found in good bodies are followed.
    pub fn spidering(&self) -> bool {
        !self.no_spider && !self.no_recursion
    }
}
