//! Result lines for the console and the output file.

use burrow_core::Finding;
use burrow_scanner::ProbeResponse;
use colored::{ColoredString, Colorize};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    /// Write bare URLs to the file.
    pub clean: bool,
    pub show_length: bool,
}

/// `METHOD URL [STATUS]`, with the body length and redirect target appended
/// when known.
pub fn format_finding(
    method: &str,
    url: &str,
    response: Option<&ProbeResponse>,
    options: &OutputOptions,
) -> String {
    let Some(response) = response else {
        return format!("{} {} [error]", method, url);
    };

    let mut line = format!("{} {} [{}]", method, url, response.status_line());
    if options.show_length {
        line.push_str(&format!(" Length: {}", response.content_length()));
    }
    if response.is_redirect()
        && let Some(location) = response.location()
    {
        line.push(' ');
        line.push_str(location);
    }
    line
}

fn colorize(line: String, status: Option<u16>) -> ColoredString {
    match status {
        Some(200..=299) => line.green(),
        Some(300..=399) => line.yellow(),
        Some(400..=499) => line.cyan(),
        Some(500..=599) => line.blue(),
        _ => line.magenta(),
    }
}

/// Writes each URL once per outcome. Found results go to the file; every
/// result gets a console line. A URL first seen as not found is still
/// written when a later method finds it.
pub struct OutputWriter {
    file: Option<File>,
    found: HashSet<String>,
    tested: HashSet<String>,
    options: OutputOptions,
}

impl OutputWriter {
    /// Append to `path`, creating it if needed. Non-clean files get a dated
    /// header line per run.
    pub fn open(path: &Path, options: OutputOptions) -> io::Result<Self> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        if !options.clean {
            writeln!(
                file,
                "# burrow {} started {}",
                env!("CARGO_PKG_VERSION"),
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
            )?;
        }
        Ok(Self {
            file: Some(file),
            found: HashSet::new(),
            tested: HashSet::new(),
            options,
        })
    }

    /// Console-only writer.
    pub fn console(options: OutputOptions) -> Self {
        Self {
            file: None,
            found: HashSet::new(),
            tested: HashSet::new(),
            options,
        }
    }

    pub fn record(&mut self, finding: &Finding) -> io::Result<Option<String>> {
        self.record_parts(
            &finding.method,
            &finding.url,
            finding.response.as_deref(),
            finding.good,
        )
    }

    /// Returns the coloured console line, or `None` if this URL was already
    /// written with the same outcome or already found.
    pub fn record_parts(
        &mut self,
        method: &str,
        url: &str,
        response: Option<&ProbeResponse>,
        good: bool,
    ) -> io::Result<Option<String>> {
        if !good && self.found.contains(url) {
            return Ok(None);
        }
        let seen = if good { &mut self.found } else { &mut self.tested };
        if !seen.insert(url.to_string()) {
            return Ok(None);
        }

        let line = format_finding(method, url, response, &self.options);
        if good && let Some(file) = self.file.as_mut() {
            if self.options.clean {
                writeln!(file, "{}", url)?;
            } else {
                writeln!(file, "{}", line)?;
            }
            file.flush()?;
        }

        let prefix = if good { "Found" } else { "Tested" };
        let status = response.map(|r| r.status_code);
        Ok(Some(format!("{} {}", prefix, colorize(line, status))))
    }

    pub fn written(&self) -> usize {
        self.found.len() + self.tested.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use url::Url;

    fn response(status_code: u16) -> ProbeResponse {
        ProbeResponse {
            method: "GET".to_string(),
            url: Url::parse("http://example.com/admin").unwrap(),
            status_code,
            headers: Default::default(),
            body: b"hello".to_vec(),
            response_time: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_format_plain() {
        let line = format_finding(
            "GET",
            "http://example.com/admin",
            Some(&response(200)),
            &OutputOptions::default(),
        );
        assert_eq!(line, "GET http://example.com/admin [200 OK]");
    }

    #[test]
    fn test_format_length_and_location() {
        let mut redirect = response(301);
        redirect
            .headers
            .insert("location", "http://example.com/admin/".parse().unwrap());
        let options = OutputOptions {
            show_length: true,
            ..Default::default()
        };
        let line = format_finding("GET", "http://example.com/admin", Some(&redirect), &options);
        assert_eq!(
            line,
            "GET http://example.com/admin [301 Moved Permanently] Length: 5 http://example.com/admin/"
        );
    }

    #[test]
    fn test_format_without_response() {
        let line = format_finding("HEAD", "http://x/", None, &OutputOptions::default());
        assert_eq!(line, "HEAD http://x/ [error]");
    }
}
