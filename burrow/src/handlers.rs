use crate::output::{OutputOptions, OutputWriter};
use anyhow::{Context as _, anyhow};
use burrow_core::lists::{load_lines, load_wordlist};
use burrow_core::{Config, Engine, EngineHandle, Stats, StatusFilter};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::fs;
use std::io::{self, BufRead, IsTerminal};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{Level, info, warn};
use url::Url;

// Helper functions for loading seeds

/// Load URLs from either a list file or a single URL argument
pub fn load_urls_from_source(
    url: Option<&str>,
    input_list: Option<&PathBuf>,
    https: bool,
) -> Result<Vec<String>, String> {
    if let Some(path) = input_list {
        load_urls_from_file(&expand_path(path), https)
    } else if let Some(url) = url {
        parse_url_line(url, https)
            .map(|url| vec![url])
            .ok_or_else(|| format!("Invalid URL '{}'", url))
    } else {
        Err("Either --url or --input-list must be provided".to_string())
    }
}

/// Load and parse URLs from a file
pub fn load_urls_from_file(path: &Path, https: bool) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read URL list {}: {}", path.display(), e))?;

    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| parse_url_line(line, https))
        .collect();

    if urls.is_empty() {
        return Err(format!("No valid URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// Parse a single line as an http(s) URL, adding a scheme if it has none.
pub fn parse_url_line(line: &str, https: bool) -> Option<String> {
    let candidate = if line.contains("://") {
        line.to_string()
    } else {
        let scheme = if https { "https" } else { "http" };
        format!("{}://{}", scheme, line)
    };

    match Url::parse(&candidate) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {
            Some(candidate)
        }
        _ => {
            warn!("Skipping invalid URL '{}'", line);
            None
        }
    }
}

pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref())
}

fn load_set(path: Option<&PathBuf>) -> anyhow::Result<HashSet<String>> {
    match path {
        Some(path) => Ok(load_lines(&expand_path(path))?.into_iter().collect()),
        None => Ok(HashSet::new()),
    }
}

fn string_arg(matches: &ArgMatches, id: &str) -> Option<String> {
    matches
        .get_one::<String>(id)
        .filter(|s| !s.is_empty())
        .cloned()
}

fn many_args(matches: &ArgMatches, id: &str) -> Vec<String> {
    matches
        .get_many::<String>(id)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

/// Translate parsed arguments into an engine configuration, loading the
/// wordlist and the black/whitelists from disk.
pub fn build_config(matches: &ArgMatches) -> anyhow::Result<Config> {
    let defaults = Config::default();

    let wordlist = match matches.get_one::<PathBuf>("wordlist") {
        Some(path) => load_wordlist(&expand_path(path))?,
        None => Vec::new(),
    };

    let status_filter = match matches.get_one::<String>("good") {
        Some(good) => StatusFilter::Allow(Config::parse_status_codes(good)?),
        None => {
            let bad = matches.get_one::<String>("bad").map_or("404", String::as_str);
            StatusFilter::Deny(Config::parse_status_codes(bad)?)
        }
    };

    let methods: Vec<String> = matches
        .get_one::<String>("methods")
        .map(|m| Config::parse_list(m))
        .unwrap_or_default()
        .into_iter()
        .map(|m| m.to_uppercase())
        .collect();

    let config = Config {
        threads: matches.get_one::<usize>("threads").copied().unwrap_or(1),
        wordlist,
        extensions: matches
            .get_one::<String>("ext")
            .map(|e| Config::parse_list(e))
            .unwrap_or_default(),
        methods,
        status_filter,
        bad_headers: many_args(matches, "bad-header"),
        bad_body: string_arg(matches, "bad-body"),
        ratio_404: matches
            .get_one::<f64>("ratio")
            .copied()
            .unwrap_or(defaults.ratio_404),
        timeout: matches
            .get_one::<u64>("timeout")
            .map_or(defaults.timeout, |s| Duration::from_secs(*s)),
        proxy: string_arg(matches, "proxy"),
        mirror_to_proxy: matches.get_flag("burp"),
        follow_redirects: matches.get_flag("redirect"),
        ignore_tls: matches.get_flag("insecure"),
        user_agent: string_arg(matches, "ua").unwrap_or(defaults.user_agent),
        auth: string_arg(matches, "auth"),
        cookies: string_arg(matches, "cookies"),
        headers: many_args(matches, "header"),
        body: string_arg(matches, "body"),
        vhost: string_arg(matches, "vhost"),
        canary: string_arg(matches, "canary"),
        blacklist: load_set(matches.get_one::<PathBuf>("blacklist"))?,
        whitelist: load_set(matches.get_one::<PathBuf>("whitelist"))?,
        input_list: matches.get_one::<PathBuf>("input-list").is_some(),
        no_head: matches.get_flag("no-head"),
        no_get: matches.get_flag("no-get"),
        no_base: matches.get_flag("no-base"),
        no_spider: matches.get_flag("no-spider"),
        no_recursion: matches.get_flag("no-recursion"),
        no_wildcard_checks: matches.get_flag("no-wildcard"),
        append_slash: matches.get_flag("append-slash"),
        no_robots: matches.get_flag("no-robots"),
        no_encode: matches.get_flag("no-encode"),
        ajax: matches.get_flag("ajax"),
        show_all: matches.get_flag("all"),
        no_start_stop: matches.get_flag("no-start-stop"),
    };

    config.validate()?;
    Ok(config)
}

/// Log to stderr. `-v` raises the level to debug, `-vv` to trace.
pub fn init_tracing(verbosity: u8, debug: bool) {
    let level = match (verbosity, debug) {
        (0, false) => Level::INFO,
        (0, true) | (1, _) => Level::DEBUG,
        _ => Level::TRACE,
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

pub fn print_banner() {
    let bar = "=".repeat(20);
    println!("{}", bar.bright_blue().bold());
    println!(
        "{}",
        format!("burrow v{}", env!("CARGO_PKG_VERSION"))
            .bright_cyan()
            .bold()
    );
    println!("{}", bar.bright_blue().bold());
}

pub fn status_message(stats: &Stats) -> String {
    let mut message = format!(
        "Tested {} | Found {} | Workers {} | Pending {}",
        stats.tested, stats.confirmed, stats.workers, stats.pending
    );
    if stats.wordlist_len > 0 {
        message.push_str(&format!(
            " | Dir {}/{}",
            stats.dirb_progress, stats.wordlist_len
        ));
    }
    message
}

/// Runtime controls read from an interactive stdin, one per line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    AddWorker,
    RemoveWorker,
    StopDir,
}

impl Control {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "+" => Some(Control::AddWorker),
            "-" => Some(Control::RemoveWorker),
            "s" | "x" => Some(Control::StopDir),
            _ => None,
        }
    }

    pub fn apply(self, handle: &EngineHandle) {
        match self {
            Control::AddWorker => {
                handle.add_worker();
            }
            Control::RemoveWorker => {
                handle.remove_worker();
            }
            Control::StopDir => handle.stop_current_dir(),
        }
    }
}

// A plain thread, so a pending read never holds up runtime shutdown.
fn spawn_controls(handle: EngineHandle) {
    if !io::stdin().is_terminal() {
        return;
    }
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match Control::parse(&line) {
                Some(control) => control.apply(&handle),
                None => warn!("Unknown control '{}'. Use +, - or s", line.trim()),
            }
        }
    });
}

fn status_spinner(enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

pub async fn run(matches: &ArgMatches) -> anyhow::Result<()> {
    init_tracing(matches.get_count("verbose"), matches.get_flag("debug"));

    if !matches.get_flag("quiet") {
        print_banner();
    }

    let seeds = load_urls_from_source(
        matches.get_one::<String>("url").map(String::as_str),
        matches.get_one::<PathBuf>("input-list"),
        matches.get_flag("https"),
    )
    .map_err(|e| anyhow!(e))?;

    let config = build_config(matches)?;
    if matches.get_flag("debug") {
        info!("Configuration: {}", serde_json::to_string_pretty(&config)?);
    }

    let options = OutputOptions {
        clean: matches.get_flag("clean"),
        show_length: matches.get_flag("len"),
    };
    let mut writer = match matches.get_one::<PathBuf>("output") {
        Some(path) => {
            let path = expand_path(path);
            OutputWriter::open(&path, options)
                .with_context(|| format!("Failed to open output file {}", path.display()))?
        }
        None => OutputWriter::console(options),
    };

    let (engine, mut findings) = Engine::new(config, seeds)?;
    let handle = engine.handle();
    info!("Canary: {}", engine.canary());

    let spinner = status_spinner(!matches.get_flag("no-status"));
    let ticker = {
        let spinner = spinner.clone();
        let handle = handle.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(250));
            loop {
                interval.tick().await;
                spinner.set_message(status_message(&handle.stats()));
            }
        })
    };
    spawn_controls(handle.clone());

    let run = tokio::spawn(engine.run());

    while let Some(finding) = findings.recv().await {
        let line = writer.record(&finding)?;
        drop(finding);
        if let Some(line) = line {
            spinner.suspend(|| println!("{}", line));
        }
    }

    let result = run.await;
    ticker.abort();
    spinner.finish_and_clear();
    let summary = result??;

    println!(
        "{} Tested {} URLs across {} host(s), found {} in {:.1}s",
        "Done.".bright_green().bold(),
        summary.tested,
        summary.hosts,
        summary.confirmed,
        summary.elapsed.as_secs_f64()
    );
    Ok(())
}
