use crate::CLAP_STYLING;
use clap::{ArgAction, arg, value_parser};
use std::path::PathBuf;

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("burrow")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("burrow")
        .about("Recursive, spidering content discovery")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress the banner").required(false))
        // Targets
        .arg(
            arg!(-u --"url" <URL>)
                .required(false)
                .required_unless_present("input-list")
                .help("The URL to start from. A missing scheme defaults to http (see --https)"),
        )
        .arg(
            arg!(-i --"input-list" <PATH>)
                .required(false)
                .help("Newline-delimited file of URLs to start from")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(arg!(--"https" "Use https for URLs given without a scheme").required(false))
        // Wordlist expansion
        .arg(
            arg!(-w --"wordlist" <PATH>)
                .required(false)
                .help("Wordlist to brute force with. Omit to spider only")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(-x --"ext" <EXTENSIONS>)
                .required(false)
                .help("Comma separated extensions to append to each word"),
        )
        .arg(
            arg!(--"methods" <METHODS>)
                .required(false)
                .help("Comma separated HTTP methods to use")
                .default_value("GET"),
        )
        .arg(
            arg!(--"append-slash" "Also try every word with a trailing slash").required(false),
        )
        .arg(arg!(--"no-encode" "Do not percent-encode words").required(false))
        .arg(
            arg!(-t --"threads" <NUM_WORKERS>)
                .required(false)
                .help("The number of concurrent workers")
                .value_parser(value_parser!(usize))
                .default_value("1"),
        )
        // Response classification
        .arg(
            arg!(--"bad" <CODES>)
                .required(false)
                .help("Comma separated status codes treated as not found")
                .default_value("404")
                .conflicts_with("good"),
        )
        .arg(
            arg!(--"good" <CODES>)
                .required(false)
                .help("Comma separated status codes treated as found. Everything else is not"),
        )
        .arg(
            arg!(--"bad-header" <HEADER>)
                .required(false)
                .help("Treat responses with this header as not found. Supply as Name: prefix")
                .action(ArgAction::Append),
        )
        .arg(
            arg!(--"bad-body" <CONTENT>)
                .required(false)
                .help("Treat responses whose body contains this as not found"),
        )
        .arg(
            arg!(--"ratio" <RATIO>)
                .required(false)
                .help("Similarity to the canary page above which a response is a soft 404")
                .value_parser(value_parser!(f64))
                .default_value("0.95"),
        )
        .arg(
            arg!(--"canary" <VALUE>)
                .required(false)
                .help("Path used to fingerprint not-found responses. Random by default"),
        )
        // Transport
        .arg(
            arg!(--"timeout" <SECONDS>)
                .required(false)
                .help("Timeout for each request")
                .value_parser(value_parser!(u64))
                .default_value("20"),
        )
        .arg(
            arg!(-p --"proxy" <ADDR>)
                .required(false)
                .help("Proxy address. ip:port is SOCKS5, use http://ip:port for an HTTP proxy"),
        )
        .arg(
            arg!(--"burp" "Only send found requests through the proxy, a second time")
                .required(false)
                .requires("proxy"),
        )
        .arg(arg!(--"redirect" "Follow redirects").required(false))
        .arg(arg!(-k --"insecure" "Ignore TLS certificate errors").required(false))
        .arg(
            arg!(--"ua" <AGENT>)
                .required(false)
                .help("User agent to send"),
        )
        .arg(
            arg!(--"auth" <BASE64>)
                .required(false)
                .help("Basic auth token, placed after 'Basic' in the Authorization header"),
        )
        .arg(
            arg!(--"cookies" <COOKIES>)
                .required(false)
                .help("Value of the Cookie header"),
        )
        .arg(
            arg!(-H --"header" <HEADER>)
                .required(false)
                .help("Extra request header as Name:value. Repeatable")
                .action(ArgAction::Append),
        )
        .arg(
            arg!(--"body" <CONTENT>)
                .required(false)
                .help("Body to send with every request"),
        )
        .arg(
            arg!(--"vhost" <HOST>)
                .required(false)
                .help("Host header to send instead of the URL's host"),
        )
        .arg(arg!(--"ajax" "Add X-Requested-With: XMLHttpRequest").required(false))
        // Scope
        .arg(
            arg!(--"blacklist" <PATH>)
                .required(false)
                .help("File of exact URLs that must never be requested")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(--"whitelist" <PATH>)
                .required(false)
                .help("File of extra hosts that may be followed")
                .value_parser(value_parser!(PathBuf)),
        )
        // Behaviour toggles
        .arg(arg!(--"no-head" "Do not send a HEAD before each GET").required(false))
        .arg(
            arg!(--"no-get" "Decide on the HEAD response alone")
                .required(false)
                .conflicts_with("no-head"),
        )
        .arg(arg!(--"no-base" "Do not request the directory itself").required(false))
        .arg(arg!(--"no-spider" "Do not follow links found in responses").required(false))
        .arg(arg!(--"no-recursion" "Stay in the starting directory").required(false))
        .arg(arg!(--"no-wildcard" "Skip canary and wildcard checks").required(false))
        .arg(arg!(--"no-robots" "Do not read robots.txt").required(false))
        .arg(
            arg!(--"no-start-stop" "Do not log when directories start and finish").required(false),
        )
        // Output
        .arg(
            arg!(-o --"output" <PATH>)
                .required(false)
                .help("File to append results to")
                .value_parser(value_parser!(PathBuf))
                .default_value("./busted.txt"),
        )
        .arg(arg!(--"clean" "Write bare URLs to the output file").required(false))
        .arg(arg!(--"len" "Include response length").required(false))
        .arg(arg!(--"all" "Report every result, not just found ones").required(false))
        .arg(arg!(--"no-status" "Do not show the live status line").required(false))
        .arg(arg!(-v --"verbose" ... "Increase log verbosity").required(false))
        .arg(arg!(--"debug" "Log the effective configuration").required(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_is_well_formed() {
        command_argument_builder().debug_assert();
    }

    #[test]
    fn test_url_or_list_required() {
        let result = command_argument_builder().try_get_matches_from(["burrow"]);
        assert!(result.is_err());

        let matches = command_argument_builder()
            .try_get_matches_from(["burrow", "-i", "hosts.txt"])
            .unwrap();
        assert!(matches.get_one::<PathBuf>("input-list").is_some());
    }

    #[test]
    fn test_good_conflicts_with_explicit_bad() {
        let result = command_argument_builder().try_get_matches_from([
            "burrow", "-u", "http://h/", "--bad", "500", "--good", "200",
        ]);
        assert!(result.is_err());
    }
}
