// Tests for newline-delimited list loading

use burrow_core::lists::{load_lines, load_wordlist, parse_lines};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

#[test]
fn test_load_wordlist_skips_comments_and_blanks() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    writeln!(temp_file, "# a comment")?;
    writeln!(temp_file, "admin")?;
    writeln!(temp_file)?;
    writeln!(temp_file, "  backup  ")?;
    writeln!(temp_file, "weird word")?;

    let words = load_wordlist(temp_file.path())?;
    assert_eq!(words, vec!["admin", "backup", "weird word"]);
    Ok(())
}

#[test]
fn test_load_wordlist_rejects_empty() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    writeln!(temp_file, "# only comments")?;
    writeln!(temp_file)?;

    assert!(load_wordlist(temp_file.path()).is_err());
    Ok(())
}

#[test]
fn test_load_lines_keeps_every_entry() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    writeln!(temp_file, "http://a.example/logout")?;
    writeln!(temp_file, "#fragment-like")?;

    let lines = load_lines(temp_file.path())?;
    assert_eq!(lines, vec!["http://a.example/logout", "#fragment-like"]);
    Ok(())
}

#[test]
fn test_load_lines_missing_file() {
    assert!(load_lines(Path::new("/nonexistent/burrow/list.txt")).is_err());
}

#[test]
fn test_parse_lines_handles_crlf() {
    assert_eq!(parse_lines("one\r\ntwo\r\n"), vec!["one", "two"]);
}
