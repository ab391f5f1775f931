//! Typed failure taxonomy.
//!
//! Everything is propagated through `anyhow::Result`; these types exist so
//! the CLI (and tests) can downcast and react per failure class instead of
//! string-matching messages.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

const EXCERPT_MAX_CHARS: usize = 200;
const EXCERPT_MAX_LINES: usize = 3;
const EXCERPT_READ_BYTES: usize = 4096;
const ELLIPSIS: &str = "…";

/// Network or I/O failure while obtaining a remote artifact.
#[derive(Debug, Error)]
#[error("failed to download {url}: {cause}")]
pub struct DownloadError {
    pub url: String,
    pub cause: String,
}

impl DownloadError {
    pub fn new(url: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self {
            url: url.into(),
            cause: cause.to_string(),
        }
    }
}

/// Malformed JSON in a kaikki-style dump.
///
/// Carries the offending path when known, the position reported by
/// serde_json, and a short excerpt of the file so error pages served instead
/// of data are recognizable at a glance.
#[derive(Debug)]
pub struct ParseError {
    pub path: Option<PathBuf>,
    pub line: usize,
    pub column: usize,
    pub cause: String,
    pub excerpt: Vec<String>,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path_hint = self
            .path
            .as_ref()
            .map_or_else(|| "<unknown>".to_string(), |p| p.display().to_string());
        write!(
            f,
            "failed to parse JSON at {path_hint} (line {}, column {}): {}",
            self.line, self.column, self.cause
        )
    }
}

impl std::error::Error for ParseError {}

impl ParseError {
    pub fn new(path: Option<&Path>, err: &serde_json::Error) -> Self {
        let excerpt = path.map(load_excerpt).unwrap_or_default();
        Self {
            path: path.map(Path::to_path_buf),
            line: err.line(),
            column: err.column(),
            cause: err.to_string(),
            excerpt,
        }
    }
}

/// Pivot chaining unavailable for a StarDict pair.
///
/// Recoverable: the assembler demotes this to a warning and the source
/// contributes zero entries.
#[derive(Debug, Error)]
#[error("translation chaining failed: {cause}")]
pub struct ChainError {
    pub cause: String,
}

impl ChainError {
    pub fn new(cause: impl fmt::Display) -> Self {
        Self {
            cause: cause.to_string(),
        }
    }
}

/// Downstream packaging failure (kindlegen, OPF patching). Never raised by
/// the assembly core itself.
#[derive(Debug, Error)]
#[error("packaging failed: {cause}")]
pub struct PackagingError {
    pub cause: String,
}

impl PackagingError {
    pub fn new(cause: impl fmt::Display) -> Self {
        Self {
            cause: cause.to_string(),
        }
    }
}

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// First few non-empty lines of `path`, HTML-stripped if the body looks like
/// markup, each line truncated to 200 chars.
fn load_excerpt(path: &Path) -> Vec<String> {
    let Ok(mut file) = File::open(path) else {
        return Vec::new();
    };
    let mut buf = vec![0u8; EXCERPT_READ_BYTES];
    let Ok(n) = file.read(&mut buf) else {
        return Vec::new();
    };
    buf.truncate(n);
    let content = String::from_utf8_lossy(&buf);

    let raw_lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    // A body starting with '<' is more likely than not an HTML error page.
    let text_lines: Vec<String> = if raw_lines.first().is_some_and(|l| l.starts_with('<')) {
        TAG_RE
            .replace_all(&content, "\n")
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        raw_lines.iter().map(|l| (*l).to_string()).collect()
    };

    text_lines
        .into_iter()
        .take(EXCERPT_MAX_LINES)
        .map(|line| {
            if line.chars().count() <= EXCERPT_MAX_CHARS {
                line
            } else {
                let cut: String = line.chars().take(EXCERPT_MAX_CHARS - 1).collect();
                format!("{cut}{ELLIPSIS}")
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    #[test]
    fn parse_error_excerpt_plain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "{{\"word\": oops}}").unwrap();

        let err = serde_json::from_str::<serde_json::Value>("{\"word\": oops}").unwrap_err();
        let perr = ParseError::new(Some(&path), &err);
        assert_eq!(perr.excerpt, vec!["{\"word\": oops}"]);
        assert!(perr.to_string().contains("bad.jsonl"));
    }

    #[test]
    fn parse_error_excerpt_html_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error.html");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "<html><body><h1>503 Service Unavailable</h1></body></html>").unwrap();

        let err = serde_json::from_str::<serde_json::Value>("<html>").unwrap_err();
        let perr = ParseError::new(Some(&path), &err);
        assert_eq!(perr.excerpt, vec!["503 Service Unavailable"]);
    }

    #[test]
    fn parse_error_excerpt_truncates_long_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.jsonl");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "{}", "x".repeat(500)).unwrap();

        let err = serde_json::from_str::<serde_json::Value>("x").unwrap_err();
        let perr = ParseError::new(Some(&path), &err);
        assert_eq!(perr.excerpt.len(), 1);
        assert_eq!(perr.excerpt[0].chars().count(), EXCERPT_MAX_CHARS);
        assert!(perr.excerpt[0].ends_with(ELLIPSIS));
    }

    #[test]
    fn parse_error_without_path() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let perr = ParseError::new(None, &err);
        assert!(perr.excerpt.is_empty());
        assert!(perr.to_string().contains("<unknown>"));
    }
}
