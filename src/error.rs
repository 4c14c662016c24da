//! Error taxonomy for the ingestion pipeline
//!
//! Every variant except [`IngestError::UnknownKind`] is contained at the
//! granularity of a single kind or router lookup: it gets logged and the
//! affected kind degrades to an empty resource list.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Maximum number of characters of raw output carried in a diagnostic
pub const MAX_EXCERPT_CHARS: usize = 200;

/// Output format a parse attempt was working on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseFormat {
    Json,
    Text,
}

impl fmt::Display for ParseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseFormat::Json => f.write_str("JSON"),
            ParseFormat::Text => f.write_str("text"),
        }
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    /// The command collaborator failed or produced no output
    #[error("Command failed: {command} -- {reason}")]
    CommandFailure { command: String, reason: String },

    /// Raw output could not be turned into resources
    #[error("Failed to parse {format} output for {kind}: {reason} (excerpt: {excerpt})")]
    ParseFailure {
        kind: String,
        format: ParseFormat,
        reason: String,
        excerpt: String,
    },

    #[error("Failed to write snapshot {path:?}: {source}")]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read snapshot {path:?}: {source}")]
    CacheRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A caller named a kind the registry does not know. Not recoverable.
    #[error("Unknown resource kind: {0}")]
    UnknownKind(String),
}

pub type IngestResult<T> = Result<T, IngestError>;

impl IngestError {
    /// Build a `CommandFailure` from the command line that was run
    pub fn command(args: &[String], reason: impl Into<String>) -> Self {
        Self::CommandFailure {
            command: args.join(" "),
            reason: reason.into(),
        }
    }

    pub fn parse(
        kind: impl fmt::Display,
        format: ParseFormat,
        reason: impl Into<String>,
        raw: &str,
    ) -> Self {
        Self::ParseFailure {
            kind: kind.to_string(),
            format,
            reason: reason.into(),
            excerpt: excerpt(raw),
        }
    }
}

/// Bounded, log-safe excerpt of raw collaborator output.
/// Truncates on a char boundary and strips control characters.
pub fn excerpt(raw: &str) -> String {
    let total = raw.chars().count();
    let clean: String = raw
        .chars()
        .take(MAX_EXCERPT_CHARS)
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();

    if total > MAX_EXCERPT_CHARS {
        format!("{}... [truncated, {} chars total]", clean, total)
    } else {
        clean
    }
}
