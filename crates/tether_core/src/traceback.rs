//! Turns the error text a running program prints into an editor location.
//!
//! Expected shape:
//!
//! ```text
//! Traceback (most recent call last):
//!   File "<stdin>", line 4, in <module>
//!   File "lib/util.py", line 12, in helper
//! ImportError: no module named 'timex'
//! ```
//!
//! The last `File` line before the message names the reported location.

use std::sync::LazyLock;

use regex::Regex;

use crate::file_tree::{base_name, SEPARATOR};
use crate::ParseFailure;

/// Name the board uses for code that was sent for execution rather than read from a file.
pub const CURRENT_SCRIPT: &str = "<stdin>";

const INTERRUPT_MARKER: &str = "KeyboardInterrupt:";
pub const STOPPED_BY_USER: &str = "Stopped by user";

static FRAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*File\s+"([^"]*)"\s*,\s*line\s+(\d+)\s*(?:,\s*in\s+(.*?))?\s*$"#)
        .expect("frame regex is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceName {
    CurrentScript,
    Path(String),
}

/// A traceback reduced to the location that should be highlighted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedError {
    pub source: SourceName,
    /// 0-based line index.
    pub line: u32,
    /// Exception type and message, possibly multi-line.
    pub message: String,
    /// Rest of the frame line after the file name, e.g. `line 4, in <module>`.
    frame_detail: String,
}

impl ParsedError {
    /// Buffer name to highlight. The current-script sentinel resolves to
    /// `current_script`; relative paths are made absolute.
    pub fn source_name(&self, current_script: Option<&str>) -> Result<String, ParseFailure> {
        match &self.source {
            SourceName::CurrentScript => current_script
                .map(ToOwned::to_owned)
                .ok_or(ParseFailure::NoCurrentScript),
            SourceName::Path(path) => Ok(path.clone()),
        }
    }

    /// Console line naming the location, e.g. `main.py, line 4, in <module>`.
    pub fn location_line(&self, resolved_name: &str) -> String {
        format!("{}, {}", base_name(resolved_name), self.frame_detail)
    }
}

/// A traceback resolved against the running script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedError {
    /// Buffer or remote file to highlight.
    pub name: String,
    /// 0-based line index.
    pub line: u32,
    pub message: String,
    /// Console line naming the location.
    pub location: String,
}

/// [`parse_traceback`] followed by [`ParsedError::source_name`].
pub fn resolve_traceback(
    text: &str,
    current_script: Option<&str>,
) -> Result<ResolvedError, ParseFailure> {
    let parsed = parse_traceback(text)?;
    let name = parsed.source_name(current_script)?;
    Ok(ResolvedError {
        location: parsed.location_line(&name),
        name,
        line: parsed.line,
        message: parsed.message,
    })
}

/// Parses `text` as a traceback. Anything that does not have the expected
/// shape is a [`ParseFailure`]; callers show the text verbatim instead.
pub fn parse_traceback(text: &str) -> Result<ParsedError, ParseFailure> {
    let cleaned = text.replace('\r', "");
    let lines: Vec<&str> = cleaned.split('\n').collect();

    // Line 0 is the banner.
    let mut end = 1;
    while end < lines.len() && FRAME_REGEX.is_match(lines[end]) {
        end += 1;
    }
    if end == 1 {
        return Err(ParseFailure::NoFrame);
    }
    if end >= lines.len() {
        return Err(ParseFailure::NoMessage);
    }

    let captures = FRAME_REGEX
        .captures(lines[end - 1])
        .ok_or(ParseFailure::NoFrame)?;
    let raw_name = captures.get(1).map_or("", |m| m.as_str());
    let line_number: u32 = captures
        .get(2)
        .and_then(|m| m.as_str().parse().ok())
        .ok_or(ParseFailure::BadLineNumber)?;
    let line = line_number
        .checked_sub(1)
        .ok_or(ParseFailure::BadLineNumber)?;

    let source = if raw_name == CURRENT_SCRIPT {
        SourceName::CurrentScript
    } else if raw_name.starts_with(SEPARATOR) {
        SourceName::Path(raw_name.to_string())
    } else {
        SourceName::Path(format!("{SEPARATOR}{raw_name}"))
    };

    let frame_detail = match captures.get(3) {
        Some(context) => format!("line {line_number}, in {}", context.as_str()),
        None => format!("line {line_number}"),
    };

    let mut message_lines: Vec<String> = lines[end..].iter().map(|l| l.to_string()).collect();
    message_lines[0] = message_lines[0].replace(INTERRUPT_MARKER, STOPPED_BY_USER);
    let message = message_lines.join("\n").trim_end().to_string();

    Ok(ParsedError {
        source,
        line,
        message,
        frame_detail,
    })
}
