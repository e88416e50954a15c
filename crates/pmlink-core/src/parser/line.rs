// ── Device log line grammar ──
//
// Zephyr's default log format:
//
//   [HH:MM:SS.mmm,uuu] <lvl> module_tag: message
//
// The microsecond part is optional and ignored. Anything that does not fit
// is not a log line and is left for the command correlator.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{LogLevel, LoggingEvent};

static LOG_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\[(?P<stamp>[^\]]*)\]\s*<(?P<level>[^>]*)>\s*(?P<module>[^\s:]+):(?P<message>.*)$")
        .expect("log line pattern is valid")
});

// Hours are two digits: the device counter wraps at 99:59:59.999.
static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<h>\d{2}):(?P<m>\d{2}):(?P<s>\d{2})\.(?P<ms>\d{3})(?:,\d+)?$")
        .expect("timestamp pattern is valid")
});

/// Borrowed view of a parsed log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedLine<'a> {
    pub timestamp: u64,
    pub level: LogLevel,
    pub module: &'a str,
    pub message: &'a str,
}

impl ParsedLine<'_> {
    pub fn to_event(&self) -> LoggingEvent {
        LoggingEvent {
            timestamp: self.timestamp,
            level: self.level,
            module: self.module.to_owned(),
            message: self.message.to_owned(),
        }
    }
}

/// Split a raw line into timestamp, level, module tag and message body.
///
/// Returns `None` for anything that is not a well-formed log line.
pub fn parse_line(raw: &str) -> Option<ParsedLine<'_>> {
    let caps = LOG_LINE_RE.captures(raw)?;
    let timestamp = parse_timestamp(caps.name("stamp")?.as_str())?;

    Some(ParsedLine {
        timestamp,
        level: LogLevel::from_tag(caps.name("level")?.as_str()),
        module: caps.name("module")?.as_str(),
        message: caps.name("message")?.as_str().trim(),
    })
}

/// Parse `HH:MM:SS.mmm[,uuu]` into milliseconds.
pub fn parse_timestamp(stamp: &str) -> Option<u64> {
    let caps = TIMESTAMP_RE.captures(stamp)?;
    let field = |name: &str| caps.name(name)?.as_str().parse::<u64>().ok();

    let hours = field("h")?;
    let minutes = field("m")?;
    let seconds = field("s")?;
    let millis = field("ms")?;
    if minutes >= 60 || seconds >= 60 {
        return None;
    }

    hours
        .checked_mul(3_600_000)?
        .checked_add(minutes * 60_000 + seconds * 1000 + millis)
}

/// Whether a line is an indented continuation of the preceding log line.
pub fn is_continuation(raw: &str) -> bool {
    raw.starts_with([' ', '\t']) && !raw.trim().is_empty()
}

// ── Tests ────────────────────────────────────────────────────────────
