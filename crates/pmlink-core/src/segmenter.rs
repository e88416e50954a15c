// ── Diagnostic dump segmentation ──
//
// `npmx errlog get` prints a block like
//
//   RSTCAUSE:
//     SHIPMODE
//   CHARGER_ERROR:
//     DIE_TEMP_HIGH
//
// A header is an upper-case token followed by a colon on its own line.
// Every line up to the next header belongs to that section.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{ErrorLogKind, ErrorLogSection};

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<token>[A-Z_]+):$").expect("header pattern is valid"));

/// Incremental dump segmenter.
///
/// Feed lines one at a time; a section is returned when the next header
/// (or [`finish`](Self::finish)) closes it. Sections under headers with no
/// known kind are consumed but never returned.
#[derive(Debug, Default)]
pub struct ErrorLogSegmenter {
    open: Option<OpenSection>,
}

#[derive(Debug)]
struct OpenSection {
    kind: Option<ErrorLogKind>,
    lines: Vec<String>,
}

impl ErrorLogSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line, returning the section it closed, if any.
    pub fn feed(&mut self, line: &str) -> Option<ErrorLogSection> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        if let Some(token) = header_token(trimmed) {
            let closed = self.close();
            let kind = ErrorLogKind::from_header(token);
            if kind.is_none() {
                tracing::debug!(header = token, "skipping unknown error-log section");
            }
            self.open = Some(OpenSection {
                kind,
                lines: Vec::new(),
            });
            return closed;
        }

        match self.open.as_mut() {
            Some(open) => open.lines.push(trimmed.to_owned()),
            None => tracing::trace!(line = trimmed, "error-log data before first header"),
        }
        None
    }

    /// Close the open section at end of input.
    pub fn finish(&mut self) -> Option<ErrorLogSection> {
        self.close()
    }

    fn close(&mut self) -> Option<ErrorLogSection> {
        let open = self.open.take()?;
        Some(ErrorLogSection {
            kind: open.kind?,
            lines: open.lines,
        })
    }
}

/// Segment a complete dump.
pub fn segment(text: &str) -> Vec<ErrorLogSection> {
    let mut segmenter = ErrorLogSegmenter::new();
    let mut sections: Vec<ErrorLogSection> = text.lines().filter_map(|line| segmenter.feed(line)).collect();
    sections.extend(segmenter.finish());
    sections
}

fn header_token(trimmed: &str) -> Option<&str> {
    HEADER_RE
        .captures(trimmed)
        .and_then(|caps| caps.name("token"))
        .as_ref()
        .map(regex::Match::as_str)
}
