// ── Command/response correlation ──
//
// The device answers commands in the order it received them, interleaved
// with unsolicited log output. Outstanding requests form a FIFO queue and
// every response line is offered to the head. The correlator never sleeps:
// the ingest task feeds it lines and the current time, and asks for the
// next deadline to wake up on.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::{CommandRequest, CommandResult, ResponseSender, ResponseShape, Uniqueness};
use crate::error::CoreError;

/// What happened to a submitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Submission {
    /// Registered; the caller must transmit the command.
    Transmit,
    /// Attached to an identical outstanding request.
    Joined,
    /// Refused as a duplicate. The waiter has already been told.
    Rejected,
}

/// A request that reached its terminal result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Resolution {
    pub id: u64,
    pub command: String,
    pub result: CommandResult,
    pub error_logs: bool,
}

#[derive(Debug)]
struct PendingEntry {
    id: u64,
    command: String,
    shape: ResponseShape,
    deadline: Instant,
    waiters: Vec<ResponseSender>,
    error_logs: bool,
    /// The device has echoed this command behind its prompt.
    echoed: bool,
    buffer: Vec<String>,
    settle_at: Option<Instant>,
}

impl PendingEntry {
    fn dump_text(&self) -> Option<String> {
        (!self.buffer.is_empty()).then(|| self.buffer.join("\n"))
    }

    fn resolve(self, result: CommandResult) -> Resolution {
        for waiter in self.waiters {
            // The caller may have stopped waiting; that is fine.
            let _ = waiter.send(Ok(result.clone()));
        }
        Resolution {
            id: self.id,
            command: self.command,
            result,
            error_logs: self.error_logs,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Correlator {
    queue: VecDeque<PendingEntry>,
    default_timeout: Duration,
    dump_settle: Duration,
    next_id: u64,
}

impl Correlator {
    pub fn new(default_timeout: Duration, dump_settle: Duration) -> Self {
        Self {
            queue: VecDeque::new(),
            default_timeout,
            dump_settle,
            next_id: 1,
        }
    }

    /// Register a request, applying its uniqueness policy.
    pub fn submit(
        &mut self,
        request: &CommandRequest,
        waiter: Option<ResponseSender>,
        error_logs: bool,
        now: Instant,
    ) -> Submission {
        if request.uniqueness != Uniqueness::NotUnique {
            if let Some(existing) = self.queue.iter_mut().find(|e| e.command == request.command) {
                if request.uniqueness == Uniqueness::RejectDuplicate {
                    debug!(command = %request.command, "rejecting duplicate command");
                    if let Some(waiter) = waiter {
                        let _ = waiter.send(Err(CoreError::DuplicateCommand {
                            command: request.command.clone(),
                        }));
                    }
                    return Submission::Rejected;
                }

                debug!(command = %request.command, id = existing.id, "joining in-flight command");
                existing.waiters.extend(waiter);
                existing.error_logs |= error_logs;
                return Submission::Joined;
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        let timeout = request.timeout.unwrap_or(self.default_timeout);

        debug!(command = %request.command, id, ?timeout, "command registered");
        self.queue.push_back(PendingEntry {
            id,
            command: request.command.clone(),
            shape: request.shape.clone(),
            deadline: now + timeout,
            waiters: waiter.into_iter().collect(),
            error_logs,
            echoed: false,
            buffer: Vec::new(),
            settle_at: None,
        });
        Submission::Transmit
    }

    /// Offer a response line to the oldest outstanding request.
    pub fn on_response_line(&mut self, line: &str, now: Instant) -> Option<Resolution> {
        let Some(head) = self.queue.front_mut() else {
            debug!(line, "response line with no command outstanding");
            return None;
        };

        let trimmed = line.trim();
        if let Some(text) = strip_error_prefix(trimmed) {
            let text = text.to_owned();
            return self.resolve_front(CommandResult::Error(text));
        }

        match &head.shape {
            ResponseShape::Line { expect_prefix } => {
                let matches = expect_prefix
                    .as_deref()
                    .is_none_or(|prefix| trimmed.starts_with(prefix));
                if matches {
                    self.resolve_front(CommandResult::Success(trimmed.to_owned()))
                } else {
                    debug!(id = head.id, line = trimmed, "skipping line not matching expected prefix");
                    None
                }
            }
            ResponseShape::Dump => {
                head.buffer.push(line.to_owned());
                head.settle_at = Some(now + self.dump_settle);
                None
            }
        }
    }

    /// Handle a prompt line. `echo` is the text that followed the prompt.
    ///
    /// The first echo seen while a request is at the head is that request's
    /// own. Any later prompt, or a prompt after a dump has started, ends the
    /// head: a dump succeeds with whatever it buffered, a plain line request
    /// succeeds empty, and a line request waiting on a prefix fails. An echo
    /// that ended the head then belongs to the next request in line.
    pub fn on_prompt(&mut self, echo: &str) -> Option<Resolution> {
        let echo = echo.trim();
        let head = self.queue.front_mut()?;

        if !head.echoed && head.buffer.is_empty() {
            // A bare prompt before the echo is left over from earlier output.
            head.echoed = !echo.is_empty();
            return None;
        }

        let result = match &head.shape {
            ResponseShape::Dump => CommandResult::Success(head.buffer.join("\n")),
            ResponseShape::Line { expect_prefix: None } => CommandResult::Success(String::new()),
            ResponseShape::Line {
                expect_prefix: Some(prefix),
            } => CommandResult::Error(format!("no response starting with '{prefix}'")),
        };
        let resolution = self.resolve_front(result);

        if !echo.is_empty() {
            if let Some(next) = self.queue.front_mut() {
                next.echoed = true;
            }
        }
        resolution
    }

    /// Resolve every request whose dump settled or whose deadline passed.
    pub fn poll_expired(&mut self, now: Instant) -> Vec<Resolution> {
        let mut resolved = Vec::new();

        let settled = self
            .queue
            .front()
            .is_some_and(|head| head.settle_at.is_some_and(|at| at <= now));
        if settled {
            if let Some(text) = self.queue.front().and_then(PendingEntry::dump_text) {
                resolved.extend(self.resolve_front(CommandResult::Success(text)));
            }
        }

        let mut index = 0;
        while index < self.queue.len() {
            if self.queue.get(index).is_some_and(|e| e.deadline <= now) {
                if let Some(entry) = self.queue.remove(index) {
                    let result = match entry.dump_text() {
                        Some(text) => CommandResult::Success(text),
                        None => {
                            debug!(id = entry.id, command = %entry.command, "command timed out");
                            CommandResult::Timeout
                        }
                    };
                    resolved.push(entry.resolve(result));
                }
            } else {
                index += 1;
            }
        }

        resolved
    }

    /// The earliest instant at which [`poll_expired`](Self::poll_expired)
    /// could resolve something.
    pub fn next_deadline(&self) -> Option<Instant> {
        let settle = self.queue.front().and_then(|head| head.settle_at);
        self.queue
            .iter()
            .map(|e| e.deadline)
            .chain(settle)
            .min()
    }

    /// Resolve the head dump with what it buffered so far, if it started.
    ///
    /// Used when the link closes: a dump cut short still carries data.
    pub fn finish_dump(&mut self) -> Option<Resolution> {
        let text = self.queue.front().filter(|head| head.shape == ResponseShape::Dump)?.dump_text()?;
        self.resolve_front(CommandResult::Success(text))
    }

    /// Whether the head request is in the middle of a dump.
    pub fn collecting(&self) -> bool {
        self.queue
            .front()
            .is_some_and(|head| head.shape == ResponseShape::Dump && !head.buffer.is_empty())
    }

    pub fn outstanding(&self) -> usize {
        self.queue.len()
    }

    /// Drop every outstanding request without resolving it.
    ///
    /// Waiters observe a closed channel.
    pub fn abandon_all(&mut self) {
        if !self.queue.is_empty() {
            debug!(count = self.queue.len(), "abandoning outstanding commands");
        }
        self.queue.clear();
    }

    fn resolve_front(&mut self, result: CommandResult) -> Option<Resolution> {
        let entry = self.queue.pop_front()?;
        debug!(id = entry.id, command = %entry.command, ?result, "command resolved");
        Some(entry.resolve(result))
    }
}

/// `error: text` (any case) → `text`.
fn strip_error_prefix(line: &str) -> Option<&str> {
    let head = line.get(..6)?;
    head.eq_ignore_ascii_case("error:")
        .then(|| line.get(6..).unwrap_or_default().trim())
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use tokio::sync::oneshot;

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);
    const SETTLE: Duration = Duration::from_millis(250);

    fn correlator() -> Correlator {
        Correlator::new(TIMEOUT, SETTLE)
    }

    fn waiter() -> (ResponseSender, oneshot::Receiver<Result<CommandResult, CoreError>>) {
        oneshot::channel()
    }

    fn take(rx: &mut oneshot::Receiver<Result<CommandResult, CoreError>>) -> CommandResult {
        rx.try_recv().unwrap().unwrap()
    }

    #[test]
    fn first_line_resolves_line_request() {
        let now = Instant::now();
        let mut c = correlator();
        let (tx, mut rx) = waiter();

        assert_eq!(c.submit(&CommandRequest::new("npmx charger status get"), Some(tx), false, now), Submission::Transmit);
        let resolution = c.on_response_line("Value: 1", now).unwrap();

        assert_eq!(resolution.result, CommandResult::Success("Value: 1".into()));
        assert_eq!(take(&mut rx), CommandResult::Success("Value: 1".into()));
        assert_eq!(c.outstanding(), 0);
    }

    #[test]
    fn error_prefix_is_case_insensitive() {
        let now = Instant::now();
        let mut c = correlator();
        let (tx, mut rx) = waiter();

        c.submit(&CommandRequest::new("npmx bogus"), Some(tx), false, now);
        c.on_response_line("ERROR: invalid argument", now);

        assert_eq!(take(&mut rx), CommandResult::Error("invalid argument".into()));
    }

    #[test]
    fn responses_go_to_oldest_request() {
        let now = Instant::now();
        let mut c = correlator();
        let (tx1, mut rx1) = waiter();
        let (tx2, mut rx2) = waiter();

        c.submit(&CommandRequest::new("first"), Some(tx1), false, now);
        c.submit(&CommandRequest::new("second"), Some(tx2), false, now);
        c.on_response_line("one", now);
        c.on_response_line("two", now);

        assert_eq!(take(&mut rx1), CommandResult::Success("one".into()));
        assert_eq!(take(&mut rx2), CommandResult::Success("two".into()));
    }

    #[test]
    fn expected_prefix_skips_chatter() {
        let now = Instant::now();
        let mut c = correlator();
        let (tx, mut rx) = waiter();

        c.submit(&CommandRequest::new("npmx adc meas").expect_prefix("Value:"), Some(tx), false, now);
        assert!(c.on_response_line("booting...", now).is_none());
        assert!(c.on_response_line("Value: 3700 mV", now).is_some());

        assert_eq!(take(&mut rx), CommandResult::Success("Value: 3700 mV".into()));
    }

    #[test]
    fn unsolicited_lines_are_dropped() {
        let mut c = correlator();
        assert!(c.on_response_line("nobody asked", Instant::now()).is_none());
    }

    #[test]
    fn join_policy_transmits_once_and_shares_result() {
        let now = Instant::now();
        let mut c = correlator();
        let (tx1, mut rx1) = waiter();
        let (tx2, mut rx2) = waiter();
        let request = CommandRequest::new("npmx errlog get").unique(Uniqueness::JoinInFlight);

        assert_eq!(c.submit(&request, Some(tx1), false, now), Submission::Transmit);
        assert_eq!(c.submit(&request, Some(tx2), false, now), Submission::Joined);
        assert_eq!(c.outstanding(), 1);

        c.on_response_line("done", now);
        assert_eq!(take(&mut rx1), CommandResult::Success("done".into()));
        assert_eq!(take(&mut rx2), CommandResult::Success("done".into()));
    }

    #[test]
    fn reject_policy_fails_duplicate_immediately() {
        let now = Instant::now();
        let mut c = correlator();
        let (tx1, _rx1) = waiter();
        let (tx2, mut rx2) = waiter();
        let request = CommandRequest::new("npmx errlog get").unique(Uniqueness::RejectDuplicate);

        assert_eq!(c.submit(&request, Some(tx1), false, now), Submission::Transmit);
        assert_eq!(c.submit(&request, Some(tx2), false, now), Submission::Rejected);

        let err = rx2.try_recv().unwrap().unwrap_err();
        assert!(matches!(err, CoreError::DuplicateCommand { ref command } if command == "npmx errlog get"));
        assert_eq!(c.outstanding(), 1);
    }

    #[test]
    fn non_unique_duplicates_both_register() {
        let now = Instant::now();
        let mut c = correlator();
        let request = CommandRequest::new("help");
        assert_eq!(c.submit(&request, None, false, now), Submission::Transmit);
        assert_eq!(c.submit(&request, None, false, now), Submission::Transmit);
        assert_eq!(c.outstanding(), 2);
    }

    #[test]
    fn dump_resolves_on_prompt() {
        let now = Instant::now();
        let mut c = correlator();
        let (tx, mut rx) = waiter();

        c.submit(&CommandRequest::new("npmx errlog get").dump(), Some(tx), true, now);
        // The echo of the command itself does not close an empty dump.
        assert!(c.on_prompt(" npmx errlog get").is_none());
        c.on_response_line("RSTCAUSE:", now);
        c.on_response_line("  SHIPMODE", now);
        assert!(c.collecting());

        let resolution = c.on_prompt("").unwrap();
        assert!(resolution.error_logs);
        assert_eq!(take(&mut rx), CommandResult::Success("RSTCAUSE:\n  SHIPMODE".into()));
        assert!(!c.collecting());
    }

    #[test]
    fn empty_dump_ends_at_next_echo() {
        let now = Instant::now();
        let mut c = correlator();
        let (dump_tx, mut dump_rx) = waiter();
        let (line_tx, mut line_rx) = waiter();

        c.submit(&CommandRequest::new("npmx errlog get").dump(), Some(dump_tx), false, now);
        c.submit(&CommandRequest::new("npmx charger status get"), Some(line_tx), false, now);

        assert!(c.on_prompt(" npmx errlog get").is_none());
        let resolution = c.on_prompt(" npmx charger status get").unwrap();
        assert_eq!(resolution.command, "npmx errlog get");
        assert_eq!(take(&mut dump_rx), CommandResult::Success(String::new()));

        c.on_response_line("Value: 1", now);
        assert_eq!(take(&mut line_rx), CommandResult::Success("Value: 1".into()));
    }

    #[test]
    fn bare_prompt_before_echo_is_ignored() {
        let now = Instant::now();
        let mut c = correlator();
        let (tx, mut rx) = waiter();

        c.submit(&CommandRequest::new("npmx errlog get").dump(), Some(tx), false, now);
        assert!(c.on_prompt("").is_none());
        assert!(c.on_prompt(" npmx errlog get").is_none());
        c.on_response_line("RSTCAUSE:", now);
        c.on_prompt("");

        assert_eq!(take(&mut rx), CommandResult::Success("RSTCAUSE:".into()));
    }

    #[test]
    fn silent_line_request_ends_at_next_prompt() {
        let now = Instant::now();
        let mut c = correlator();
        let (plain_tx, mut plain_rx) = waiter();
        let (prefixed_tx, mut prefixed_rx) = waiter();

        c.submit(&CommandRequest::new("npmx ship mode"), Some(plain_tx), false, now);
        c.on_prompt(" npmx ship mode");
        c.on_prompt("");
        assert_eq!(take(&mut plain_rx), CommandResult::Success(String::new()));

        c.submit(&CommandRequest::new("npmx adc meas").expect_prefix("Value:"), Some(prefixed_tx), false, now);
        c.on_prompt(" npmx adc meas");
        c.on_response_line("booting...", now);
        c.on_prompt("");
        assert_eq!(
            take(&mut prefixed_rx),
            CommandResult::Error("no response starting with 'Value:'".into())
        );
    }

    #[test]
    fn dump_resolves_after_settle() {
        let start = Instant::now();
        let mut c = correlator();
        let (tx, mut rx) = waiter();

        c.submit(&CommandRequest::new("npmx errlog get").dump(), Some(tx), false, start);
        c.on_response_line("RSTCAUSE:", start);
        assert_eq!(c.next_deadline(), Some(start + SETTLE));

        assert!(c.poll_expired(start + SETTLE / 2).is_empty());
        let resolved = c.poll_expired(start + SETTLE);
        assert_eq!(resolved.len(), 1);
        assert_eq!(take(&mut rx), CommandResult::Success("RSTCAUSE:".into()));
    }

    #[test]
    fn timeout_resolves_and_late_line_is_ignored() {
        let start = Instant::now();
        let mut c = correlator();
        let (tx, mut rx) = waiter();

        c.submit(&CommandRequest::new("npmx ship reset"), Some(tx), false, start);
        assert_eq!(c.next_deadline(), Some(start + TIMEOUT));

        let resolved = c.poll_expired(start + TIMEOUT);
        assert_eq!(resolved.len(), 1);
        assert_eq!(take(&mut rx), CommandResult::Timeout);

        assert!(c.on_response_line("late", start + TIMEOUT).is_none());
        assert_eq!(c.next_deadline(), None);
    }

    #[test]
    fn timeouts_are_independent() {
        let start = Instant::now();
        let mut c = correlator();
        let (tx1, mut rx1) = waiter();
        let (tx2, mut rx2) = waiter();

        c.submit(&CommandRequest::new("slow").timeout(Duration::from_secs(10)), Some(tx1), false, start);
        c.submit(&CommandRequest::new("fast").timeout(Duration::from_secs(1)), Some(tx2), false, start);

        // The second request expires while the first is still at the head.
        let resolved = c.poll_expired(start + Duration::from_secs(1));
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].command, "fast");
        assert_eq!(take(&mut rx2), CommandResult::Timeout);

        c.on_response_line("slow answer", start + Duration::from_secs(2));
        assert_eq!(take(&mut rx1), CommandResult::Success("slow answer".into()));
    }

    #[test]
    fn dump_with_content_succeeds_at_deadline() {
        let start = Instant::now();
        let mut c = Correlator::new(Duration::from_secs(1), Duration::from_secs(10));
        let (tx, mut rx) = waiter();

        c.submit(&CommandRequest::new("npmx errlog get").dump(), Some(tx), false, start);
        c.on_response_line("SENSOR_ERROR:", start);
        c.poll_expired(start + Duration::from_secs(1));

        assert_eq!(take(&mut rx), CommandResult::Success("SENSOR_ERROR:".into()));
    }

    #[test]
    fn finish_dump_only_resolves_started_dumps() {
        let now = Instant::now();
        let mut c = correlator();
        let (tx, mut rx) = waiter();

        c.submit(&CommandRequest::new("npmx errlog get").dump(), Some(tx), true, now);
        assert!(c.finish_dump().is_none());

        c.on_response_line("SENSOR_ERROR:", now);
        let resolution = c.finish_dump().unwrap();
        assert!(resolution.error_logs);
        assert_eq!(take(&mut rx), CommandResult::Success("SENSOR_ERROR:".into()));
    }

    #[test]
    fn abandon_closes_waiters_without_result() {
        let mut c = correlator();
        let (tx, mut rx) = waiter();
        c.submit(&CommandRequest::new("help"), Some(tx), false, Instant::now());

        c.abandon_all();
        assert_eq!(c.outstanding(), 0);
        assert!(matches!(rx.try_recv(), Err(oneshot::error::TryRecvError::Closed)));
    }

    #[test]
    fn error_prefix_parsing() {
        assert_eq!(strip_error_prefix("error: nope"), Some("nope"));
        assert_eq!(strip_error_prefix("Error:"), Some(""));
        assert_eq!(strip_error_prefix("errors happen"), None);
        assert_eq!(strip_error_prefix("err"), None);
    }
}
