use std::collections::{HashSet, VecDeque};
use std::io::{IsTerminal, Write};

use chrono::DateTime;
use tail_api::{QueryNotice, QueryRecord, QueryRenderer, TailRenderer};

const CLEAR: &str = "\x1b[2J\x1b[H";

// ═══════════════════════════════════════════════════════════════
//  Tail
// ═══════════════════════════════════════════════════════════════

/// Draws the tail window.
///
/// On a terminal the screen is redrawn under a status header on every
/// frame and every status change. Otherwise only lines not yet written are
/// appended, oldest first, and status changes go to the log.
pub struct TerminalTail<W> {
    out: W,
    tty: bool,
    status: String,
    /// Last window, kept for status redraws on a terminal.
    frame: Vec<String>,
    /// `received` of the last render.
    written: u64,
}

impl TerminalTail<std::io::Stdout> {
    pub fn stdout() -> Self {
        let out = std::io::stdout();
        let tty = out.is_terminal();
        Self::new(out, tty)
    }
}

impl<W: Write> TerminalTail<W> {
    pub fn new(out: W, tty: bool) -> Self {
        Self {
            out,
            tty,
            status: String::new(),
            frame: Vec::new(),
            written: 0,
        }
    }

    fn redraw(&mut self) -> std::io::Result<()> {
        write!(self.out, "{CLEAR}[{}]\n\n", self.status)?;
        for line in &self.frame {
            writeln!(self.out, "{line}")?;
        }
        self.out.flush()
    }

    /// Lines evicted before they were drawn are gone; the rest is written.
    fn append(&mut self, lines: &[String], received: u64) -> std::io::Result<()> {
        let new = received.saturating_sub(self.written);
        let fresh = new.min(lines.len() as u64) as usize;
        if new > fresh as u64 {
            tracing::warn!(skipped = new - fresh as u64, "lines evicted before they were written");
        }
        for line in lines[..fresh].iter().rev() {
            writeln!(self.out, "{line}")?;
        }
        self.out.flush()
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> TailRenderer for TerminalTail<W> {
    fn render(&mut self, lines: &[String], received: u64) {
        let result = if self.tty {
            self.frame = lines.to_vec();
            self.redraw()
        } else {
            self.append(lines, received)
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "write failed");
        }
        self.written = self.written.max(received);
    }

    fn status(&mut self, status: &str) {
        self.status = status.to_string();
        if !self.tty {
            tracing::info!(status, "tail");
        } else if let Err(e) = self.redraw() {
            tracing::warn!(error = %e, "write failed");
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Query
// ═══════════════════════════════════════════════════════════════

/// `YYYY-MM-DD HH:MM:SS` in UTC; raw seconds when out of range.
pub fn format_timestamp(secs: i64) -> String {
    match DateTime::from_timestamp(secs, 0) {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => secs.to_string(),
    }
}

pub fn format_row(record: &QueryRecord) -> String {
    format!(
        "{}  {:<12}  {:<16}  {:<16}  {}",
        format_timestamp(record.timestamp()),
        record.value.queue.as_deref().unwrap_or("-"),
        record.kind().as_str(),
        record.value.key.as_deref().unwrap_or("-"),
        record.text(),
    )
}

const HEADER: &str = "TIMESTAMP            QUEUE         TYPE              KEY               VALUE";

type RowId = (String, i64);

/// Rows already printed, oldest evicted first once `capacity` is reached.
struct SeenRows {
    ids: HashSet<RowId>,
    order: VecDeque<RowId>,
    capacity: usize,
}

impl SeenRows {
    fn new(capacity: usize) -> Self {
        Self {
            ids: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// `true` if the row was not seen yet.
    fn insert(&mut self, id: RowId) -> bool {
        if !self.ids.insert(id.clone()) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.ids.remove(&old);
            }
        }
        true
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.order.len()
    }
}

/// Prints query results as a table; keys one per line. Errors reported by
/// the server are printed verbatim.
pub struct TerminalQuery<W> {
    out: W,
    tty: bool,
    header: bool,
    seen: SeenRows,
}

impl TerminalQuery<std::io::Stdout> {
    /// `max_rows` bounds the memory used to skip already printed rows.
    pub fn stdout(max_rows: usize) -> Self {
        let out = std::io::stdout();
        let tty = out.is_terminal();
        Self::new(out, tty, max_rows)
    }
}

impl<W: Write> TerminalQuery<W> {
    pub fn new(out: W, tty: bool, max_rows: usize) -> Self {
        Self {
            out,
            tty,
            header: false,
            seen: SeenRows::new(max_rows),
        }
    }

    fn write_rows(&mut self, rows: &[QueryRecord]) -> std::io::Result<()> {
        if self.tty {
            write!(self.out, "{CLEAR}{HEADER}\n")?;
            for row in rows {
                writeln!(self.out, "{}", format_row(row))?;
            }
        } else {
            if !self.header && !rows.is_empty() {
                writeln!(self.out, "{HEADER}")?;
                self.header = true;
            }
            for row in rows {
                if self.seen.insert((row.key.clone(), row.timestamp())) {
                    writeln!(self.out, "{}", format_row(row))?;
                }
            }
        }
        self.out.flush()
    }

    fn write_keys(&mut self, keys: &[String]) -> std::io::Result<()> {
        let mut keys = keys.to_vec();
        keys.sort();
        if self.tty {
            write!(self.out, "{CLEAR}")?;
        }
        for key in &keys {
            writeln!(self.out, "{key}")?;
        }
        self.out.flush()
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> QueryRenderer for TerminalQuery<W> {
    fn rows(&mut self, rows: &[QueryRecord]) {
        if let Err(e) = self.write_rows(rows) {
            tracing::warn!(error = %e, "write failed");
        }
    }

    fn keys(&mut self, keys: &[String]) {
        if let Err(e) = self.write_keys(keys) {
            tracing::warn!(error = %e, "write failed");
        }
    }

    fn notice(&mut self, notice: &QueryNotice) {
        if !matches!(notice, QueryNotice::NoResults) {
            tracing::debug!(%notice, "query failed");
        }
        if let Err(e) = writeln!(self.out, "{notice}").and_then(|_| self.out.flush()) {
            tracing::warn!(error = %e, "write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use tail_api::EventValue;

    use super::*;

    fn text(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn piped_tail_appends_only_new_lines_in_order() {
        let mut tail = TerminalTail::new(Vec::new(), false);
        tail.render(&lines(&["2", "1"]), 2);
        tail.render(&lines(&["4", "3", "2"]), 4);
        tail.render(&lines(&["4", "3", "2"]), 4);
        assert_eq!(text(tail.into_inner()), "1\n2\n3\n4\n");
    }

    #[test]
    fn piped_tail_writes_repeated_lines() {
        let mut tail = TerminalTail::new(Vec::new(), false);
        tail.render(&lines(&["x"]), 1);
        tail.render(&lines(&["x", "x"]), 2);
        tail.render(&lines(&["x", "x", "x"]), 4);
        assert_eq!(text(tail.into_inner()), "x\nx\nx\nx\n");
    }

    #[test]
    fn terminal_tail_redraws_on_frame_and_status() {
        let mut tail = TerminalTail::new(Vec::new(), true);
        tail.render(&lines(&["b", "a"]), 2);
        tail.status("paused");
        assert_eq!(
            text(tail.into_inner()),
            format!("{CLEAR}[]\n\nb\na\n{CLEAR}[paused]\n\nb\na\n")
        );
    }

    fn record(key: &str, ts: i64) -> QueryRecord {
        let value: EventValue = serde_json::from_value(serde_json::json!({
            "timestamp": ts,
            "type": "TASK_BEGIN",
            "queue": "build",
            "key": "t-1",
        }))
        .unwrap();
        QueryRecord {
            key: key.into(),
            value,
        }
    }

    #[test]
    fn timestamps_are_utc() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00");
        assert_eq!(format_timestamp(1_700_000_000), "2023-11-14 22:13:20");
    }

    #[test]
    fn piped_query_prints_each_row_once() {
        let mut q = TerminalQuery::new(Vec::new(), false, 100);
        q.rows(&[record("1", 10)]);
        q.rows(&[record("1", 10), record("2", 20)]);
        q.notice(&QueryNotice::NoResults);
        let out = text(q.into_inner());
        let body: Vec<&str> = out.lines().collect();
        assert_eq!(body.len(), 4);
        assert_eq!(body[0], HEADER);
        assert!(body[1].starts_with("1970-01-01 00:00:10  build"));
        assert!(body[2].starts_with("1970-01-01 00:00:20"));
        assert_eq!(body[3], "- no results -");
    }

    #[test]
    fn server_errors_are_printed_verbatim() {
        let mut q = TerminalQuery::new(Vec::new(), false, 100);
        q.notice(&QueryNotice::ServerError("bad index".into()));
        q.notice(&QueryNotice::ProtocolError("eof".into()));
        assert_eq!(text(q.into_inner()), "bad index\nbad response: eof\n");
    }

    #[test]
    fn printed_rows_memory_is_bounded() {
        let mut q = TerminalQuery::new(Vec::new(), false, 2);
        q.rows(&[record("1", 10), record("2", 20), record("3", 30)]);
        assert_eq!(q.seen.len(), 2);
        // "1" was forgotten, so it prints again; "3" is still known.
        q.rows(&[record("1", 10), record("3", 30)]);
        let out = text(q.into_inner());
        assert_eq!(out.lines().count(), 5);
    }

    #[test]
    fn keys_are_sorted() {
        let mut q = TerminalQuery::new(Vec::new(), false, 100);
        q.keys(&lines(&["b", "a", "c"]));
        assert_eq!(text(q.into_inner()), "a\nb\nc\n");
    }
}
