//! The wrapper's captured-output buffer: raw bytes plus a bounded,
//! line-oriented cleaned view (§4.2 `output`/`raw_output`).

use std::collections::VecDeque;

use relay_patterns::strip_ansi;

/// Raw output accumulated from the child process, bounded to the last
/// `max_lines` cleaned lines (oldest evicted first) while retaining the
/// unbounded raw byte buffer the parser restarts against (§9
/// "String-scanning PTY buffer": parsing is pure over the raw view, so the
/// same raw prefix always yields the same events).
pub struct OutputBuffer {
    raw: String,
    lines: VecDeque<String>,
    max_lines: usize,
}

impl OutputBuffer {
    pub fn new(max_lines: usize) -> Self {
        Self {
            raw: String::new(),
            lines: VecDeque::new(),
            max_lines,
        }
    }

    /// Appends a chunk of raw PTY output, re-deriving the cleaned line
    /// buffer from the full raw history so parsing stays pure and
    /// restartable.
    pub fn push(&mut self, chunk: &str) {
        self.raw.push_str(chunk);
        let cleaned = strip_ansi(&self.raw);
        self.lines = cleaned.lines().map(str::to_string).collect();
        while self.lines.len() > self.max_lines {
            self.lines.pop_front();
        }
    }

    /// The cleaned view used by the outbound parser.
    pub fn cleaned(&self) -> String {
        self.lines.iter().cloned().collect::<Vec<_>>().join("\n")
    }

    /// The last `limit` cleaned lines, or all of them if `limit` is `None`.
    pub fn output(&self, limit: Option<usize>) -> Vec<String> {
        match limit {
            Some(n) => self
                .lines
                .iter()
                .rev()
                .take(n)
                .rev()
                .cloned()
                .collect(),
            None => self.lines.iter().cloned().collect(),
        }
    }

    /// The raw, unstripped byte history.
    pub fn raw_output(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_strips_ansi_and_splits_lines() {
        let mut buf = OutputBuffer::new(10);
        buf.push("\x1b[31mhello\x1b[0m\nworld\n");
        assert_eq!(buf.output(None), vec!["hello", "world"]);
    }

    #[test]
    fn eviction_keeps_only_max_lines() {
        let mut buf = OutputBuffer::new(3);
        for i in 0..10 {
            buf.push(&format!("line{i}\n"));
        }
        let lines = buf.output(None);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines.last().unwrap(), "line9");
    }

    #[test]
    fn output_limit_returns_most_recent() {
        let mut buf = OutputBuffer::new(100);
        for i in 0..5 {
            buf.push(&format!("line{i}\n"));
        }
        assert_eq!(buf.output(Some(2)), vec!["line3", "line4"]);
    }
}
