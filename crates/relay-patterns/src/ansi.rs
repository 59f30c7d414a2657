//! ANSI escape stripping for the wrapper's cleaned-output view.

use once_cell::sync::Lazy;
use regex::Regex;

/// CSI sequences: ESC `[` ... final byte in `@`..=`~`.
static CSI: Lazy<Regex> = Lazy::new(|| Regex::new(r"\x1b\[[0-9;:?]*[ -/]*[@-~]").unwrap());

/// OSC sequences: ESC `]` ... terminated by BEL or ST (`ESC \`).
static OSC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\x1b\][^\x07]*(\x07|\x1b\\)").unwrap());

/// A CSI cursor-forward sequence (`ESC [ <n> C`), captured separately so it
/// can be rendered as spaces instead of dropped outright.
static CURSOR_FORWARD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\x1b\[(\d*)C").unwrap());

/// An orphaned CSI sequence that lost its leading ESC byte (seen behind some
/// terminal multiplexers): a bare `[` followed by parameter bytes and a
/// CSI final byte, at the start of a line.
static ORPHAN_CSI: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\[[0-9;:?]*[ -/]*[@-~]").unwrap());

/// Strips ANSI control sequences from `raw`, producing the cleaned view the
/// outbound parser runs against.
///
/// Cursor-forward sequences (`ESC[<n>C`) are replaced with `n` literal spaces
/// to preserve column alignment of any embedded `->relay:` command; all other
/// CSI/OSC sequences are dropped entirely. Carriage returns are dropped (but
/// not as part of a CRLF pair, which collapses to a single `\n`). Legitimate
/// bracketed text such as `[Agent Relay]` or `[thread:xyz]` is left
/// untouched — it never matches the CSI/OSC grammar because it isn't
/// preceded by an escape byte and isn't anchored at line start.
pub fn strip_ansi(raw: &str) -> String {
    let normalized = raw.replace("\r\n", "\n");

    let with_cursor_spaces = CURSOR_FORWARD.replace_all(&normalized, |caps: &regex::Captures| {
        let n: usize = caps[1].parse().unwrap_or(1).max(1);
        " ".repeat(n)
    });

    let without_osc = OSC.replace_all(&with_cursor_spaces, "");
    let without_csi = CSI.replace_all(&without_osc, "");
    let without_orphans = ORPHAN_CSI.replace_all(&without_csi, "");

    without_orphans.replace('\r', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_plain_csi_sequence() {
        let raw = "\x1b[31mred text\x1b[0m";
        assert_eq!(strip_ansi(raw), "red text");
    }

    #[test]
    fn cursor_forward_becomes_spaces() {
        let raw = "a\x1b[3Cb";
        assert_eq!(strip_ansi(raw), "a   b");
    }

    #[test]
    fn drops_lone_cr_but_not_crlf() {
        assert_eq!(strip_ansi("a\r\nb"), "a\nb");
        assert_eq!(strip_ansi("a\rb"), "ab");
    }

    #[test]
    fn preserves_legitimate_bracketed_text() {
        assert_eq!(strip_ansi("[Agent Relay] hello"), "[Agent Relay] hello");
        assert_eq!(strip_ansi("[thread:xyz] body"), "[thread:xyz] body");
    }

    #[test]
    fn drops_orphan_csi_at_line_start() {
        let raw = "[1;32mok\nnormal";
        assert_eq!(strip_ansi(raw), "ok\nnormal");
    }

    #[test]
    fn drops_osc_title_sequence() {
        let raw = "\x1b]0;my title\x07rest";
        assert_eq!(strip_ansi(raw), "rest");
    }
}
