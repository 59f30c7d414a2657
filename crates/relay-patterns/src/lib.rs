//! Compiled regex patterns and classifiers shared by the PTY wrapper's
//! outbound parser (§4.1).
//!
//! Everything here is pure and side-effect-free: no I/O, no knowledge of a
//! live wrapper or router. [`PatternSet::compiled`] memoizes compilation so
//! that constructing a set with the same prefixes twice — which happens
//! once per spawned agent — never re-compiles the underlying regexes.

mod ansi;
mod classify;

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;

pub use ansi::strip_ansi;
pub use classify::{is_instructional_text, is_placeholder_target, is_valid_agent_name, should_reject};

/// Default outbound relay prefix.
pub const DEFAULT_RELAY_PREFIX: &str = "->relay:";
/// Default thinking-channel prefix.
pub const DEFAULT_THINKING_PREFIX: &str = "->thinking:";

/// The compiled regex family for one `(relay_prefix, thinking_prefix)` pair.
///
/// Both prefixes are configurable (§6 configuration knobs), so the set is
/// keyed on them rather than hardcoded; most processes only ever construct
/// one set, using the defaults.
#[derive(Debug)]
pub struct PatternSet {
    pub relay_prefix: String,
    pub thinking_prefix: String,
    /// Matches a single-line relay send: optional leading bullet/prompt, the
    /// relay prefix, a non-whitespace target, then the body to end of line.
    pub inline: Regex,
    /// Matches the opening line of a fenced multi-line relay send.
    pub fence_open: Regex,
    /// Same as `inline`, but for the thinking-channel prefix.
    pub inline_thinking: Regex,
    /// Same as `fence_open`, but for the thinking-channel prefix.
    pub fence_open_thinking: Regex,
    /// Matches an unescaped fence-closing marker on its own.
    pub fence_close: Regex,
    /// Matches an escaped prefix occurrence (`\->relay:`), which is literal
    /// text and produces no command.
    pub escaped_prefix: Regex,
    /// Matches `->relay:spawn <Name> <cli> "<task>"`.
    pub spawn: Regex,
    /// Matches `->relay:release <Name>`.
    pub release: Regex,
}

impl PatternSet {
    fn compile(relay_prefix: &str, thinking_prefix: &str) -> Self {
        let relay_esc = regex::escape(relay_prefix);
        let thinking_esc = regex::escape(thinking_prefix);
        // Either prefix introduces a send; they share identical grammar, but
        // the parser needs to know which one matched to pick the envelope
        // kind, so each prefix gets its own pair of compiled patterns.
        let any_prefix = format!("(?:{relay_esc}|{thinking_esc})");

        let inline = Regex::new(&format!(
            r"(?m)^[ \t]*(?:[>•]\s*)?{relay_esc}(\S+)[ \t]+(.+)$"
        ))
        .expect("inline pattern compiles");

        let fence_open = Regex::new(&format!(
            r"(?m)^[ \t]*(?:[>•]\s*)?{relay_esc}(\S+)[ \t]*<<<[ \t]*$"
        ))
        .expect("fence-open pattern compiles");

        let inline_thinking = Regex::new(&format!(
            r"(?m)^[ \t]*(?:[>•]\s*)?{thinking_esc}(\S+)[ \t]+(.+)$"
        ))
        .expect("thinking inline pattern compiles");

        let fence_open_thinking = Regex::new(&format!(
            r"(?m)^[ \t]*(?:[>•]\s*)?{thinking_esc}(\S+)[ \t]*<<<[ \t]*$"
        ))
        .expect("thinking fence-open pattern compiles");

        // An unescaped `>>>` on its own line; a preceding backslash keeps it
        // literal and must not match here.
        let fence_close = Regex::new(r"(?m)^(?:.*[^\\])?>>>[ \t]*$").expect("fence-close pattern compiles");

        let escaped_prefix =
            Regex::new(&format!(r"\\({any_prefix})")).expect("escaped-prefix pattern compiles");

        let spawn = Regex::new(&format!(
            r#"(?m)^[ \t]*{relay_esc}spawn[ \t]+(\S+)[ \t]+(\S+)[ \t]+"([^"]*)"[ \t]*$"#
        ))
        .expect("spawn pattern compiles");

        let release = Regex::new(&format!(r"(?m)^[ \t]*{relay_esc}release[ \t]+(\S+)[ \t]*$"))
            .expect("release pattern compiles");

        Self {
            relay_prefix: relay_prefix.to_string(),
            thinking_prefix: thinking_prefix.to_string(),
            inline,
            fence_open,
            inline_thinking,
            fence_open_thinking,
            fence_close,
            escaped_prefix,
            spawn,
            release,
        }
    }
}

type PatternCache = Mutex<HashMap<(String, String), Arc<PatternSet>>>;
static CACHE: Lazy<PatternCache> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Returns the compiled pattern set for `(relay_prefix, thinking_prefix)`,
/// compiling and caching it on first use. Subsequent calls with the same
/// pair are a cache hit — identical knobs never re-compile regexes.
pub fn compiled(relay_prefix: &str, thinking_prefix: &str) -> Arc<PatternSet> {
    let key = (relay_prefix.to_string(), thinking_prefix.to_string());
    let mut cache = CACHE.lock();
    if let Some(set) = cache.get(&key) {
        return Arc::clone(set);
    }
    let set = Arc::new(PatternSet::compile(relay_prefix, thinking_prefix));
    cache.insert(key, Arc::clone(&set));
    set
}

/// The compiled set for the default prefixes, built lazily on first access.
pub fn default_patterns() -> Arc<PatternSet> {
    compiled(DEFAULT_RELAY_PREFIX, DEFAULT_THINKING_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiled_is_memoized_for_identical_knobs() {
        let a = compiled("->relay:", "->thinking:");
        let b = compiled("->relay:", "->thinking:");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn distinct_knobs_produce_distinct_sets() {
        let a = compiled("->relay:", "->thinking:");
        let b = compiled("!relay:", "!thinking:");
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn inline_matches_simple_send() {
        let set = default_patterns();
        let caps = set.inline.captures("->relay:Dev Please ack").unwrap();
        assert_eq!(&caps[1], "Dev");
        assert_eq!(&caps[2], "Please ack");
    }

    #[test]
    fn inline_matches_with_leading_bullet() {
        let set = default_patterns();
        assert!(set.inline.is_match("> ->relay:Dev hello"));
        assert!(set.inline.is_match("• ->relay:Dev hello"));
    }

    #[test]
    fn fence_open_matches_target_only() {
        let set = default_patterns();
        let caps = set.fence_open.captures("->relay:Dev <<<").unwrap();
        assert_eq!(&caps[1], "Dev");
    }

    #[test]
    fn escaped_prefix_is_literal() {
        let set = default_patterns();
        assert!(set.escaped_prefix.is_match(r"\->relay:"));
        assert!(!set.inline.is_match(r"\->relay:Dev hello"));
    }

    #[test]
    fn spawn_command_parses_quoted_task() {
        let set = default_patterns();
        let caps = set
            .spawn
            .captures(r#"->relay:spawn Reviewer claude "Review the PR""#)
            .unwrap();
        assert_eq!(&caps[1], "Reviewer");
        assert_eq!(&caps[2], "claude");
        assert_eq!(&caps[3], "Review the PR");
    }

    #[test]
    fn release_command_parses_name() {
        let set = default_patterns();
        let caps = set.release.captures("->relay:release Reviewer").unwrap();
        assert_eq!(&caps[1], "Reviewer");
    }

    #[test]
    fn fence_close_ignores_escaped_marker() {
        let set = default_patterns();
        assert!(!set.fence_close.is_match(r"text \>>>"));
        assert!(set.fence_close.is_match(">>>"));
    }
}
