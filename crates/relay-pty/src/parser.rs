//! The outbound parser: turns a wrapper's cleaned output into relay
//! commands (§4.2 "Outbound parsing").

use std::sync::Arc;

use relay_patterns::{should_reject, PatternSet};
use relay_types::{Envelope, EnvelopeKind};

use crate::dedup::DedupSet;

/// One parsed outbound command, prior to being handed to the router.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundCommand {
    /// A relay or thinking send.
    Send {
        project: Option<String>,
        target: String,
        body: String,
        kind: EnvelopeKind,
    },
    Spawn {
        name: String,
        cli: String,
        task: String,
    },
    Release {
        name: String,
    },
}

/// Scans `cleaned` (the ANSI-stripped output view) for fenced sends,
/// single-line sends, and control verbs, applying the instructional/
/// placeholder/agent-name rejection rules and the per-wrapper dedup set.
///
/// Escaped markers (`\->relay:`, `\<<<`, `\>>>`) never produce a command
/// and are restored to their literal form in fenced bodies (§8 property 3).
pub fn parse_outbound(
    cleaned: &str,
    patterns: &Arc<PatternSet>,
    dedup: &mut DedupSet,
) -> Vec<OutboundCommand> {
    let mut commands = Vec::new();
    let mut fenced_ranges = Vec::new();

    for (fence_re, kind) in [
        (&patterns.fence_open, EnvelopeKind::Message),
        (&patterns.fence_open_thinking, EnvelopeKind::Thinking),
    ] {
        for fence_match in fence_re.captures_iter(cleaned) {
            let whole = fence_match.get(0).unwrap();
            let target = fence_match.get(1).unwrap().as_str();
            let fence_start = whole.end();

            // Find the first unescaped `>>>` after the fence opens.
            let Some(close_rel) = find_unescaped_close(&cleaned[fence_start..]) else {
                continue;
            };
            let body_raw = &cleaned[fence_start..fence_start + close_rel];
            let body = unescape_fence_markers(body_raw.trim_matches('\n'));
            let fence_end = fence_start + close_rel + ">>>".len();
            fenced_ranges.push((whole.start(), fence_end));

            push_send(&mut commands, dedup, target, &body, kind);
        }
    }

    for line in cleaned.lines() {
        let line_start = offset_of(cleaned, line);
        if fenced_ranges
            .iter()
            .any(|(start, end)| line_start >= *start && line_start < *end)
        {
            continue;
        }
        if patterns.escaped_prefix.is_match(line) {
            continue;
        }
        if let Some(caps) = patterns.spawn.captures(line) {
            commands.push(OutboundCommand::Spawn {
                name: caps[1].to_string(),
                cli: caps[2].to_string(),
                task: caps[3].to_string(),
            });
            continue;
        }
        if let Some(caps) = patterns.release.captures(line) {
            commands.push(OutboundCommand::Release {
                name: caps[1].to_string(),
            });
            continue;
        }
        if let Some(caps) = patterns.inline.captures(line) {
            push_send(&mut commands, dedup, &caps[1], &caps[2], EnvelopeKind::Message);
            continue;
        }
        if let Some(caps) = patterns.inline_thinking.captures(line) {
            push_send(&mut commands, dedup, &caps[1], &caps[2], EnvelopeKind::Thinking);
        }
    }

    commands
}

fn push_send(
    commands: &mut Vec<OutboundCommand>,
    dedup: &mut DedupSet,
    raw_target: &str,
    body: &str,
    kind: EnvelopeKind,
) {
    let (project, target) = Envelope::split_cross_project_target(raw_target);
    if should_reject(target, body) {
        return;
    }
    if dedup.check_and_insert(raw_target, body) {
        return;
    }
    commands.push(OutboundCommand::Send {
        project: project.map(str::to_string),
        target: target.to_string(),
        body: body.to_string(),
        kind,
    });
}

/// Finds the byte offset of the first unescaped `>>>` in `text`.
fn find_unescaped_close(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i + 3 <= bytes.len() {
        if &bytes[i..i + 3] == b">>>" {
            let escaped = i > 0 && bytes[i - 1] == b'\\';
            if !escaped {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

/// Restores escaped fence markers (`\<<<`, `\>>>`) to their literal form.
fn unescape_fence_markers(body: &str) -> String {
    body.replace(r"\<<<", "<<<").replace(r"\>>>", ">>>")
}

/// Returns the byte offset of `needle` within `haystack`, assuming
/// `needle` is a line borrowed directly from `haystack.lines()`.
fn offset_of(haystack: &str, needle: &str) -> usize {
    (needle.as_ptr() as usize).saturating_sub(haystack.as_ptr() as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_patterns::default_patterns;

    fn commands_for(text: &str) -> Vec<OutboundCommand> {
        let patterns = default_patterns();
        let mut dedup = DedupSet::new(100);
        parse_outbound(text, &patterns, &mut dedup)
    }

    #[test]
    fn parses_simple_inline_send() {
        let cmds = commands_for("->relay:Dev Please ack");
        assert_eq!(
            cmds,
            vec![OutboundCommand::Send {
                project: None,
                target: "Dev".into(),
                body: "Please ack".into(),
                kind: EnvelopeKind::Message,
            }]
        );
    }

    #[test]
    fn parses_fenced_multiline_send() {
        let text = "->relay:Dev <<<\nline one\nline two\n>>>";
        let cmds = commands_for(text);
        assert_eq!(
            cmds,
            vec![OutboundCommand::Send {
                project: None,
                target: "Dev".into(),
                body: "line one\nline two".into(),
                kind: EnvelopeKind::Message,
            }]
        );
    }

    #[test]
    fn fenced_escape_markers_round_trip_literal() {
        let text = "->relay:Dev <<<\nkeep \\<<< and \\>>> literal\n>>>";
        let cmds = commands_for(text);
        match &cmds[0] {
            OutboundCommand::Send { body, .. } => {
                assert_eq!(body, "keep <<< and >>> literal");
            }
            other => panic!("expected Send, got {other:?}"),
        }
    }

    #[test]
    fn escaped_prefix_produces_no_command() {
        let cmds = commands_for(r"\->relay:Dev Please ack");
        assert!(cmds.is_empty());
    }

    #[test]
    fn leading_bullet_and_prompt_are_ignored() {
        assert_eq!(commands_for("> ->relay:Dev hi").len(), 1);
        assert_eq!(commands_for("• ->relay:Dev hi").len(), 1);
    }

    #[test]
    fn instructional_text_is_rejected() {
        assert!(commands_for("->relay:Dev for example, do this").is_empty());
    }

    #[test]
    fn placeholder_target_is_rejected() {
        assert!(commands_for("->relay:AgentName hello").is_empty());
    }

    #[test]
    fn duplicate_send_in_same_session_is_dropped() {
        let patterns = default_patterns();
        let mut dedup = DedupSet::new(100);
        let first = parse_outbound("->relay:Dev Please ack", &patterns, &mut dedup);
        let second = parse_outbound("->relay:Dev Please ack", &patterns, &mut dedup);
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[test]
    fn cross_project_target_is_split() {
        let cmds = commands_for("->relay:backend:Dev status");
        match &cmds[0] {
            OutboundCommand::Send { project, target, .. } => {
                assert_eq!(project.as_deref(), Some("backend"));
                assert_eq!(target, "Dev");
            }
            other => panic!("expected Send, got {other:?}"),
        }
    }

    #[test]
    fn spawn_and_release_control_verbs_are_detected() {
        let cmds = commands_for(r#"->relay:spawn Reviewer claude "Review the PR""#);
        assert_eq!(
            cmds,
            vec![OutboundCommand::Spawn {
                name: "Reviewer".into(),
                cli: "claude".into(),
                task: "Review the PR".into(),
            }]
        );

        let cmds = commands_for("->relay:release Reviewer");
        assert_eq!(
            cmds,
            vec![OutboundCommand::Release {
                name: "Reviewer".into(),
            }]
        );
    }

    #[test]
    fn thinking_prefix_produces_thinking_kind() {
        let cmds = commands_for("->thinking:Dev internal note");
        assert_eq!(
            cmds,
            vec![OutboundCommand::Send {
                project: None,
                target: "Dev".into(),
                body: "internal note".into(),
                kind: EnvelopeKind::Thinking,
            }]
        );
    }

    #[test]
    fn thinking_fence_produces_thinking_kind() {
        let text = "->thinking:Dev <<<\nmulti\nline\n>>>";
        let cmds = commands_for(text);
        match &cmds[0] {
            OutboundCommand::Send { kind, .. } => assert_eq!(*kind, EnvelopeKind::Thinking),
            other => panic!("expected Send, got {other:?}"),
        }
    }
}
