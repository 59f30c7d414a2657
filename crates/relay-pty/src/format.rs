//! Builds the line typed into a child agent's PTY for one inbound
//! envelope (§4.2 "Inbound injection" step 1, §6 "Injection format").

use relay_types::Envelope;

/// `Relay message from <from> [<shortId>][thread:<t>][!!][#general]
/// [Attachments: ...]: <body>`. Hints appear only when applicable; the
/// broadcast hint (`[#general]`) appears when the original `to` was `*`.
///
/// The returned string always starts with the literal prefix
/// `Relay message from <from> [<shortId>]`, which is what the verification
/// poll (§4.2 step 5) searches the captured output for.
pub fn format_injection_line(envelope: &Envelope) -> String {
    let mut hints = String::new();

    if let Some(thread) = &envelope.thread {
        hints.push_str(&format!("[thread:{thread}]"));
    }
    if envelope.is_urgent {
        hints.push_str("[!!]");
    }
    if envelope.is_broadcast {
        hints.push_str("[#general]");
    }
    if let Some(attachments) = attachment_paths(envelope) {
        hints.push_str(&format!("[Attachments: {}]", attachments.join(", ")));
    }

    format!(
        "Relay message from {} [{}]{hints}: {}",
        envelope.from,
        envelope.short_id(),
        envelope.body,
    )
}

/// The literal substring the verification poll must find in captured
/// output for `envelope` to be considered delivered.
pub fn verification_marker(envelope: &Envelope) -> String {
    format!("Relay message from {} [{}]", envelope.from, envelope.short_id())
}

/// For CLIs where a bare newline-terminated line risks being executed as a
/// shell command (the "Gemini-like" class, §4.2 step 3), the body is
/// additionally wrapped in backticks as a second line of defense beyond
/// the shell-prompt abort check in [`crate::wrapper`].
pub fn format_injection_line_guarded(envelope: &Envelope) -> String {
    let mut hints = String::new();
    if let Some(thread) = &envelope.thread {
        hints.push_str(&format!("[thread:{thread}]"));
    }
    if envelope.is_urgent {
        hints.push_str("[!!]");
    }
    if envelope.is_broadcast {
        hints.push_str("[#general]");
    }
    if let Some(attachments) = attachment_paths(envelope) {
        hints.push_str(&format!("[Attachments: {}]", attachments.join(", ")));
    }
    format!(
        "Relay message from {} [{}]{hints}: `{}`",
        envelope.from,
        envelope.short_id(),
        envelope.body,
    )
}

fn attachment_paths(envelope: &Envelope) -> Option<Vec<String>> {
    let data = envelope.data.as_ref()?;
    let list = data.get("attachments")?.as_array()?;
    let paths: Vec<String> = list
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    if paths.is_empty() {
        None
    } else {
        Some(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_types::EnvelopeKind;

    #[test]
    fn plain_message_has_no_hints() {
        let env = Envelope::new("Lead", "Dev", EnvelopeKind::Message, "Please ack").unwrap();
        let line = format_injection_line(&env);
        assert!(line.starts_with(&format!("Relay message from Lead [{}]: Please ack", env.short_id())));
    }

    #[test]
    fn broadcast_carries_general_hint() {
        let env = Envelope::new("Lead", "*", EnvelopeKind::Message, "status report").unwrap();
        let line = format_injection_line(&env);
        assert!(line.contains("[#general]"));
    }

    #[test]
    fn urgent_carries_bang_hint() {
        let mut env = Envelope::new("Lead", "Dev", EnvelopeKind::Message, "fire").unwrap();
        env.is_urgent = true;
        let line = format_injection_line(&env);
        assert!(line.contains("[!!]"));
    }

    #[test]
    fn thread_hint_is_included_when_present() {
        let mut env = Envelope::new("Lead", "Dev", EnvelopeKind::Message, "hi").unwrap();
        env.thread = Some("design-review".to_string());
        let line = format_injection_line(&env);
        assert!(line.contains("[thread:design-review]"));
    }

    #[test]
    fn verification_marker_is_a_prefix_of_the_line() {
        let env = Envelope::new("Lead", "Dev", EnvelopeKind::Message, "hi").unwrap();
        let line = format_injection_line(&env);
        assert!(line.starts_with(&verification_marker(&env)));
    }
}
