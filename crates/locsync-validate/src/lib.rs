use std::collections::BTreeSet;
use std::sync::OnceLock;

use locsync_formats::{fluent_syntax_error, Format};
use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Result of one check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckMessage {
    pub severity: Severity,
    /// Machine-readable kind: "empty" | "placeholders" | "fluent-syntax" | "whitespace"
    pub kind: &'static str,
    pub message: String,
}

impl CheckMessage {
    fn error(kind: &'static str, message: String) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            message,
        }
    }

    fn warning(kind: &'static str, message: String) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            message,
        }
    }
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\{\w+\}|\{\d+\}|%(?:\d+\$)?[sd]|\$[A-Z][A-Z0-9_]*\$)")
            .expect("placeholder regex compiles")
    })
}

pub fn placeholders(text: &str) -> BTreeSet<String> {
    placeholder_re()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Run every check that applies to `format` on one translation string.
pub fn check_translation(format: Format, source: &str, translation: &str) -> Vec<CheckMessage> {
    let mut messages = Vec::new();

    // Fluent strings are whole serialized entries; only syntax matters.
    if format == Format::Ftl {
        if let Some(err) = fluent_syntax_error(translation) {
            messages.push(CheckMessage::error(
                "fluent-syntax",
                format!("Fluent parse error: {err}"),
            ));
        }
        return messages;
    }

    if translation.trim().is_empty() && !source.trim().is_empty() {
        messages.push(CheckMessage::error(
            "empty",
            "Empty translation".to_string(),
        ));
        return messages;
    }

    let expected = placeholders(source);
    let found = placeholders(translation);
    if expected != found {
        let missing: Vec<&str> = expected.difference(&found).map(String::as_str).collect();
        let extra: Vec<&str> = found.difference(&expected).map(String::as_str).collect();
        let mut parts = Vec::new();
        if !missing.is_empty() {
            parts.push(format!("missing {}", missing.join(", ")));
        }
        if !extra.is_empty() {
            parts.push(format!("unexpected {}", extra.join(", ")));
        }
        messages.push(CheckMessage::warning(
            "placeholders",
            format!("Placeholder mismatch: {}", parts.join("; ")),
        ));
    }

    let lead = |s: &str| s.starts_with(char::is_whitespace);
    let trail = |s: &str| s.ends_with(char::is_whitespace);
    if lead(source) != lead(translation) || trail(source) != trail(translation) {
        messages.push(CheckMessage::warning(
            "whitespace",
            "Leading or trailing whitespace differs from the source".to_string(),
        ));
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(msgs: &[CheckMessage]) -> Vec<&'static str> {
        msgs.iter().map(|m| m.kind).collect()
    }

    #[test]
    fn clean_translation_has_no_messages() {
        assert!(check_translation(Format::Properties, "Hello {name}", "Hallo {name}").is_empty());
        assert!(check_translation(Format::Po, "%1$s of %2$s", "%1$s von %2$s").is_empty());
    }

    #[test]
    fn detects_empty_placeholders_and_whitespace() {
        let msgs = check_translation(Format::Properties, "Save", "  ");
        assert_eq!(kinds(&msgs), vec!["empty"]);
        assert_eq!(msgs[0].severity, Severity::Error);

        let msgs = check_translation(Format::Json, "You clicked $URL$.", "Geklickt: $LINK$ ");
        assert_eq!(kinds(&msgs), vec!["placeholders", "whitespace"]);
        assert!(msgs[0].message.contains("missing $URL$"));
        assert!(msgs[0].message.contains("unexpected $LINK$"));
        assert!(msgs.iter().all(|m| m.severity == Severity::Warning));
    }

    #[test]
    fn fluent_is_checked_for_syntax_only() {
        assert!(check_translation(Format::Ftl, "a = A\n", "a = { $x }\n").is_empty());
        let msgs = check_translation(Format::Ftl, "a = A\n", "a = { $x\n");
        assert_eq!(kinds(&msgs), vec!["fluent-syntax"]);
        assert_eq!(msgs[0].severity, Severity::Error);
    }

    #[test]
    fn placeholder_forms() {
        let found = placeholders("{0} {name} %s %d %2$d $COUNT$ {not closed");
        let expected: BTreeSet<String> = ["{0}", "{name}", "%s", "%d", "%2$d", "$COUNT$"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(found, expected);
    }
}
