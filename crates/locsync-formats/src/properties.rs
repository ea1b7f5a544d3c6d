//! Java `.properties` files.
//!
//! Shares the comment-attachment rules of the other line-oriented formats:
//! a run of comment lines directly above an entry belongs to it; a blank line
//! detaches it.

use std::collections::BTreeMap;

use locsync_core::VcsTranslation;

use crate::document::{content, line_ending, physical_lines};
use crate::{Document, Extra, Format, UnitSpan, VcsResource};

pub(crate) fn parse(text: &str) -> VcsResource {
    let lines = physical_lines(text);
    let mut doc = Document::default();
    let mut units = Vec::new();
    let mut pending = PendingComment::default();

    let mut i = 0;
    while i < lines.len() {
        let first = content(lines[i]);
        let trimmed = first.trim_start();
        if trimmed.is_empty() {
            pending.flush_into(&mut doc);
            doc.push_text(lines[i]);
            i += 1;
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix(['#', '!']) {
            pending.push(lines[i], rest.trim());
            i += 1;
            continue;
        }

        let start = i;
        let mut logical = first.to_string();
        while continues(content(lines[i])) && i + 1 < lines.len() {
            logical.pop();
            i += 1;
            logical.push_str(content(lines[i]).trim_start());
        }
        i += 1;

        let (prefix_len, key_raw) = split_entry(&logical);
        let value = unescape(&logical[prefix_len..]);
        let (leading, comments) = pending.take();
        units.push(VcsTranslation {
            key: unescape(key_raw),
            source_string: value.clone(),
            comments,
            order: units.len(),
            strings: BTreeMap::from([(None, value)]),
            ..Default::default()
        });
        doc.push_unit(UnitSpan {
            leading,
            raw: lines[start..i].concat(),
        });
    }
    pending.flush_into(&mut doc);

    VcsResource::new(Format::Properties, units, doc, Extra::None)
}

pub(crate) fn serialize(res: &VcsResource) -> String {
    res.render_segments(|_, t, span| {
        let value = t.strings.get(&None)?;
        let first = span.raw.split_inclusive('\n').next().unwrap_or("");
        let (prefix_len, _) = split_entry(content(first));
        Some(format!(
            "{}{}{}",
            &first[..prefix_len],
            escape(value),
            line_ending(&span.raw)
        ))
    })
}

/// Comment lines waiting for the entry they may belong to.
#[derive(Default)]
pub(crate) struct PendingComment {
    raw: String,
    lines: Vec<String>,
}

impl PendingComment {
    pub fn push(&mut self, raw: &str, text: &str) {
        self.raw.push_str(raw);
        self.lines.push(text.to_string());
    }

    pub fn flush_into(&mut self, doc: &mut Document) {
        doc.push_text(&std::mem::take(&mut self.raw));
        self.lines.clear();
    }

    pub fn take(&mut self) -> (String, Vec<String>) {
        let comments = if self.lines.is_empty() {
            Vec::new()
        } else {
            vec![std::mem::take(&mut self.lines).join("\n")]
        };
        (std::mem::take(&mut self.raw), comments)
    }
}

/// Odd number of trailing backslashes means the entry continues.
fn continues(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

/// Length of `indent key separator` and the raw key.
fn split_entry(line: &str) -> (usize, &str) {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() && matches!(bytes[i], b' ' | b'\t' | b'\x0c') {
        i += 1;
    }
    let key_start = i;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'=' | b':' | b' ' | b'\t' | b'\x0c' => break,
            _ => i += 1,
        }
    }
    let key_end = i.min(bytes.len());
    let mut j = key_end;
    while j < bytes.len() && matches!(bytes[j], b' ' | b'\t' | b'\x0c') {
        j += 1;
    }
    if j < bytes.len() && matches!(bytes[j], b'=' | b':') {
        j += 1;
        while j < bytes.len() && matches!(bytes[j], b' ' | b'\t' | b'\x0c') {
            j += 1;
        }
    }
    (j, &line[key_start..key_end])
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ' ' if i == 0 => out.push_str("\\ "),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WriteContext;

    const SAMPLE: &str = "# Header comment\n\n# Greeting shown on start\nhello = Hello\\nWorld\nbye:Bye \\\n    for now\nescaped\\ key = caf\\u00e9\n";

    #[test]
    fn parses_entries_comments_and_continuations() {
        let res = parse(SAMPLE);
        let t = res.translations();
        assert_eq!(t.len(), 3);
        assert_eq!(t[0].key, "hello");
        assert_eq!(t[0].source_string, "Hello\nWorld");
        assert_eq!(t[0].comments, vec!["Greeting shown on start"]);
        assert_eq!(t[1].key, "bye");
        assert_eq!(t[1].source_string, "Bye for now");
        assert!(t[1].comments.is_empty());
        assert_eq!(t[2].key, "escaped key");
        assert_eq!(t[2].source_string, "café");
        assert_eq!(t[2].order, 2);
    }

    #[test]
    fn unchanged_round_trip_is_byte_identical() {
        let res = parse(SAMPLE);
        assert_eq!(res.serialize(&WriteContext::default()), SAMPLE);
    }

    #[test]
    fn changed_entry_keeps_separator_and_missing_entry_is_dropped() {
        let mut res = parse(SAMPLE);
        res.translations_mut()[0]
            .strings
            .insert(None, "Hallo Welt".into());
        res.translations_mut()[1].strings.clear();
        let out = res.serialize(&WriteContext::default());
        assert_eq!(
            out,
            "# Header comment\n\n# Greeting shown on start\nhello = Hallo Welt\nescaped\\ key = caf\\u00e9\n"
        );
    }
}
