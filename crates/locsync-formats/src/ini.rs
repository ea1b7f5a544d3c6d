//! `.ini` files as used by installers and updaters: `[Section]` headers,
//! `key=value` lines, `;` or `#` comments. Keys are the bare names; sections
//! are kept as text.

use std::collections::BTreeMap;

use locsync_core::VcsTranslation;

use crate::document::{content, line_ending, physical_lines};
use crate::properties::PendingComment;
use crate::{Document, Extra, Format, UnitSpan, VcsResource};

pub(crate) fn parse(text: &str) -> VcsResource {
    let mut doc = Document::default();
    let mut units = Vec::new();
    let mut pending = PendingComment::default();

    for line in physical_lines(text) {
        let trimmed = content(line).trim();
        if let Some(rest) = trimmed.strip_prefix([';', '#']) {
            pending.push(line, rest.trim());
            continue;
        }
        let Some((prefix_len, key)) = split_entry(content(line)) else {
            // Blank lines, section headers and anything unrecognised.
            pending.flush_into(&mut doc);
            doc.push_text(line);
            continue;
        };
        let value = content(line)[prefix_len..].trim_end().to_string();
        let (leading, comments) = pending.take();
        units.push(VcsTranslation {
            key: key.to_string(),
            source_string: value.clone(),
            comments,
            order: units.len(),
            strings: BTreeMap::from([(None, value)]),
            ..Default::default()
        });
        doc.push_unit(UnitSpan {
            leading,
            raw: line.to_string(),
        });
    }
    pending.flush_into(&mut doc);

    VcsResource::new(Format::Ini, units, doc, Extra::None)
}

pub(crate) fn serialize(res: &VcsResource) -> String {
    res.render_segments(|_, t, span| {
        let value = t.strings.get(&None)?;
        let (prefix_len, _) = split_entry(content(&span.raw))?;
        Some(format!(
            "{}{}{}",
            &span.raw[..prefix_len],
            value.replace('\n', " "),
            line_ending(&span.raw)
        ))
    })
}

/// Length of `key = ` and the trimmed key.
fn split_entry(line: &str) -> Option<(usize, &str)> {
    if line.trim_start().starts_with('[') {
        return None;
    }
    let eq = line.find('=')?;
    let key = line[..eq].trim();
    if key.is_empty() {
        return None;
    }
    let after = &line[eq + 1..];
    let spaces = after.len() - after.trim_start().len();
    Some((eq + 1 + spaces, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WriteContext;

    const SAMPLE: &str = "; This file is in the UTF-8 encoding\n[Strings]\n; Window caption\nTitle=Mozilla Updater\nInfo = Installing your update\n\n[Other]\nBroken line\n";

    #[test]
    fn sections_are_text_and_keys_are_bare() {
        let res = parse(SAMPLE);
        let t = res.translations();
        assert_eq!(t.len(), 2);
        assert_eq!(t[0].key, "Title");
        assert_eq!(t[0].comments, vec!["Window caption"]);
        assert_eq!(t[1].key, "Info");
        assert_eq!(t[1].source_string, "Installing your update");
        assert_eq!(res.serialize(&WriteContext::default()), SAMPLE);
    }

    #[test]
    fn changed_value_keeps_spacing_around_separator() {
        let mut res = parse(SAMPLE);
        res.translations_mut()[1]
            .strings
            .insert(None, "Update wird installiert".into());
        let out = res.serialize(&WriteContext::default());
        assert!(out.contains("Info = Update wird installiert\n"));
        assert!(out.contains("Title=Mozilla Updater\n"));
    }
}
