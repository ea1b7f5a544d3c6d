//! Mozilla `.lang` files.
//!
//! ```text
//! ## NOTE: file-level note, kept as text
//! # Comment for the string below
//! ;Source string
//! Translated string {ok}
//! ```
//!
//! A translation identical to its source is untranslated unless tagged
//! `{ok}`. Untranslated strings are written back as the source text, since
//! the format has no way to leave a string out.

use std::collections::{BTreeMap, BTreeSet};

use locsync_core::VcsTranslation;

use crate::document::{content, line_ending, physical_lines};
use crate::properties::PendingComment;
use crate::{Document, Extra, Format, UnitSpan, VcsResource};

const OK_TAG: &str = "ok";
const KNOWN_TAGS: &[&str] = &[OK_TAG, "l10n-extra"];

pub(crate) fn parse(text: &str) -> VcsResource {
    let lines = physical_lines(text);
    let mut doc = Document::default();
    let mut units = Vec::new();
    let mut pending = PendingComment::default();

    let mut i = 0;
    while i < lines.len() {
        let line = content(lines[i]);
        if line.starts_with("##") || line.trim().is_empty() {
            pending.flush_into(&mut doc);
            doc.push_text(lines[i]);
            i += 1;
            continue;
        }
        if let Some(rest) = line.strip_prefix('#') {
            pending.push(lines[i], rest.trim());
            i += 1;
            continue;
        }
        let Some(source) = line.strip_prefix(';') else {
            pending.flush_into(&mut doc);
            doc.push_text(lines[i]);
            i += 1;
            continue;
        };

        let start = i;
        i += 1;
        let mut translation = None;
        if let Some(next) = lines.get(i).map(|l| content(l)) {
            if !next.trim().is_empty() && !next.starts_with(';') && !next.starts_with('#') {
                translation = Some(next);
                i += 1;
            }
        }

        let mut tags = BTreeSet::new();
        let mut strings = BTreeMap::new();
        if let Some(raw) = translation {
            let (value, found) = strip_tags(raw);
            let is_ok = found.iter().any(|t| t == OK_TAG);
            if value != source || is_ok {
                strings.insert(None, value.to_string());
            }
            tags.extend(found);
        }

        let (leading, comments) = pending.take();
        units.push(VcsTranslation {
            source_string: source.to_string(),
            comments,
            order: units.len(),
            strings,
            tags,
            ..Default::default()
        });
        doc.push_unit(UnitSpan {
            leading,
            raw: lines[start..i].concat(),
        });
    }
    pending.flush_into(&mut doc);

    VcsResource::new(Format::Lang, units, doc, Extra::None)
}

pub(crate) fn serialize(res: &VcsResource) -> String {
    res.render_segments(|_, t, span| {
        let nl = line_ending(&span.raw);
        let value = t
            .strings
            .get(&None)
            .map(String::as_str)
            .unwrap_or(&t.source_string);
        let mut tags: Vec<&str> = t
            .tags
            .iter()
            .map(String::as_str)
            .filter(|tag| *tag != OK_TAG)
            .collect();
        if value == t.source_string && t.strings.contains_key(&None) {
            tags.insert(0, OK_TAG);
        }
        let mut out = format!(";{}{nl}{value}", t.source_string);
        for tag in tags {
            out.push_str(&format!(" {{{tag}}}"));
        }
        out.push_str(nl);
        Some(out)
    })
}

/// Split trailing `{tag}` markers off a translation line.
fn strip_tags(line: &str) -> (&str, Vec<String>) {
    let mut value = line.trim_end();
    let mut tags = Vec::new();
    loop {
        let Some(open) = value.rfind('{') else { break };
        let candidate = &value[open..];
        let Some(name) = candidate
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
        else {
            break;
        };
        if !KNOWN_TAGS.contains(&name) {
            break;
        }
        tags.insert(0, name.to_string());
        value = value[..open].trim_end();
    }
    (value, tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WriteContext;

    const SAMPLE: &str = "## NOTE: Mozilla website strings\n## active ##\n\n# Page title\n;Download Firefox\nFirefox herunterladen\n\n;Firefox\nFirefox {ok}\n\n;Privacy\nPrivacy\n\n;New feature\nNeue Funktion {l10n-extra}\n";

    #[test]
    fn parses_sources_translations_and_tags() {
        let res = parse(SAMPLE);
        let t = res.translations();
        assert_eq!(t.len(), 4);
        assert_eq!(t[0].key, "");
        assert_eq!(t[0].entity_key(), "Download Firefox");
        assert_eq!(t[0].comments, vec!["Page title"]);
        assert_eq!(t[0].strings[&None], "Firefox herunterladen");
        assert_eq!(t[1].strings[&None], "Firefox");
        assert!(t[1].tags.contains("ok"));
        assert!(!t[2].has_translation());
        assert_eq!(t[3].strings[&None], "Neue Funktion");
        assert!(t[3].tags.contains("l10n-extra"));
        assert_eq!(res.serialize(&WriteContext::default()), SAMPLE);
    }

    #[test]
    fn identical_translation_gets_ok_tag_and_missing_one_writes_source() {
        let mut res = parse(SAMPLE);
        res.translations_mut()[0]
            .strings
            .insert(None, "Download Firefox".into());
        res.translations_mut()[3].strings.clear();
        let out = res.serialize(&WriteContext::default());
        assert!(out.contains("# Page title\n;Download Firefox\nDownload Firefox {ok}\n"));
        assert!(out.contains(";New feature\nNew feature {l10n-extra}\n"));
    }
}
