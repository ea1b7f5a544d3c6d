//! XUL `.dtd` entity files.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use locsync_core::VcsTranslation;
use regex::Regex;

use crate::properties::PendingComment;
use crate::{Document, Extra, Format, UnitSpan, VcsResource};

fn entity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^<!ENTITY\s+([^\s%"'>]+)\s+(["'])"#).expect("entity regex compiles")
    })
}

struct EntityMatch<'a> {
    key: &'a str,
    quote: char,
    value_start: usize,
    value_end: usize,
    /// Offset just past the closing `>`.
    end: usize,
}

/// Match an entity declaration at the start of `s`.
fn entity_at(s: &str) -> Option<EntityMatch<'_>> {
    let caps = entity_re().captures(s)?;
    let key = caps.get(1)?.as_str();
    let quote_m = caps.get(2)?;
    let quote = quote_m.as_str().chars().next()?;
    let value_start = quote_m.end();
    let value_end = value_start + s[value_start..].find(quote)?;
    let after = &s[value_end + 1..];
    let gt = after.find('>')?;
    if !after[..gt].trim().is_empty() {
        return None;
    }
    Some(EntityMatch {
        key,
        quote,
        value_start,
        value_end,
        end: value_end + 1 + gt + 1,
    })
}

/// Index just past the newline ending the line that contains `pos`, if the
/// rest of that line is blank; `pos` otherwise.
pub(crate) fn rest_of_line(text: &str, pos: usize) -> usize {
    let rest = &text[pos..];
    match rest.find('\n') {
        Some(nl) if rest[..nl].trim().is_empty() => pos + nl + 1,
        None if rest.trim().is_empty() => text.len(),
        _ => pos,
    }
}

pub(crate) fn line_end(text: &str, pos: usize) -> usize {
    text[pos..].find('\n').map(|n| pos + n + 1).unwrap_or(text.len())
}

pub(crate) fn parse(text: &str) -> VcsResource {
    let mut doc = Document::default();
    let mut units = Vec::new();
    let mut pending = PendingComment::default();

    let mut pos = 0;
    while pos < text.len() {
        let eol = line_end(text, pos);
        let line = &text[pos..eol];
        let trimmed = line.trim_start();
        let start = pos + (line.len() - trimmed.len());
        if trimmed.trim().is_empty() {
            pending.flush_into(&mut doc);
            doc.push_text(line);
            pos = eol;
            continue;
        }
        if text[start..].starts_with("<!--") {
            let Some(close) = text[start + 4..].find("-->") else {
                pending.flush_into(&mut doc);
                doc.push_text(&text[pos..]);
                break;
            };
            let end = start + 4 + close + 3;
            let item_end = rest_of_line(text, end);
            pending.push(&text[pos..item_end], text[start + 4..end - 3].trim());
            pos = item_end;
            continue;
        }
        if let Some(m) = entity_at(&text[start..]) {
            let item_end = rest_of_line(text, start + m.end);
            let value = unescape(&text[start + m.value_start..start + m.value_end], m.quote);
            let (leading, comments) = pending.take();
            units.push(VcsTranslation {
                key: m.key.to_string(),
                source_string: value.clone(),
                comments,
                order: units.len(),
                strings: BTreeMap::from([(None, value)]),
                ..Default::default()
            });
            doc.push_unit(UnitSpan {
                leading,
                raw: text[pos..item_end].to_string(),
            });
            pos = item_end;
            continue;
        }
        pending.flush_into(&mut doc);
        doc.push_text(line);
        pos = eol;
    }
    pending.flush_into(&mut doc);

    VcsResource::new(Format::Dtd, units, doc, Extra::None)
}

pub(crate) fn serialize(res: &VcsResource) -> String {
    res.render_segments(|_, t, span| {
        let value = t.strings.get(&None)?;
        let indent = span.raw.len() - span.raw.trim_start().len();
        let decl = &span.raw[indent..];
        let m = entity_at(decl)?;
        Some(format!(
            "{}{}{}{}",
            &span.raw[..indent],
            &decl[..m.value_start],
            escape(value, m.quote),
            &decl[m.value_end..],
        ))
    })
}

fn unescape(value: &str, quote: char) -> String {
    match quote {
        '"' => value.replace("&quot;", "\"").replace("&#34;", "\""),
        _ => value.replace("&apos;", "'").replace("&#39;", "'"),
    }
}

fn escape(value: &str, quote: char) -> String {
    match quote {
        '"' => value.replace('"', "&quot;"),
        _ => value.replace('\'', "&apos;"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WriteContext;

    const SAMPLE: &str = r#"<!-- This Source Code Form is subject to the terms of the MPL. -->

<!ENTITY % brandDTD SYSTEM "chrome://branding/locale/brand.dtd">
<!-- LOCALIZATION NOTE: window title -->
<!ENTITY window.title "Preferences">
<!ENTITY button.label 'Don&apos;t save'>
"#;

    #[test]
    fn parses_entities_and_attached_comments() {
        let res = parse(SAMPLE);
        let t = res.translations();
        assert_eq!(t.len(), 2);
        assert_eq!(t[0].key, "window.title");
        assert_eq!(t[0].comments, vec!["LOCALIZATION NOTE: window title"]);
        assert_eq!(t[1].source_string, "Don't save");
        assert!(t[1].comments.is_empty());
    }

    #[test]
    fn round_trip_and_quote_escaping() {
        let mut res = parse(SAMPLE);
        assert_eq!(res.serialize(&WriteContext::default()), SAMPLE);

        res.translations_mut()[0]
            .strings
            .insert(None, "Say \"hi\"".into());
        let out = res.serialize(&WriteContext::default());
        assert!(out.contains("<!ENTITY window.title \"Say &quot;hi&quot;\">\n"));
        assert!(out.contains("<!-- LOCALIZATION NOTE: window title -->\n<!ENTITY window.title"));
    }

    #[test]
    fn missing_translation_drops_entity_and_its_comment() {
        let mut res = parse(SAMPLE);
        res.translations_mut()[0].strings.clear();
        let out = res.serialize(&WriteContext::default());
        assert!(!out.contains("window.title"));
        assert!(!out.contains("LOCALIZATION NOTE"));
        assert!(out.contains("button.label"));
    }
}
