//! XLIFF 1.2 files.
//!
//! Each `<trans-unit>` is a unit keyed by its `id`. `<note>` children become
//! comments; a target `state` starting with `needs-` marks it fuzzy.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use locsync_core::VcsTranslation;
use regex::Regex;

use crate::xml_util::{self, decode_entities, escape_attr, escape_text, indent_before, Element, Node};
use crate::{Document, Extra, Format, UnitSpan, VcsResource, WriteContext};

const FUZZY_STATE: &str = "needs-review-translation";
const TRANSLATED_STATE: &str = "translated";

pub(crate) fn parse(text: &str) -> Result<VcsResource, String> {
    let nodes = xml_util::scan(text, |name, _| name == "trans-unit")?;
    let mut doc = Document::default();
    let mut units = Vec::new();
    let mut cursor = 0;

    for node in nodes {
        let Node::Element(el) = node else { continue };
        let Some(id) = el.attr("id").map(String::from) else {
            tracing::warn!(event = "xliff_unit_without_id", offset = el.start);
            continue;
        };
        let Some(inner) = el.inner.clone() else { continue };
        let children = xml_util::scan(&text[inner.clone()], |name, depth| {
            depth == 0 && matches!(name, "source" | "target" | "note")
        })?;

        let mut source = String::new();
        let mut target: Option<(String, Option<String>)> = None;
        let mut notes = Vec::new();
        for child in &children {
            let Node::Element(c) = child else { continue };
            let body = c
                .inner
                .clone()
                .map(|r| decode_entities(&text[inner.start + r.start..inner.start + r.end]))
                .unwrap_or_default();
            match c.name.as_str() {
                "source" => source = body,
                "target" => target = Some((body, c.attr("state").map(String::from))),
                _ => {
                    if !body.trim().is_empty() {
                        notes.push(body.trim().to_string());
                    }
                }
            }
        }

        let (strings, fuzzy) = match target {
            Some((value, state)) if !value.is_empty() => (
                BTreeMap::from([(None, value)]),
                state.is_some_and(|s| s.starts_with("needs-")),
            ),
            _ => (BTreeMap::new(), false),
        };

        doc.push_text(&text[cursor..el.start]);
        let leading = doc.take_line_prefix();
        units.push(VcsTranslation {
            key: id,
            source_string: source,
            comments: notes,
            order: units.len(),
            strings,
            fuzzy,
            ..Default::default()
        });
        doc.push_unit(UnitSpan {
            leading,
            raw: text[el.start..el.end].to_string(),
        });
        cursor = el.end;
    }
    doc.push_text(&text[cursor..]);

    Ok(VcsResource::new(Format::Xliff, units, doc, Extra::None))
}

pub(crate) fn serialize(res: &VcsResource, ctx: &WriteContext<'_>) -> String {
    let out = res.render_segments(|_, t, span| Some(render_unit(t, &span.raw)));
    match ctx.locale {
        Some(locale) => set_target_language(&out, &locale.code),
        None => out,
    }
}

fn render_unit(t: &VcsTranslation, raw: &str) -> String {
    let children = match xml_util::scan(raw, |name, depth| {
        depth == 1 && matches!(name, "source" | "target")
    }) {
        Ok(children) => children,
        Err(e) => {
            tracing::warn!(event = "xliff_unit_rescan_failed", key = %t.key, error = %e);
            return raw.to_string();
        }
    };
    let elements: Vec<&Element> = children
        .iter()
        .filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Comment { .. } => None,
        })
        .collect();
    let source = elements.iter().find(|e| e.name == "source");
    let target = elements.iter().find(|e| e.name == "target");

    match (t.strings.get(&None), target) {
        (Some(value), Some(target)) => format!(
            "{}{}{}",
            &raw[..target.start],
            target_element(value, t.fuzzy, &target.attrs),
            &raw[target.end..]
        ),
        (Some(value), None) => {
            let Some(source) = source else {
                return raw.to_string();
            };
            let indent = indent_before(raw, source.start);
            format!(
                "{}\n{indent}{}{}",
                &raw[..source.end],
                target_element(value, t.fuzzy, &[]),
                &raw[source.end..]
            )
        }
        (None, Some(target)) => {
            let line_start = raw[..target.start]
                .rfind('\n')
                .filter(|&n| raw[n..target.start].trim().is_empty())
                .unwrap_or(target.start);
            format!("{}{}", &raw[..line_start], &raw[target.end..])
        }
        (None, None) => raw.to_string(),
    }
}

fn target_element(value: &str, fuzzy: bool, attrs: &[(String, String)]) -> String {
    let mut out = String::from("<target");
    let mut has_state = false;
    for (k, v) in attrs {
        if k == "state" {
            has_state = true;
            let state = match (fuzzy, v.starts_with("needs-")) {
                (true, true) | (false, false) => v.as_str(),
                (true, false) => FUZZY_STATE,
                (false, true) => TRANSLATED_STATE,
            };
            out.push_str(&format!(" state=\"{}\"", escape_attr(state)));
        } else {
            out.push_str(&format!(" {k}=\"{}\"", escape_attr(v)));
        }
    }
    if fuzzy && !has_state {
        out.push_str(&format!(" state=\"{FUZZY_STATE}\""));
    }
    out.push('>');
    out.push_str(&escape_text(value));
    out.push_str("</target>");
    out
}

fn file_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<file\b[^>]*>").expect("file tag regex compiles"))
}

fn target_lang_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\btarget-language\s*=\s*("[^"]*"|'[^']*')"#)
            .expect("target-language regex compiles")
    })
}

/// Point every `<file>` element at `code`.
fn set_target_language(text: &str, code: &str) -> String {
    file_tag_re()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let tag = &caps[0];
            let wanted = format!("target-language=\"{}\"", escape_attr(code));
            if target_lang_re().is_match(tag) {
                target_lang_re()
                    .replace(tag, regex::NoExpand(&wanted))
                    .into_owned()
            } else {
                let close = if tag.ends_with("/>") { tag.len() - 2 } else { tag.len() - 1 };
                format!("{} {wanted}{}", tag[..close].trim_end(), &tag[close..])
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use locsync_core::builtin_locale;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xliff version="1.2" xmlns="urn:oasis:names:tc:xliff:document:1.2">
  <file original="app.strings" source-language="en" target-language="de" datatype="plaintext">
    <body>
      <trans-unit id="greeting">
        <source>Hello &amp; welcome</source>
        <target state="translated">Hallo &amp; willkommen</target>
        <note>Shown on start</note>
      </trans-unit>
      <trans-unit id="bye">
        <source>Bye</source>
      </trans-unit>
      <trans-unit id="review">
        <source>Review</source>
        <target state="needs-review-translation">Prüfen</target>
      </trans-unit>
    </body>
  </file>
</xliff>
"#;

    #[test]
    fn parses_units_notes_and_states() {
        let res = parse(SAMPLE).unwrap();
        let t = res.translations();
        assert_eq!(t.len(), 3);
        assert_eq!(t[0].key, "greeting");
        assert_eq!(t[0].source_string, "Hello & welcome");
        assert_eq!(t[0].strings[&None], "Hallo & willkommen");
        assert_eq!(t[0].comments, vec!["Shown on start"]);
        assert!(!t[0].fuzzy);
        assert!(!t[1].has_translation());
        assert!(t[2].fuzzy);
    }

    #[test]
    fn unchanged_round_trip_is_byte_identical() {
        let res = parse(SAMPLE).unwrap();
        assert_eq!(res.serialize(&WriteContext::default()), SAMPLE);
        let de = builtin_locale("de").unwrap();
        let ctx = WriteContext {
            locale: Some(&de),
            ..Default::default()
        };
        assert_eq!(res.serialize(&ctx), SAMPLE);
    }

    #[test]
    fn inserts_replaces_and_removes_targets() {
        let mut res = parse(SAMPLE).unwrap();
        {
            let t = res.translations_mut();
            t[0].strings.clear();
            t[1].strings.insert(None, "Tschüss".into());
            t[2].fuzzy = false;
        }
        let out = res.serialize(&WriteContext::default());
        assert!(out.contains(
            "<source>Hello &amp; welcome</source>\n        <note>Shown on start</note>"
        ));
        assert!(out.contains("<source>Bye</source>\n        <target>Tschüss</target>\n"));
        assert!(out.contains("<target state=\"translated\">Prüfen</target>"));
    }

    #[test]
    fn target_language_follows_the_locale() {
        let res = parse(SAMPLE).unwrap();
        let fr = builtin_locale("fr").unwrap();
        let ctx = WriteContext {
            locale: Some(&fr),
            ..Default::default()
        };
        let out = res.serialize(&ctx);
        assert!(out.contains("source-language=\"en\" target-language=\"fr\" datatype"));
        assert_eq!(
            set_target_language("<file original=\"a\">", "it"),
            "<file original=\"a\" target-language=\"it\">"
        );
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(parse("<xliff><file>").is_err());
    }
}
