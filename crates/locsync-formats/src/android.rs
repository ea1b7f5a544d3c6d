//! Android `strings.xml` resources.
//!
//! `<string>` and `<plurals>` children of `<resources>` are units; elements
//! marked `translatable="false"` and string arrays stay as text. Plural
//! items map to plural forms through the locale's CLDR categories.

use std::collections::BTreeMap;

use locsync_core::{Locale, PluralCategory, VcsTranslation};

use crate::xml_util::{self, adjacent, decode_entities, escape_text, indent_before, Node};
use crate::{Document, Extra, Format, UnitSpan, VcsResource, WriteContext};

pub(crate) fn parse(text: &str, locale: Option<&Locale>) -> Result<VcsResource, String> {
    let default_locale = Locale::with_default_plurals("en");
    let locale = locale.unwrap_or(&default_locale);
    let nodes = xml_util::scan(text, |name, depth| {
        depth == 1 && matches!(name, "string" | "plurals")
    })?;

    let mut doc = Document::default();
    let mut units = Vec::new();
    let mut cursor = 0;
    let mut comment: Option<(usize, usize, String)> = None;

    for node in nodes {
        let el = match node {
            Node::Comment { start, end, text } => {
                comment = Some((start, end, text));
                continue;
            }
            Node::Element(el) => el,
        };
        let attached = comment
            .take()
            .filter(|(_, end, _)| *end >= cursor && adjacent(&text[*end..el.start]));
        if el.attr("translatable") == Some("false") {
            continue;
        }
        let Some(name) = el.attr("name").map(String::from) else {
            tracing::warn!(event = "android_element_without_name", offset = el.start);
            continue;
        };

        let mut unit = VcsTranslation {
            key: name,
            order: units.len(),
            ..Default::default()
        };
        if el.name == "plurals" {
            let inner = el.inner.clone().unwrap_or(el.end..el.end);
            let items = xml_util::scan(&text[inner.clone()], |n, d| d == 0 && n == "item")?;
            let mut by_category = BTreeMap::new();
            for item in items {
                let Node::Element(item) = item else { continue };
                let quantity = item.attr("quantity").unwrap_or_default();
                let Ok(category) = PluralCategory::parse(quantity) else {
                    tracing::warn!(event = "android_unknown_quantity", quantity = %quantity);
                    continue;
                };
                let value = item
                    .inner
                    .map(|r| unescape(&text[inner.start + r.start..inner.start + r.end]))
                    .unwrap_or_default();
                by_category.insert(category, value);
            }
            unit.source_string = by_category
                .get(&PluralCategory::One)
                .cloned()
                .unwrap_or_default();
            unit.source_string_plural = by_category
                .get(&PluralCategory::Other)
                .cloned()
                .unwrap_or_default();
            for (category, value) in by_category {
                match locale.form_of(category) {
                    Some(form) => {
                        unit.strings.insert(Some(form), value);
                    }
                    None => tracing::debug!(
                        event = "android_quantity_not_in_locale",
                        locale = %locale.code,
                        quantity = category.as_str()
                    ),
                }
            }
        } else {
            let value = el
                .inner
                .clone()
                .map(|r| unescape(&text[r]))
                .unwrap_or_default();
            unit.source_string = value.clone();
            unit.strings.insert(None, value);
        }

        let leading = match attached {
            Some((c_start, _, c_text)) => {
                doc.push_text(&text[cursor..c_start]);
                unit.comments.push(c_text);
                let prefix = doc.take_line_prefix();
                format!("{prefix}{}", &text[c_start..el.start])
            }
            None => {
                doc.push_text(&text[cursor..el.start]);
                doc.take_line_prefix()
            }
        };
        units.push(unit);
        doc.push_unit(UnitSpan {
            leading,
            raw: text[el.start..el.end].to_string(),
        });
        cursor = el.end;
    }
    doc.push_text(&text[cursor..]);

    Ok(VcsResource::new(Format::Android, units, doc, Extra::None))
}

pub(crate) fn serialize(res: &VcsResource, ctx: &WriteContext<'_>) -> String {
    let default_locale = Locale::with_default_plurals("en");
    let locale = ctx.locale.unwrap_or(&default_locale);
    res.render_segments(|_, t, span| {
        let start_tag_end = start_tag_end(&span.raw)?;
        let open = open_tag(&span.raw[..start_tag_end]);
        if !span.raw.starts_with("<plurals") {
            let value = t.strings.get(&None)?;
            return Some(format!("{open}{}</string>", escape(value)));
        }
        if t.strings.is_empty() {
            return None;
        }
        let base = span.leading.rsplit('\n').next().unwrap_or("");
        let base = if base.trim().is_empty() { base } else { "" };
        let item_indent = item_indent(&span.raw).unwrap_or_else(|| format!("{base}    "));
        let mut out = open;
        for (form, category) in locale.cldr_plurals.iter().enumerate() {
            let Some(value) = t.strings.get(&Some(form)) else {
                continue;
            };
            out.push_str(&format!(
                "\n{item_indent}<item quantity=\"{}\">{}</item>",
                category.as_str(),
                escape(value)
            ));
        }
        out.push_str(&format!("\n{base}</plurals>"));
        Some(out)
    })
}

fn start_tag_end(raw: &str) -> Option<usize> {
    let nodes = xml_util::scan(raw, |_, depth| depth == 0).ok()?;
    match nodes.into_iter().next()? {
        Node::Element(el) => Some(el.start_tag_end()),
        Node::Comment { .. } => None,
    }
}

/// `<string name="x"/>` becomes `<string name="x">`.
fn open_tag(tag: &str) -> String {
    match tag.strip_suffix("/>") {
        Some(head) => format!("{}>", head.trim_end()),
        None => tag.to_string(),
    }
}

fn item_indent(raw: &str) -> Option<String> {
    let pos = raw.find("<item")?;
    let indent = indent_before(raw, pos);
    (!indent.is_empty()).then(|| indent.to_string())
}

/// Resolve Android string escapes and surrounding quotes. Inline markup is
/// kept as written.
fn unescape(raw: &str) -> String {
    let decoded = decode_entities(raw);
    let s = decoded.trim();
    let s = match s.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Some(inner) if !inner.ends_with('\\') => inner,
        _ => s,
    };
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
            None => out.push('\\'),
        }
    }
    out
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 4);
    for (i, c) in value.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '@' | '?' if i == 0 => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    escape_text(&out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use locsync_core::builtin_locale;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<resources>
    <!-- App name shown in the launcher -->
    <string name="app_name">Notes</string>
    <string name="api_key" translatable="false">abc123</string>

    <!-- Detached comment -->

    <string name="quote">Don\'t \"panic\" &amp; relax</string>
    <plurals name="notes">
        <item quantity="one">%d note</item>
        <item quantity="other">%d notes</item>
    </plurals>
    <string-array name="colors">
        <item>Red</item>
    </string-array>
</resources>
"#;

    #[test]
    fn parses_strings_plurals_and_comments() {
        let res = parse(SAMPLE, None).unwrap();
        let t = res.translations();
        assert_eq!(t.len(), 3);
        assert_eq!(t[0].key, "app_name");
        assert_eq!(t[0].comments, vec!["App name shown in the launcher"]);
        assert_eq!(t[1].key, "quote");
        assert_eq!(t[1].source_string, "Don't \"panic\" & relax");
        assert!(t[1].comments.is_empty());
        assert_eq!(t[2].source_string, "%d note");
        assert_eq!(t[2].source_string_plural, "%d notes");
        assert_eq!(t[2].strings[&Some(1)], "%d notes");
    }

    #[test]
    fn unchanged_round_trip_is_byte_identical() {
        let res = parse(SAMPLE, None).unwrap();
        assert_eq!(res.serialize(&WriteContext::default()), SAMPLE);
    }

    #[test]
    fn missing_string_is_dropped_with_its_comment_line() {
        let mut res = parse(SAMPLE, None).unwrap();
        res.translations_mut()[0].strings.clear();
        res.translations_mut()[1]
            .strings
            .insert(None, "Keine \"Panik\"".into());
        let out = res.serialize(&WriteContext::default());
        assert!(out.starts_with(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<resources>\n    <string name=\"api_key\""
        ));
        assert!(out.contains("<string name=\"quote\">Keine \\\"Panik\\\"</string>"));
    }

    #[test]
    fn plurals_follow_the_target_locale() {
        let pl = builtin_locale("pl").unwrap();
        let target = SAMPLE.replace(
            "<item quantity=\"one\">%d note</item>",
            "<item quantity=\"one\">%d notatka</item>\n        <item quantity=\"few\">%d notatki</item>",
        );
        let mut res = parse(&target, Some(&pl)).unwrap();
        let few = pl.form_of(PluralCategory::Few).unwrap();
        assert_eq!(res.translations()[2].strings[&Some(few)], "%d notatki");

        let many = pl.form_of(PluralCategory::Many).unwrap();
        res.translations_mut()[2]
            .strings
            .insert(Some(many), "%d notatek".into());
        let ctx = WriteContext {
            locale: Some(&pl),
            ..Default::default()
        };
        let out = res.serialize(&ctx);
        assert!(out.contains(
            "        <item quantity=\"few\">%d notatki</item>\n        <item quantity=\"many\">%d notatek</item>\n    </plurals>"
        ));
    }
}
