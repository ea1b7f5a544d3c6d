//! Gettext `.po`/`.pot` catalogs.
//!
//! Entries are blank-line separated blocks. Obsolete (`#~`) entries and
//! blocks without a `msgid` are kept verbatim as text. When a translation
//! changes only its `msgstr` lines and the `fuzzy` flag are rewritten; every
//! other line of the block stays as read.

use std::collections::{BTreeMap, BTreeSet};

use locsync_core::{SourceLocation, VcsTranslation};

use crate::document::{content, line_ending, physical_lines};
use crate::{Document, Extra, Format, Segment, UnitSpan, VcsResource, WriteContext};

const FUZZY: &str = "fuzzy";

/// The catalog header entry (`msgid ""`).
#[derive(Debug, Clone, Default)]
pub(crate) struct Header {
    /// Text in front of the header block.
    prefix: String,
    /// Comment lines of the header block.
    comments: String,
    fields: Vec<(String, String)>,
    raw: String,
}

impl Header {
    fn set(&mut self, name: &str, value: String) {
        match self
            .fields
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some((_, v)) => *v = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    fn render(&self, ctx: &WriteContext<'_>) -> String {
        let mut updated = self.clone();
        if let Some(locale) = ctx.locale {
            updated.set("Language", locale.code.clone());
            updated.set("Plural-Forms", locale.plural_forms_header());
        }
        let overrides = [
            ("PO-Revision-Date", &ctx.revision_date),
            ("Last-Translator", &ctx.last_translator),
            ("X-Generator", &ctx.generator),
        ];
        for (name, value) in overrides {
            if let Some(value) = value {
                updated.set(name, value.clone());
            }
        }
        if updated.fields == self.fields {
            return format!("{}{}", self.prefix, self.raw);
        }

        let nl = line_ending(&self.raw);
        let mut out = format!("{}{}msgid \"\"{nl}msgstr \"\"{nl}", self.prefix, self.comments);
        for (k, v) in &updated.fields {
            out.push_str(&format!("\"{}\"{nl}", escape(&format!("{k}: {v}\n"))));
        }
        out
    }
}

/// One parsed block.
#[derive(Default)]
struct Entry {
    extracted: Vec<String>,
    references: Vec<SourceLocation>,
    flags: Vec<String>,
    msgctxt: Option<String>,
    msgid: Option<String>,
    msgid_plural: Option<String>,
    msgstr: BTreeMap<Option<usize>, String>,
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    None,
    Ctxt,
    Id,
    IdPlural,
    Str(Option<usize>),
}

fn parse_block(lines: &[&str]) -> Option<Entry> {
    let mut e = Entry::default();
    let mut field = Field::None;
    for line in lines {
        let line = content(line).trim_end();
        if let Some(rest) = line.strip_prefix("#.") {
            e.extracted.push(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("#:") {
            e.references
                .extend(rest.split_whitespace().map(SourceLocation::parse));
        } else if let Some(rest) = line.strip_prefix("#,") {
            e.flags.extend(
                rest.split(',')
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(String::from),
            );
        } else if line.starts_with("#~") {
            return None;
        } else if line.starts_with('#') {
            // Translator and previous-msgid comments.
        } else if line.starts_with('"') {
            let value = quoted(line)?;
            let target = match field {
                Field::None => return None,
                Field::Ctxt => e.msgctxt.get_or_insert_with(String::new),
                Field::Id => e.msgid.get_or_insert_with(String::new),
                Field::IdPlural => e.msgid_plural.get_or_insert_with(String::new),
                Field::Str(form) => e.msgstr.entry(form).or_default(),
            };
            target.push_str(&value);
        } else {
            let (keyword, rest) = line.split_once(char::is_whitespace)?;
            let value = quoted(rest.trim())?;
            field = match keyword {
                "msgctxt" => {
                    e.msgctxt = Some(value);
                    Field::Ctxt
                }
                "msgid" => {
                    e.msgid = Some(value);
                    Field::Id
                }
                "msgid_plural" => {
                    e.msgid_plural = Some(value);
                    Field::IdPlural
                }
                "msgstr" => {
                    e.msgstr.insert(None, value);
                    Field::Str(None)
                }
                other => {
                    let n = other
                        .strip_prefix("msgstr[")?
                        .strip_suffix(']')?
                        .parse()
                        .ok()?;
                    e.msgstr.insert(Some(n), value);
                    Field::Str(Some(n))
                }
            };
        }
    }
    e.msgid.is_some().then_some(e)
}

fn quoted(s: &str) -> Option<String> {
    let inner = s.strip_prefix('"')?.strip_suffix('"')?;
    Some(unescape(inner))
}

pub(crate) fn parse(text: &str) -> Result<VcsResource, String> {
    let lines = physical_lines(text);
    let mut doc = Document::default();
    let mut units = Vec::new();
    let mut header: Option<Header> = None;

    let mut i = 0;
    while i < lines.len() {
        if content(lines[i]).trim().is_empty() {
            doc.push_text(lines[i]);
            i += 1;
            continue;
        }
        let start = i;
        while i < lines.len() && !content(lines[i]).trim().is_empty() {
            i += 1;
        }
        let block = &lines[start..i];
        let raw = block.concat();

        let Some(entry) = parse_block(block) else {
            if !block.iter().all(|l| l.starts_with('#')) {
                tracing::warn!(event = "po_block_skipped", line = start + 1);
            }
            doc.push_text(&raw);
            continue;
        };

        if entry.msgid.as_deref() == Some("")
            && entry.msgctxt.is_none()
            && header.is_none()
            && units.is_empty()
        {
            // Only text precedes the header; it moves in front of it.
            let prefix = doc
                .segments
                .drain(..)
                .filter_map(|seg| match seg {
                    Segment::Text(t) => Some(t),
                    Segment::Unit(_) => None,
                })
                .collect();
            let comments = block
                .iter()
                .take_while(|l| l.starts_with('#'))
                .copied()
                .collect::<String>();
            let body = entry.msgstr.get(&None).cloned().unwrap_or_default();
            let fields = body
                .lines()
                .filter_map(|l| l.split_once(':'))
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .collect();
            header = Some(Header {
                prefix,
                comments,
                fields,
                raw,
            });
            continue;
        }

        let msgid = entry.msgid.unwrap_or_default();
        let fuzzy = entry.flags.iter().any(|f| f == FUZZY);
        let tags: BTreeSet<String> = entry.flags.into_iter().filter(|f| f != FUZZY).collect();
        let strings = entry
            .msgstr
            .into_iter()
            .filter(|(_, v)| !v.is_empty())
            .collect();
        units.push(VcsTranslation {
            key: match &entry.msgctxt {
                Some(ctxt) => format!("{ctxt}\u{4}{msgid}"),
                None => String::new(),
            },
            context: entry.msgctxt.unwrap_or_default(),
            source_string: msgid,
            source_string_plural: entry.msgid_plural.unwrap_or_default(),
            comments: entry.extracted,
            order: units.len(),
            source: entry.references,
            strings,
            fuzzy,
            tags,
            ..Default::default()
        });
        doc.push_unit(UnitSpan {
            leading: String::new(),
            raw,
        });
    }

    let extra = match header {
        Some(h) => Extra::Po(h),
        None => Extra::None,
    };
    Ok(VcsResource::new(Format::Po, units, doc, extra))
}

pub(crate) fn serialize(res: &VcsResource, ctx: &WriteContext<'_>) -> String {
    let mut out = match &res.extra {
        Extra::Po(h) => h.render(ctx),
        _ => String::new(),
    };
    out.push_str(&res.render_segments(|_, t, span| Some(render_entry(t, span, ctx))));
    out
}

fn render_entry(t: &VcsTranslation, span: &UnitSpan, ctx: &WriteContext<'_>) -> String {
    let nl = line_ending(&span.raw);
    let mut out = String::new();
    let mut flags_written = false;
    let mut in_msgstr = false;
    let mut msgstr_written = false;

    for line in physical_lines(&span.raw) {
        let body = content(line);
        if in_msgstr && body.starts_with('"') {
            continue;
        }
        in_msgstr = false;
        if body.starts_with("#,") {
            flags_written = true;
            out.push_str(&render_flags(t, nl));
            continue;
        }
        if !flags_written && (body.starts_with("#|") || body.starts_with("msg")) {
            flags_written = true;
            out.push_str(&render_flags(t, nl));
        }
        if body.starts_with("msgstr") {
            in_msgstr = true;
            if !msgstr_written {
                msgstr_written = true;
                out.push_str(&render_msgstr(t, ctx, span, nl));
            }
            continue;
        }
        out.push_str(line);
        if !line.ends_with('\n') {
            out.push_str(nl);
        }
    }
    out
}

fn render_flags(t: &VcsTranslation, nl: &str) -> String {
    let mut flags: Vec<&str> = Vec::new();
    if t.fuzzy {
        flags.push(FUZZY);
    }
    flags.extend(t.tags.iter().map(String::as_str));
    if flags.is_empty() {
        String::new()
    } else {
        format!("#, {}{nl}", flags.join(", "))
    }
}

fn render_msgstr(t: &VcsTranslation, ctx: &WriteContext<'_>, span: &UnitSpan, nl: &str) -> String {
    if !t.is_plural() {
        let value = t.strings.get(&None).map(String::as_str).unwrap_or("");
        return render_string("msgstr", value, nl);
    }
    let in_file = physical_lines(&span.raw)
        .iter()
        .filter(|l| l.starts_with("msgstr["))
        .count();
    let highest = t.strings.keys().flatten().max().map(|n| n + 1).unwrap_or(0);
    let count = ctx
        .locale
        .map(|l| l.nplurals())
        .unwrap_or_else(|| in_file.max(highest).max(2));
    (0..count)
        .map(|n| {
            let value = t.strings.get(&Some(n)).map(String::as_str).unwrap_or("");
            render_string(&format!("msgstr[{n}]"), value, nl)
        })
        .collect()
}

/// `keyword "value"`, wrapped after embedded newlines.
fn render_string(keyword: &str, value: &str, nl: &str) -> String {
    let pieces: Vec<&str> = value.split_inclusive('\n').collect();
    if pieces.len() <= 1 {
        return format!("{keyword} \"{}\"{nl}", escape(value));
    }
    let mut out = format!("{keyword} \"\"{nl}");
    for piece in pieces {
        out.push_str(&format!("\"{}\"{nl}", escape(piece)));
    }
    out
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
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use locsync_core::builtin_locale;

    const SAMPLE: &str = r#"# German translation.
msgid ""
msgstr ""
"Project-Id-Version: demo\n"
"Language: de\n"
"Plural-Forms: nplurals=2; plural=(n != 1);\n"

#. Button label
#: src/main.c:12 src/other.c
msgid "Save"
msgstr "Speichern"

#, fuzzy, c-format
msgctxt "menu"
msgid "Open %s"
msgstr "Öffnen %s"

msgid "One file"
msgid_plural "%d files"
msgstr[0] ""
msgstr[1] ""

#~ msgid "Old"
#~ msgstr "Alt"
"#;

    #[test]
    fn parses_entries_context_flags_and_plurals() {
        let res = parse(SAMPLE).unwrap();
        let t = res.translations();
        assert_eq!(t.len(), 3);

        assert_eq!(t[0].entity_key(), "Save");
        assert_eq!(t[0].comments, vec!["Button label"]);
        assert_eq!(t[0].source.len(), 2);
        assert_eq!(t[0].source[0].line, Some(12));
        assert_eq!(t[0].strings[&None], "Speichern");

        assert_eq!(t[1].key, "menu\u{4}Open %s");
        assert_eq!(t[1].context, "menu");
        assert!(t[1].fuzzy);
        assert!(t[1].tags.contains("c-format"));

        assert!(t[2].is_plural());
        assert!(!t[2].has_translation());
    }

    #[test]
    fn header_fields_are_available() {
        let res = parse(SAMPLE).unwrap();
        let Extra::Po(h) = &res.extra else {
            panic!("expected header");
        };
        assert!(h.fields.contains(&("Language".to_string(), "de".to_string())));
        assert_eq!(h.comments, "# German translation.\n");
    }

    #[test]
    fn unchanged_round_trip_is_byte_identical() {
        let res = parse(SAMPLE).unwrap();
        assert_eq!(res.serialize(&WriteContext::default()), SAMPLE);
    }

    #[test]
    fn changed_entries_rewrite_msgstr_and_flags_only() {
        let mut res = parse(SAMPLE).unwrap();
        {
            let t = res.translations_mut();
            t[1].fuzzy = false;
            t[2].strings.insert(Some(0), "Eine Datei".into());
            t[2].strings.insert(Some(1), "%d Dateien".into());
            t[0].strings.insert(None, "Zeile 1\nZeile 2".into());
        }
        let out = res.serialize(&WriteContext::default());
        assert!(out.contains("#, c-format\nmsgctxt \"menu\"\n"));
        assert!(out.contains("msgstr[0] \"Eine Datei\"\nmsgstr[1] \"%d Dateien\"\n"));
        assert!(out.contains("msgid \"Save\"\nmsgstr \"\"\n\"Zeile 1\\n\"\n\"Zeile 2\"\n"));
        assert!(out.contains("#~ msgid \"Old\"\n"));
    }

    #[test]
    fn header_is_rewritten_from_context() {
        let res = parse(SAMPLE).unwrap();
        let fr = builtin_locale("fr").unwrap();
        let ctx = WriteContext {
            locale: Some(&fr),
            last_translator: Some("Ana <ana@example.com>".into()),
            ..Default::default()
        };
        let out = res.serialize(&ctx);
        assert!(out.starts_with("# German translation.\nmsgid \"\"\nmsgstr \"\"\n"));
        assert!(out.contains("\"Language: fr\\n\"\n"));
        assert!(out.contains(&format!("\"Plural-Forms: {}\\n\"\n", fr.plural_forms_header())));
        assert!(out.contains("\"Last-Translator: Ana <ana@example.com>\\n\"\n\n#. Button label"));
    }

    #[test]
    fn marking_fuzzy_inserts_a_flags_line() {
        let mut res = parse(SAMPLE).unwrap();
        res.translations_mut()[0].fuzzy = true;
        let out = res.serialize(&WriteContext::default());
        assert!(out.contains("#: src/main.c:12 src/other.c\n#, fuzzy\nmsgid \"Save\"\n"));
    }
}
