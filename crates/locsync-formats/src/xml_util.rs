//! Byte-span scanning shared by the XML codecs.
//!
//! The codecs never rebuild a document from events; they locate elements
//! and comments by offset and splice text around them.

use std::ops::Range;
use std::sync::OnceLock;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;

#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    /// Offset of `<`.
    pub start: usize,
    /// Content between the tags; `None` for `<name/>`.
    pub inner: Option<Range<usize>>,
    /// Offset just past the closing `>`.
    pub end: usize,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Offset just past the start tag.
    pub fn start_tag_end(&self) -> usize {
        self.inner.as_ref().map(|r| r.start).unwrap_or(self.end)
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Node {
    Element(Element),
    Comment { start: usize, end: usize, text: String },
}

fn local_name(raw: &[u8]) -> String {
    let s = String::from_utf8_lossy(raw);
    match s.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => s.into_owned(),
    }
}

fn attributes(e: &BytesStart<'_>) -> Result<Vec<(String, String)>, String> {
    let mut out = Vec::new();
    for a in e.attributes() {
        let a = a.map_err(|err| err.to_string())?;
        let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
        let value = a.unescape_value().map_err(|err| err.to_string())?;
        out.push((key, value.into_owned()));
    }
    Ok(out)
}

/// Elements accepted by `wanted(local_name, depth)` and the comments outside
/// them, in document order. Wanted elements nested inside a wanted element
/// are not reported separately.
pub(crate) fn scan(
    text: &str,
    wanted: impl Fn(&str, usize) -> bool,
) -> Result<Vec<Node>, String> {
    let mut reader = Reader::from_str(text);
    let mut nodes = Vec::new();
    // (local name, start offset, inner start) of open elements.
    let mut stack: Vec<(String, usize, usize)> = Vec::new();
    let mut open: Option<(usize, Element)> = None;

    loop {
        let before = reader.buffer_position() as usize;
        let event = reader
            .read_event()
            .map_err(|e| format!("at byte {}: {e}", reader.buffer_position()))?;
        let after = reader.buffer_position() as usize;
        match event {
            Event::Start(e) => {
                let name = local_name(e.name().as_ref());
                let depth = stack.len();
                if open.is_none() && wanted(&name, depth) {
                    open = Some((
                        depth,
                        Element {
                            name: name.clone(),
                            attrs: attributes(&e)?,
                            start: before,
                            inner: None,
                            end: after,
                        },
                    ));
                }
                stack.push((name, before, after));
            }
            Event::End(_) => {
                let Some((_, _, inner_start)) = stack.pop() else {
                    return Err(format!("unbalanced end tag at byte {before}"));
                };
                if let Some((depth, _)) = &open {
                    if *depth == stack.len() {
                        if let Some((_, mut el)) = open.take() {
                            el.inner = Some(inner_start..before);
                            el.end = after;
                            nodes.push(Node::Element(el));
                        }
                    }
                }
            }
            Event::Empty(e) => {
                let name = local_name(e.name().as_ref());
                if open.is_none() && wanted(&name, stack.len()) {
                    nodes.push(Node::Element(Element {
                        name,
                        attrs: attributes(&e)?,
                        start: before,
                        inner: None,
                        end: after,
                    }));
                }
            }
            Event::Comment(_) if open.is_none() => {
                let body = text
                    .get(before + 4..after.saturating_sub(3))
                    .unwrap_or_default();
                nodes.push(Node::Comment {
                    start: before,
                    end: after,
                    text: body.trim().to_string(),
                });
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if let Some((name, _, _)) = stack.last() {
        return Err(format!("unclosed element <{name}>"));
    }
    Ok(nodes)
}

/// Whether the text between a comment and the element after it keeps them
/// on adjacent lines.
pub(crate) fn adjacent(between: &str) -> bool {
    between.trim().is_empty() && between.matches('\n').count() <= 1
}

/// Resolve the predefined and numeric character references.
pub(crate) fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').and_then(|semi| {
            let name = &tail[1..semi];
            let ch = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => name
                    .strip_prefix("#x")
                    .or_else(|| name.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| name.strip_prefix('#').and_then(|d| d.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, semi + 1))
        });
        match decoded {
            Some((c, len)) => {
                out.push(c);
                rest = &tail[len..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^</?[A-Za-z][\w:.-]*(\s+[\w:.-]+\s*=\s*("[^"]*"|'[^']*'))*\s*/?>"#)
            .expect("tag regex compiles")
    })
}

/// Escape text content, leaving inline markup (`<b>`, `<xliff:g id="x">`)
/// intact.
pub(crate) fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    let mut i = 0;
    while i < s.len() {
        let rest = &s[i..];
        let Some(c) = rest.chars().next() else { break };
        match c {
            '&' => out.push_str("&amp;"),
            '<' => match tag_re().find(rest) {
                Some(m) => {
                    out.push_str(m.as_str());
                    i += m.end();
                    continue;
                }
                None => out.push_str("&lt;"),
            },
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
        i += c.len_utf8();
    }
    out
}

pub(crate) fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('"', "&quot;")
}

/// Indentation in front of the line that `pos` is on.
pub(crate) fn indent_before(text: &str, pos: usize) -> &str {
    let line_start = text[..pos].rfind('\n').map(|n| n + 1).unwrap_or(0);
    let ws = &text[line_start..pos];
    if ws.trim().is_empty() {
        ws
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_reports_offsets_of_wanted_elements_and_comments() {
        let text = "<r>\n  <!-- note -->\n  <a k=\"v\">x<b/>y</a>\n  <a/>\n</r>\n";
        let nodes = scan(text, |name, depth| name == "a" && depth == 1).unwrap();
        assert_eq!(nodes.len(), 3);
        let Node::Comment { text: note, .. } = &nodes[0] else {
            panic!("expected comment");
        };
        assert_eq!(note, "note");
        let Node::Element(a) = &nodes[1] else {
            panic!("expected element");
        };
        assert_eq!(&text[a.start..a.end], "<a k=\"v\">x<b/>y</a>");
        assert_eq!(&text[a.inner.clone().unwrap()], "x<b/>y");
        assert_eq!(a.attr("k"), Some("v"));
        let Node::Element(empty) = &nodes[2] else {
            panic!("expected element");
        };
        assert!(empty.inner.is_none());
    }

    #[test]
    fn unclosed_document_is_an_error() {
        assert!(scan("<r><a>", |_, _| true).is_err());
    }

    #[test]
    fn entities_and_markup() {
        assert_eq!(decode_entities("a &amp; b &#233; &lt;x&gt; &bogus;"), "a & b é <x> &bogus;");
        assert_eq!(escape_text("1 < 2 & <b>bold</b>"), "1 &lt; 2 &amp; <b>bold</b>");
        assert_eq!(indent_before("x\n    <a>", 6), "    ");
    }
}
