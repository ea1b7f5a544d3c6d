//! Fluent `.ftl` files.
//!
//! A message (or term) is one unit. Its string is the canonical
//! serialization of the whole entry, `id = value` plus attributes, so
//! translations are compared and stored independently of how the file
//! happened to be indented. `#` comments directly above an entry belong to
//! it; `##` and `###` comments set the group and resource comment of the
//! entries that follow.

use std::collections::BTreeMap;

use locsync_core::{Locale, PluralCategory, VcsTranslation};

use crate::dtd::{line_end, rest_of_line};
use crate::document::content;
use crate::properties::PendingComment;
use crate::{Document, Extra, Format, Segment, UnitSpan, VcsResource, WriteContext};

pub(crate) type Pattern = Vec<Element>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Element {
    Text(String),
    Placeable(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    /// Canonical text of a literal, reference or call.
    Inline(String),
    Select {
        selector: String,
        variants: Vec<Variant>,
    },
    Placeable(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Variant {
    pub key: String,
    pub default: bool,
    pub value: Pattern,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Entry {
    pub id: String,
    pub value: Option<Pattern>,
    pub attributes: Vec<(String, Pattern)>,
}

type PResult<T> = Result<T, String>;

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic()
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

impl<'a> Parser<'a> {
    fn new(src: &'a str, pos: usize) -> Self {
        Self { src, pos }
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.as_bytes().get(self.pos + offset).copied()
    }

    fn err<T>(&self, msg: &str) -> PResult<T> {
        Err(format!("{msg} at byte {}", self.pos))
    }

    fn expect(&mut self, b: u8) -> PResult<()> {
        if self.peek() == Some(b) {
            self.pos += 1;
            Ok(())
        } else {
            self.err(&format!("expected '{}'", b as char))
        }
    }

    fn skip_blank_inline(&mut self) {
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
    }

    /// Spaces and line breaks.
    fn skip_blank(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn newline_len(&self, at: usize) -> usize {
        match (self.src.as_bytes().get(at), self.src.as_bytes().get(at + 1)) {
            (Some(b'\n'), _) => 1,
            (Some(b'\r'), Some(b'\n')) => 2,
            _ => 0,
        }
    }

    /// At a line break, look for an indented continuation line. Returns the
    /// blank lines crossed, the indentation width and the offset of the
    /// first content byte.
    fn peek_block_line(&self) -> Option<(usize, usize, usize)> {
        let bytes = self.src.as_bytes();
        let mut at = self.pos;
        let mut breaks = 0;
        loop {
            let nl = self.newline_len(at);
            if nl == 0 {
                return None;
            }
            at += nl;
            breaks += 1;
            let line_start = at;
            while bytes.get(at) == Some(&b' ') {
                at += 1;
            }
            if self.newline_len(at) > 0 {
                continue;
            }
            let indent = at - line_start;
            return match bytes.get(at) {
                None => None,
                Some(b'[' | b'*' | b'.' | b'}') => None,
                Some(_) if indent == 0 => None,
                Some(_) => Some((breaks - 1, indent, at)),
            };
        }
    }

    fn identifier(&mut self) -> PResult<String> {
        let start = self.pos;
        match self.peek() {
            Some(b) if is_ident_start(b) => self.pos += 1,
            _ => return self.err("expected identifier"),
        }
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn entry(&mut self) -> PResult<Entry> {
        let term = self.peek() == Some(b'-');
        if term {
            self.pos += 1;
        }
        let name = self.identifier()?;
        let id = if term { format!("-{name}") } else { name };
        self.skip_blank_inline();
        self.expect(b'=')?;
        let value = self.pattern()?;

        let mut attributes = Vec::new();
        loop {
            let save = self.pos;
            if self.newline_len(self.pos) == 0 {
                break;
            }
            self.skip_blank();
            if self.peek() != Some(b'.') {
                self.pos = save;
                break;
            }
            self.pos += 1;
            let name = self.identifier()?;
            self.skip_blank_inline();
            self.expect(b'=')?;
            match self.pattern()? {
                Some(p) => attributes.push((name, p)),
                None => return self.err("attribute without value"),
            }
        }

        if value.is_none() && (term || attributes.is_empty()) {
            return self.err("entry without value");
        }
        Ok(Entry {
            id,
            value,
            attributes,
        })
    }

    fn pattern(&mut self) -> PResult<Option<Pattern>> {
        enum Raw {
            Text(String),
            Indent { breaks: usize, width: usize },
            Placeable(Expr),
        }

        self.skip_blank_inline();
        let mut raw = Vec::new();
        let mut common: Option<usize> = None;

        if self.newline_len(self.pos) > 0 {
            let Some((_, width, at)) = self.peek_block_line() else {
                return Ok(None);
            };
            self.pos = at;
            raw.push(Raw::Indent { breaks: 0, width });
            common = Some(width);
        }

        while let Some(b) = self.peek() {
            match b {
                b'{' => raw.push(Raw::Placeable(self.placeable()?)),
                b'}' => return self.err("unbalanced '}'"),
                b'\n' | b'\r' => {
                    let Some((blank, width, at)) = self.peek_block_line() else {
                        break;
                    };
                    self.pos = at;
                    raw.push(Raw::Indent {
                        breaks: blank + 1,
                        width,
                    });
                    common = Some(common.map_or(width, |c| c.min(width)));
                }
                _ => {
                    let start = self.pos;
                    while !matches!(self.peek(), None | Some(b'{' | b'}' | b'\n' | b'\r')) {
                        self.pos += 1;
                    }
                    raw.push(Raw::Text(self.src[start..self.pos].to_string()));
                }
            }
        }

        let common = common.unwrap_or(0);
        let mut out: Pattern = Vec::new();
        for piece in raw {
            let text = match piece {
                Raw::Placeable(expr) => {
                    out.push(Element::Placeable(expr));
                    continue;
                }
                Raw::Text(t) => t,
                Raw::Indent { breaks, width } => {
                    format!("{}{}", "\n".repeat(breaks), " ".repeat(width - common))
                }
            };
            match out.last_mut() {
                Some(Element::Text(prev)) => prev.push_str(&text),
                _ => out.push(Element::Text(text)),
            }
        }
        if let Some(Element::Text(last)) = out.last_mut() {
            let trimmed = last.trim_end_matches([' ', '\t', '\n', '\r']).len();
            last.truncate(trimmed);
            if last.is_empty() {
                out.pop();
            }
        }
        out.retain(|e| !matches!(e, Element::Text(t) if t.is_empty()));
        Ok((!out.is_empty()).then_some(out))
    }

    fn placeable(&mut self) -> PResult<Expr> {
        self.expect(b'{')?;
        self.skip_blank();
        if self.peek() == Some(b'{') {
            let inner = self.placeable()?;
            self.skip_blank();
            self.expect(b'}')?;
            return Ok(Expr::Placeable(Box::new(inner)));
        }
        let selector = self.inline_expression()?;
        self.skip_blank();
        if self.src[self.pos..].starts_with("->") {
            self.pos += 2;
            let variants = self.variants()?;
            self.skip_blank();
            self.expect(b'}')?;
            return Ok(Expr::Select { selector, variants });
        }
        self.expect(b'}')?;
        Ok(Expr::Inline(selector))
    }

    fn variants(&mut self) -> PResult<Vec<Variant>> {
        let mut variants = Vec::new();
        loop {
            let save = self.pos;
            self.skip_blank();
            let default = self.peek() == Some(b'*');
            if default {
                self.pos += 1;
            }
            if self.peek() != Some(b'[') {
                if default {
                    return self.err("expected variant key");
                }
                self.pos = save;
                break;
            }
            self.pos += 1;
            self.skip_blank();
            let start = self.pos;
            while self
                .peek()
                .is_some_and(|b| is_ident_char(b) || b == b'.')
            {
                self.pos += 1;
            }
            if start == self.pos {
                return self.err("empty variant key");
            }
            let key = self.src[start..self.pos].to_string();
            self.skip_blank();
            self.expect(b']')?;
            let Some(value) = self.pattern()? else {
                return self.err("variant without value");
            };
            variants.push(Variant {
                key,
                default,
                value,
            });
        }
        match variants.iter().filter(|v| v.default).count() {
            1 => Ok(variants),
            _ => self.err("select expression needs exactly one default variant"),
        }
    }

    fn inline_expression(&mut self) -> PResult<String> {
        match self.peek() {
            Some(b'"') => {
                let start = self.pos;
                self.pos += 1;
                loop {
                    match self.peek() {
                        Some(b'\\') => self.pos += 2,
                        Some(b'"') => {
                            self.pos += 1;
                            break;
                        }
                        None | Some(b'\n' | b'\r') => return self.err("unterminated string"),
                        Some(_) => self.pos += 1,
                    }
                }
                Ok(self.src[start..self.pos].to_string())
            }
            Some(b) if b.is_ascii_digit() => Ok(self.number()),
            Some(b'-') if self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) => Ok(self.number()),
            Some(b'$') => {
                self.pos += 1;
                Ok(format!("${}", self.identifier()?))
            }
            Some(b'-') => {
                self.pos += 1;
                let mut out = format!("-{}", self.identifier()?);
                out.push_str(&self.attribute_accessor()?);
                if self.peek() == Some(b'(') {
                    out.push_str(&self.call_arguments()?);
                }
                Ok(out)
            }
            Some(b) if is_ident_start(b) => {
                let name = self.identifier()?;
                if self.peek() == Some(b'(') {
                    return Ok(format!("{name}{}", self.call_arguments()?));
                }
                Ok(format!("{name}{}", self.attribute_accessor()?))
            }
            _ => self.err("expected expression"),
        }
    }

    fn number(&mut self) -> String {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_digit() || b == b'.')
        {
            self.pos += 1;
        }
        self.src[start..self.pos].to_string()
    }

    fn attribute_accessor(&mut self) -> PResult<String> {
        if self.peek() == Some(b'.') {
            self.pos += 1;
            return Ok(format!(".{}", self.identifier()?));
        }
        Ok(String::new())
    }

    fn call_arguments(&mut self) -> PResult<String> {
        self.expect(b'(')?;
        let mut positional = Vec::new();
        let mut named = Vec::new();
        loop {
            self.skip_blank();
            if self.peek() == Some(b')') {
                break;
            }
            let expr = self.inline_expression()?;
            self.skip_blank();
            if self.peek() == Some(b':') {
                self.pos += 1;
                self.skip_blank();
                let value = self.inline_expression()?;
                named.push(format!("{expr}: {value}"));
            } else {
                positional.push(expr);
            }
            self.skip_blank();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b')') => break,
                _ => return self.err("expected ',' or ')'"),
            }
        }
        self.expect(b')')?;
        positional.extend(named);
        Ok(format!("({})", positional.join(", ")))
    }
}

/// Parse a single entry (`id = ...`), as stored in a unit's string.
pub(crate) fn parse_entry(text: &str) -> PResult<Entry> {
    let trimmed = text.trim_start_matches(['\n', '\r']);
    let offset = text.len() - trimmed.len();
    let mut p = Parser::new(text, offset);
    let entry = p.entry()?;
    if !text[p.pos..].trim().is_empty() {
        return p.err("trailing content after entry");
    }
    Ok(entry)
}

fn indent_except_first_line(s: &str) -> String {
    s.replace('\n', "\n    ")
}

fn serialize_pattern(pattern: &Pattern) -> String {
    let content: String = pattern.iter().map(serialize_element).collect();
    let multiline = pattern.iter().any(|e| match e {
        Element::Text(t) => t.contains('\n'),
        Element::Placeable(Expr::Select { .. }) => true,
        Element::Placeable(_) => false,
    });
    let starts_special = matches!(
        pattern.first(),
        Some(Element::Text(t)) if t.starts_with(['[', '.', '*'])
    );
    if multiline && !starts_special {
        format!("\n    {}", indent_except_first_line(&content))
    } else {
        format!(" {}", indent_except_first_line(&content))
    }
}

fn serialize_element(e: &Element) -> String {
    match e {
        Element::Text(t) => t.clone(),
        Element::Placeable(expr) => serialize_placeable(expr),
    }
}

fn serialize_placeable(expr: &Expr) -> String {
    match expr {
        Expr::Placeable(inner) => format!("{{{}}}", serialize_placeable(inner)),
        Expr::Select { .. } => format!("{{ {}}}", serialize_expression(expr)),
        Expr::Inline(s) => format!("{{ {s} }}"),
    }
}

fn serialize_expression(expr: &Expr) -> String {
    match expr {
        Expr::Inline(s) => s.clone(),
        Expr::Placeable(inner) => serialize_placeable(inner),
        Expr::Select { selector, variants } => {
            let mut out = format!("{selector} ->");
            for v in variants {
                let value = indent_except_first_line(&serialize_pattern(&v.value));
                let marker = if v.default { "   *" } else { "    " };
                out.push_str(&format!("\n{marker}[{}]{value}", v.key));
            }
            out.push('\n');
            out
        }
    }
}

/// Canonical text of an entry, ending with a newline.
pub(crate) fn serialize_entry(entry: &Entry) -> String {
    let mut out = format!("{} =", entry.id);
    if let Some(value) = &entry.value {
        out.push_str(&serialize_pattern(value));
    }
    for (name, pattern) in &entry.attributes {
        let value = indent_except_first_line(&serialize_pattern(pattern));
        out.push_str(&format!("\n    .{name} ={value}"));
    }
    out.push('\n');
    out
}

/// Give every plural select the variants `locale` needs, copying the value
/// of the highest existing category, and order the keys numbers first, then
/// by CLDR category.
pub(crate) fn normalize_plurals(entry: &mut Entry, locale: &Locale) {
    fn walk(pattern: &mut Pattern, locale: &Locale) {
        for element in pattern.iter_mut() {
            if let Element::Placeable(expr) = element {
                walk_expr(expr, locale);
            }
        }
    }
    fn walk_expr(expr: &mut Expr, locale: &Locale) {
        match expr {
            Expr::Inline(_) => {}
            Expr::Placeable(inner) => walk_expr(inner, locale),
            Expr::Select { variants, .. } => {
                for v in variants.iter_mut() {
                    walk(&mut v.value, locale);
                }
                normalize_select(variants, locale);
            }
        }
    }
    if let Some(value) = &mut entry.value {
        walk(value, locale);
    }
    for (_, pattern) in &mut entry.attributes {
        walk(pattern, locale);
    }
}

fn normalize_select(variants: &mut Vec<Variant>, locale: &Locale) {
    let is_number = |k: &str| k.parse::<f64>().is_ok();
    let categories: Vec<Option<PluralCategory>> = variants
        .iter()
        .map(|v| PluralCategory::parse(&v.key).ok())
        .collect();
    let is_plural = categories.iter().any(Option::is_some)
        && variants
            .iter()
            .zip(&categories)
            .all(|(v, c)| c.is_some() || is_number(&v.key));
    if !is_plural {
        return;
    }

    let Some(template) = variants
        .iter()
        .zip(&categories)
        .filter_map(|(v, c)| c.map(|c| (c, v)))
        .max_by_key(|(c, _)| c.index())
        .map(|(_, v)| v.value.clone())
    else {
        return;
    };
    for category in &locale.cldr_plurals {
        if !categories.contains(&Some(*category)) {
            variants.push(Variant {
                key: category.as_str().to_string(),
                default: false,
                value: template.clone(),
            });
        }
    }

    let mut numbers: Vec<Variant> = Vec::new();
    let mut by_category: BTreeMap<u8, Variant> = BTreeMap::new();
    for v in variants.drain(..) {
        match PluralCategory::parse(&v.key) {
            Ok(c) => {
                by_category.insert(c.index(), v);
            }
            Err(_) => numbers.push(v),
        }
    }
    variants.extend(numbers);
    variants.extend(by_category.into_values());
}

fn starts_entry(line: &str) -> bool {
    let bytes = line.as_bytes();
    let start = usize::from(bytes.first() == Some(&b'-'));
    if !bytes.get(start).copied().is_some_and(is_ident_start) {
        return false;
    }
    let mut i = start;
    while bytes.get(i).copied().is_some_and(is_ident_char) {
        i += 1;
    }
    line[i..].trim_start_matches(' ').starts_with('=')
}

/// The text of a comment line of the given level (`#`, `##`, `###`).
fn comment_line(line: &str, level: usize) -> Option<&str> {
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    if hashes != level {
        return None;
    }
    let rest = &line[level..];
    if rest.is_empty() {
        return Some("");
    }
    rest.strip_prefix(' ')
}

pub(crate) fn parse(text: &str) -> Result<VcsResource, String> {
    let mut doc = Document::default();
    let mut units: Vec<VcsTranslation> = Vec::new();
    let mut pending = PendingComment::default();
    let mut group_comment = String::new();
    let mut group_lines: Option<Vec<String>> = None;
    let mut resource_lines: Vec<String> = Vec::new();

    let mut pos = 0;
    while pos < text.len() {
        let eol = line_end(text, pos);
        let line = content(&text[pos..eol]);

        if let Some(c) = comment_line(line, 2) {
            pending.flush_into(&mut doc);
            group_lines.get_or_insert_with(Vec::new).push(c.to_string());
            doc.push_text(&text[pos..eol]);
            pos = eol;
            continue;
        }
        if let Some(lines) = group_lines.take() {
            group_comment = lines.join("\n").trim().to_string();
        }
        if let Some(c) = comment_line(line, 3) {
            pending.flush_into(&mut doc);
            resource_lines.push(c.to_string());
            doc.push_text(&text[pos..eol]);
            pos = eol;
            continue;
        }
        if let Some(c) = comment_line(line, 1) {
            pending.push(&text[pos..eol], c);
            pos = eol;
            continue;
        }
        if line.trim().is_empty() {
            pending.flush_into(&mut doc);
            doc.push_text(&text[pos..eol]);
            pos = eol;
            continue;
        }
        if starts_entry(line) {
            let mut p = Parser::new(text, pos);
            match p.entry() {
                Ok(entry) => {
                    let end = rest_of_line(text, p.pos);
                    let string = serialize_entry(&entry);
                    let (leading, comments) = pending.take();
                    units.push(VcsTranslation {
                        key: entry.id,
                        source_string: string.clone(),
                        comments,
                        group_comment: group_comment.clone(),
                        order: units.len(),
                        strings: BTreeMap::from([(None, string)]),
                        ..Default::default()
                    });
                    doc.push_unit(UnitSpan {
                        leading,
                        raw: text[pos..end].to_string(),
                    });
                    pos = end;
                    continue;
                }
                Err(e) => {
                    let line_no = text[..pos].matches('\n').count() + 1;
                    tracing::warn!(event = "ftl_junk", line = line_no, error = %e);
                }
            }
        }

        // Junk runs until the next line that could start an entry or comment.
        pending.flush_into(&mut doc);
        let mut end = eol;
        while end < text.len() {
            let next = &text[end..line_end(text, end)];
            if next.starts_with('#') || starts_entry(next) {
                break;
            }
            end = line_end(text, end);
        }
        doc.push_text(&text[pos..end]);
        pos = end;
    }
    pending.flush_into(&mut doc);

    let resource_comment = resource_lines.join("\n").trim().to_string();
    for unit in &mut units {
        unit.resource_comment = resource_comment.clone();
    }
    Ok(VcsResource::new(Format::Ftl, units, doc, Extra::None))
}

fn render_unit(t: &VcsTranslation, ctx: &WriteContext<'_>) -> Option<String> {
    let string = t.strings.get(&None)?;
    match parse_entry(string) {
        Ok(mut entry) => {
            if let Some(locale) = ctx.locale {
                normalize_plurals(&mut entry, locale);
            }
            Some(serialize_entry(&entry))
        }
        Err(e) => {
            tracing::warn!(event = "ftl_translation_unparsable", key = %t.key, error = %e);
            let mut raw = string.clone();
            if !raw.ends_with('\n') {
                raw.push('\n');
            }
            Some(raw)
        }
    }
}

pub(crate) fn serialize(res: &VcsResource, ctx: &WriteContext<'_>) -> String {
    let mut out = String::new();
    let mut dropped = false;
    for seg in &res.doc.segments {
        match seg {
            Segment::Text(t) => {
                let t = if dropped && out.ends_with("\n\n") {
                    t.strip_prefix('\n').unwrap_or(t)
                } else {
                    t.as_str()
                };
                out.push_str(t);
                dropped = false;
            }
            Segment::Unit(i) => {
                let span = &res.doc.units[*i];
                let body = if res.is_changed(*i) {
                    render_unit(&res.translations[*i], ctx)
                } else {
                    Some(span.raw.clone())
                };
                match body {
                    Some(body) => {
                        out.push_str(&span.leading);
                        out.push_str(&body);
                        dropped = false;
                    }
                    None => dropped = true,
                }
            }
        }
    }
    if out.trim().is_empty() {
        out.clear();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use locsync_core::builtin_locale;

    const SAMPLE: &str = "### Resource notes\n\n## Menu\n\n# Shown in the title bar\nhello = Hello, { $name }!\n-brand = Firefox\n\nemails = { $count ->\n    [one] One email\n   *[other] { $count } emails\n}\n\n## Dialogs\n\nlogin = Log in\n    .title = Log in to { -brand }\n    .accesskey = L\n!!! junk\n";

    #[test]
    fn parses_messages_terms_and_comments() {
        let res = parse(SAMPLE).unwrap();
        let t = res.translations();
        assert_eq!(t.len(), 4);
        assert_eq!(t[0].key, "hello");
        assert_eq!(t[0].source_string, "hello = Hello, { $name }!\n");
        assert_eq!(t[0].comments, vec!["Shown in the title bar"]);
        assert_eq!(t[0].group_comment, "Menu");
        assert_eq!(t[0].resource_comment, "Resource notes");
        assert_eq!(t[1].key, "-brand");
        assert!(t[1].comments.is_empty());
        assert_eq!(t[3].group_comment, "Dialogs");
        assert_eq!(
            t[3].source_string,
            "login = Log in\n    .title = Log in to { -brand }\n    .accesskey = L\n"
        );
    }

    #[test]
    fn select_expressions_serialize_canonically() {
        let res = parse(SAMPLE).unwrap();
        assert_eq!(
            res.translations()[2].source_string,
            "emails =\n    { $count ->\n        [one] One email\n       *[other] { $count } emails\n    }\n"
        );
    }

    #[test]
    fn block_text_is_dedented() {
        let entry = parse_entry("multi =\n        First line\n          indented\n\n        after blank\n").unwrap();
        assert_eq!(
            entry.value,
            Some(vec![Element::Text("First line\n  indented\n\nafter blank".into())])
        );
        assert_eq!(
            serialize_entry(&entry),
            "multi =\n    First line\n      indented\n    \n    after blank\n"
        );
    }

    #[test]
    fn call_arguments_are_normalized() {
        let entry = parse_entry("n = { NUMBER($n,minimumFractionDigits:2) } and { -term(case:\"gen\") }").unwrap();
        assert_eq!(
            serialize_entry(&entry),
            "n = { NUMBER($n, minimumFractionDigits: 2) } and { -term(case: \"gen\") }\n"
        );
    }

    #[test]
    fn unchanged_round_trip_is_byte_identical() {
        let res = parse(SAMPLE).unwrap();
        assert_eq!(res.serialize(&WriteContext::default()), SAMPLE);
    }

    #[test]
    fn dropping_an_entry_collapses_the_blank_line() {
        let mut res = parse(SAMPLE).unwrap();
        res.translations_mut()[2].strings.clear();
        let out = res.serialize(&WriteContext::default());
        assert!(out.contains("-brand = Firefox\n\n## Dialogs\n"));
        assert!(!out.contains("\n\n\n"));
    }

    #[test]
    fn write_back_fills_plural_categories_for_the_locale() {
        let mut res = parse(SAMPLE).unwrap();
        res.translations_mut()[2].strings.insert(
            None,
            "emails = { $count ->\n    [one] Jeden\n   *[other] Wiele\n}\n".into(),
        );
        let pl = builtin_locale("pl").unwrap();
        let ctx = WriteContext {
            locale: Some(&pl),
            ..Default::default()
        };
        let out = res.serialize(&ctx);
        assert!(out.contains(
            "emails =\n    { $count ->\n        [one] Jeden\n        [few] Wiele\n        [many] Wiele\n       *[other] Wiele\n    }\n"
        ));
    }

    #[test]
    fn broken_entries_are_junk() {
        assert!(parse_entry("broken = { $x").is_err());
        assert!(parse_entry("sel = { $n ->\n    [one] x\n}").is_err());
        let res = parse("ok = Fine\nbad = { oops\n\nnext = Next\n").unwrap();
        let keys: Vec<_> = res.translations().iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["ok", "next"]);
    }
}
