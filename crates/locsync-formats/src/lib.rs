//! Format Codec Layer.
//!
//! Every supported file format parses into a [`VcsResource`]: an ordered list
//! of [`VcsTranslation`] units plus whatever the format needs to write the
//! file back. Each unit remembers its untouched text, so serializing a
//! resource whose translations were not modified reproduces the input
//! byte-for-byte (the gettext header fields listed in [`WriteContext`] are
//! the only exception, and only when the context asks for them).

mod document;
mod format;

mod android;
mod dtd;
mod ftl;
mod inc;
mod ini;
mod json;
mod lang;
mod po;
mod properties;
mod xliff;

mod xml_util;

use std::path::Path;

pub use format::Format;
use locsync_core::{Locale, VcsTranslation};

pub(crate) use document::{Document, Segment, UnitSpan};

/// A file that cannot be decoded at all. Recoverable problems inside a
/// readable file never surface as this error; the offending unit is skipped.
#[derive(Debug, thiserror::Error)]
#[error("cannot parse {path} as {format}: {message}")]
pub struct ParseError {
    pub path: String,
    pub format: Format,
    pub message: String,
}

/// Values written into volatile header fields on serialize. Unset fields
/// keep what the file carried.
#[derive(Debug, Clone, Default)]
pub struct WriteContext<'a> {
    pub locale: Option<&'a Locale>,
    /// `Name <email>` of the most recent translator.
    pub last_translator: Option<String>,
    /// Already-formatted revision date (`2024-01-31 12:00+0000`).
    pub revision_date: Option<String>,
    pub generator: Option<String>,
}

/// Per-format state that does not fit the segment model.
#[derive(Debug, Clone)]
pub(crate) enum Extra {
    None,
    Po(po::Header),
    Json(json::JsonExtra),
}

/// A parsed file.
#[derive(Debug, Clone)]
pub struct VcsResource {
    format: Format,
    translations: Vec<VcsTranslation>,
    originals: Vec<VcsTranslation>,
    doc: Document,
    extra: Extra,
    bom: bool,
}

impl VcsResource {
    pub(crate) fn new(
        format: Format,
        translations: Vec<VcsTranslation>,
        doc: Document,
        extra: Extra,
    ) -> Self {
        Self {
            format,
            originals: translations.clone(),
            translations,
            doc,
            extra,
            bom: false,
        }
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn translations(&self) -> &[VcsTranslation] {
        &self.translations
    }

    /// Units may be edited (strings, fuzzy) but not added or removed; a unit
    /// whose `strings` is emptied is written as untranslated.
    pub fn translations_mut(&mut self) -> &mut [VcsTranslation] {
        &mut self.translations
    }

    pub fn find(&self, entity_key: &str) -> Option<&VcsTranslation> {
        self.translations
            .iter()
            .find(|t| t.entity_key() == entity_key)
    }

    pub(crate) fn is_changed(&self, idx: usize) -> bool {
        self.translations[idx] != self.originals[idx]
    }

    pub fn serialize(&self, ctx: &WriteContext<'_>) -> String {
        let body = match self.format {
            Format::Po => po::serialize(self, ctx),
            Format::Xliff => xliff::serialize(self, ctx),
            Format::Ftl => ftl::serialize(self, ctx),
            Format::Properties => properties::serialize(self),
            Format::Dtd => dtd::serialize(self),
            Format::Ini => ini::serialize(self),
            Format::Inc => inc::serialize(self),
            Format::Lang => lang::serialize(self),
            Format::Json => json::serialize(self),
            Format::Android => android::serialize(self, ctx),
        };
        if self.bom {
            format!("\u{feff}{body}")
        } else {
            body
        }
    }

    /// Emit the document, rendering changed units with `render`. A `None`
    /// from `render` drops the unit together with its leading text.
    pub(crate) fn render_segments(
        &self,
        mut render: impl FnMut(usize, &VcsTranslation, &UnitSpan) -> Option<String>,
    ) -> String {
        let mut out = String::new();
        for seg in &self.doc.segments {
            match seg {
                Segment::Text(t) => out.push_str(t),
                Segment::Unit(i) => {
                    let span = &self.doc.units[*i];
                    if !self.is_changed(*i) {
                        out.push_str(&span.leading);
                        out.push_str(&span.raw);
                    } else if let Some(body) = render(*i, &self.translations[*i], span) {
                        out.push_str(&span.leading);
                        out.push_str(&body);
                    }
                }
            }
        }
        out
    }
}

/// Parse `text` as `format`. `locale` is the locale of a target file and is
/// needed by formats that address plural forms by CLDR category.
pub fn parse(
    format: Format,
    text: &str,
    locale: Option<&Locale>,
) -> Result<VcsResource, ParseError> {
    parse_text(format, text, locale).map_err(|message| ParseError {
        path: "<input>".to_string(),
        format,
        message,
    })
}

fn parse_text(
    format: Format,
    text: &str,
    locale: Option<&Locale>,
) -> Result<VcsResource, String> {
    let (text, bom) = match text.strip_prefix('\u{feff}') {
        Some(rest) => (rest, true),
        None => (text, false),
    };
    let mut res = match format {
        Format::Po => po::parse(text),
        Format::Xliff => xliff::parse(text),
        Format::Ftl => ftl::parse(text),
        Format::Properties => Ok(properties::parse(text)),
        Format::Dtd => Ok(dtd::parse(text)),
        Format::Ini => Ok(ini::parse(text)),
        Format::Inc => Ok(inc::parse(text)),
        Format::Lang => Ok(lang::parse(text)),
        Format::Json => json::parse(text),
        Format::Android => android::parse(text, locale),
    }?;
    res.bom = bom;
    Ok(res)
}

/// Read and parse a file, mapping every failure to [`ParseError`].
pub fn parse_file(
    path: &Path,
    format: Format,
    locale: Option<&Locale>,
) -> Result<VcsResource, ParseError> {
    let err = |message: String| ParseError {
        path: path.display().to_string(),
        format,
        message,
    };
    let bytes = std::fs::read(path).map_err(|e| err(e.to_string()))?;
    let text = String::from_utf8(bytes).map_err(|e| err(format!("not valid UTF-8: {e}")))?;
    parse_text(format, &text, locale).map_err(err)
}

/// Syntax error of a Fluent entry as stored in a translation string, if any.
pub fn fluent_syntax_error(entry: &str) -> Option<String> {
    ftl::parse_entry(entry).err()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bom_is_kept_across_a_round_trip() {
        let text = "\u{feff}key=value\n";
        let res = parse(Format::Properties, text, None).unwrap();
        assert_eq!(res.translations()[0].key, "key");
        assert_eq!(res.serialize(&WriteContext::default()), text);
    }

    #[test]
    fn parse_file_reports_path_and_encoding_problems() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("app.properties");
        std::fs::write(&good, "a=b\n").unwrap();
        let res = parse_file(&good, Format::from_path(&good).unwrap(), None).unwrap();
        assert_eq!(res.find("a").map(|t| t.source_string.as_str()), Some("b"));

        let bad = dir.path().join("bad.properties");
        std::fs::write(&bad, [0xff, 0xfe, b'a']).unwrap();
        let err = parse_file(&bad, Format::Properties, None).unwrap_err();
        assert!(err.path.ends_with("bad.properties"));
        assert!(err.message.contains("UTF-8"));
    }

    #[test]
    fn fluent_entries_are_checked() {
        assert_eq!(fluent_syntax_error("key = Value\n"), None);
        assert!(fluent_syntax_error("key = { $x").is_some());
    }
}
