use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Index into a locale's CLDR plural categories; `None` for strings that are
/// not pluralized.
pub type PluralForm = Option<usize>;

/// A `file:line` reference carried by formats that record where a string is
/// used (gettext `#:` comments).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: Option<u32>,
}

impl SourceLocation {
    pub fn parse(reference: &str) -> Self {
        match reference.rsplit_once(':') {
            Some((file, line)) if !file.is_empty() => match line.parse() {
                Ok(n) => Self {
                    file: file.to_string(),
                    line: Some(n),
                },
                Err(_) => Self {
                    file: reference.to_string(),
                    line: None,
                },
            },
            _ => Self {
                file: reference.to_string(),
                line: None,
            },
        }
    }

    pub fn render(&self) -> String {
        match self.line {
            Some(n) => format!("{}:{}", self.file, n),
            None => self.file.clone(),
        }
    }
}

/// Unified unit every codec produces when parsing a file, for source and
/// target locales alike.
///
/// For a source-locale parse `strings` holds the source value itself; for a
/// target-locale parse it holds the translations keyed by plural form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VcsTranslation {
    /// Format-specific identifier. Empty for formats keyed by source text.
    pub key: String,
    pub context: String,
    pub source_string: String,
    pub source_string_plural: String,
    pub comments: Vec<String>,
    pub group_comment: String,
    pub resource_comment: String,
    /// Position within the file, starting at zero.
    pub order: usize,
    pub source: Vec<SourceLocation>,
    pub strings: BTreeMap<PluralForm, String>,
    pub fuzzy: bool,
    /// Per-translation metadata such as `.lang` tags (`ok`, `l10n-extra`).
    pub tags: BTreeSet<String>,
}

impl VcsTranslation {
    /// Identity of the entity this unit belongs to within its resource.
    pub fn entity_key(&self) -> &str {
        entity_key(&self.key, &self.source_string)
    }

    pub fn is_plural(&self) -> bool {
        !self.source_string_plural.is_empty()
    }

    /// Comments joined the way they are stored on an entity.
    pub fn comment(&self) -> String {
        self.comments.join("\n")
    }

    /// True when at least one plural form carries a translation.
    pub fn has_translation(&self) -> bool {
        !self.strings.is_empty()
    }
}

/// Canonical entity identity inside a resource: the key when the format has
/// one, the source string otherwise.
pub fn entity_key<'a>(key: &'a str, string: &'a str) -> &'a str {
    if key.is_empty() {
        string
    } else {
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_key_falls_back_to_source_string() {
        assert_eq!(entity_key("", "Hello"), "Hello");
        assert_eq!(entity_key("greeting", "Hello"), "greeting");

        let unit = VcsTranslation {
            source_string: "Save".into(),
            ..Default::default()
        };
        assert_eq!(unit.entity_key(), "Save");
    }

    #[test]
    fn source_location_parses_line_suffix() {
        let loc = SourceLocation::parse("src/app.c:42");
        assert_eq!(loc.file, "src/app.c");
        assert_eq!(loc.line, Some(42));
        assert_eq!(loc.render(), "src/app.c:42");

        let bare = SourceLocation::parse("C:notanumber");
        assert_eq!(bare.line, None);
        assert_eq!(bare.file, "C:notanumber");
    }
}
