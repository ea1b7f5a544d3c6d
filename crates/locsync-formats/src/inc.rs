//! Preprocessor `.inc` files: `#define KEY value` lines. `# ` lines are
//! comments; other directives (`#filter`, `#unfilter`, ...) are kept as text.

use std::collections::BTreeMap;

use locsync_core::VcsTranslation;

use crate::document::{content, line_ending, physical_lines};
use crate::properties::PendingComment;
use crate::{Document, Extra, Format, UnitSpan, VcsResource};

const DEFINE: &str = "#define";

pub(crate) fn parse(text: &str) -> VcsResource {
    let mut doc = Document::default();
    let mut units = Vec::new();
    let mut pending = PendingComment::default();

    for line in physical_lines(text) {
        let trimmed = content(line).trim_start();
        if trimmed == "#" || trimmed.starts_with("# ") {
            pending.push(line, trimmed[1..].trim());
            continue;
        }
        let Some((prefix_len, key)) = split_define(content(line)) else {
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

    VcsResource::new(Format::Inc, units, doc, Extra::None)
}

pub(crate) fn serialize(res: &VcsResource) -> String {
    res.render_segments(|_, t, span| {
        let value = t.strings.get(&None)?;
        let (prefix_len, _) = split_define(content(&span.raw))?;
        let prefix = &span.raw[..prefix_len];
        let sep = if prefix.ends_with(char::is_whitespace) || value.is_empty() {
            ""
        } else {
            " "
        };
        Some(format!(
            "{prefix}{sep}{}{}",
            value.replace('\n', " "),
            line_ending(&span.raw)
        ))
    })
}

/// Length of `#define KEY ` and the key.
fn split_define(line: &str) -> Option<(usize, &str)> {
    let indent = line.len() - line.trim_start().len();
    let rest = line[indent..].strip_prefix(DEFINE)?;
    let key_part = rest.trim_start();
    if key_part.len() == rest.len() {
        // `#defineFOO` is not a define.
        return None;
    }
    let key_len = key_part
        .find(char::is_whitespace)
        .unwrap_or(key_part.len());
    if key_len == 0 {
        return None;
    }
    let key = &key_part[..key_len];
    let after = &key_part[key_len..];
    let spaces = after.len() - after.trim_start().len();
    let key_start = indent + DEFINE.len() + (rest.len() - key_part.len());
    Some((key_start + key_len + spaces, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WriteContext;

    const SAMPLE: &str = "#filter emptyLines\n\n# LOCALIZATION NOTE: author of the language pack\n#define MOZ_LANGPACK_CREATOR mozilla.org\n\n#define MOZ_LANGPACK_CONTRIBUTORS\n\n#unfilter emptyLines\n";

    #[test]
    fn defines_become_units() {
        let res = parse(SAMPLE);
        let t = res.translations();
        assert_eq!(t.len(), 2);
        assert_eq!(t[0].key, "MOZ_LANGPACK_CREATOR");
        assert_eq!(t[0].source_string, "mozilla.org");
        assert_eq!(
            t[0].comments,
            vec!["LOCALIZATION NOTE: author of the language pack"]
        );
        assert_eq!(t[1].key, "MOZ_LANGPACK_CONTRIBUTORS");
        assert_eq!(t[1].source_string, "");
        assert_eq!(res.serialize(&WriteContext::default()), SAMPLE);
    }

    #[test]
    fn changed_define_is_rewritten_in_place() {
        let mut res = parse(SAMPLE);
        res.translations_mut()[0]
            .strings
            .insert(None, "Mozilla Deutschland".into());
        let out = res.serialize(&WriteContext::default());
        assert!(out.contains("#define MOZ_LANGPACK_CREATOR Mozilla Deutschland\n"));
    }
}
