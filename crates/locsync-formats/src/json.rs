//! WebExtension `messages.json` files.
//!
//! Each top-level member with a string `message` is a unit; `description`
//! becomes its comment. Files are rewritten in the canonical layout
//! (two-space indentation, trailing newline), so only files already in that
//! layout survive an edit byte-for-byte. An untouched file is returned as
//! read.

use std::collections::BTreeMap;

use locsync_core::VcsTranslation;
use serde_json::{Map, Value};

use crate::{Document, Extra, Format, UnitSpan, VcsResource};

#[derive(Debug, Clone)]
pub(crate) struct JsonExtra {
    original: Map<String, Value>,
    text: String,
}

pub(crate) fn parse(text: &str) -> Result<VcsResource, String> {
    let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    let Value::Object(root) = value else {
        return Err("top-level value is not an object".to_string());
    };

    let mut doc = Document::default();
    let mut units = Vec::new();
    for (key, entry) in &root {
        let Some(message) = entry.get("message").and_then(Value::as_str) else {
            tracing::debug!(event = "json_member_skipped", key = %key);
            continue;
        };
        let comments = entry
            .get("description")
            .and_then(Value::as_str)
            .filter(|d| !d.is_empty())
            .map(|d| vec![d.to_string()])
            .unwrap_or_default();
        units.push(VcsTranslation {
            key: key.clone(),
            source_string: message.to_string(),
            comments,
            order: units.len(),
            strings: BTreeMap::from([(None, message.to_string())]),
            ..Default::default()
        });
        doc.push_unit(UnitSpan::default());
    }

    Ok(VcsResource::new(
        Format::Json,
        units,
        doc,
        Extra::Json(JsonExtra {
            original: root,
            text: text.to_string(),
        }),
    ))
}

pub(crate) fn serialize(res: &VcsResource) -> String {
    let Extra::Json(extra) = &res.extra else {
        return String::new();
    };
    if (0..res.translations.len()).all(|i| !res.is_changed(i)) {
        return extra.text.clone();
    }

    let by_key: BTreeMap<&str, &VcsTranslation> = res
        .translations
        .iter()
        .map(|t| (t.key.as_str(), t))
        .collect();
    let mut out = Map::new();
    for (key, entry) in &extra.original {
        match by_key.get(key.as_str()) {
            Some(t) => {
                let Some(message) = t.strings.get(&None) else {
                    continue;
                };
                let mut entry = entry.clone();
                if let Value::Object(obj) = &mut entry {
                    obj.insert("message".to_string(), Value::String(message.clone()));
                }
                out.insert(key.clone(), entry);
            }
            None => {
                out.insert(key.clone(), entry.clone());
            }
        }
    }
    match serde_json::to_string_pretty(&Value::Object(out)) {
        Ok(mut text) => {
            text.push('\n');
            text
        }
        Err(e) => {
            tracing::warn!(event = "json_serialize_failed", error = %e);
            extra.text.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WriteContext;

    const SAMPLE: &str = r#"{
  "extensionName": {
    "message": "Notify link clicks",
    "description": "Name of the extension."
  },
  "notificationContent": {
    "message": "You clicked $URL$.",
    "description": "Tells the user which link they clicked.",
    "placeholders": {
      "url": {
        "content": "$1",
        "example": "https://developer.mozilla.org"
      }
    }
  }
}
"#;

    #[test]
    fn members_with_message_become_units() {
        let res = parse(SAMPLE).unwrap();
        let t = res.translations();
        assert_eq!(t.len(), 2);
        assert_eq!(t[0].key, "extensionName");
        assert_eq!(t[0].comments, vec!["Name of the extension."]);
        assert_eq!(t[1].source_string, "You clicked $URL$.");
        assert_eq!(res.serialize(&WriteContext::default()), SAMPLE);
    }

    #[test]
    fn edit_rewrites_canonically_and_keeps_placeholders() {
        let mut res = parse(SAMPLE).unwrap();
        res.translations_mut()[1]
            .strings
            .insert(None, "Sie haben $URL$ angeklickt.".into());
        let out = res.serialize(&WriteContext::default());
        assert_eq!(out, SAMPLE.replace("You clicked $URL$.", "Sie haben $URL$ angeklickt."));

        res.translations_mut()[0].strings.clear();
        let out = res.serialize(&WriteContext::default());
        assert!(!out.contains("extensionName"));
        assert!(out.contains("\"placeholders\""));
    }

    #[test]
    fn non_object_is_a_parse_error() {
        assert!(parse("[1, 2]").is_err());
        assert!(parse("{ broken").is_err());
    }
}
