//! `l10n.toml` layouts.
//!
//! ```toml
//! basepath = "."
//!
//! [[paths]]
//! reference = "en-US/**/*.ftl"
//! l10n = "{locale}/**/*.ftl"
//! ```

use std::path::{Path, PathBuf};

use locsync_formats::Format;
use serde::Deserialize;
use walkdir::WalkDir;

use crate::glob::Glob;
use crate::{
    is_hidden, project_locale, relative, resource_name, PathError, PathMatch, SourceFile,
};

#[derive(Debug, Deserialize)]
struct L10nToml {
    #[serde(default)]
    basepath: Option<String>,
    #[serde(default)]
    paths: Vec<PathEntry>,
}

#[derive(Debug, Deserialize)]
struct PathEntry {
    reference: String,
    l10n: String,
}

#[derive(Debug, Clone)]
struct Rule {
    reference: Glob,
    l10n: Glob,
}

#[derive(Debug, Clone)]
pub struct Layout {
    pub(crate) root: PathBuf,
    rules: Vec<Rule>,
    locales: Vec<String>,
}

impl Layout {
    pub(crate) fn load(
        checkout: &Path,
        config_file: &Path,
        locales: &[String],
    ) -> Result<Self, PathError> {
        let path = if config_file.is_absolute() {
            config_file.to_path_buf()
        } else {
            checkout.join(config_file)
        };
        let text = std::fs::read_to_string(&path).map_err(|source| PathError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(checkout, &path, &text, locales)
    }

    fn parse(
        checkout: &Path,
        config_path: &Path,
        text: &str,
        locales: &[String],
    ) -> Result<Self, PathError> {
        let cfg: L10nToml = toml::from_str(text).map_err(|source| PathError::Parse {
            path: config_path.display().to_string(),
            source,
        })?;
        let config_dir = config_path.parent().unwrap_or(checkout);
        let root = match cfg.basepath.as_deref() {
            None | Some(".") | Some("") => config_dir.to_path_buf(),
            Some(base) => config_dir.join(base),
        };

        let mut rules = Vec::new();
        for entry in cfg.paths {
            let reference = Glob::parse(&entry.reference)?;
            let l10n = Glob::parse(&entry.l10n)?;
            if !l10n.has_locale() || reference.has_locale() {
                return Err(PathError::Pattern {
                    pattern: entry.l10n,
                    message: "l10n pattern needs a locale placeholder; reference must not have one"
                        .to_string(),
                });
            }
            if reference.wildcards() != l10n.wildcards() {
                return Err(PathError::Pattern {
                    pattern: l10n.pattern().to_string(),
                    message: format!(
                        "wildcards do not line up with reference {:?}",
                        reference.pattern()
                    ),
                });
            }
            rules.push(Rule { reference, l10n });
        }
        tracing::debug!(event = "l10n_config_loaded", path = %config_path.display(), rules = rules.len());
        Ok(Self {
            root,
            rules,
            locales: locales.to_vec(),
        })
    }

    pub(crate) fn source_files(&self) -> Vec<SourceFile> {
        WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && Format::from_path(e.path()).is_some())
            .filter_map(|e| {
                let rel = relative(&self.root, e.path())?;
                self.rules
                    .iter()
                    .any(|r| r.reference.captures(&rel).is_some())
                    .then(|| SourceFile {
                        path: e.path().to_path_buf(),
                        resource: resource_name(Path::new(&rel)),
                    })
            })
            .collect()
    }

    pub(crate) fn find_reference(&self, path: &Path) -> Option<PathMatch> {
        let rel = relative(&self.root, path)?;
        for rule in &self.rules {
            if rule.reference.captures(&rel).is_some() {
                return Some(PathMatch {
                    reference: path.to_path_buf(),
                    resource: resource_name(Path::new(&rel)),
                    locale: None,
                });
            }
            let Some(caps) = rule.l10n.captures(&rel) else {
                continue;
            };
            let Some(locale) = caps
                .locale
                .as_deref()
                .and_then(|code| project_locale(code, &self.locales))
            else {
                continue;
            };
            let Some(reference) = rule.reference.fill(&caps.wildcards, None) else {
                continue;
            };
            return Some(PathMatch {
                reference: self.root.join(&reference),
                resource: resource_name(Path::new(&reference)),
                locale: Some(locale),
            });
        }
        None
    }

    /// Reference path (relative to the root) of a resource as it exists, or
    /// as the first matching rule spells it.
    fn reference_rel(&self, resource: &str) -> Option<(&Rule, String)> {
        let template = resource
            .strip_suffix(".po")
            .map(|stem| format!("{stem}.pot"));
        let candidates: Vec<String> = match template {
            Some(t) => vec![t, resource.to_string()],
            None => vec![resource.to_string()],
        };
        let mut fallback = None;
        for rule in &self.rules {
            for candidate in &candidates {
                if rule.reference.captures(candidate).is_some() {
                    if self.root.join(candidate).is_file() {
                        return Some((rule, candidate.clone()));
                    }
                    fallback.get_or_insert((rule, candidate.clone()));
                }
            }
        }
        fallback
    }

    pub(crate) fn target_path(&self, resource: &str, locale: &str) -> Option<PathBuf> {
        let (rule, rel) = self.reference_rel(resource)?;
        let caps = rule.reference.captures(&rel)?;
        let target = rule.l10n.fill(&caps.wildcards, Some(locale))?;
        Some(self.root.join(target))
    }

    pub(crate) fn source_path(&self, resource: &str) -> Option<PathBuf> {
        let (_, rel) = self.reference_rel(resource)?;
        let path = self.root.join(rel);
        path.is_file().then_some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PathResolver;

    const CONFIG: &str = r#"
basepath = "."

[[paths]]
reference = "en-US/**/*.ftl"
l10n = "{locale}/**/*.ftl"

[[paths]]
reference = "templates/*.pot"
l10n = "locales/{locale}/*.po"

[[paths]]
reference = "app/res/values/strings.xml"
l10n = "app/res/values-{android_locale}/strings.xml"
"#;

    fn write(root: &Path, rel: &str, text: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    fn fixture() -> (tempfile::TempDir, PathResolver) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "l10n.toml", CONFIG);
        write(root, "en-US/browser/menu.ftl", "a = A\n");
        write(root, "de/browser/menu.ftl", "a = A\n");
        write(root, "templates/messages.pot", "");
        write(root, "locales/fr/messages.po", "");
        write(root, "app/res/values/strings.xml", "<resources/>");
        write(root, "app/res/values-pt-rBR/strings.xml", "<resources/>");
        write(root, "README.md", "");
        let locales = vec!["de".to_string(), "fr".to_string(), "pt-BR".to_string()];
        let resolver = PathResolver::from_config(root, Path::new("l10n.toml"), &locales).unwrap();
        (dir, resolver)
    }

    #[test]
    fn lists_reference_files_only() {
        let (_dir, r) = fixture();
        let names: Vec<String> = r.source_files().into_iter().map(|f| f.resource).collect();
        assert_eq!(
            names,
            vec![
                "app/res/values/strings.xml",
                "en-US/browser/menu.ftl",
                "templates/messages.po"
            ]
        );
    }

    #[test]
    fn maps_targets_back_to_references() {
        let (dir, r) = fixture();
        let root = dir.path();

        let m = r.find_reference(&root.join("de/browser/menu.ftl")).unwrap();
        assert_eq!(m.reference, root.join("en-US/browser/menu.ftl"));
        assert_eq!(m.locale.as_deref(), Some("de"));

        let m = r.find_reference(&root.join("locales/fr/messages.po")).unwrap();
        assert_eq!(m.resource, "templates/messages.po");
        assert_eq!(m.reference, root.join("templates/messages.pot"));

        let m = r
            .find_reference(&root.join("app/res/values-pt-rBR/strings.xml"))
            .unwrap();
        assert_eq!(m.locale.as_deref(), Some("pt-BR"));

        assert!(r.find_reference(&root.join("README.md")).is_none());
        assert!(r.find_reference(&root.join("it/browser/menu.ftl")).is_none());
    }

    #[test]
    fn computes_target_paths() {
        let (dir, r) = fixture();
        let root = dir.path();
        assert_eq!(
            r.target_path("templates/messages.po", "de"),
            Some(root.join("locales/de/messages.po"))
        );
        assert_eq!(
            r.target_path("app/res/values/strings.xml", "de"),
            Some(root.join("app/res/values-de/strings.xml"))
        );
        assert_eq!(
            r.source_path("templates/messages.po"),
            Some(root.join("templates/messages.pot"))
        );
    }

    #[test]
    fn rejects_misaligned_patterns() {
        let bad = "[[paths]]\nreference = \"en/*.ftl\"\nl10n = \"{locale}/x.ftl\"\n";
        let err = Layout::parse(Path::new("/r"), Path::new("/r/l10n.toml"), bad, &[]).unwrap_err();
        assert!(matches!(err, PathError::Pattern { .. }));
        let err = Layout::parse(Path::new("/r"), Path::new("/r/l10n.toml"), "paths = 3", &[]).unwrap_err();
        assert!(matches!(err, PathError::Parse { .. }));
    }
}
