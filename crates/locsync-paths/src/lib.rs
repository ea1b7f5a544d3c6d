//! Path Resolver.
//!
//! Maps files of a checkout to logical resources and back. Two layouts are
//! supported: convention-based discovery (a source directory such as
//! `en-US/` with sibling locale directories) and explicit `l10n.toml`
//! configuration. [`PathResolver::find_reference`] is total: a path outside
//! every mapping yields `None` and is simply ignored by callers.

mod config;
mod discovery;
mod glob;

use std::path::{Component, Path, PathBuf};

/// Directory names that mark the source-locale tree, in order of preference.
pub const SOURCE_DIRS: &[&str] = &["templates", "en-US", "en-GB", "en"];

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid l10n config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid path pattern {pattern:?}: {message}")]
    Pattern { pattern: String, message: String },
    #[error("no source directory (templates, en-US, en-GB, en) under {root}")]
    NoSourceDir { root: String },
}

/// Result of resolving a checkout file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch {
    /// Absolute path of the source-locale file.
    pub reference: PathBuf,
    /// Logical resource path (relative to the source root, `.pot` shown as `.po`).
    pub resource: String,
    /// Project locale the file belongs to; `None` for the source file itself.
    pub locale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub resource: String,
}

#[derive(Debug, Clone)]
pub enum PathResolver {
    Discovery(discovery::Layout),
    Config(config::Layout),
}

impl PathResolver {
    /// Convention-based layout rooted at a checkout.
    pub fn discover(root: &Path, locales: &[String]) -> Result<Self, PathError> {
        discovery::Layout::discover(root, locales).map(Self::Discovery)
    }

    /// Layout declared by an `l10n.toml` file; relative patterns are resolved
    /// against `root`.
    pub fn from_config(
        root: &Path,
        config_file: &Path,
        locales: &[String],
    ) -> Result<Self, PathError> {
        config::Layout::load(root, config_file, locales).map(Self::Config)
    }

    pub fn root(&self) -> &Path {
        match self {
            Self::Discovery(l) => &l.root,
            Self::Config(l) => &l.root,
        }
    }

    /// Every source-locale file of the checkout, sorted by resource path.
    pub fn source_files(&self) -> Vec<SourceFile> {
        let mut files = match self {
            Self::Discovery(l) => l.source_files(),
            Self::Config(l) => l.source_files(),
        };
        files.sort_by(|a, b| a.resource.cmp(&b.resource));
        files
    }

    pub fn find_reference(&self, path: &Path) -> Option<PathMatch> {
        let found = match self {
            Self::Discovery(l) => l.find_reference(path),
            Self::Config(l) => l.find_reference(path),
        };
        if found.is_none() {
            tracing::trace!(event = "path_unmapped", path = %path.display());
        }
        found
    }

    /// Where the file of `resource` for `locale` lives (or would be created).
    pub fn target_path(&self, resource: &str, locale: &str) -> Option<PathBuf> {
        match self {
            Self::Discovery(l) => l.target_path(resource, locale),
            Self::Config(l) => l.target_path(resource, locale),
        }
    }

    /// The source-locale file of `resource`, if it exists.
    pub fn source_path(&self, resource: &str) -> Option<PathBuf> {
        match self {
            Self::Discovery(l) => l.source_path(resource),
            Self::Config(l) => l.source_path(resource),
        }
    }
}

/// Logical resource name: forward slashes, gettext templates named as their
/// translated counterparts.
pub fn resource_name(rel: &Path) -> String {
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    let joined = parts.join("/");
    match joined.strip_suffix(".pot") {
        Some(stem) => format!("{stem}.po"),
        None => joined,
    }
}

/// Locale codes compare case-insensitively with `-` and `_` interchangeable.
pub fn same_locale(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a
            .bytes()
            .zip(b.bytes())
            .all(|(x, y)| normalize(x) == normalize(y))
}

fn normalize(b: u8) -> u8 {
    match b {
        b'_' => b'-',
        other => other.to_ascii_lowercase(),
    }
}

/// The project locale matching a code found in a path.
pub(crate) fn project_locale(code: &str, locales: &[String]) -> Option<String> {
    locales.iter().find(|l| same_locale(l, code)).cloned()
}

/// `path` relative to `root` with forward slashes.
pub(crate) fn relative(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let s = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");
    (!s.is_empty()).then_some(s)
}

/// `name.po` → `name.pot` when the template is what exists on disk.
pub(crate) fn with_template_extension(path: &Path) -> Option<PathBuf> {
    let s = path.to_str()?;
    s.ends_with(".po").then(|| PathBuf::from(format!("{s}t")))
}

pub(crate) fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|s| s.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_names_use_forward_slashes_and_po() {
        assert_eq!(resource_name(Path::new("a/b/messages.pot")), "a/b/messages.po");
        assert_eq!(resource_name(Path::new("main.ftl")), "main.ftl");
    }

    #[test]
    fn locale_codes_match_loosely() {
        assert!(same_locale("de-AT", "de_at"));
        assert!(!same_locale("de", "de-AT"));
        assert_eq!(
            project_locale("pt_BR", &["fr".into(), "pt-BR".into()]),
            Some("pt-BR".into())
        );
    }
}
