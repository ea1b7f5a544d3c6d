//! Convention-based layouts: a source directory named after
//! [`SOURCE_DIRS`](crate::SOURCE_DIRS) and sibling directories named by
//! locale code mirroring its relative paths.

use std::path::{Path, PathBuf};

use locsync_formats::Format;
use walkdir::WalkDir;

use crate::{
    is_hidden, relative, resource_name, same_locale, with_template_extension, PathError,
    PathMatch, SourceFile, SOURCE_DIRS,
};

#[derive(Debug, Clone)]
pub struct Layout {
    pub(crate) root: PathBuf,
    source_dir: PathBuf,
    /// (project locale, directory holding its files)
    locale_dirs: Vec<(String, PathBuf)>,
}

impl Layout {
    pub(crate) fn discover(root: &Path, locales: &[String]) -> Result<Self, PathError> {
        let source_dir = WalkDir::new(root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir())
            .filter_map(|e| {
                let name = e.file_name().to_str()?;
                let rank = SOURCE_DIRS.iter().position(|s| *s == name)?;
                Some((e.depth(), rank, e.into_path()))
            })
            .min_by_key(|(depth, rank, _)| (*depth, *rank))
            .map(|(_, _, path)| path)
            .ok_or_else(|| PathError::NoSourceDir {
                root: root.display().to_string(),
            })?;

        let parent = source_dir.parent().unwrap_or(root).to_path_buf();
        let siblings: Vec<String> = std::fs::read_dir(&parent)
            .map_err(|source| PathError::Read {
                path: parent.display().to_string(),
                source,
            })?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|e| e.file_name().to_str().map(String::from))
            .collect();

        let locale_dirs = locales
            .iter()
            .map(|code| {
                let dir = siblings
                    .iter()
                    .find(|name| same_locale(name, code))
                    .map(|name| parent.join(name))
                    .unwrap_or_else(|| parent.join(code));
                (code.clone(), dir)
            })
            .collect();

        tracing::debug!(event = "source_dir_discovered", path = %source_dir.display());
        Ok(Self {
            root: root.to_path_buf(),
            source_dir,
            locale_dirs,
        })
    }

    pub(crate) fn source_files(&self) -> Vec<SourceFile> {
        WalkDir::new(&self.source_dir)
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && Format::from_path(e.path()).is_some())
            .filter_map(|e| {
                let rel = relative(&self.source_dir, e.path())?;
                Some(SourceFile {
                    path: e.into_path(),
                    resource: resource_name(Path::new(&rel)),
                })
            })
            .collect()
    }

    pub(crate) fn find_reference(&self, path: &Path) -> Option<PathMatch> {
        Format::from_path(path)?;
        if let Some(rel) = relative(&self.source_dir, path) {
            return Some(PathMatch {
                reference: path.to_path_buf(),
                resource: resource_name(Path::new(&rel)),
                locale: None,
            });
        }
        let (code, rel) = self
            .locale_dirs
            .iter()
            .find_map(|(code, dir)| relative(dir, path).map(|rel| (code, rel)))?;
        let reference = self.source_path(&resource_name(Path::new(&rel)))?;
        Some(PathMatch {
            reference,
            resource: resource_name(Path::new(&rel)),
            locale: Some(code.clone()),
        })
    }

    pub(crate) fn target_path(&self, resource: &str, locale: &str) -> Option<PathBuf> {
        self.locale_dirs
            .iter()
            .find(|(code, _)| code == locale)
            .map(|(_, dir)| dir.join(resource))
    }

    pub(crate) fn source_path(&self, resource: &str) -> Option<PathBuf> {
        let path = self.source_dir.join(resource);
        if path.is_file() {
            return Some(path);
        }
        with_template_extension(&path).filter(|p| p.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PathResolver;

    fn write(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "").unwrap();
    }

    #[test]
    fn finds_source_dir_and_locale_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "locale/en-US/main.ftl");
        write(root, "locale/en-US/sub/extra.properties");
        write(root, "locale/en-US/notes.txt");
        write(root, "locale/de_AT/main.ftl");
        write(root, "locale/fr/main.ftl");
        write(root, ".git/en/ignored.ftl");

        let locales = vec!["de-AT".to_string(), "fr".to_string(), "it".to_string()];
        let r = PathResolver::discover(root, &locales).unwrap();
        let names: Vec<String> = r.source_files().into_iter().map(|f| f.resource).collect();
        assert_eq!(names, vec!["main.ftl", "sub/extra.properties"]);

        let m = r.find_reference(&root.join("locale/de_AT/main.ftl")).unwrap();
        assert_eq!(m.reference, root.join("locale/en-US/main.ftl"));
        assert_eq!(m.locale.as_deref(), Some("de-AT"));

        let m = r.find_reference(&root.join("locale/en-US/main.ftl")).unwrap();
        assert_eq!(m.locale, None);

        assert!(r.find_reference(&root.join("locale/fr/missing.ftl")).is_none());
        assert!(r.find_reference(&root.join("locale/en-US/notes.txt")).is_none());
        assert_eq!(
            r.target_path("main.ftl", "it"),
            Some(root.join("locale/it/main.ftl"))
        );
    }

    #[test]
    fn gettext_templates_map_to_po_targets() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "templates/app.pot");
        write(root, "fr/app.po");
        let r = PathResolver::discover(root, &["fr".to_string()]).unwrap();

        assert_eq!(r.source_files()[0].resource, "app.po");
        let m = r.find_reference(&root.join("fr/app.po")).unwrap();
        assert_eq!(m.reference, root.join("templates/app.pot"));
        assert_eq!(m.resource, "app.po");
        assert_eq!(r.target_path("app.po", "fr"), Some(root.join("fr/app.po")));
    }

    #[test]
    fn missing_source_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "de/main.ftl");
        assert!(matches!(
            PathResolver::discover(dir.path(), &[]),
            Err(PathError::NoSourceDir { .. })
        ));
    }
}
