//! Translation reconciler, database to repository.
//!
//! Target files are rebuilt in memory from the current active translations
//! and only written once every file of the run has been rendered.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::DateTime;
use locsync_core::PluralForm;
use locsync_domain::ProjectReport;
use locsync_formats::{parse_file, Format, WriteContext};
use locsync_store::{EntityRow, ResourceRow, StoreError};

use crate::vcs::Author;
use crate::{skip, Pass, ProjectLocale, SkipReason};

/// A target file rendered from the database.
#[derive(Debug)]
pub(crate) struct RenderedFile {
    pub path: PathBuf,
    pub locale: String,
    /// `None` when the file on disk already has this content, or when a new
    /// file would not hold a single translation.
    pub content: Option<String>,
    /// Markers settled once this file is written.
    pub settled: Vec<(i64, i64)>,
    /// Human translators behind the marked changes, with the time of their
    /// translation.
    pub authors: Vec<(String, Author)>,
}

/// Generated files follow the source file's structure; bilingual and
/// `.lang` files are edited in place when they exist.
fn edits_in_place(format: Format) -> bool {
    format.is_bilingual() || format == Format::Lang
}

pub(crate) fn render_target(
    pass: &Pass<'_>,
    resource: &ResourceRow,
    locale: &ProjectLocale,
    marked: &[i64],
    generator: &str,
    report: &mut ProjectReport,
) -> Result<Option<RenderedFile>, StoreError> {
    let db = pass.db;
    let code = &locale.locale.code;
    let Some(target) = pass.resolver.target_path(&resource.path, code) else {
        let message = format!("no {code} target path for {}", resource.path);
        skip(report, Path::new(&resource.path), SkipReason::MissingReference, message);
        return Ok(None);
    };
    let in_place = edits_in_place(resource.format) && target.is_file();
    let base = if in_place {
        Some(target.clone())
    } else {
        pass.resolver.source_path(&resource.path)
    };
    let Some(base) = base else {
        let message = format!("source file of {} is missing", resource.path);
        skip(report, &target, SkipReason::MissingReference, message);
        return Ok(None);
    };
    let parse_locale = in_place.then_some(&locale.locale);
    let mut parsed = match parse_file(&base, resource.format, parse_locale) {
        Ok(res) => res,
        Err(e) => {
            skip(report, &base, SkipReason::Parse, e.to_string());
            return Ok(None);
        }
    };

    let entities = db.entities(resource.id)?;
    let by_key: HashMap<&str, &EntityRow> = entities.iter().map(|e| (e.entity_key(), e)).collect();
    let nplurals = locale.locale.nplurals();
    for unit in parsed.translations_mut() {
        let Some(entity) = by_key.get(unit.entity_key()) else {
            if !in_place {
                unit.strings.clear();
            }
            continue;
        };
        let active = db.active_translations(entity.id, locale.id)?;
        let strings: BTreeMap<PluralForm, String> = active
            .iter()
            .filter(|t| match t.plural_form {
                None => !entity.is_plural(),
                Some(i) => entity.is_plural() && i < nplurals,
            })
            .map(|t| (t.plural_form, t.string.clone()))
            .collect();
        unit.fuzzy = !strings.is_empty() && active.iter().any(|t| t.fuzzy);
        unit.strings = strings;
    }

    let latest = db.latest_translation(resource.id, locale.id)?;
    let translator = latest.as_ref().and_then(|t| t.user_id.or(t.approved_user_id));
    let last_translator = match translator {
        Some(id) => db.user(id)?.map(|u| u.signature()),
        None => None,
    };
    let revision_date = latest
        .as_ref()
        .and_then(|t| DateTime::parse_from_rfc3339(&t.date).ok())
        .map(|d| d.format("%Y-%m-%d %H:%M%z").to_string());
    let ctx = WriteContext {
        locale: Some(&locale.locale),
        last_translator,
        revision_date,
        generator: Some(generator.to_string()),
    };
    let content = parsed.serialize(&ctx);
    let empty = !target.exists() && parsed.translations().iter().all(|u| u.strings.is_empty());
    let unchanged = empty || std::fs::read_to_string(&target).is_ok_and(|old| old == content);

    let mut authors = Vec::new();
    for entity_id in marked {
        for t in db.active_translations(*entity_id, locale.id)? {
            for user_id in [t.user_id, t.approved_user_id].into_iter().flatten() {
                if let Some(user) = db.user(user_id)? {
                    authors.push((t.date.clone(), Author::new(&user.name, &user.email)));
                }
            }
        }
    }

    Ok(Some(RenderedFile {
        path: target,
        locale: code.clone(),
        content: (!unchanged).then_some(content),
        settled: marked.iter().map(|e| (*e, locale.id)).collect(),
        authors,
    }))
}

/// Write a rendered file, creating missing directories.
pub(crate) fn write_file(file: &RenderedFile) -> Result<bool, crate::SyncError> {
    let Some(content) = &file.content else {
        return Ok(false);
    };
    let io = |source| crate::SyncError::Io {
        path: file.path.display().to_string(),
        source,
    };
    if let Some(parent) = file.path.parent() {
        std::fs::create_dir_all(parent).map_err(io)?;
    }
    std::fs::write(&file.path, content).map_err(io)?;
    tracing::debug!(event = "target_written", path = %file.path.display());
    Ok(true)
}
