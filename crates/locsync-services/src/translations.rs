//! Translation reconciler, repository to database.
//!
//! Target files are merged into the translations of their resource. A unit
//! whose `(entity, locale)` has a pending change marker is dropped: the
//! database wins when both sides changed since the last sync.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use locsync_core::PluralForm;
use locsync_domain::ProjectReport;
use locsync_formats::parse_file;
use locsync_store::{
    EntityRow, NewTranslation, ResourceRow, StoreError, TranslationRow, TranslationState,
};
use locsync_validate::check_translation;

use crate::{skip, Pass, ProjectLocale, SkipReason};

/// Merge one target file into the database.
pub(crate) fn import_target(
    pass: &Pass<'_>,
    resource: &ResourceRow,
    locale: &ProjectLocale,
    file: &Path,
    markers: &BTreeSet<(i64, i64)>,
    report: &mut ProjectReport,
) -> Result<(), StoreError> {
    let db = pass.db;
    let parsed = match parse_file(file, resource.format, Some(&locale.locale)) {
        Ok(res) => res,
        Err(e) => {
            skip(report, file, SkipReason::Parse, e.to_string());
            return Ok(());
        }
    };
    db.ensure_translated_resource(resource.id, locale.id)?;

    let entities = db.entities(resource.id)?;
    let by_key: HashMap<&str, &EntityRow> = entities.iter().map(|e| (e.entity_key(), e)).collect();
    let mut existing: HashMap<(i64, PluralForm), Vec<TranslationRow>> = HashMap::new();
    for t in db.translations(resource.id, locale.id)? {
        existing.entry((t.entity_id, t.plural_form)).or_default().push(t);
    }

    let mut seen = BTreeSet::new();
    let mut conflicts = 0usize;
    for unit in parsed.translations() {
        let Some(entity) = by_key.get(unit.entity_key()) else {
            tracing::debug!(event = "target_unit_without_entity", key = %unit.entity_key());
            continue;
        };
        if !seen.insert(entity.id) {
            continue;
        }
        if markers.contains(&(entity.id, locale.id)) {
            conflicts += 1;
            continue;
        }
        for (form, string) in &unit.strings {
            if !form_fits(entity, *form, locale) {
                tracing::debug!(
                    event = "plural_form_ignored",
                    key = %entity.entity_key(),
                    form = ?form
                );
                continue;
            }
            let candidates = existing
                .get(&(entity.id, *form))
                .map(Vec::as_slice)
                .unwrap_or_default();
            let incoming = Incoming {
                entity,
                form: *form,
                string,
                fuzzy: unit.fuzzy,
            };
            if let Some(id) = apply(pass, resource, locale, &incoming, candidates, report)? {
                db.set_latest_translation(resource.id, locale.id, id)?;
            }
        }
    }
    if conflicts > 0 {
        tracing::info!(
            event = "repository_changes_dropped",
            resource = %resource.path,
            locale = %locale.locale.code,
            entities = conflicts
        );
    }
    Ok(())
}

struct Incoming<'a> {
    entity: &'a EntityRow,
    form: PluralForm,
    string: &'a str,
    fuzzy: bool,
}

/// Plural entities take indexed forms within the locale's plural count;
/// everything else takes the unindexed form only.
fn form_fits(entity: &EntityRow, form: PluralForm, locale: &ProjectLocale) -> bool {
    match form {
        None => !entity.is_plural(),
        Some(i) => entity.is_plural() && i < locale.locale.nplurals(),
    }
}

/// Bring the database in line with one repository string. Returns the id of
/// the translation that became active, `None` when nothing had to change.
fn apply(
    pass: &Pass<'_>,
    resource: &ResourceRow,
    locale: &ProjectLocale,
    incoming: &Incoming<'_>,
    candidates: &[TranslationRow],
    report: &mut ProjectReport,
) -> Result<Option<i64>, StoreError> {
    let db = pass.db;
    let same: Vec<&TranslationRow> = candidates
        .iter()
        .filter(|t| t.string == incoming.string)
        .collect();
    if same.iter().any(|t| t.approved || t.pretranslated) {
        return Ok(None);
    }
    if incoming.fuzzy && same.iter().any(|t| t.fuzzy && t.active) {
        return Ok(None);
    }

    let state = if incoming.fuzzy {
        TranslationState::Fuzzy
    } else {
        TranslationState::Approved
    };
    let id = match same.first() {
        Some(t) => {
            db.set_state(t.id, state, None, pass.now)?;
            t.id
        }
        None => {
            let id = db.insert_translation(
                &NewTranslation {
                    entity_id: incoming.entity.id,
                    locale_id: locale.id,
                    string: incoming.string,
                    plural_form: incoming.form,
                    state,
                    user_id: None,
                },
                pass.now,
            )?;
            report.translations_created += 1;
            id
        }
    };
    if state == TranslationState::Approved {
        report.translations_approved += 1;
    }
    report.translations_rejected += db.activate(id, None, pass.now)?;

    let source = match incoming.form {
        Some(i) if i > 0 && incoming.entity.is_plural() => &incoming.entity.string_plural,
        _ => &incoming.entity.string,
    };
    db.replace_checks(id, &check_translation(resource.format, source, incoming.string))?;
    Ok(Some(id))
}

/// A bilingual target file disappeared: its translations go with it.
pub(crate) fn remove_target(
    pass: &Pass<'_>,
    resource: &ResourceRow,
    locale: &ProjectLocale,
    report: &mut ProjectReport,
) -> Result<(), StoreError> {
    let deleted = pass.db.delete_translated_resource(resource.id, locale.id)?;
    report.translations_deleted += deleted;
    tracing::info!(
        event = "target_removed",
        resource = %resource.path,
        locale = %locale.locale.code,
        translations = deleted
    );
    Ok(())
}
