//! Entity reconciler: keeps the database's entities in line with the
//! source-locale files.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;

use locsync_core::VcsTranslation;
use locsync_domain::ProjectReport;
use locsync_formats::{parse_file, Format};
use locsync_store::{EntityRow, ResourceRow, StoreError};

use crate::{skip, Pass, SkipReason};

/// Source-side file changes of one run, by logical resource path.
#[derive(Debug, Default)]
pub(crate) struct SourceChanges {
    /// `(file on disk, resource)`
    pub changed: Vec<(PathBuf, String)>,
    pub removed: Vec<String>,
    pub renamed: Vec<(String, String)>,
}

#[derive(Debug, Default)]
pub(crate) struct EntityOutcome {
    pub created: BTreeSet<i64>,
    /// Existing resources whose entities were added, updated or obsoleted.
    pub changed: BTreeSet<i64>,
}

pub(crate) fn reconcile_entities(
    pass: &Pass<'_>,
    changes: &SourceChanges,
    report: &mut ProjectReport,
) -> Result<EntityOutcome, StoreError> {
    let mut outcome = EntityOutcome::default();
    let db = pass.db;

    for (old, new) in &changes.renamed {
        let Some(resource) = db.resource_by_path(pass.project_id, old)? else {
            continue;
        };
        if db.resource_by_path(pass.project_id, new)?.is_some() {
            db.delete_resource(resource.id)?;
            report.resources_removed += 1;
            continue;
        }
        db.rename_resource(resource.id, new)?;
        report.resources_renamed += 1;
        tracing::info!(event = "resource_renamed", from = %old, to = %new);
    }

    for path in &changes.removed {
        if let Some(resource) = db.resource_by_path(pass.project_id, path)? {
            db.delete_resource(resource.id)?;
            report.resources_removed += 1;
            tracing::info!(event = "resource_removed", resource = %path);
        }
    }

    for (file, path) in &changes.changed {
        let existing = db.resource_by_path(pass.project_id, path)?;
        let format = match &existing {
            Some(r) => r.format,
            None => match Format::from_path(file) {
                Some(f) => f,
                None => continue,
            },
        };
        let parsed = match parse_file(file, format, None) {
            Ok(res) => res,
            Err(e) => {
                skip(report, file, SkipReason::Parse, e.to_string());
                continue;
            }
        };
        let units = unique_units(parsed.translations(), path);

        match existing {
            None => {
                let id = db.insert_resource(pass.project_id, path, format)?;
                for unit in &units {
                    db.insert_entity(id, unit, pass.now)?;
                }
                report.resources_added += 1;
                report.entities_added += units.len();
                create_translated_resources(pass, id, path, format)?;
                outcome.created.insert(id);
                tracing::info!(event = "resource_added", resource = %path, entities = units.len());
            }
            Some(resource) => {
                if diff_entities(pass, &resource, &units, report)? {
                    report.resources_changed += 1;
                    outcome.changed.insert(resource.id);
                }
            }
        }
    }
    Ok(outcome)
}

/// Units of a file with duplicate keys dropped; the first occurrence wins.
fn unique_units<'a>(units: &'a [VcsTranslation], resource: &str) -> Vec<&'a VcsTranslation> {
    let mut seen = BTreeSet::new();
    units
        .iter()
        .filter(|u| {
            let fresh = seen.insert(u.entity_key());
            if !fresh {
                tracing::warn!(event = "duplicate_entity", resource, key = %u.entity_key());
            }
            fresh
        })
        .collect()
}

/// Three-way split of stored against parsed entities. Returns whether
/// anything changed.
fn diff_entities(
    pass: &Pass<'_>,
    resource: &ResourceRow,
    units: &[&VcsTranslation],
    report: &mut ProjectReport,
) -> Result<bool, StoreError> {
    let db = pass.db;
    let stored = db.entities(resource.id)?;
    let mut prev: HashMap<&str, &EntityRow> = HashMap::new();
    for e in &stored {
        prev.entry(e.entity_key()).or_insert(e);
    }
    let next: HashSet<&str> = units.iter().map(|u| u.entity_key()).collect();

    let obsolete: Vec<i64> = stored
        .iter()
        .filter(|e| !next.contains(e.entity_key()))
        .map(|e| e.id)
        .collect();
    let obsoleted = db.obsolete_entities(&obsolete, pass.now)?;

    let mut added = 0;
    let mut updated = 0;
    for unit in units {
        match prev.get(unit.entity_key()) {
            None => {
                db.insert_entity(resource.id, unit, pass.now)?;
                added += 1;
            }
            Some(entity) if entity.differs_from(unit) => {
                db.update_entity(entity.id, unit)?;
                updated += 1;
            }
            Some(entity) => db.set_entity_order(entity.id, unit.order)?,
        }
    }

    report.entities_added += added;
    report.entities_updated += updated;
    report.entities_obsoleted += obsoleted;
    if added + updated + obsoleted > 0 {
        tracing::info!(
            event = "entities_reconciled",
            resource = %resource.path,
            added,
            updated,
            obsoleted
        );
    }
    Ok(added + updated + obsoleted > 0)
}

/// Track the locales of a new resource: every project locale for formats
/// whose targets are generated from the source, otherwise only locales
/// that already have a file.
fn create_translated_resources(
    pass: &Pass<'_>,
    resource_id: i64,
    path: &str,
    format: Format,
) -> Result<(), StoreError> {
    for (code, locale) in &pass.locales {
        let has_file = pass
            .resolver
            .target_path(path, code)
            .is_some_and(|p| p.is_file());
        if format.is_asymmetric() || has_file {
            pass.db.ensure_translated_resource(resource_id, locale.id)?;
        }
    }
    Ok(())
}
