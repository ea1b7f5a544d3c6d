use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use locsync_domain::{ProjectReport, RunStatus, SyncSummary};
use locsync_paths::PathResolver;
use locsync_store::{Db, RepositoryRow, ResourceRow, Store};

use crate::commit::{commit_author, commit_message};
use crate::entities::{reconcile_entities, SourceChanges};
use crate::project::{ProjectSpec, SyncOptions, SyncSettings};
use crate::translations::{import_target, remove_target};
use crate::vcs::{Author, Checkout, Vcs, VcsError};
use crate::write_back::{render_target, write_file, RenderedFile};
use crate::{skip, Pass, ProjectLocale, SkipReason, SyncError};

/// Sync every project in turn. A failing project is reported and does not
/// stop the others.
pub fn sync_projects(
    store: &Store,
    vcs: &dyn Vcs,
    projects: &[ProjectSpec],
    settings: &SyncSettings,
    options: SyncOptions,
) -> SyncSummary {
    let mut summary = SyncSummary::default();
    for project in projects {
        let report = match sync_project(store, vcs, project, settings, options) {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(event = "sync_failed", project = %project.slug, error = %e);
                ProjectReport::failed(&project.slug, e.to_string())
            }
        };
        summary.projects.push(report);
    }
    summary
}

struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    fn check(&self, stage: &'static str) -> Result<(), SyncError> {
        if self.started.elapsed() > self.budget {
            return Err(SyncError::Timeout {
                budget_secs: self.budget.as_secs(),
                stage,
            });
        }
        Ok(())
    }
}

/// Run the whole pipeline for one project under its sync lock.
pub fn sync_project(
    store: &Store,
    vcs: &dyn Vcs,
    project: &ProjectSpec,
    settings: &SyncSettings,
    options: SyncOptions,
) -> Result<ProjectReport, SyncError> {
    let deadline = Deadline {
        started: Instant::now(),
        budget: settings.timeout,
    };
    let now = Utc::now();
    let project_id = store.transaction(|db| register(db, project))?;
    let stale_after = chrono::Duration::from_std(settings.timeout)
        .map_err(|e| SyncError::Config(format!("timeout out of range: {e}")))?;
    let _lock = store
        .try_lock(project_id, stale_after, now)?
        .ok_or_else(|| SyncError::Locked {
            slug: project.slug.clone(),
        })?;
    tracing::info!(event = "sync_started", project = %project.slug);

    let repositories = store.read(|db| db.repositories(project_id))?;
    let checkouts = prepare_checkouts(vcs, project, &repositories, options)?;
    deadline.check("pull")?;

    let mut report = ProjectReport::new(&project.slug);
    let source = checkouts
        .iter()
        .find(|(repo, _)| repo.source)
        .or_else(|| checkouts.first())
        .map(|(_, co)| co)
        .ok_or_else(|| SyncError::Config(format!("project {} has no repository", project.slug)))?;
    report.revision = Some(source.current_commit.clone());

    let pending = store.read(|db| db.changed_entity_locales(project_id))?;
    if !options.force && pending.is_empty() && checkouts.iter().all(|(_, co)| co.is_unchanged()) {
        report.status = RunStatus::Unchanged;
        tracing::info!(event = "sync_unchanged", project = %project.slug);
        return Ok(report);
    }

    let codes = project.locale_codes();
    let resolver = match &project.config_file {
        Some(file) => PathResolver::from_config(&source.path, &source.path.join(file), &codes)?,
        None => PathResolver::discover(&source.path, &codes)?,
    };

    let run = Run {
        vcs,
        project,
        project_id,
        settings,
        options,
        checkouts: &checkouts,
        resolver: &resolver,
        deadline: &deadline,
        now,
    };
    store.transaction(|db| run.execute(db, &mut report))?;

    tracing::info!(
        event = "sync_finished",
        project = %project.slug,
        resources_added = report.resources_added,
        resources_changed = report.resources_changed,
        resources_removed = report.resources_removed,
        entities_added = report.entities_added,
        entities_obsoleted = report.entities_obsoleted,
        translations_created = report.translations_created,
        translations_approved = report.translations_approved,
        translations_rejected = report.translations_rejected,
        files_written = report.files_written,
        committed = report.committed,
        skipped = report.skipped.len(),
        elapsed_ms = deadline.started.elapsed().as_millis() as u64
    );
    Ok(report)
}

/// Make sure the project, its locales and repositories exist in the store.
fn register(db: &Db<'_>, project: &ProjectSpec) -> Result<i64, SyncError> {
    let project_id = db.upsert_project(&project.slug, &project.name)?;
    for locale in &project.locales {
        let locale_id = db.upsert_locale(locale)?;
        db.add_project_locale(project_id, locale_id)?;
    }
    for repo in &project.repositories {
        db.upsert_repository(project_id, &repo.url, repo.branch.as_deref(), repo.source)?;
    }
    Ok(project_id)
}

fn prepare_checkouts(
    vcs: &dyn Vcs,
    project: &ProjectSpec,
    rows: &[RepositoryRow],
    options: SyncOptions,
) -> Result<Vec<(RepositoryRow, Checkout)>, SyncError> {
    let mut checkouts = Vec::new();
    for spec in &project.repositories {
        let Some(row) = rows.iter().find(|r| r.url == spec.url) else {
            continue;
        };
        let current = if options.no_pull {
            vcs.revision(&spec.path)?
        } else {
            vcs.pull(&spec.url, &spec.path, spec.branch.as_deref())?
        };
        let changes = if options.force {
            None
        } else {
            vcs.changed_files(&spec.path, row.last_synced_revision.as_deref())?
        };
        checkouts.push((
            row.clone(),
            Checkout {
                url: spec.url.clone(),
                branch: spec.branch.clone(),
                path: spec.path.clone(),
                previous_commit: row.last_synced_revision.clone(),
                current_commit: current,
                changes,
            },
        ));
    }
    Ok(checkouts)
}

/// Target-side file changes of one run.
#[derive(Debug, Default)]
struct TargetChanges {
    /// `(file, resource, locale)`
    changed: Vec<(PathBuf, String, String)>,
    removed: Vec<(String, String)>,
}

struct Run<'a> {
    vcs: &'a dyn Vcs,
    project: &'a ProjectSpec,
    project_id: i64,
    settings: &'a SyncSettings,
    options: SyncOptions,
    checkouts: &'a [(RepositoryRow, Checkout)],
    resolver: &'a PathResolver,
    deadline: &'a Deadline,
    now: chrono::DateTime<Utc>,
}

impl Run<'_> {
    fn execute(&self, db: &Db<'_>, report: &mut ProjectReport) -> Result<(), SyncError> {
        let locales: BTreeMap<String, ProjectLocale> = db
            .project_locales(self.project_id)?
            .into_iter()
            .filter(|row| self.project.locales.iter().any(|l| l.code == row.locale.code))
            .map(|row| {
                (
                    row.locale.code.clone(),
                    ProjectLocale {
                        id: row.id,
                        locale: row.locale,
                    },
                )
            })
            .collect();
        let pass = Pass {
            db,
            project_id: self.project_id,
            locales,
            resolver: self.resolver,
            now: self.now,
        };

        let full_scan = self.checkouts.iter().any(|(_, co)| co.is_full_scan());
        let (sources, targets) = if full_scan {
            (self.scan_sources(&pass)?, TargetChanges::default())
        } else {
            self.classify_changes()
        };

        let outcome = reconcile_entities(&pass, &sources, report)?;
        self.track_generated_locales(&pass)?;
        self.deadline.check("entities")?;

        let markers = db.changed_entity_locales(self.project_id)?;
        if full_scan {
            self.import_all(&pass, &markers, report)?;
        } else {
            self.import_changed(&pass, &targets, &outcome.created, &markers, report)?;
        }
        self.deadline.check("translations")?;

        let rendered = self.render(&pass, &markers, &outcome.changed, report)?;
        self.deadline.check("write-back")?;

        let mut committed_in = BTreeSet::new();
        if self.options.no_commit {
            tracing::info!(event = "write_back_skipped", files = rendered.len());
        } else {
            committed_in = self.write_and_commit(&rendered, report)?;
            let settled: Vec<(i64, i64)> =
                rendered.iter().flat_map(|f| f.settled.iter().copied()).collect();
            db.clear_changed(&settled)?;
        }

        for (i, (row, co)) in self.checkouts.iter().enumerate() {
            let revision = if committed_in.contains(&i) {
                self.vcs.revision(&co.path)?
            } else {
                co.current_commit.clone()
            };
            if row.source {
                report.revision = Some(revision.clone());
            }
            db.set_last_synced_revision(row.id, &revision)?;
        }
        db.update_stats(self.project_id)?;
        Ok(())
    }

    /// Every source file, plus every stored resource whose file is gone.
    fn scan_sources(&self, pass: &Pass<'_>) -> Result<SourceChanges, SyncError> {
        let files = self.resolver.source_files();
        let present: BTreeSet<&str> = files.iter().map(|f| f.resource.as_str()).collect();
        let removed = pass
            .db
            .resources(self.project_id)?
            .into_iter()
            .filter(|r| !present.contains(r.path.as_str()))
            .map(|r| r.path)
            .collect();
        Ok(SourceChanges {
            changed: files.iter().map(|f| (f.path.clone(), f.resource.clone())).collect(),
            removed,
            renamed: Vec::new(),
        })
    }

    fn classify_changes(&self) -> (SourceChanges, TargetChanges) {
        let mut sources = SourceChanges::default();
        let mut targets = TargetChanges::default();
        for (_, co) in self.checkouts {
            let Some(changes) = &co.changes else {
                continue;
            };
            for rel in &changes.changed {
                self.classify_changed(&co.path.join(rel), &mut sources, &mut targets);
            }
            for rel in &changes.removed {
                self.classify_removed(&co.path.join(rel), &mut sources, &mut targets);
            }
            for (old, new) in &changes.renamed {
                let (old, new) = (co.path.join(old), co.path.join(new));
                let old_match = self.resolver.find_reference(&old);
                let new_match = self.resolver.find_reference(&new);
                match (old_match, new_match) {
                    (Some(a), Some(b)) if a.locale.is_none() && b.locale.is_none() => {
                        sources.renamed.push((a.resource, b.resource.clone()));
                        sources.changed.push((new, b.resource));
                    }
                    _ => {
                        self.classify_removed(&old, &mut sources, &mut targets);
                        self.classify_changed(&new, &mut sources, &mut targets);
                    }
                }
            }
        }
        (sources, targets)
    }

    fn classify_changed(&self, file: &Path, sources: &mut SourceChanges, targets: &mut TargetChanges) {
        if let Some(m) = self.resolver.find_reference(file) {
            match m.locale {
                None => sources.changed.push((file.to_path_buf(), m.resource)),
                Some(locale) => targets.changed.push((file.to_path_buf(), m.resource, locale)),
            }
        }
    }

    fn classify_removed(&self, file: &Path, sources: &mut SourceChanges, targets: &mut TargetChanges) {
        if let Some(m) = self.resolver.find_reference(file) {
            match m.locale {
                None => sources.removed.push(m.resource),
                Some(locale) => targets.removed.push((m.resource, locale)),
            }
        }
    }

    /// Generated target files exist for every locale, so every locale of
    /// such a resource is tracked, including locales added later.
    fn track_generated_locales(&self, pass: &Pass<'_>) -> Result<(), SyncError> {
        for resource in pass.db.resources(self.project_id)? {
            if resource.format.is_asymmetric() {
                for locale in pass.locales.values() {
                    pass.db.ensure_translated_resource(resource.id, locale.id)?;
                }
            }
        }
        Ok(())
    }

    fn import_all(
        &self,
        pass: &Pass<'_>,
        markers: &BTreeSet<(i64, i64)>,
        report: &mut ProjectReport,
    ) -> Result<(), SyncError> {
        for resource in pass.db.resources(self.project_id)? {
            let tracked = pass.db.translated_locales(resource.id)?;
            for locale in pass.locales.values() {
                let Some(file) = self.resolver.target_path(&resource.path, &locale.locale.code)
                else {
                    continue;
                };
                if file.is_file() {
                    import_target(pass, &resource, locale, &file, markers, report)?;
                } else if resource.format.is_bilingual() && tracked.contains(&locale.id) {
                    remove_target(pass, &resource, locale, report)?;
                }
            }
        }
        Ok(())
    }

    fn import_changed(
        &self,
        pass: &Pass<'_>,
        targets: &TargetChanges,
        created: &BTreeSet<i64>,
        markers: &BTreeSet<(i64, i64)>,
        report: &mut ProjectReport,
    ) -> Result<(), SyncError> {
        for (resource, code) in &targets.removed {
            let (Some(row), Some(locale)) = (
                pass.db.resource_by_path(self.project_id, resource)?,
                pass.locales.get(code),
            ) else {
                continue;
            };
            if row.format.is_bilingual() {
                remove_target(pass, &row, locale, report)?;
            }
        }

        let mut queue: BTreeMap<(String, String), PathBuf> = BTreeMap::new();
        for (file, resource, code) in &targets.changed {
            queue.insert((resource.clone(), code.clone()), file.clone());
        }
        for resource in pass.db.resources(self.project_id)? {
            if !created.contains(&resource.id) {
                continue;
            }
            for code in pass.locales.keys() {
                if let Some(file) = self.resolver.target_path(&resource.path, code) {
                    if file.is_file() {
                        queue.entry((resource.path.clone(), code.clone())).or_insert(file);
                    }
                }
            }
        }

        for ((resource, code), file) in &queue {
            let Some(locale) = pass.locales.get(code) else {
                continue;
            };
            match pass.db.resource_by_path(self.project_id, resource)? {
                Some(row) => import_target(pass, &row, locale, file, markers, report)?,
                None => skip(
                    report,
                    file,
                    SkipReason::MissingReference,
                    format!("no source resource {resource}"),
                ),
            }
        }
        Ok(())
    }

    /// Render every target with marked entities, and for generated formats
    /// every target of a resource whose source changed.
    fn render(
        &self,
        pass: &Pass<'_>,
        markers: &BTreeSet<(i64, i64)>,
        changed_sources: &BTreeSet<i64>,
        report: &mut ProjectReport,
    ) -> Result<Vec<RenderedFile>, SyncError> {
        let db = pass.db;
        let mut work: BTreeMap<(i64, i64), Vec<i64>> = BTreeMap::new();
        for (entity_id, locale_id) in markers {
            if let Some(entity) = db.entity(*entity_id)? {
                work.entry((entity.resource_id, *locale_id))
                    .or_default()
                    .push(*entity_id);
            }
        }
        for resource_id in changed_sources {
            for locale_id in db.translated_locales(*resource_id)? {
                work.entry((*resource_id, locale_id)).or_default();
            }
        }

        let resources: BTreeMap<i64, ResourceRow> = db
            .resources(self.project_id)?
            .into_iter()
            .map(|r| (r.id, r))
            .collect();
        let mut rendered = Vec::new();
        for ((resource_id, locale_id), marked) in &work {
            let (Some(resource), Some(locale)) =
                (resources.get(resource_id), pass.locale_by_id(*locale_id))
            else {
                continue;
            };
            let regenerate = !marked.is_empty() || resource.format.is_asymmetric();
            if !regenerate {
                continue;
            }
            if let Some(file) =
                render_target(pass, resource, locale, marked, &self.settings.generator, report)?
            {
                rendered.push(file);
            }
        }
        Ok(rendered)
    }

    /// Write rendered files and commit them, one commit per repository.
    /// Returns the indices of the checkouts that received a commit.
    fn write_and_commit(
        &self,
        rendered: &[RenderedFile],
        report: &mut ProjectReport,
    ) -> Result<BTreeSet<usize>, SyncError> {
        struct Pending {
            locales: BTreeSet<String>,
            authors: Vec<(String, Author)>,
        }
        let mut per_checkout: BTreeMap<usize, Pending> = BTreeMap::new();
        for file in rendered {
            if !write_file(file)? {
                continue;
            }
            report.files_written += 1;
            let Some(idx) = self.checkouts.iter().position(|(_, co)| co.contains(&file.path))
            else {
                tracing::warn!(event = "file_outside_checkouts", path = %file.path.display());
                continue;
            };
            let pending = per_checkout.entry(idx).or_insert_with(|| Pending {
                locales: BTreeSet::new(),
                authors: Vec::new(),
            });
            pending.locales.insert(file.locale.clone());
            pending.authors.extend(file.authors.iter().cloned());
        }

        let mut committed = BTreeSet::new();
        for (idx, pending) in per_checkout {
            let (_, co) = &self.checkouts[idx];
            let co_authors: BTreeSet<Author> =
                pending.authors.iter().map(|(_, a)| a.clone()).collect();
            let message = commit_message(
                &self.settings.message_prefix,
                &self.project.name,
                &pending.locales,
                &co_authors,
            );
            let author = commit_author(&pending.authors, &self.settings.bot);
            match self
                .vcs
                .commit(&co.path, &message, &author, co.branch.as_deref(), &co.url)
            {
                Ok(()) => {
                    committed.insert(idx);
                    report.committed = true;
                }
                Err(VcsError::NothingToCommit) => {
                    tracing::info!(event = "nothing_to_commit", path = %co.path.display());
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(committed)
    }
}
