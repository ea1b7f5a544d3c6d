//! The sync pipeline.
//!
//! One run per project: pull every repository, reconcile entities from the
//! source-locale files, merge translations from the target-locale files,
//! write database-side changes back and commit them, then recompute stats.
//! All database writes of a run happen in one transaction.

mod commit;
mod entities;
mod project;
mod sync;
mod translations;
mod vcs;
mod write_back;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use locsync_core::Locale;
use locsync_paths::PathResolver;
use locsync_store::Db;

pub use commit::commit_message;
pub use project::{
    projects_from_config, resolve_locale, ProjectSpec, RepositorySpec, SyncOptions, SyncSettings,
};
pub use sync::{sync_project, sync_projects};
pub use vcs::{Author, ChangedFiles, Checkout, GitClient, Vcs, VcsError};

pub use locsync_core::Result;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Vcs(#[from] VcsError),
    #[error(transparent)]
    Store(#[from] locsync_store::StoreError),
    #[error("sync exceeded its time budget of {budget_secs}s during {stage}")]
    Timeout { budget_secs: u64, stage: &'static str },
    #[error("project {slug} is already being synced")]
    Locked { slug: String },
    #[error("cannot write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid project setup: {0}")]
    Config(String),
}

impl From<locsync_paths::PathError> for SyncError {
    fn from(e: locsync_paths::PathError) -> Self {
        SyncError::Config(e.to_string())
    }
}

/// Why a file was left out of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Parse,
    MissingReference,
}

impl From<SkipReason> for locsync_domain::SkipKind {
    fn from(r: SkipReason) -> Self {
        match r {
            SkipReason::Parse => locsync_domain::SkipKind::Parse,
            SkipReason::MissingReference => locsync_domain::SkipKind::MissingReference,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ProjectLocale {
    pub id: i64,
    pub locale: Locale,
}

/// State shared by the stages of one run inside its transaction.
pub(crate) struct Pass<'a> {
    pub db: &'a Db<'a>,
    pub project_id: i64,
    pub locales: BTreeMap<String, ProjectLocale>,
    pub resolver: &'a PathResolver,
    pub now: DateTime<Utc>,
}

impl Pass<'_> {
    pub fn locale_by_id(&self, id: i64) -> Option<&ProjectLocale> {
        self.locales.values().find(|l| l.id == id)
    }
}

pub(crate) fn skip(
    report: &mut locsync_domain::ProjectReport,
    path: &std::path::Path,
    reason: SkipReason,
    message: String,
) {
    tracing::warn!(
        event = "file_skipped",
        path = %path.display(),
        reason = ?reason,
        message = %message
    );
    report.skipped.push(locsync_domain::SkippedItem {
        path: path.display().to_string(),
        kind: reason.into(),
        reason: message,
    });
}
