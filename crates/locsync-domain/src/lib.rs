use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SkipKind {
    /// The file could not be decoded; the resource is left as it was.
    Parse,
    /// A target-locale file has no resolvable source counterpart.
    MissingReference,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SkippedItem {
    pub path: String,
    pub kind: SkipKind,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Synced,
    /// Nothing changed in the repository or in the database since the last run.
    Unchanged,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProjectReport {
    pub schema_version: u32,
    pub slug: String,
    pub status: RunStatus,
    pub revision: Option<String>,
    pub resources_added: usize,
    pub resources_changed: usize,
    pub resources_removed: usize,
    pub resources_renamed: usize,
    pub entities_added: usize,
    pub entities_updated: usize,
    pub entities_obsoleted: usize,
    pub translations_created: usize,
    pub translations_approved: usize,
    pub translations_rejected: usize,
    pub translations_deleted: usize,
    pub files_written: usize,
    pub committed: bool,
    pub skipped: Vec<SkippedItem>,
    pub error: Option<String>,
}

impl ProjectReport {
    pub fn new(slug: &str) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            slug: slug.to_string(),
            status: RunStatus::Synced,
            revision: None,
            resources_added: 0,
            resources_changed: 0,
            resources_removed: 0,
            resources_renamed: 0,
            entities_added: 0,
            entities_updated: 0,
            entities_obsoleted: 0,
            translations_created: 0,
            translations_approved: 0,
            translations_rejected: 0,
            translations_deleted: 0,
            files_written: 0,
            committed: false,
            skipped: Vec::new(),
            error: None,
        }
    }

    pub fn failed(slug: &str, error: String) -> Self {
        Self {
            status: RunStatus::Failed,
            error: Some(error),
            ..Self::new(slug)
        }
    }

    /// True when the run touched neither the database nor the repository.
    pub fn is_noop(&self) -> bool {
        self.resources_added == 0
            && self.resources_changed == 0
            && self.resources_removed == 0
            && self.resources_renamed == 0
            && self.entities_added == 0
            && self.entities_updated == 0
            && self.entities_obsoleted == 0
            && self.translations_created == 0
            && self.translations_approved == 0
            && self.translations_rejected == 0
            && self.translations_deleted == 0
            && self.files_written == 0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SyncSummary {
    pub projects: Vec<ProjectReport>,
}

impl SyncSummary {
    pub fn has_failures(&self) -> bool {
        self.projects
            .iter()
            .any(|p| p.status == RunStatus::Failed)
    }
}

/// Denormalized counters as exposed by `locsync stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StatsRow {
    pub name: String,
    pub total: i64,
    pub approved: i64,
    pub pretranslated: i64,
    pub errors: i64,
    pub warnings: i64,
    pub unreviewed: i64,
}

impl StatsRow {
    /// Share of approved or pretranslated strings, in percent.
    pub fn completion(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.approved + self.pretranslated) as f64 * 100.0 / self.total as f64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProjectStats {
    pub project: StatsRow,
    pub locales: Vec<StatsRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_report_marks_summary_as_failed() {
        let mut summary = SyncSummary::default();
        summary.projects.push(ProjectReport::new("ok"));
        assert!(!summary.has_failures());
        summary
            .projects
            .push(ProjectReport::failed("broken", "push rejected".into()));
        assert!(summary.has_failures());

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains(r#""status":"failed""#));
        assert!(json.contains(r#""error":"push rejected""#));
    }

    #[test]
    fn fresh_report_is_noop() {
        let mut r = ProjectReport::new("p");
        assert!(r.is_noop());
        r.entities_added = 1;
        assert!(!r.is_noop());
    }

    #[test]
    fn completion_counts_pretranslated() {
        let row = StatsRow {
            name: "de".into(),
            total: 4,
            approved: 2,
            pretranslated: 1,
            ..Default::default()
        };
        assert_eq!(row.completion(), 75.0);
        assert_eq!(StatsRow::default().completion(), 0.0);
    }
}
