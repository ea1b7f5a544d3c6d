use color_eyre::eyre::bail;
use locsync_core::Result;
use locsync_domain::{ProjectReport, RunStatus, SyncSummary};
use locsync_services::{projects_from_config, sync_projects, GitClient, SyncOptions, SyncSettings};
use owo_colors::OwoColorize;

use super::{load, open_store};
use crate::{OutputFormat, StoreArgs};

/// Returns whether every project synced.
pub fn run_sync(
    projects: &[String],
    options: SyncOptions,
    store_args: &StoreArgs,
    format: OutputFormat,
    use_color: bool,
) -> Result<bool> {
    let (cfg, base) = load(store_args)?;
    let specs = match projects_from_config(&cfg, projects, &base) {
        Ok(specs) => specs,
        Err(unknown) => bail!("unknown project(s): {}", unknown.join(", ")),
    };
    if specs.is_empty() {
        crate::ui_warn!("no projects configured");
    }
    let store = open_store(store_args, &cfg, &base)?;
    let settings = SyncSettings::from_config(&cfg);
    let summary = sync_projects(&store, &GitClient, &specs, &settings, options);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => print_summary(&summary, use_color),
    }
    Ok(!summary.has_failures())
}

fn print_summary(summary: &SyncSummary, use_color: bool) {
    for report in &summary.projects {
        let status = match report.status {
            RunStatus::Synced => "synced",
            RunStatus::Unchanged => "unchanged",
            RunStatus::Failed => "failed",
        };
        let revision = report.revision.as_deref().unwrap_or("-");
        if use_color {
            let status = match report.status {
                RunStatus::Synced => status.green().to_string(),
                RunStatus::Unchanged => status.dimmed().to_string(),
                RunStatus::Failed => status.red().to_string(),
            };
            println!("{} {} {}", report.slug.bold(), status, revision.blue());
        } else {
            println!("{} {} {}", report.slug, status, revision);
        }
        if let Some(error) = &report.error {
            crate::ui_err!("{}: {}", report.slug, error);
            continue;
        }
        if report.status == RunStatus::Synced {
            println!("  {}", counters(report));
        }
        for item in &report.skipped {
            crate::ui_warn!("skipped {}: {}", item.path, item.reason);
        }
    }
}

fn counters(r: &ProjectReport) -> String {
    format!(
        "resources +{} ~{} -{} >{} | entities +{} ~{} -{} | translations +{} approved {} rejected {} deleted {} | files {}{}",
        r.resources_added,
        r.resources_changed,
        r.resources_removed,
        r.resources_renamed,
        r.entities_added,
        r.entities_updated,
        r.entities_obsoleted,
        r.translations_created,
        r.translations_approved,
        r.translations_rejected,
        r.translations_deleted,
        r.files_written,
        if r.committed { " | committed" } else { "" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_commit_only_when_made() {
        let mut r = ProjectReport::new("app");
        r.resources_added = 1;
        r.files_written = 2;
        let line = counters(&r);
        assert!(line.starts_with("resources +1 ~0 -0 >0"));
        assert!(line.ends_with("files 2"));
        r.committed = true;
        assert!(counters(&r).ends_with("files 2 | committed"));
    }
}
