use color_eyre::eyre::bail;
use locsync_core::Result;
use locsync_domain::{ProjectStats, StatsRow};
use locsync_store::StoreError;
use owo_colors::OwoColorize;

use super::{load, open_store};
use crate::{OutputFormat, StoreArgs};

pub fn run_stats(
    project: Option<&str>,
    store_args: &StoreArgs,
    format: OutputFormat,
    use_color: bool,
) -> Result<()> {
    let (cfg, base) = load(store_args)?;
    let store = open_store(store_args, &cfg, &base)?;

    let stats = store.read(|db| {
        let mut projects = db.projects()?;
        if let Some(slug) = project {
            projects.retain(|p| p.slug == slug);
        }
        projects
            .iter()
            .map(|p| {
                Ok(ProjectStats {
                    project: db.project_stats(p.id)?,
                    locales: db.project_locale_stats(p.id)?,
                })
            })
            .collect::<std::result::Result<Vec<_>, StoreError>>()
    })?;
    if let (Some(slug), true) = (project, stats.is_empty()) {
        bail!("unknown project: {slug}");
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Text => {
            for entry in &stats {
                print_row(&entry.project, 0, use_color);
                for locale in &entry.locales {
                    print_row(locale, 2, use_color);
                }
            }
        }
    }
    Ok(())
}

fn print_row(row: &StatsRow, indent: usize, use_color: bool) {
    let name = format!("{:indent$}{}", "", row.name);
    let completion = format!("{:5.1}%", row.completion());
    let line = format!(
        "total {} approved {} pretranslated {} unreviewed {} errors {} warnings {}",
        row.total, row.approved, row.pretranslated, row.unreviewed, row.errors, row.warnings
    );
    if use_color {
        let completion = if row.total > 0 && row.completion() >= 100.0 {
            completion.green().to_string()
        } else {
            completion.yellow().to_string()
        };
        println!("{:<24} {} {}", name.bold(), completion, line);
    } else {
        println!("{name:<24} {completion} {line}");
    }
}
