use std::path::{Path, PathBuf};
use std::time::Duration;

use locsync_config::{LocSyncConfig, LocaleCfg, ProjectCfg};
use locsync_core::{builtin_locale, Locale, PluralCategory};

use crate::vcs::Author;

/// A project as the pipeline sees it, with locales resolved and checkout
/// paths made absolute.
#[derive(Debug, Clone)]
pub struct ProjectSpec {
    pub slug: String,
    pub name: String,
    pub locales: Vec<Locale>,
    /// `l10n.toml` relative to the source checkout; config mode when set.
    pub config_file: Option<PathBuf>,
    pub repositories: Vec<RepositorySpec>,
}

#[derive(Debug, Clone)]
pub struct RepositorySpec {
    pub url: String,
    pub branch: Option<String>,
    pub path: PathBuf,
    pub source: bool,
}

impl ProjectSpec {
    pub fn locale_codes(&self) -> Vec<String> {
        self.locales.iter().map(|l| l.code.clone()).collect()
    }

    /// The repository holding the source-locale files.
    pub fn source_repository(&self) -> Option<&RepositorySpec> {
        self.repositories
            .iter()
            .find(|r| r.source)
            .or_else(|| self.repositories.first())
    }
}

/// Process-wide values the pipeline needs, scoped to one invocation.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub bot: Author,
    pub message_prefix: String,
    pub timeout: Duration,
    pub generator: String,
}

impl SyncSettings {
    pub fn from_config(cfg: &LocSyncConfig) -> Self {
        Self {
            bot: Author::new(cfg.bot_name(), cfg.bot_email()),
            message_prefix: cfg.message_prefix().to_string(),
            timeout: Duration::from_secs(cfg.timeout_secs()),
            generator: format!("LocSync {}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from_config(&LocSyncConfig::default())
    }
}

/// Flags of one `sync` invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Use the checkouts as they are.
    pub no_pull: bool,
    /// Persist database effects but write and push no files.
    pub no_commit: bool,
    /// Rescan everything even when nothing seems to have changed.
    pub force: bool,
}

/// Build the locale for `code` from built-ins and configured overrides.
pub fn resolve_locale(code: &str, overrides: &[LocaleCfg]) -> Locale {
    let mut locale = builtin_locale(code).unwrap_or_else(|| Locale::with_default_plurals(code));
    if let Some(cfg) = overrides.iter().find(|l| l.code == code) {
        if let Some(name) = &cfg.name {
            locale.name = name.clone();
        }
        if let Some(plurals) = &cfg.cldr_plurals {
            locale.cldr_plurals = plurals
                .iter()
                .filter_map(|i| PluralCategory::from_index(*i))
                .collect();
        }
        if let Some(rule) = &cfg.plural_rule {
            locale.plural_rule = rule.clone();
        }
    }
    locale
}

fn project_spec(cfg: &LocSyncConfig, p: &ProjectCfg, base: &Path) -> ProjectSpec {
    let checkouts = base.join(cfg.checkouts_dir());
    let repositories = p
        .repositories
        .iter()
        .enumerate()
        .map(|(i, r)| RepositorySpec {
            url: r.url.clone(),
            branch: r.branch.clone(),
            path: match &r.path {
                Some(path) => base.join(path),
                None => checkouts.join(&p.slug).join(i.to_string()),
            },
            source: r.source.unwrap_or(i == 0),
        })
        .collect();
    ProjectSpec {
        slug: p.slug.clone(),
        name: p.name.clone().unwrap_or_else(|| p.slug.clone()),
        locales: p
            .locales
            .iter()
            .map(|code| resolve_locale(code, &cfg.locales))
            .collect(),
        config_file: p.config_file.as_ref().map(PathBuf::from),
        repositories,
    }
}

/// Projects selected by `slugs` (all when empty), relative paths resolved
/// against `base`. Unknown slugs are returned as the error value.
pub fn projects_from_config(
    cfg: &LocSyncConfig,
    slugs: &[String],
    base: &Path,
) -> Result<Vec<ProjectSpec>, Vec<String>> {
    let unknown: Vec<String> = slugs
        .iter()
        .filter(|s| cfg.project(s).is_none())
        .cloned()
        .collect();
    if !unknown.is_empty() {
        return Err(unknown);
    }
    Ok(cfg
        .projects
        .iter()
        .filter(|p| slugs.is_empty() || slugs.contains(&p.slug))
        .map(|p| project_spec(cfg, p, base))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LocSyncConfig {
        toml::from_str(
            r#"
checkouts_dir = "co"
[[locales]]
code = "sl"
name = "Slovenščina"
cldr_plurals = [1, 2, 3, 5]
plural_rule = "(n%100==1 ? 0 : n%100==2 ? 1 : n%100==3 || n%100==4 ? 2 : 3)"

[[projects]]
slug = "app"
locales = ["de", "sl", "xx"]
[[projects.repositories]]
url = "https://example.com/app.git"

[[projects]]
slug = "web"
[[projects.repositories]]
url = "https://example.com/web.git"
path = "/srv/web"
"#,
        )
        .unwrap()
    }

    #[test]
    fn locales_combine_builtins_and_overrides() {
        let cfg = config();
        let sl = resolve_locale("sl", &cfg.locales);
        assert_eq!(sl.nplurals(), 4);
        assert_eq!(sl.name, "Slovenščina");
        let xx = resolve_locale("xx", &cfg.locales);
        assert_eq!(xx.plural_rule, "(n != 1)");
    }

    #[test]
    fn projects_get_checkout_paths() {
        let cfg = config();
        let base = Path::new("/work");
        let all = projects_from_config(&cfg, &[], base).unwrap();
        assert_eq!(all.len(), 2);
        let app = &all[0];
        assert_eq!(app.repositories[0].path, PathBuf::from("/work/co/app/0"));
        assert!(app.repositories[0].source);
        assert_eq!(app.locale_codes(), vec!["de", "sl", "xx"]);
        assert_eq!(all[1].repositories[0].path, PathBuf::from("/srv/web"));

        let err = projects_from_config(&cfg, &["nope".to_string()], base).unwrap_err();
        assert_eq!(err, vec!["nope"]);
    }
}
