use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "locsync.toml";
pub const DEFAULT_DATABASE: &str = "locsync.sqlite3";
pub const DEFAULT_CHECKOUTS_DIR: &str = "checkouts";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30 * 60;
pub const DEFAULT_BOT_NAME: &str = "LocSync";
pub const DEFAULT_BOT_EMAIL: &str = "locsync@localhost";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocSyncConfig {
    pub database: Option<String>,
    pub checkouts_dir: Option<String>,
    pub timeout_secs: Option<u64>,
    pub commit: Option<CommitCfg>,
    #[serde(default)]
    pub locales: Vec<LocaleCfg>,
    #[serde(default)]
    pub projects: Vec<ProjectCfg>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommitCfg {
    pub bot_name: Option<String>,
    pub bot_email: Option<String>,
    pub message_prefix: Option<String>,
}

/// Locale override or addition to the built-in table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocaleCfg {
    pub code: String,
    pub name: Option<String>,
    /// CLDR category indices (0 = zero … 5 = other).
    pub cldr_plurals: Option<Vec<u8>>,
    pub plural_rule: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectCfg {
    pub slug: String,
    pub name: Option<String>,
    #[serde(default)]
    pub locales: Vec<String>,
    /// Project configuration file (l10n.toml) relative to the source checkout;
    /// switches path resolution from discovery mode to config mode.
    pub config_file: Option<String>,
    #[serde(default)]
    pub repositories: Vec<RepositoryCfg>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepositoryCfg {
    pub url: String,
    pub branch: Option<String>,
    /// Checkout directory, defaults to `<checkouts_dir>/<project>/<n>`.
    pub path: Option<String>,
    /// Whether this repository carries the source-locale files.
    pub source: Option<bool>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl LocSyncConfig {
    pub fn database(&self) -> &str {
        self.database.as_deref().unwrap_or(DEFAULT_DATABASE)
    }

    pub fn checkouts_dir(&self) -> &str {
        self.checkouts_dir.as_deref().unwrap_or(DEFAULT_CHECKOUTS_DIR)
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)
    }

    pub fn bot_name(&self) -> &str {
        self.commit
            .as_ref()
            .and_then(|c| c.bot_name.as_deref())
            .unwrap_or(DEFAULT_BOT_NAME)
    }

    pub fn bot_email(&self) -> &str {
        self.commit
            .as_ref()
            .and_then(|c| c.bot_email.as_deref())
            .unwrap_or(DEFAULT_BOT_EMAIL)
    }

    pub fn message_prefix(&self) -> &str {
        self.commit
            .as_ref()
            .and_then(|c| c.message_prefix.as_deref())
            .unwrap_or(DEFAULT_BOT_NAME)
    }

    pub fn project(&self, slug: &str) -> Option<&ProjectCfg> {
        self.projects.iter().find(|p| p.slug == slug)
    }
}

/// Read a single config file. A missing file is an error here; use
/// [`load_config`] for the optional layered lookup.
pub fn load_config_file(path: &Path) -> Result<LocSyncConfig, ConfigError> {
    let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str::<LocSyncConfig>(&s).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_config() -> Result<LocSyncConfig, ConfigError> {
    // Search order: CWD/locsync.toml, $CONFIG/locsync/locsync.toml
    let mut merged = LocSyncConfig::default();
    if let Ok(p) = std::env::current_dir() {
        let path = p.join(CONFIG_FILE_NAME);
        if path.is_file() {
            merged = merge(merged, load_config_file(&path)?);
        }
    }
    if let Some(base) = dirs::config_dir() {
        let path = base.join("locsync").join(CONFIG_FILE_NAME);
        if path.is_file() {
            merged = merge(merged, load_config_file(&path)?);
        }
    }
    Ok(merged)
}

/// Fill unset fields of `a` from `b`. Lists from `b` are appended for
/// entries (by code/slug) that `a` does not define.
pub fn merge(mut a: LocSyncConfig, b: LocSyncConfig) -> LocSyncConfig {
    if a.database.is_none() {
        a.database = b.database;
    }
    if a.checkouts_dir.is_none() {
        a.checkouts_dir = b.checkouts_dir;
    }
    if a.timeout_secs.is_none() {
        a.timeout_secs = b.timeout_secs;
    }
    a.commit = merge_opt(a.commit, b.commit, merge_commit);
    for l in b.locales {
        if !a.locales.iter().any(|x| x.code == l.code) {
            a.locales.push(l);
        }
    }
    for p in b.projects {
        if !a.projects.iter().any(|x| x.slug == p.slug) {
            a.projects.push(p);
        }
    }
    a
}

fn merge_opt<T: Default>(a: Option<T>, b: Option<T>, f: fn(T, T) -> T) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(f(a, b)),
        (None, Some(b)) => Some(b),
        (Some(a), None) => Some(a),
        (None, None) => None,
    }
}

fn merge_commit(mut a: CommitCfg, b: CommitCfg) -> CommitCfg {
    if a.bot_name.is_none() {
        a.bot_name = b.bot_name;
    }
    if a.bot_email.is_none() {
        a.bot_email = b.bot_email;
    }
    if a.message_prefix.is_none() {
        a.message_prefix = b.message_prefix;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SAMPLE: &str = r#"
database = "db.sqlite3"
timeout_secs = 60

[commit]
bot_name = "Sync Bot"

[[locales]]
code = "sl"
cldr_plurals = [1, 2, 3, 5]

[[projects]]
slug = "app"
locales = ["de", "fr"]

[[projects.repositories]]
url = "https://example.com/app.git"
branch = "main"
source = true
"#;

    #[test]
    fn parses_projects_and_repositories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, SAMPLE).unwrap();

        let cfg = load_config_file(&path).unwrap();
        assert_eq!(cfg.database(), "db.sqlite3");
        assert_eq!(cfg.timeout_secs(), 60);
        assert_eq!(cfg.bot_name(), "Sync Bot");
        assert_eq!(cfg.bot_email(), DEFAULT_BOT_EMAIL);
        let p = cfg.project("app").unwrap();
        assert_eq!(p.locales, vec!["de", "fr"]);
        assert_eq!(p.repositories[0].branch.as_deref(), Some("main"));
        assert_eq!(p.repositories[0].source, Some(true));
    }

    #[test]
    fn merge_prefers_first_layer() {
        let a: LocSyncConfig = toml::from_str(
            r#"
database = "a.db"
[[projects]]
slug = "x"
"#,
        )
        .unwrap();
        let b: LocSyncConfig = toml::from_str(
            r#"
database = "b.db"
checkouts_dir = "co"
[commit]
bot_email = "bot@b"
[[projects]]
slug = "x"
name = "ignored"
[[projects]]
slug = "y"
"#,
        )
        .unwrap();
        let m = merge(a, b);
        assert_eq!(m.database(), "a.db");
        assert_eq!(m.checkouts_dir(), "co");
        assert_eq!(m.bot_email(), "bot@b");
        assert_eq!(m.projects.len(), 2);
        assert!(m.project("x").unwrap().name.is_none());
    }

    #[test]
    fn invalid_toml_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "database = [").unwrap();
        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(CONFIG_FILE_NAME));
    }
}
