//! Checkout boundary. The pipeline never inspects history directly; it asks
//! a [`Vcs`] for the current revision, the files changed since the last
//! synced one, and to commit what it wrote.

use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    #[error("pull of {url} failed: {message}")]
    Pull { url: String, message: String },
    #[error("commit in {path} failed: {message}")]
    Commit { path: String, message: String },
    /// Not a failure: the working copy matched the last commit.
    #[error("nothing to commit")]
    NothingToCommit,
}

/// Files changed between two revisions, relative to the checkout root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedFiles {
    pub changed: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub renamed: Vec<(PathBuf, PathBuf)>,
}

impl ChangedFiles {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty() && self.renamed.is_empty()
    }
}

/// One repository's working copy as seen by a sync run.
#[derive(Debug, Clone)]
pub struct Checkout {
    pub url: String,
    pub branch: Option<String>,
    pub path: PathBuf,
    pub previous_commit: Option<String>,
    pub current_commit: String,
    /// `None` when every file has to be treated as changed.
    pub changes: Option<ChangedFiles>,
}

impl Checkout {
    pub fn is_full_scan(&self) -> bool {
        self.changes.is_none()
    }

    /// The checkout saw neither a new revision nor changed files.
    pub fn is_unchanged(&self) -> bool {
        self.previous_commit.as_deref() == Some(self.current_commit.as_str())
            && self.changes.as_ref().is_some_and(ChangedFiles::is_empty)
    }

    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl Author {
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
        }
    }

    pub fn signature(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }
}

pub trait Vcs {
    /// Bring the checkout at `path` to the tip of `branch`, cloning it first
    /// if needed. Returns the new revision.
    fn pull(&self, url: &str, path: &Path, branch: Option<&str>) -> Result<String, VcsError>;

    /// Revision the working copy is at, without contacting the remote.
    fn revision(&self, path: &Path) -> Result<String, VcsError>;

    /// Changes since `previous`; `None` when there is no usable previous
    /// revision.
    fn changed_files(
        &self,
        path: &Path,
        previous: Option<&str>,
    ) -> Result<Option<ChangedFiles>, VcsError>;

    /// Commit every change under `path` and push it. Fails with
    /// [`VcsError::NothingToCommit`] when the working copy is clean.
    fn commit(
        &self,
        path: &Path,
        message: &str,
        author: &Author,
        branch: Option<&str>,
        url: &str,
    ) -> Result<(), VcsError>;
}

/// [`Vcs`] over the `git` command line client.
#[derive(Debug, Clone, Default)]
pub struct GitClient;

fn git(path: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(path);
    cmd
}

/// Run a prepared git command and return its stdout.
fn run(mut cmd: Command) -> Result<String, String> {
    let output = cmd
        .output()
        .map_err(|err| format!("git execution failed: {err}"))?;
    if !output.status.success() {
        return Err(String::from_utf8_lossy(&output.stderr).trim().to_string());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

impl Vcs for GitClient {
    fn pull(&self, url: &str, path: &Path, branch: Option<&str>) -> Result<String, VcsError> {
        let fail = |message: String| VcsError::Pull {
            url: url.to_string(),
            message,
        };
        if !path.join(".git").exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| fail(e.to_string()))?;
            }
            let mut cmd = Command::new("git");
            cmd.arg("clone");
            if let Some(b) = branch {
                cmd.args(["--branch", b]);
            }
            cmd.arg(url).arg(path);
            run(cmd).map_err(fail)?;
        } else {
            let mut fetch = git(path);
            fetch.args(["fetch", url, branch.unwrap_or("HEAD")]);
            run(fetch).map_err(fail)?;
            let mut reset = git(path);
            reset.args(["reset", "--hard", "FETCH_HEAD"]);
            run(reset).map_err(fail)?;
        }
        let revision = self.revision(path).map_err(|e| fail(e.to_string()))?;
        tracing::info!(event = "vcs_pulled", url, revision = %revision);
        Ok(revision)
    }

    fn revision(&self, path: &Path) -> Result<String, VcsError> {
        let mut cmd = git(path);
        cmd.args(["rev-parse", "HEAD"]);
        run(cmd)
            .map(|s| s.trim().to_string())
            .map_err(|message| VcsError::Pull {
                url: path.display().to_string(),
                message,
            })
    }

    fn changed_files(
        &self,
        path: &Path,
        previous: Option<&str>,
    ) -> Result<Option<ChangedFiles>, VcsError> {
        let Some(previous) = previous else {
            return Ok(None);
        };
        let mut known = git(path);
        known.args(["cat-file", "-e", &format!("{previous}^{{commit}}")]);
        if run(known).is_err() {
            tracing::warn!(event = "vcs_previous_revision_unknown", revision = previous);
            return Ok(None);
        }
        let mut diff = git(path);
        diff.args(["diff", "--name-status", "-M", previous, "HEAD"]);
        let out = run(diff).map_err(|message| VcsError::Pull {
            url: path.display().to_string(),
            message,
        })?;
        Ok(Some(parse_name_status(&out)))
    }

    fn commit(
        &self,
        path: &Path,
        message: &str,
        author: &Author,
        branch: Option<&str>,
        url: &str,
    ) -> Result<(), VcsError> {
        let fail = |message: String| VcsError::Commit {
            path: path.display().to_string(),
            message,
        };
        let mut add = git(path);
        add.args(["add", "-A"]);
        run(add).map_err(fail)?;

        let mut staged = git(path);
        staged.args(["diff", "--cached", "--quiet"]);
        if run(staged).is_ok() {
            return Err(VcsError::NothingToCommit);
        }

        let mut commit = git(path);
        commit
            .arg("-c")
            .arg(format!("user.name={}", author.name))
            .arg("-c")
            .arg(format!("user.email={}", author.email))
            .args(["commit", "-m", message, "--author", &author.signature()]);
        run(commit).map_err(fail)?;

        let refspec = match branch {
            Some(b) => format!("HEAD:{b}"),
            None => "HEAD".to_string(),
        };
        let mut push = git(path);
        push.args(["push", url, &refspec]);
        run(push).map_err(fail)?;
        tracing::info!(event = "vcs_committed", path = %path.display());
        Ok(())
    }
}

/// Parse `git diff --name-status -M` output.
pub(crate) fn parse_name_status(out: &str) -> ChangedFiles {
    let mut files = ChangedFiles::default();
    for line in out.lines() {
        let mut cols = line.split('\t');
        let (Some(status), Some(first)) = (cols.next(), cols.next()) else {
            continue;
        };
        match status.chars().next() {
            Some('D') => files.removed.push(PathBuf::from(first)),
            Some('R') => match cols.next() {
                Some(second) => files
                    .renamed
                    .push((PathBuf::from(first), PathBuf::from(second))),
                None => files.changed.push(PathBuf::from(first)),
            },
            Some('C') => {
                if let Some(second) = cols.next() {
                    files.changed.push(PathBuf::from(second));
                }
            }
            Some(_) => files.changed.push(PathBuf::from(first)),
            None => {}
        }
    }
    files
}
