//! Source Control Metadata
//!
//! The recipe's `scm` block. `auto` values are filled in from the git
//! checkout the recipe is exported from.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{RecipeError, Result};

const AUTO: &str = "auto";

/// Version control system kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScmKind {
    Git,
}

/// A value that is either given or resolved from the checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScmValue {
    Auto,
    Fixed(String),
}

impl ScmValue {
    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Auto)
    }

    pub fn as_fixed(&self) -> Option<&str> {
        match self {
            Self::Auto => None,
            Self::Fixed(value) => Some(value),
        }
    }
}

impl fmt::Display for ScmValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str(AUTO),
            Self::Fixed(value) => f.write_str(value),
        }
    }
}

impl Serialize for ScmValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ScmValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(if text == AUTO {
            Self::Auto
        } else {
            Self::Fixed(text)
        })
    }
}

/// `scm` block of a recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scm {
    #[serde(rename = "type")]
    pub kind: ScmKind,
    pub url: ScmValue,
    pub revision: ScmValue,
}

impl Scm {
    /// Git with url and revision taken from the checkout
    pub fn auto_git() -> Self {
        Self {
            kind: ScmKind::Git,
            url: ScmValue::Auto,
            revision: ScmValue::Auto,
        }
    }

    /// Copy with every `auto` value resolved from the git checkout at
    /// `repo_dir`
    pub fn resolve(&self, repo_dir: &Path) -> Result<Self> {
        let git_dir = git_dir(repo_dir)?;
        let common_dir = common_dir(&git_dir)?;

        let url = match &self.url {
            ScmValue::Auto => ScmValue::Fixed(origin_url(&common_dir)?),
            fixed => fixed.clone(),
        };
        let revision = match &self.revision {
            ScmValue::Auto => ScmValue::Fixed(head_revision(&git_dir, &common_dir)?),
            fixed => fixed.clone(),
        };

        tracing::debug!(url = %url, revision = %revision, "Resolved scm");
        Ok(Self {
            kind: self.kind,
            url,
            revision,
        })
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|err| RecipeError::io(path, err))
}

/// `.git` directory of a checkout, following `gitdir:` files of worktrees
/// and submodules
fn git_dir(repo_dir: &Path) -> Result<PathBuf> {
    let dot_git = repo_dir.join(".git");
    if dot_git.is_dir() {
        return Ok(dot_git);
    }
    if dot_git.is_file() {
        let content = read(&dot_git)?;
        if let Some(target) = content.trim().strip_prefix("gitdir:") {
            let target = Path::new(target.trim());
            return Ok(if target.is_absolute() {
                target.to_path_buf()
            } else {
                repo_dir.join(target)
            });
        }
    }
    Err(RecipeError::Scm {
        field: "repository",
        path: repo_dir.to_path_buf(),
        reason: "not a git checkout".to_string(),
    })
}

/// Directory holding the config, refs and packed-refs shared by all
/// worktrees. A linked worktree's git dir names it in its `commondir` file.
fn common_dir(git_dir: &Path) -> Result<PathBuf> {
    let commondir = git_dir.join("commondir");
    if !commondir.is_file() {
        return Ok(git_dir.to_path_buf());
    }
    let content = read(&commondir)?;
    let target = Path::new(content.trim());
    Ok(if target.is_absolute() {
        target.to_path_buf()
    } else {
        git_dir.join(target)
    })
}

/// `url` of `[remote "origin"]` in the git config
fn origin_url(common_dir: &Path) -> Result<String> {
    let config_path = common_dir.join("config");
    let config = read(&config_path)?;

    let mut in_origin = false;
    for line in config.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_origin = line == r#"[remote "origin"]"#;
            continue;
        }
        if !in_origin {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            if key.trim() == "url" {
                return Ok(value.trim().to_string());
            }
        }
    }

    Err(RecipeError::Scm {
        field: "url",
        path: config_path,
        reason: "no url for remote \"origin\"".to_string(),
    })
}

/// Commit `HEAD` points at, through loose or packed refs. `HEAD` is per
/// worktree, refs may be per worktree or shared.
fn head_revision(git_dir: &Path, common_dir: &Path) -> Result<String> {
    let head_path = git_dir.join("HEAD");
    let head = read(&head_path)?;
    let head = head.trim();

    let Some(ref_name) = head.strip_prefix("ref:").map(str::trim) else {
        return commit_id(head, &head_path);
    };

    for dir in [git_dir, common_dir] {
        let loose = dir.join(ref_name);
        if loose.is_file() {
            let content = read(&loose)?;
            return commit_id(content.trim(), &loose);
        }
    }

    let packed_path = common_dir.join("packed-refs");
    if packed_path.is_file() {
        let packed = read(&packed_path)?;
        let found = packed
            .lines()
            .filter(|line| !line.starts_with('#') && !line.starts_with('^'))
            .filter_map(|line| line.split_once(' '))
            .find(|(_, name)| name.trim() == ref_name);
        if let Some((id, _)) = found {
            return commit_id(id, &packed_path);
        }
    }

    Err(RecipeError::Scm {
        field: "revision",
        path: head_path,
        reason: format!("{ref_name} does not resolve to a commit"),
    })
}

fn commit_id(text: &str, source: &Path) -> Result<String> {
    let valid = matches!(text.len(), 40 | 64) && text.chars().all(|c| c.is_ascii_hexdigit());
    if valid {
        Ok(text.to_ascii_lowercase())
    } else {
        Err(RecipeError::Scm {
            field: "revision",
            path: source.to_path_buf(),
            reason: format!("{text:?} is not a commit id"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const COMMIT: &str = "0123456789abcdef0123456789abcdef01234567";

    fn checkout(head: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        let git = dir.path().join(".git");
        fs::create_dir_all(git.join("refs/heads")).unwrap();
        fs::write(git.join("HEAD"), head).unwrap();
        fs::write(
            git.join("config"),
            "[core]\n\tbare = false\n[remote \"upstream\"]\n\turl = https://example.com/other.git\n\
             [remote \"origin\"]\n\turl = git@github.com:microblink/sweater.git\n\tfetch = +refs/heads/*:refs/remotes/origin/*\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_resolve_loose_ref() {
        let repo = checkout("ref: refs/heads/master\n");
        fs::write(repo.path().join(".git/refs/heads/master"), format!("{COMMIT}\n")).unwrap();

        let scm = Scm::auto_git().resolve(repo.path()).unwrap();
        assert_eq!(scm.url.as_fixed(), Some("git@github.com:microblink/sweater.git"));
        assert_eq!(scm.revision.as_fixed(), Some(COMMIT));
    }

    #[test]
    fn test_resolve_packed_ref() {
        let repo = checkout("ref: refs/heads/release\n");
        fs::write(
            repo.path().join(".git/packed-refs"),
            format!("# pack-refs with: peeled fully-peeled sorted\n{COMMIT} refs/heads/release\n"),
        )
        .unwrap();

        let scm = Scm::auto_git().resolve(repo.path()).unwrap();
        assert_eq!(scm.revision.as_fixed(), Some(COMMIT));
    }

    #[test]
    fn test_resolve_detached_head() {
        let repo = checkout(&format!("{}\n", COMMIT.to_uppercase()));
        let scm = Scm::auto_git().resolve(repo.path()).unwrap();
        assert_eq!(scm.revision.as_fixed(), Some(COMMIT));
    }

    #[test]
    fn test_resolve_linked_worktree() {
        let main = checkout("ref: refs/heads/master\n");
        let main_git = main.path().join(".git");
        fs::write(
            main_git.join("packed-refs"),
            format!("{COMMIT} refs/heads/feature\n"),
        )
        .unwrap();

        let worktree_git = main_git.join("worktrees/wt");
        fs::create_dir_all(&worktree_git).unwrap();
        fs::write(worktree_git.join("HEAD"), "ref: refs/heads/feature\n").unwrap();
        fs::write(worktree_git.join("commondir"), "../..\n").unwrap();

        let worktree = TempDir::new().unwrap();
        fs::write(
            worktree.path().join(".git"),
            format!("gitdir: {}\n", worktree_git.display()),
        )
        .unwrap();

        let scm = Scm::auto_git().resolve(worktree.path()).unwrap();
        assert_eq!(scm.url.as_fixed(), Some("git@github.com:microblink/sweater.git"));
        assert_eq!(scm.revision.as_fixed(), Some(COMMIT));
    }

    #[test]
    fn test_worktree_loose_ref_in_common_dir() {
        let main = checkout("ref: refs/heads/master\n");
        let main_git = main.path().join(".git");
        fs::write(main_git.join("refs/heads/feature"), COMMIT).unwrap();

        let worktree_git = main_git.join("worktrees/wt");
        fs::create_dir_all(&worktree_git).unwrap();
        fs::write(worktree_git.join("HEAD"), "ref: refs/heads/feature\n").unwrap();
        fs::write(worktree_git.join("commondir"), "../..").unwrap();

        let worktree = TempDir::new().unwrap();
        fs::write(
            worktree.path().join(".git"),
            format!("gitdir: {}", worktree_git.display()),
        )
        .unwrap();

        let scm = Scm::auto_git().resolve(worktree.path()).unwrap();
        assert_eq!(scm.revision.as_fixed(), Some(COMMIT));
    }

    #[test]
    fn test_fixed_values_are_kept() {
        let repo = checkout("ref: refs/heads/master\n");
        fs::write(repo.path().join(".git/refs/heads/master"), COMMIT).unwrap();

        let scm = Scm {
            url: ScmValue::Fixed("https://mirror.example.com/sweater.git".to_string()),
            ..Scm::auto_git()
        };
        let resolved = scm.resolve(repo.path()).unwrap();
        assert_eq!(
            resolved.url.as_fixed(),
            Some("https://mirror.example.com/sweater.git")
        );
    }

    #[test]
    fn test_not_a_checkout() {
        let dir = TempDir::new().unwrap();
        let err = Scm::auto_git().resolve(dir.path()).unwrap_err();
        assert!(matches!(err, RecipeError::Scm { field: "repository", .. }));
    }

    #[test]
    fn test_dangling_ref() {
        let repo = checkout("ref: refs/heads/missing\n");
        let err = Scm::auto_git().resolve(repo.path()).unwrap_err();
        assert!(matches!(err, RecipeError::Scm { field: "revision", .. }));
    }

    #[test]
    fn test_scm_json() {
        let json = serde_json::to_string(&Scm::auto_git()).unwrap();
        assert_eq!(json, r#"{"type":"git","url":"auto","revision":"auto"}"#);
    }
}
