//! Git operations and remote management
//!
//! Thin layer over `git2` used by the mirror cache and the reconcilers:
//! clone, open, fetch, push, and remote list/add/delete. Network operations
//! take optional basic-auth credentials and report `Change::NoChange` when
//! the other side is already up to date.

mod auth;
mod transport;

use std::path::Path;

use git2::{ErrorCode, Repository};
use thiserror::Error;

pub use transport::{clone_mirror, fetch, push};

/// Remote created by a mirror clone
pub const ORIGIN: &str = "origin";

/// Fetch refspec of the local mirror: source branches land directly in `refs/heads`
pub const MIRROR_FETCH_REFSPEC: &str = "+refs/heads/*:refs/heads/*";

/// Errors from git operations
#[derive(Debug, Error)]
pub enum GitError {
    #[error("open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: git2::Error,
    },

    #[error("git clone {url}: {source}")]
    Clone {
        url: String,
        #[source]
        source: git2::Error,
    },

    #[error("git fetch from {remote}: {source}")]
    Fetch {
        remote: String,
        #[source]
        source: git2::Error,
    },

    #[error("git push to {remote}: {source}")]
    Push {
        remote: String,
        #[source]
        source: git2::Error,
    },

    #[error("remote rejected {refname}: {message}")]
    Rejected { refname: String, message: String },

    #[error("remote {name}: {source}")]
    Remote {
        name: String,
        #[source]
        source: git2::Error,
    },

    #[error("reference not found: {0}")]
    MissingRef(String),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A named remote as stored in the repository config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub name: String,
    /// Every `remote.<name>.url` value, in config order
    pub urls: Vec<String>,
    /// Every `remote.<name>.pushurl` value; pushes go here when set
    pub push_urls: Vec<String>,
    pub fetch_refspecs: Vec<String>,
}

/// Open an existing (bare) repository
pub fn open(path: &Path) -> Result<Repository, GitError> {
    Repository::open_bare(path).map_err(|source| GitError::Open {
        path: path.display().to_string(),
        source,
    })
}

/// List all remotes with their full fetch and push URL sets
pub fn list_remotes(repo: &Repository) -> Result<Vec<RemoteConfig>, GitError> {
    let config = repo.config()?;
    let names = repo.remotes()?;
    let mut remotes = Vec::new();

    for name in names.iter().flatten() {
        let remote = repo.find_remote(name).map_err(|source| GitError::Remote {
            name: name.to_string(),
            source,
        })?;
        let fetch_refspecs = remote
            .fetch_refspecs()?
            .iter()
            .flatten()
            .map(String::from)
            .collect();

        remotes.push(RemoteConfig {
            name: name.to_string(),
            urls: config_values(&config, &format!("remote.{}.url", name))?,
            push_urls: config_values(&config, &format!("remote.{}.pushurl", name))?,
            fetch_refspecs,
        });
    }

    Ok(remotes)
}

/// Add a remote with a single URL and fetch refspec
pub fn add_remote(repo: &Repository, name: &str, url: &str, fetch_refspec: &str) -> Result<(), GitError> {
    repo.remote_with_fetch(name, url, fetch_refspec)
        .map(|_| ())
        .map_err(|source| GitError::Remote {
            name: name.to_string(),
            source,
        })
}

/// Delete a remote and its remote-tracking refs
pub fn delete_remote(repo: &Repository, name: &str) -> Result<(), GitError> {
    repo.remote_delete(name).map_err(|source| GitError::Remote {
        name: name.to_string(),
        source,
    })
}

/// Names of local refs matching any of the glob patterns, sorted
pub fn local_refs(repo: &Repository, patterns: &[&str]) -> Result<Vec<String>, GitError> {
    let mut names = Vec::new();
    for pattern in patterns {
        for reference in repo.references_glob(pattern)? {
            let reference = reference?;
            if reference.kind() == Some(git2::ReferenceType::Symbolic) {
                continue;
            }
            if let Some(name) = reference.name() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    names.dedup();
    Ok(names)
}

/// Point HEAD at an existing local branch
pub fn set_head_branch(repo: &Repository, branch: &str) -> Result<(), GitError> {
    let refname = format!("refs/heads/{}", branch);
    match repo.find_reference(&refname) {
        Ok(_) => {}
        Err(e) if e.code() == ErrorCode::NotFound => return Err(GitError::MissingRef(refname)),
        Err(e) => return Err(e.into()),
    }
    repo.set_head(&refname)?;
    Ok(())
}

fn config_values(config: &git2::Config, key: &str) -> Result<Vec<String>, GitError> {
    let mut values = Vec::new();
    let mut entries = match config.multivar(key, None) {
        Ok(entries) => entries,
        Err(e) if e.code() == ErrorCode::NotFound => return Ok(values),
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = entries.next() {
        let entry = entry?;
        if let Some(value) = entry.value() {
            values.push(value.to_string());
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_add_list_delete_remote() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init_bare(temp.path()).unwrap();

        add_remote(&repo, "dest", "https://example.com/a.git", "+refs/heads/*:refs/remotes/dest/*").unwrap();

        let remotes = list_remotes(&repo).unwrap();
        assert_eq!(remotes.len(), 1);
        assert_eq!(remotes[0].name, "dest");
        assert_eq!(remotes[0].urls, vec!["https://example.com/a.git"]);
        assert!(remotes[0].push_urls.is_empty());
        assert_eq!(remotes[0].fetch_refspecs, vec!["+refs/heads/*:refs/remotes/dest/*"]);

        delete_remote(&repo, "dest").unwrap();
        assert!(list_remotes(&repo).unwrap().is_empty());
    }

    #[test]
    fn test_list_remotes_reports_every_url() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init_bare(temp.path()).unwrap();
        add_remote(&repo, "dest", "https://example.com/a.git", "+refs/heads/*:refs/remotes/dest/*").unwrap();
        repo.config()
            .unwrap()
            .set_multivar("remote.dest.url", "^$", "https://example.com/b.git")
            .unwrap();

        let remotes = list_remotes(&repo).unwrap();
        assert_eq!(
            remotes[0].urls,
            vec!["https://example.com/a.git", "https://example.com/b.git"]
        );
    }

    #[test]
    fn test_list_remotes_reports_push_urls() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init_bare(temp.path()).unwrap();
        add_remote(&repo, "dest", "https://example.com/a.git", "+refs/heads/*:refs/remotes/dest/*").unwrap();
        repo.remote_set_pushurl("dest", Some("https://example.com/push.git")).unwrap();

        let remotes = list_remotes(&repo).unwrap();
        assert_eq!(remotes[0].urls, vec!["https://example.com/a.git"]);
        assert_eq!(remotes[0].push_urls, vec!["https://example.com/push.git"]);
    }

    #[test]
    fn test_set_head_branch_requires_existing_branch() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init_bare(temp.path()).unwrap();

        let result = set_head_branch(&repo, "nope");
        assert!(matches!(result, Err(GitError::MissingRef(_))));
    }

    #[test]
    fn test_open_missing_repo_fails() {
        let temp = TempDir::new().unwrap();
        let result = open(&temp.path().join("missing.git"));
        assert!(matches!(result, Err(GitError::Open { .. })));
    }
}
