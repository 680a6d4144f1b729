//! Remote reconciler
//!
//! Converges a named remote of a local mirror onto exactly one URL. A remote
//! with the wrong URL set, or with any push URL, is deleted and recreated
//! rather than edited.

use git2::Repository;

use crate::git::{self, GitError};
use crate::types::RemoteAction;

/// Fetch refspec for a destination remote: its branches land under `refs/remotes/<name>/`
pub fn tracking_refspec(name: &str) -> String {
    format!("+refs/heads/*:refs/remotes/{}/*", name)
}

/// Ensure `name` exists with the URL set `[url]` and no push URL override
pub fn ensure_remote(repo: &Repository, name: &str, url: &str) -> Result<RemoteAction, GitError> {
    let existing = git::list_remotes(repo)?
        .into_iter()
        .find(|r| r.name == name);

    let action = match existing {
        Some(remote) if remote.urls == [url] && remote.push_urls.is_empty() => {
            return Ok(RemoteAction::Unchanged);
        }
        Some(remote) => {
            tracing::debug!(
                "remote {}: replacing urls {:?} (push urls {:?})",
                name,
                remote.urls,
                remote.push_urls
            );
            git::delete_remote(repo, name)?;
            RemoteAction::Replaced
        }
        None => RemoteAction::Created,
    };

    git::add_remote(repo, name, url, &tracking_refspec(name))?;
    Ok(action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const URL: &str = "https://gitlab.com/mirrors/widget.git";

    fn urls(repo: &Repository, name: &str) -> Vec<String> {
        git::list_remotes(repo)
            .unwrap()
            .into_iter()
            .find(|r| r.name == name)
            .map(|r| r.urls)
            .unwrap_or_default()
    }

    #[test]
    fn test_absent_remote_is_created() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init_bare(temp.path()).unwrap();

        assert_eq!(ensure_remote(&repo, "gitlab", URL).unwrap(), RemoteAction::Created);
        assert_eq!(urls(&repo, "gitlab"), vec![URL]);

        let remotes = git::list_remotes(&repo).unwrap();
        assert_eq!(remotes[0].fetch_refspecs, vec!["+refs/heads/*:refs/remotes/gitlab/*"]);
    }

    #[test]
    fn test_correct_remote_is_left_alone() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init_bare(temp.path()).unwrap();
        ensure_remote(&repo, "gitlab", URL).unwrap();

        assert_eq!(ensure_remote(&repo, "gitlab", URL).unwrap(), RemoteAction::Unchanged);
        assert_eq!(urls(&repo, "gitlab"), vec![URL]);
    }

    #[test]
    fn test_stale_remote_is_replaced() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init_bare(temp.path()).unwrap();
        git::add_remote(&repo, "gitlab", "https://old.example.com/widget.git", "+refs/heads/*:refs/remotes/gitlab/*")
            .unwrap();

        assert_eq!(ensure_remote(&repo, "gitlab", URL).unwrap(), RemoteAction::Replaced);
        assert_eq!(urls(&repo, "gitlab"), vec![URL]);
        assert_eq!(ensure_remote(&repo, "gitlab", URL).unwrap(), RemoteAction::Unchanged);
    }

    #[test]
    fn test_multi_url_remote_is_replaced() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init_bare(temp.path()).unwrap();
        ensure_remote(&repo, "gitlab", URL).unwrap();
        repo.config()
            .unwrap()
            .set_multivar("remote.gitlab.url", "^$", "https://other.example.com/widget.git")
            .unwrap();
        assert_eq!(urls(&repo, "gitlab").len(), 2);

        assert_eq!(ensure_remote(&repo, "gitlab", URL).unwrap(), RemoteAction::Replaced);
        assert_eq!(urls(&repo, "gitlab"), vec![URL]);
    }

    #[test]
    fn test_stale_push_url_is_replaced() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init_bare(temp.path()).unwrap();
        ensure_remote(&repo, "gitlab", URL).unwrap();
        repo.remote_set_pushurl("gitlab", Some("https://old.example.com/widget.git"))
            .unwrap();

        assert_eq!(ensure_remote(&repo, "gitlab", URL).unwrap(), RemoteAction::Replaced);

        let remote = repo.find_remote("gitlab").unwrap();
        assert_eq!(remote.url(), Some(URL));
        assert_eq!(remote.pushurl(), None);
        assert_eq!(ensure_remote(&repo, "gitlab", URL).unwrap(), RemoteAction::Unchanged);
    }

    #[test]
    fn test_other_remotes_untouched() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init_bare(temp.path()).unwrap();
        git::add_remote(&repo, "origin", "https://github.com/alice/widget.git", "+refs/heads/*:refs/heads/*").unwrap();

        ensure_remote(&repo, "gitlab", URL).unwrap();
        assert_eq!(urls(&repo, "origin"), vec!["https://github.com/alice/widget.git"]);
    }
}
