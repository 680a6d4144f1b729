//! Network operations: clone, fetch, push

use std::cell::{Cell, RefCell};
use std::path::Path;

use git2::{AutotagOption, FetchOptions, FetchPrune, PushOptions, Remote, Repository};

use super::auth::remote_callbacks;
use super::{GitError, MIRROR_FETCH_REFSPEC, ORIGIN};
use crate::types::{Change, Credentials};

/// Create a bare mirror of `url` at `path`.
///
/// The repository is initialized bare, given an `origin` whose fetch refspec
/// maps source branches straight into `refs/heads`, fetched with all tags, and
/// its HEAD pointed at the source's default branch when the source advertises
/// one.
pub fn clone_mirror(url: &str, path: &Path, credentials: Option<&Credentials>) -> Result<Repository, GitError> {
    let clone_err = |source| GitError::Clone {
        url: url.to_string(),
        source,
    };

    let repo = Repository::init_bare(path).map_err(clone_err)?;
    {
        let mut remote = repo
            .remote_with_fetch(ORIGIN, url, MIRROR_FETCH_REFSPEC)
            .map_err(clone_err)?;
        fetch_remote(&mut remote, &[MIRROR_FETCH_REFSPEC], credentials).map_err(clone_err)?;

        if let Ok(head) = remote.default_branch() {
            if let Some(head) = head.as_str() {
                if repo.find_reference(head).is_ok() {
                    repo.set_head(head).map_err(clone_err)?;
                }
            }
        }
    }

    tracing::debug!("Cloned {} into {}", url, path.display());
    Ok(repo)
}

/// Fetch `refspecs` (plus all tags) from a named remote.
///
/// Returns `Change::NoChange` when no local ref moved.
pub fn fetch(
    repo: &Repository,
    remote_name: &str,
    refspecs: &[&str],
    credentials: Option<&Credentials>,
) -> Result<Change, GitError> {
    let mut remote = repo.find_remote(remote_name).map_err(|source| GitError::Remote {
        name: remote_name.to_string(),
        source,
    })?;

    fetch_remote(&mut remote, refspecs, credentials).map_err(|source| GitError::Fetch {
        remote: remote_name.to_string(),
        source,
    })
}

/// Push explicit refspecs to a named remote.
///
/// Returns `Change::NoChange` when every destination ref already matched.
/// A ref the remote refuses (protected branch, hook) fails the whole call.
pub fn push(
    repo: &Repository,
    remote_name: &str,
    refspecs: &[String],
    credentials: Option<&Credentials>,
) -> Result<Change, GitError> {
    if refspecs.is_empty() {
        return Ok(Change::NoChange);
    }

    let mut remote = repo.find_remote(remote_name).map_err(|source| GitError::Remote {
        name: remote_name.to_string(),
        source,
    })?;

    let status = RefCell::new(PushStatus::default());
    {
        let mut callbacks = remote_callbacks(credentials);
        callbacks.push_negotiation(|updates| {
            status
                .borrow_mut()
                .negotiated(updates.iter().filter(|u| u.src() != u.dst()).count());
            Ok(())
        });
        callbacks.push_update_reference(|refname, message| {
            status.borrow_mut().record(refname, message);
            Ok(())
        });

        let mut options = PushOptions::new();
        options.remote_callbacks(callbacks);

        remote
            .push(refspecs, Some(&mut options))
            .map_err(|source| GitError::Push {
                remote: remote_name.to_string(),
                source,
            })?;
    }

    status.into_inner().finish()
}

/// Ref updates reported by the push callbacks
#[derive(Debug, Default)]
struct PushStatus {
    changed: usize,
    /// First ref the remote refused, with its reason
    rejected: Option<(String, String)>,
}

impl PushStatus {
    fn negotiated(&mut self, changed: usize) {
        self.changed = changed;
    }

    fn record(&mut self, refname: &str, message: Option<&str>) {
        if let Some(message) = message {
            self.rejected
                .get_or_insert_with(|| (refname.to_string(), message.to_string()));
        }
    }

    fn finish(self) -> Result<Change, GitError> {
        match self.rejected {
            Some((refname, message)) => Err(GitError::Rejected { refname, message }),
            None => Ok(Change::from_count(self.changed)),
        }
    }
}

fn fetch_remote(
    remote: &mut Remote<'_>,
    refspecs: &[&str],
    credentials: Option<&Credentials>,
) -> Result<Change, git2::Error> {
    let updated = Cell::new(0usize);
    {
        let mut callbacks = remote_callbacks(credentials);
        callbacks.update_tips(|refname, old, new| {
            tracing::trace!("{}: {} -> {}", refname, old, new);
            updated.set(updated.get() + 1);
            true
        });

        let mut options = FetchOptions::new();
        options.remote_callbacks(callbacks);
        options.download_tags(AutotagOption::All);
        options.prune(FetchPrune::Off);

        remote.fetch(refspecs, Some(&mut options), Some("forgemirror: fetch"))?;
    }
    Ok(Change::from_count(updated.get()))
}
