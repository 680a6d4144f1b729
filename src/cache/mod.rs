//! Local mirror cache
//!
//! Every source repository gets one bare mirror under the cache root, at a
//! path derived from a hash of its clone URL. The mirror is cloned on first
//! encounter and fetched on every later run; nothing here ever deletes a
//! mirror that was cloned successfully.

use std::path::{Path, PathBuf};

use git2::Repository;
use sha2::{Digest, Sha256};

use crate::error::{MirrorError, Result};
use crate::git::{self, GitError, MIRROR_FETCH_REFSPEC, ORIGIN};
use crate::types::{CacheRefresh, RepositoryRef};

/// Hex characters of the URL hash kept in the directory name
const PATH_HASH_LEN: usize = 16;

/// A bare repository on disk, keyed by source identity
pub struct LocalMirror {
    path: PathBuf,
    repo: Repository,
}

impl LocalMirror {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }
}

impl std::fmt::Debug for LocalMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalMirror").field("path", &self.path).finish()
    }
}

/// Directory tree holding one bare mirror per source repository
#[derive(Debug, Clone)]
pub struct MirrorCache {
    root: PathBuf,
}

impl MirrorCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<user cache dir>/forgemirror`, or the temp dir when there is none
    pub fn default_root() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("forgemirror")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic mirror path for a source clone URL
    pub fn path_for(&self, source_url: &str) -> PathBuf {
        let digest = format!("{:x}", Sha256::digest(source_url.as_bytes()));
        self.root.join(format!("{}.git", &digest[..PATH_HASH_LEN]))
    }

    /// Return an up-to-date mirror of `source`, cloning it if absent.
    ///
    /// Presence is decided by the path existing on disk. A clone that fails
    /// removes what it created, so the next run starts over.
    pub fn ensure(&self, source: &RepositoryRef) -> Result<(LocalMirror, CacheRefresh)> {
        let path = self.path_for(&source.url);
        let fetch_err = |source_err: GitError| MirrorError::Fetch {
            repo: source.name.clone(),
            source: source_err,
        };

        if path.exists() {
            tracing::debug!("{}: fetching into {}", source.name, path.display());
            let repo = git::open(&path).map_err(fetch_err)?;
            let change = git::fetch(&repo, ORIGIN, &[MIRROR_FETCH_REFSPEC], source.credentials.as_ref())
                .map_err(fetch_err)?;
            return Ok((LocalMirror { path, repo }, CacheRefresh::Fetched(change)));
        }

        create_private_dir(&self.root).map_err(|e| fetch_err(GitError::Io(e)))?;

        tracing::debug!("{}: cloning {} into {}", source.name, source.url, path.display());
        match git::clone_mirror(&source.url, &path, source.credentials.as_ref()) {
            Ok(repo) => Ok((LocalMirror { path, repo }, CacheRefresh::Cloned)),
            Err(e) => {
                if path.exists() {
                    if let Err(cleanup) = std::fs::remove_dir_all(&path) {
                        tracing::warn!(
                            "{}: could not remove partial clone {}: {}",
                            source.name,
                            path.display(),
                            cleanup
                        );
                    }
                }
                Err(fetch_err(e))
            }
        }
    }
}

/// Create a directory and its parents, owner-only on Unix
fn create_private_dir(path: &Path) -> std::io::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(path)
}
