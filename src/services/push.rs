//! Push synchronizer
//!
//! Force-pushes every local branch and tag of a mirror to the destination
//! remote. Refspecs are expanded from the local refs, so refs that exist only
//! on the destination are never touched.

use git2::Repository;

use crate::git::{self, GitError};
use crate::types::{Change, Credentials};

/// Local refs that take part in a mirror push
const MIRRORED_REFS: [&str; 2] = ["refs/heads/*", "refs/tags/*"];

/// One `+ref:ref` refspec per local branch and tag
pub fn mirror_refspecs(repo: &Repository) -> Result<Vec<String>, GitError> {
    Ok(git::local_refs(repo, &MIRRORED_REFS)?
        .into_iter()
        .map(|name| format!("+{0}:{0}", name))
        .collect())
}

/// Push all branches and tags to `remote`
pub fn push_all(repo: &Repository, remote: &str, credentials: Option<&Credentials>) -> Result<Change, GitError> {
    let refspecs = mirror_refspecs(repo)?;
    tracing::trace!("pushing {} refs to {}", refspecs.len(), remote);
    git::push(repo, remote, &refspecs, credentials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::remote::ensure_remote;
    use git2::{Oid, Signature};
    use std::path::Path;
    use tempfile::TempDir;

    fn commit_on(repo: &Repository, branch: &str, content: &str) -> Oid {
        let sig = Signature::now("Test", "test@test.com").unwrap();
        let blob = repo.blob(content.as_bytes()).unwrap();
        let mut builder = repo.treebuilder(None).unwrap();
        builder.insert("README.md", blob, 0o100_644).unwrap();
        let tree = repo.find_tree(builder.write().unwrap()).unwrap();
        let refname = format!("refs/heads/{}", branch);
        let parent = repo
            .find_reference(&refname)
            .ok()
            .and_then(|r| r.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        repo.commit(Some(&refname), &sig, &sig, content, &tree, &parents)
            .unwrap()
    }

    fn target_of(repo: &Repository, refname: &str) -> Option<Oid> {
        repo.find_reference(refname).ok().and_then(|r| r.target())
    }

    struct Setup {
        _temp: TempDir,
        mirror: Repository,
        dest: Repository,
    }

    fn setup() -> Setup {
        let temp = TempDir::new().unwrap();
        let mirror = Repository::init_bare(temp.path().join("mirror.git")).unwrap();
        let dest_path = temp.path().join("dest.git");
        let dest = Repository::init_bare(&dest_path).unwrap();
        ensure_remote(&mirror, "dest", path_str(&dest_path)).unwrap();
        Setup { _temp: temp, mirror, dest }
    }

    fn path_str(path: &Path) -> &str {
        path.to_str().unwrap()
    }

    #[test]
    fn test_mirror_refspecs_cover_branches_and_tags() {
        let s = setup();
        let main = commit_on(&s.mirror, "main", "one");
        s.mirror
            .tag_lightweight("v1.0", &s.mirror.find_object(main, None).unwrap(), false)
            .unwrap();

        assert_eq!(
            mirror_refspecs(&s.mirror).unwrap(),
            vec!["+refs/heads/main:refs/heads/main", "+refs/tags/v1.0:refs/tags/v1.0"]
        );
    }

    #[test]
    fn test_push_then_up_to_date() {
        let s = setup();
        let main = commit_on(&s.mirror, "main", "one");

        assert_eq!(push_all(&s.mirror, "dest", None).unwrap(), Change::Updated);
        assert_eq!(target_of(&s.dest, "refs/heads/main"), Some(main));

        assert_eq!(push_all(&s.mirror, "dest", None).unwrap(), Change::NoChange);
    }

    #[test]
    fn test_tags_are_pushed() {
        let s = setup();
        let main = commit_on(&s.mirror, "main", "one");
        s.mirror
            .tag_lightweight("v1.0", &s.mirror.find_object(main, None).unwrap(), false)
            .unwrap();

        push_all(&s.mirror, "dest", None).unwrap();
        assert_eq!(target_of(&s.dest, "refs/tags/v1.0"), Some(main));
    }

    #[test]
    fn test_destination_only_refs_survive() {
        let s = setup();
        commit_on(&s.mirror, "main", "one");
        let extra = commit_on(&s.dest, "dest-only", "kept");

        push_all(&s.mirror, "dest", None).unwrap();

        assert_eq!(target_of(&s.dest, "refs/heads/dest-only"), Some(extra));
        assert!(target_of(&s.dest, "refs/heads/main").is_some());
    }

    #[test]
    fn test_non_fast_forward_is_forced() {
        let s = setup();
        commit_on(&s.dest, "main", "divergent");
        let main = commit_on(&s.mirror, "main", "upstream");

        assert_eq!(push_all(&s.mirror, "dest", None).unwrap(), Change::Updated);
        assert_eq!(target_of(&s.dest, "refs/heads/main"), Some(main));
    }

    #[test]
    fn test_missing_destination_fails() {
        let temp = TempDir::new().unwrap();
        let mirror = Repository::init_bare(temp.path().join("mirror.git")).unwrap();
        commit_on(&mirror, "main", "one");
        ensure_remote(&mirror, "dest", path_str(&temp.path().join("absent.git"))).unwrap();

        assert!(push_all(&mirror, "dest", None).is_err());
    }
}
