//! In-memory forge for tests and dry runs
//!
//! Implements both provider ports over a shared state table. Every call is
//! recorded so tests can assert exactly which provider mutations a run
//! issued. Clone URLs are built from a configurable base, which lets tests
//! point pushes at bare repositories on disk.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{DestinationForge, ForgeError, ForgeResult, SourceForge};
use crate::types::{Change, DestinationProjectState, Forge, ProjectEdit, SourceRepo};

/// Callback run when a project is unarchived, before the call returns
pub type UnarchiveHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Record of a call made to the in-memory forge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForgeCall {
    ListRepositories { owner: String },
    GetProject { path: String },
    EditProject { id: u64, edit: ProjectEdit },
    ArchiveProject { id: u64 },
    UnarchiveProject { id: u64 },
}

impl ForgeCall {
    /// True for calls that change provider state
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            ForgeCall::EditProject { .. } | ForgeCall::ArchiveProject { .. } | ForgeCall::UnarchiveProject { .. }
        )
    }
}

#[derive(Default)]
struct State {
    sources: Vec<SourceRepo>,
    list_error: Option<String>,
    /// Keyed by `namespace/name`
    projects: BTreeMap<String, DestinationProjectState>,
    /// Project paths whose lookup fails with an API error
    failing_lookups: Vec<String>,
    calls: Vec<ForgeCall>,
    unarchive_hook: Option<UnarchiveHook>,
}

/// Forge backed by an in-process table
#[derive(Clone)]
pub struct InMemoryForge {
    forge: Forge,
    clone_base: String,
    state: Arc<Mutex<State>>,
}

impl InMemoryForge {
    /// `clone_base` is the prefix of every clone URL: `<clone_base>/<ns>/<name>.git`
    pub fn new(forge: Forge, clone_base: impl Into<String>) -> Self {
        Self {
            forge,
            clone_base: clone_base.into().trim_end_matches('/').to_string(),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Repositories returned by `list_repositories`
    pub fn with_sources(self, sources: Vec<SourceRepo>) -> Self {
        self.state().sources = sources;
        self
    }

    /// Make `list_repositories` fail
    pub fn with_list_error(self, message: impl Into<String>) -> Self {
        self.state().list_error = Some(message.into());
        self
    }

    pub fn with_project(self, namespace: &str, name: &str, project: DestinationProjectState) -> Self {
        self.state()
            .projects
            .insert(format!("{}/{}", namespace, name), project);
        self
    }

    /// Make `get_project` fail for one project
    pub fn with_failing_lookup(self, namespace: &str, name: &str) -> Self {
        self.state()
            .failing_lookups
            .push(format!("{}/{}", namespace, name));
        self
    }

    /// Run `hook` with the project path whenever a project gets unarchived
    pub fn with_unarchive_hook(self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.state().unarchive_hook = Some(Arc::new(hook));
        self
    }

    /// Current state of a project
    pub fn project(&self, namespace: &str, name: &str) -> Option<DestinationProjectState> {
        self.state()
            .projects
            .get(&format!("{}/{}", namespace, name))
            .cloned()
    }

    /// Get the call log for verification
    pub fn calls(&self) -> Vec<ForgeCall> {
        self.state().calls.clone()
    }

    /// Only the calls that changed provider state
    pub fn mutations(&self) -> Vec<ForgeCall> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.is_mutation())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    fn record(&self, call: ForgeCall) {
        self.state().calls.push(call);
    }

    fn update_project<F>(&self, id: u64, apply: F) -> ForgeResult<(String, Change)>
    where
        F: FnOnce(&mut DestinationProjectState) -> Change,
    {
        let mut state = self.state();
        let (path, project) = state
            .projects
            .iter_mut()
            .find(|(_, p)| p.id == id)
            .ok_or_else(|| ForgeError::RepoNotFound { name: id.to_string() })?;
        Ok((path.clone(), apply(project)))
    }
}

#[async_trait]
impl SourceForge for InMemoryForge {
    fn forge(&self) -> Forge {
        self.forge
    }

    async fn list_repositories(&self, owner: &str) -> ForgeResult<Vec<SourceRepo>> {
        self.record(ForgeCall::ListRepositories { owner: owner.to_string() });

        let state = self.state();
        if let Some(message) = &state.list_error {
            return Err(ForgeError::ApiError(message.clone()));
        }
        Ok(state.sources.clone())
    }
}

#[async_trait]
impl DestinationForge for InMemoryForge {
    fn forge(&self) -> Forge {
        self.forge
    }

    fn clone_url(&self, namespace: &str, name: &str) -> String {
        format!("{}/{}/{}.git", self.clone_base, namespace, name)
    }

    async fn get_project(&self, namespace: &str, name: &str) -> ForgeResult<DestinationProjectState> {
        let path = format!("{}/{}", namespace, name);
        self.record(ForgeCall::GetProject { path: path.clone() });

        let state = self.state();
        if state.failing_lookups.contains(&path) {
            return Err(ForgeError::ApiError(format!("lookup of {} failed", path)));
        }
        state
            .projects
            .get(&path)
            .cloned()
            .ok_or(ForgeError::RepoNotFound { name: path })
    }

    async fn edit_project(&self, id: u64, edit: &ProjectEdit) -> ForgeResult<Change> {
        self.record(ForgeCall::EditProject { id, edit: edit.clone() });

        let (_, change) = self.update_project(id, |project| {
            if project.description == edit.description && project.visibility == edit.visibility {
                return Change::NoChange;
            }
            project.description = edit.description.clone();
            project.visibility = edit.visibility;
            Change::Updated
        })?;
        Ok(change)
    }

    async fn archive_project(&self, id: u64) -> ForgeResult<Change> {
        self.record(ForgeCall::ArchiveProject { id });

        let (_, change) = self.update_project(id, |project| {
            if project.archived {
                return Change::NoChange;
            }
            project.archived = true;
            Change::Updated
        })?;
        Ok(change)
    }

    async fn unarchive_project(&self, id: u64) -> ForgeResult<Change> {
        self.record(ForgeCall::UnarchiveProject { id });

        let (path, change) = self.update_project(id, |project| {
            if !project.archived {
                return Change::NoChange;
            }
            project.archived = false;
            Change::Updated
        })?;

        let hook = self.state().unarchive_hook.clone();
        if let Some(hook) = hook {
            hook(&path);
        }
        Ok(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Visibility;

    fn forge() -> InMemoryForge {
        InMemoryForge::new(Forge::GitLab, "/srv/git/").with_project(
            "mirrors",
            "widget",
            DestinationProjectState::new(3).with_description("old"),
        )
    }

    #[tokio::test]
    async fn test_edit_and_archive_are_idempotent() {
        let forge = forge();
        let edit = ProjectEdit {
            description: "new".into(),
            visibility: Visibility::Public,
        };

        assert_eq!(forge.edit_project(3, &edit).await.unwrap(), Change::Updated);
        assert_eq!(forge.edit_project(3, &edit).await.unwrap(), Change::NoChange);
        assert_eq!(forge.archive_project(3).await.unwrap(), Change::Updated);
        assert_eq!(forge.archive_project(3).await.unwrap(), Change::NoChange);

        let project = forge.project("mirrors", "widget").unwrap();
        assert_eq!(project.description, "new");
        assert_eq!(project.visibility, Visibility::Public);
        assert!(project.archived);
        assert_eq!(forge.mutations().len(), 4);
    }

    #[tokio::test]
    async fn test_get_project_errors() {
        let forge = forge().with_failing_lookup("mirrors", "broken");

        assert!(matches!(
            forge.get_project("mirrors", "missing").await,
            Err(ForgeError::RepoNotFound { .. })
        ));
        assert!(matches!(
            forge.get_project("mirrors", "broken").await,
            Err(ForgeError::ApiError(_))
        ));
        assert!(forge.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_unarchive_runs_hook() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_hook = Arc::clone(&seen);
        let forge = forge().with_unarchive_hook(move |path| {
            seen_in_hook.lock().unwrap().push(path.to_string());
        });
        forge.archive_project(3).await.unwrap();

        assert_eq!(forge.unarchive_project(3).await.unwrap(), Change::Updated);
        assert_eq!(*seen.lock().unwrap(), vec!["mirrors/widget".to_string()]);
        assert!(!forge.project("mirrors", "widget").unwrap().archived);
    }

    #[test]
    fn test_clone_url_uses_base() {
        assert_eq!(forge().clone_url("mirrors", "widget"), "/srv/git/mirrors/widget.git");
    }

    #[tokio::test]
    async fn test_list_error() {
        let forge = InMemoryForge::new(Forge::GitHub, "/x").with_list_error("rate limited");
        assert!(forge.list_repositories("alice").await.is_err());
        assert_eq!(
            forge.calls(),
            vec![ForgeCall::ListRepositories { owner: "alice".into() }]
        );
    }
}
