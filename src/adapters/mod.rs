//! Forge adapters implementing the provider ports

pub mod forge_port;
pub mod github;
pub mod gitlab;
pub mod memory;

use std::sync::Arc;

pub use forge_port::{DestinationForge, ForgeError, ForgeResult, SourceForge};
pub use github::GitHubAdapter;
pub use gitlab::GitLabAdapter;
pub use memory::{ForgeCall, InMemoryForge};

use crate::types::Forge;

/// Build the source-side adapter for a provider.
/// `web_url` of `None` means the public hosted instance.
pub fn source_forge(forge: Forge, web_url: Option<&str>, token: Option<String>) -> ForgeResult<Box<dyn SourceForge>> {
    let web_url = web_url.unwrap_or(forge.default_web_url());
    Ok(match forge {
        Forge::GitHub => Box::new(GitHubAdapter::with_url(web_url, token)?),
        Forge::GitLab => Box::new(GitLabAdapter::with_url(web_url, token)?),
    })
}

/// Build the destination-side adapter for a provider
pub fn destination_forge(forge: Forge, web_url: Option<&str>, token: Option<String>) -> ForgeResult<Arc<dyn DestinationForge>> {
    let web_url = web_url.unwrap_or(forge.default_web_url());
    Ok(match forge {
        Forge::GitHub => Arc::new(GitHubAdapter::with_url(web_url, token)?),
        Forge::GitLab => Arc::new(GitLabAdapter::with_url(web_url, token)?),
    })
}
