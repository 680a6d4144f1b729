//! Forgemirror - keep forge repositories mirrored into another forge
//!
//! Forgemirror lists the repositories of a source account (GitHub or GitLab),
//! keeps a bare local mirror of each, force-pushes every branch and tag to a
//! matching destination project, and reconciles the destination's
//! description, visibility, and archive state.

pub mod adapters;
pub mod cache;
pub mod config;
pub mod error;
pub mod git;
pub mod services;
pub mod types;

// Re-exports for convenience
pub use adapters::{DestinationForge, ForgeError, InMemoryForge, SourceForge};
pub use cache::{LocalMirror, MirrorCache};
pub use config::MirrorConfig;
pub use error::{MirrorError, Result};
pub use services::{MetadataPolicy, MirrorService};
pub use types::*;
