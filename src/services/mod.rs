//! Reconcilers and the orchestrator that chains them

pub mod metadata;
pub mod mirror;
pub mod push;
pub mod remote;

pub use metadata::{DescriptionMatch, MetadataPlan, MetadataPolicy, DEFAULT_STALE_FORK_DAYS};
pub use mirror::{GitMirror, MirrorService};
pub use push::{mirror_refspecs, push_all};
pub use remote::ensure_remote;
