//! whatsdeployed core library
//!
//! Resolves which revision each environment is running and attributes the
//! people behind every deployed revision.

pub mod config;
pub mod culprits;
pub mod error;
pub mod fakes;
pub mod forge;
pub mod metrics;
pub mod obs;
pub mod participants;
pub mod resolver;
pub mod revision;
pub mod shortlink;
pub mod tags;
pub mod telemetry;

pub use config::ForgeConfig;
pub use culprits::{attribute, CulpritGroup, DeployedRevision};
pub use error::{DeployError, Result};
pub use forge::{
    CallPolicy, CommitResource, Forge, ForgeTag, ForgeUser, GitHubClient, IssueComment,
    MarkerResponse, MarkerSource, PullRequest, RepoRef,
};
pub use participants::{Participant, Role, Sightings};
pub use resolver::{
    cache_busted_url, resolve, resolve_deployments, EnvironmentSpec, Resolution,
    ResolvedDeployment,
};
pub use revision::extract_revision;
pub use shortlink::{
    parse_setup_url, MemoryShortlinkStore, Setup, Shortlink, ShortlinkError, ShortlinkStore,
};
pub use tags::{index_tags, TagIndex};

/// Crate version reported by `/health` and `--version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
