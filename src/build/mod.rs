//! Charm build: configuration, orchestration and artifact discovery

pub mod artifact;
pub mod configuration;
pub mod orchestrator;
pub mod pipeline;

pub use artifact::{ArtifactResolver, ResolvedArtifact};
pub use configuration::{expand_home, BuildConfiguration, Verbosity};
pub use orchestrator::{BuildStage, Builder, SharedCache};
pub use pipeline::CachePlan;
