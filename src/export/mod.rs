//! Artifact export module
//!
//! Persists the fitted feature plan and the selected model:
//! - JSON format (portable, human-readable)
//! - Binary format via bincode (compact)

mod store;

pub use store::{
    Artifact, ArtifactFormat, ArtifactKind, ArtifactMetadata, ArtifactStore,
    ARTIFACT_FORMAT_VERSION,
};
