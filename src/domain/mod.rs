//! Domain logic - pure business rules independent of repository access

pub mod branch;
pub mod components;
pub mod tag;
pub mod version;

pub use branch::AutoDeployBranch;
pub use components::{ComponentVersionMap, ManifestComponent, VersionFile};
pub use tag::Tag;
pub use version::{Edition, Version, VersionHistory};
