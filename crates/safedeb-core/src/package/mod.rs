//! Package metadata, control file rendering and lifecycle script slots.

pub mod metadata;
pub mod scripts;

pub use metadata::PackageMetadata;
pub use metadata::default_architecture;
pub use metadata::installed_size_kb;
pub use scripts::MaintainerScript;
