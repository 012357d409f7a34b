//! Secure Debian package building with path isolation.
//!
//! `safedeb-core` turns a source tree laid out like a target filesystem into
//! a `.deb` whose payload lives below an isolated root (`/opt` by default).
//! Every entry is rewritten through the path mapper and checked by layered
//! validation; maintainer scripts are scored for risky shell constructs, and
//! links back to conventional locations are deferred to install time.
//!
//! # Examples
//!
//! ```no_run
//! use safedeb_core::{Builder, BuilderConfig, PackageMetadata};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metadata = PackageMetadata::new("hello", "1.0.0")
//!     .with_maintainer("Jane Doe <jane@example.com>");
//! let config = BuilderConfig::default();
//! let timeout = config.options.timeout();
//!
//! let report = Builder::new("./pkgroot", "./dist", metadata, config)?
//!     .build_with_timeout(timeout)?;
//! println!("Built {} ({} files)", report.output_path.display(), report.files_copied);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod build;
pub mod config;
pub mod error;
pub mod package;
pub mod security;
pub mod symlink;
pub mod types;

// Re-export main API types
pub use build::Archiver;
pub use build::BuildReport;
pub use build::Builder;
pub use build::CancellationToken;
pub use build::DpkgDeb;
pub use config::BuildOptions;
pub use config::BuilderConfig;
pub use config::MapperConfig;
pub use config::ScriptPolicy;
pub use config::SecurityLevel;
pub use config::SecurityPolicy;
pub use config::SymlinkFailurePolicy;
pub use error::BuildError;
pub use error::Result;
pub use package::MaintainerScript;
pub use package::PackageMetadata;
