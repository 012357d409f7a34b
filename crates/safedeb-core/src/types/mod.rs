//! Path-level value types shared by the mapper, validator and builder.
//!
//! - [`clean_path`] performs purely lexical normalization (no I/O).
//! - [`DirectorySet`] answers directory membership with an explicit
//!   [`Membership`] mode, so "this directory" and "this directory or any
//!   descendant" are never confused.
//! - [`PathMapping`] is the deterministic, longest-prefix-wins rule table.

pub mod clean;
pub mod directory_set;
pub mod path_mapping;

pub use clean::clean_path;
pub use clean::has_parent_segment;
pub use directory_set::DirectorySet;
pub use directory_set::Membership;
pub use path_mapping::MappingRule;
pub use path_mapping::PathMapping;
