//! Deferred symlink handling.
//!
//! Symlinks back from the isolated tree to conventional locations are never
//! created while packaging. The [`SymlinkProcessor`] queues them during the
//! walk, and the builder turns the queue into an install-time script with
//! [`render_symlink_script`]. [`SymlinkManager`] is the single-link primitive
//! used when links are created directly.

pub mod manager;
pub mod processor;
pub mod script;

pub use manager::SymlinkManager;
pub use processor::AUTO_DESCRIPTION;
pub use processor::SymlinkProcessor;
pub use processor::SymlinkRequest;
pub use script::merge_into_script;
pub use script::render_symlink_block;
pub use script::render_symlink_script;
pub use script::shell_quote;
