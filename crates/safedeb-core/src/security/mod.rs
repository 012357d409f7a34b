//! Path mapping and the validation layers applied to every staged entry.
//!
//! - [`PathMapper`] rewrites system paths below the secure root.
//! - [`PathValidator`] enforces the [`SecurityPolicy`](crate::SecurityPolicy)
//!   on single paths, symlink pairs and whole staging trees.
//! - [`ScriptValidator`] scores lifecycle scripts.

pub mod mapper;
pub mod rules;
pub mod script;
pub mod validator;

pub use mapper::PathMapper;
pub use mapper::Transformed;
pub use script::RiskAssessment;
pub use script::RiskBand;
pub use script::ScriptDetails;
pub use script::ScriptValidationResult;
pub use script::ScriptValidator;
pub use validator::PathValidator;
