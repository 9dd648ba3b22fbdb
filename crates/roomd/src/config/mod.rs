//! Configuration file parsing and structures.
//!
//! roomd reads one or more TOML files. Each may `imports = [...]` further
//! files; all of them are merged first-wins and validated together, so every
//! conflict and invalid value is reported in one pass.

// Private module - the public surface is re-exported below
#[allow(clippy::module_inception)]
mod config;
mod diagnostics;
mod partial;

pub use config::*;
pub use diagnostics::Diagnostic;
pub use diagnostics::LoadError;
pub use diagnostics::Warning;
pub use diagnostics::format_diagnostics;
