//! CLI command implementations
//!
//! Each submodule implements a specific CLI command.

pub mod check;
pub mod combinations;
pub mod run;
pub mod summary;
