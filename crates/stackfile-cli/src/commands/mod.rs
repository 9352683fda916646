//! CLI commands

pub mod build;
pub mod list;
pub mod plan;
pub mod run;
