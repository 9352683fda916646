//! Stackfile Run - dependency graph and scheduling of release operations
//!
//! - [`ReleaseGraph`] validates identities and `needs` of the selected
//!   releases and orders them
//! - [`ChartExecutor`] is the contract for the tool doing the actual work,
//!   with [`HelmExecutor`] and [`MockExecutor`] implementations
//! - [`Scheduler`] walks the graph with bounded concurrency, installing
//!   forward and deleting in reverse, and collects a [`RunReport`]

pub mod error;
pub mod executor;
pub mod graph;
pub mod helm;
pub mod mock;
pub mod report;
pub mod scheduler;

pub use error::{ExecError, GraphError, RunError};
pub use executor::{ChartExecutor, ExecFlags, ExecutorKey, ExecutorRegistry};
pub use graph::{ExecutionPlan, GraphOptions, NeedsPolicy, ReleaseGraph};
pub use helm::HelmExecutor;
pub use mock::{Call, MockExecutor, Operation};
pub use report::{ReleaseOutcome, ReleaseResult, RunOutcome, RunReport};
pub use scheduler::{Direction, RunMode, RunOptions, Scheduler};
