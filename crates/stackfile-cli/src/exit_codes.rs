//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// Success - operation completed without errors
pub const SUCCESS: u8 = 0;

/// General error - unspecified failure
pub const ERROR: u8 = 1;

/// Changes detected - only with `--detailed-exitcode`
pub const CHANGES: u8 = 2;

/// Release error - one or more releases failed or were skipped
pub const RELEASE_ERROR: u8 = 3;

/// State error - loading, selecting or validating the release graph failed
pub const STATE_ERROR: u8 = 4;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: u8 = 64;
