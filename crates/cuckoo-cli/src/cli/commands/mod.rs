//! Command implementations.

pub mod analyze;
pub mod score;

use crate::config::Config;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged configuration
    pub config: Config,
}
