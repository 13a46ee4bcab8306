//! API endpoint modules.

mod artifacts;
mod tasks;

pub use artifacts::ArtifactsApi;
pub use tasks::TasksApi;
