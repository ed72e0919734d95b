//! Service layer - orchestration above the adapters
//!
//! The orchestrator composes adapters behind the DataSource port, the draft
//! cache sits in front of it for a session, and the status service reports
//! what a context is running on.

mod draft_cache;
pub mod migration;
mod orchestrator;
mod status;

pub use draft_cache::{CacheStats, DraftCache, WarmReport};
pub use migration::{MigrationResult, MigrationService};
pub use orchestrator::{BackendSummary, FallbackDataSource};
pub use status::{StatusService, StatusSummary};
