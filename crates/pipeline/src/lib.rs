pub mod adapters;
pub mod bootstrap;
pub mod coordinator;

pub use bootstrap::PipelineContext;
pub use coordinator::{BatchCoordinator, BatchReport, RecordOutcome};
