pub mod error;
pub mod orchestrator;
pub mod state_machine;
pub mod types;

pub use error::{CoordinatorError, CoordinatorResult};
pub use orchestrator::UploadOrchestrator;
pub use state_machine::FileUploadStateMachine;
pub use types::{FileUploadState, UploadEvent};
