pub mod error;
pub mod identifier;
pub mod loader;
pub mod orchestrator;
pub mod poller;

pub use error::WorkflowError;
pub use identifier::IdentifierSource;
pub use loader::{LoadError, LogOnlyLoader, SchemaLoader};
pub use orchestrator::{Orchestrator, ReviewInput, RfcSummary};
pub use poller::{resolve_mergeability, PollConfig};
