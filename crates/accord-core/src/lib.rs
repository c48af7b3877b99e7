pub mod error;
pub mod hash;
pub mod ledger;
pub mod types;

pub use error::CoreError;
pub use types::{Action, ActionType, LoadStatus, Rfc, Target, TargetType};
