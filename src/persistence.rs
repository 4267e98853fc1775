//! Persistence sink for the discovered targets.
mod error;
mod file;
mod models;
mod persister;

pub use error::{Error, Result};
pub use file::FileTargetGroupPersister;
pub use models::{ManagedContainer, TargetGroup};
pub use persister::TargetGroupPersister;
