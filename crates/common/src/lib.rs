pub mod error;
pub mod library;
pub mod rebuild;

pub use error::{Error, Result};
pub use library::{DatabaseInfo, IdentitySummary, PersonDetails, StatsResponse};
pub use rebuild::{RebuildJob, RebuildStatus, TriggerRebuildResponse, TriggerSource};
