mod removal;
mod stats;

use thiserror::Error;

use crate::backend::{BackendError, RecordId};
use crate::browser::AutomationError;

pub use removal::{ListingRemover, RemovalStop, RemovalSummary};
pub use stats::{StatsRefresher, StatsSummary};

#[derive(Debug, Error)]
pub enum AccountTaskError {
    #[error(transparent)]
    Automation(#[from] AutomationError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("account {0} has no marketplace user id")]
    MissingUserId(RecordId),
}

pub type AccountTaskResult<T> = Result<T, AccountTaskError>;
