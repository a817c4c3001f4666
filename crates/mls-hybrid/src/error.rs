use mls_core::LaneId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HybridError {
    #[error("lane {0} is not registered with the hybridizer")]
    UnknownLane(LaneId),

    #[error("lane {0} is already registered")]
    AlreadyRegistered(LaneId),

    #[error("lane {0} is inconsistent: {1}")]
    Inconsistent(LaneId, &'static str),

    #[error(transparent)]
    Road(#[from] mls_road::RoadError),
}

pub type HybridResult<T> = Result<T, HybridError>;
