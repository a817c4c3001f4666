use mls_core::{LaneId, RoadId, VehicleId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoadError {
    #[error("road {0} does not exist")]
    UnknownRoad(RoadId),

    #[error("lane {0} does not exist")]
    UnknownLane(LaneId),

    #[error("vehicle {0} does not exist")]
    UnknownVehicle(VehicleId),
}

pub type RoadResult<T> = Result<T, RoadError>;
