//! `mls-micro` — the microscopic (per-vehicle) traffic instantiation.
//!
//! Vehicles are kernel agents on the `"microscopic"` level.  Their
//! perception scans the public snapshot for same-lane and adjacent-lane
//! neighbors, their decision tree combines IDM car-following with MOBIL
//! lane changing, and the micro reactor turns the resulting influences into
//! lane moves and kinematics.
//!
//! # Crate layout
//!
//! | Module         | Contents                                             |
//! |----------------|------------------------------------------------------|
//! | [`idm`]        | `IdmParams`, `CarFollowing` (IDM and IDM+)           |
//! | [`mobil`]      | `MobilParams`, lane-change evaluation                |
//! | [`state`]      | Vehicle public/private states, `DriverProfile`       |
//! | [`perception`] | `MicroPerception`, `VehiclePerceivedMicro`,          |
//! |                | `RoadEnvironment`                                    |
//! | [`dms`]        | `VehicleSubmodel` DMS leaves and the default tree    |
//! | [`reaction`]   | `MicroReactor`                                       |

pub mod dms;
pub mod idm;
pub mod mobil;
pub mod perception;
pub mod reaction;
pub mod state;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use dms::{default_vehicle_decision, ForwardAccelerationDms, LaneChangeDms, VehicleSubmodel};
pub use idm::{CarFollowing, IdmParams};
pub use mobil::{LaneView, MobilParams, NeighborInfo};
pub use perception::{MicroPerception, RoadEnvironment, VehiclePerceivedMicro};
pub use reaction::MicroReactor;
pub use state::{DriverProfile, VehiclePrivateMicro, VehiclePublicMicro};

/// Conventional name of the microscopic level.
pub const MICRO_LEVEL: &str = "microscopic";
