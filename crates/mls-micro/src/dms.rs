//! Vehicle decision sub-models.
//!
//! The default vehicle decision is a conjunction of two orthogonal leaves:
//! lane keeping/changing (MOBIL) and longitudinal control (IDM).  Leaves
//! are variants of [`VehicleSubmodel`] so the tree dispatches directly.

use mls_core::{AgentId, Period};
use mls_kernel::{
    DecisionSubmodel, Dms, DmsDecision, InfluenceBuffer, LaneChange, LocalState, Outcome, Payload,
    PerceivedData,
};
use mls_road::Side;

use crate::perception::VehiclePerceivedMicro;
use crate::state::{VehiclePrivateMicro, VehiclePublicMicro};

/// Longitudinal control: IDM acceleration toward the desired speed,
/// capped so the vehicle does not accelerate at or above the speed limit.
pub struct ForwardAccelerationDms;

impl ForwardAccelerationDms {
    fn manage(
        &self,
        agent:     AgentId,
        public:    &VehiclePublicMicro,
        private:   &VehiclePrivateMicro,
        perceived: &VehiclePerceivedMicro,
        out:       &mut InfluenceBuffer,
    ) -> Outcome {
        let cf = &private.driver.car_following;
        let leader = perceived.leader.map(|l| (l.gap, public.speed - l.speed));
        let mut accel = cf.acceleration(public.speed, leader);

        if public.speed >= perceived.speed_limit && accel > 0.0 {
            accel = 0.0;
        }

        out.emit(Payload::ChangeAcceleration { target: agent, da: accel });
        Outcome::Handled
    }
}

/// Lateral control: MOBIL evaluation of the two adjacent lanes.
pub struct LaneChangeDms;

impl LaneChangeDms {
    fn manage(
        &self,
        agent:     AgentId,
        public:    &VehiclePublicMicro,
        private:   &VehiclePrivateMicro,
        perceived: &VehiclePerceivedMicro,
        out:       &mut InfluenceBuffer,
    ) -> Outcome {
        if perceived.left.is_none() && perceived.right.is_none() {
            return Outcome::Passed;
        }

        let decision = private.driver.mobil.decide(
            &private.driver.car_following,
            public.speed,
            public.length,
            perceived.leader,
            perceived.follower,
            perceived.left.as_ref(),
            perceived.right.as_ref(),
        );

        if let Some(side) = decision {
            let direction = match side {
                Side::Left  => LaneChange::Left,
                Side::Right => LaneChange::Right,
            };
            out.emit(Payload::ChangeLane { target: agent, direction });
        }
        Outcome::Handled
    }
}

/// The built-in vehicle DMS leaves.
pub enum VehicleSubmodel {
    ForwardAcceleration(ForwardAccelerationDms),
    LaneChange(LaneChangeDms),
}

impl DecisionSubmodel for VehicleSubmodel {
    fn manage(
        &self,
        _period:   Period,
        agent:     AgentId,
        public:    &dyn LocalState,
        private:   &dyn LocalState,
        perceived: &dyn PerceivedData,
        out:       &mut InfluenceBuffer,
    ) -> Outcome {
        // A vehicle submodel only understands vehicle states; anything else
        // is not its situation.
        let (Some(public), Some(private), Some(perceived)) = (
            public.downcast_ref::<VehiclePublicMicro>(),
            private.downcast_ref::<VehiclePrivateMicro>(),
            perceived.downcast_ref::<VehiclePerceivedMicro>(),
        ) else {
            return Outcome::Passed;
        };

        match self {
            VehicleSubmodel::ForwardAcceleration(dms) => {
                dms.manage(agent, public, private, perceived, out)
            }
            VehicleSubmodel::LaneChange(dms) => {
                dms.manage(agent, public, private, perceived, out)
            }
        }
    }
}

/// The default vehicle decision tree: lane change and car following run as
/// orthogonal concerns every tick.
pub fn default_vehicle_decision() -> DmsDecision<Dms<VehicleSubmodel>> {
    DmsDecision(Dms::Conjunction(vec![
        Dms::Leaf(VehicleSubmodel::LaneChange(LaneChangeDms)),
        Dms::Leaf(VehicleSubmodel::ForwardAcceleration(ForwardAccelerationDms)),
    ]))
}
