//! The `PerceptionModel` trait — how an agent builds its view of a level.

use mls_core::{AgentId, Period};

use crate::environment::Environment;
use crate::state::{LocalState, PerceivedData};
use crate::store::PublicSnapshot;

/// Builds an agent's [`PerceivedData`] for one level tick.
///
/// Perception reads the consistent public snapshot (never the live store)
/// plus the agent's own private state and the level environment; it must not
/// mutate anything.  The scheduler may run perception for many agents in
/// parallel, so implementations are `Send + Sync` and are usually shared as
/// one `Arc` across a whole population.
pub trait PerceptionModel: Send + Sync {
    fn perceive(
        &self,
        period:   Period,
        agent:    AgentId,
        snapshot: &PublicSnapshot,
        private:  &dyn LocalState,
        env:      Option<&dyn Environment>,
    ) -> Box<dyn PerceivedData>;
}
