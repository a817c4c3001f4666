//! Composition of decision sub-models.
//!
//! A decision model is a tree: leaves are instantiation-specific sub-models
//! (type parameter `L`, dispatched directly), inner nodes combine children,
//! and `Custom` is the one virtual seam for user extensions.

use mls_core::{AgentId, Period};

use crate::decision::{DecisionSubmodel, InfluenceBuffer, Outcome};
use crate::state::{LocalState, PerceivedData};

/// A decision sub-model tree.
///
/// - **Conjunction** runs every child and ORs their outcomes — used to
///   combine orthogonal concerns (acceleration *and* lane keeping).
/// - **Subsumption** runs children in priority order and stops at the first
///   `Handled` — used when a safety reflex overrides nominal behavior.
pub enum Dms<L> {
    Leaf(L),
    Conjunction(Vec<Dms<L>>),
    Subsumption(Vec<Dms<L>>),
    Custom(Box<dyn DecisionSubmodel>),
}

impl<L: DecisionSubmodel> DecisionSubmodel for Dms<L> {
    fn manage(
        &self,
        period:    Period,
        agent:     AgentId,
        public:    &dyn LocalState,
        private:   &dyn LocalState,
        perceived: &dyn PerceivedData,
        out:       &mut InfluenceBuffer,
    ) -> Outcome {
        match self {
            Dms::Leaf(leaf) => leaf.manage(period, agent, public, private, perceived, out),

            Dms::Conjunction(children) => {
                let mut outcome = Outcome::Passed;
                for child in children {
                    if child.manage(period, agent, public, private, perceived, out)
                        == Outcome::Handled
                    {
                        outcome = Outcome::Handled;
                    }
                }
                outcome
            }

            Dms::Subsumption(children) => {
                for child in children {
                    if child.manage(period, agent, public, private, perceived, out)
                        == Outcome::Handled
                    {
                        return Outcome::Handled;
                    }
                }
                Outcome::Passed
            }

            Dms::Custom(submodel) => {
                submodel.manage(period, agent, public, private, perceived, out)
            }
        }
    }
}
