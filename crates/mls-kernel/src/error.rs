use mls_core::{AgentId, LevelId};
use thiserror::Error;

/// Structural kernel failures.  These propagate to the caller of
/// [`Scheduler::step`][crate::Scheduler::step]; agent-local problems
/// (orphan influence targets, topology clamps) are probe events instead.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("level {0} is not registered")]
    UnknownLevel(LevelId),

    #[error("no level named {0:?} is registered")]
    UnknownLevelName(String),

    #[error("a level named {0:?} is already registered")]
    DuplicateLevel(String),

    #[error("agent {0} is not present in level {1}")]
    NotInLevel(AgentId, LevelId),

    #[error("invalid transition of agent {agent} from {from} to {to}: {reason}")]
    InvalidTransition {
        agent:  AgentId,
        from:   LevelId,
        to:     LevelId,
        reason: &'static str,
    },

    #[error("kernel configuration error: {0}")]
    Config(String),
}

pub type KernelResult<T> = Result<T, KernelError>;
