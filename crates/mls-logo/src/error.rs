use mls_core::PheromoneId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogoError {
    #[error("pheromone {0} is not registered")]
    UnknownPheromone(PheromoneId),

    #[error("a pheromone named {0:?} is already registered")]
    DuplicatePheromone(String),

    #[error("grid dimensions must be positive, got {width}×{height}")]
    EmptyGrid { width: usize, height: usize },
}

pub type LogoResult<T> = Result<T, LogoError>;
