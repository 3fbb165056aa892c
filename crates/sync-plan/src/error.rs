use thiserror::Error;

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("direction not permitted: {0}")]
    DirectionNotPermitted(String),
    #[error("retry is only legal on a failed action")]
    InvalidRetry,
    #[error("no plan node at path {0}")]
    NodeNotFound(String),
    #[error(transparent)]
    Engine(#[from] sync_transfer::EngineError),
}

pub type ActionResult<T> = Result<T, ActionError>;
