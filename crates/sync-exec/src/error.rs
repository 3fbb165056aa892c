use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("plan tree has no node at path {0}")]
    MissingNode(String),
    #[error(transparent)]
    Action(#[from] sync_plan::ActionError),
    #[error(transparent)]
    Fs(#[from] sync_fs::FsError),
    #[error(transparent)]
    Engine(#[from] sync_transfer::EngineError),
}

pub type ExecResult<T> = Result<T, ExecError>;
