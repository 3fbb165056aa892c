use thiserror::Error;

#[derive(Error, Debug)]
pub enum FsError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("path {path} is not under root {root}")]
    OutsideRoot { path: String, root: String },
    #[error(transparent)]
    Engine(#[from] sync_transfer::EngineError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("snapshot encode error: {0}")]
    Encode(#[from] Box<bincode::ErrorKind>),
}

pub type FsResult<T> = Result<T, FsError>;
