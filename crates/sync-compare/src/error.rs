use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompareError {
    #[error(transparent)]
    Fs(#[from] sync_fs::FsError),
    #[error(transparent)]
    Action(#[from] sync_plan::ActionError),
}

pub type CompareResult<T> = Result<T, CompareError>;
