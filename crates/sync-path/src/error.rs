use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PathError {
    #[error("path is not absolute: {0}")]
    NotAbsolute(String),
    #[error("path {path} lies outside root {root}")]
    OutsideRoot { path: String, root: String },
}

pub type PathResult<T> = Result<T, PathError>;
