use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("invalid glob pattern {0}: {1}")]
    InvalidPattern(String, String),
}

pub type FilterResult<T> = Result<T, FilterError>;
