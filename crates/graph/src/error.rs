use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Invalid graph configuration: {0}")]
    InvalidConfig(String),

    #[error("Too many slugs for a u32 id space: {0}")]
    TooManySlugs(usize),

    #[error("Too many keywords for a u32 id space: {0}")]
    TooManyKeywords(usize),
}
