#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid operation")]
    InvalidOperation,
    #[error("Invalid door index: {0}")]
    InvalidDoorIndex(u32),
    #[error("Trial invariant violated: {0}")]
    InvariantViolated(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
