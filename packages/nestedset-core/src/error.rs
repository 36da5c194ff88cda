use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown node id {0}")]
    InvalidId(u64),
    #[error("operation not allowed on the root node")]
    RootOperation,
    #[error("move would place a node inside its own subtree")]
    Cycle,
    #[error("child index {0} has no valid anchor")]
    IndexOutOfRange(isize),
    #[error("attribute update carries no fields")]
    EmptyAttributes,
    #[error("tree numbering has gaps; run close_gaps first")]
    NonContiguous,
    #[error("interval numbering would overflow")]
    CapacityExceeded,
    #[error("inconsistent row set: {0}")]
    Consistency(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Numeric error classes carried over from the classic nested-set API
    /// (1000 for root violations, 2000 for cycle violations).
    pub fn class(&self) -> Option<u32> {
        match self {
            Error::RootOperation => Some(1000),
            Error::Cycle => Some(2000),
            _ => None,
        }
    }
}
