use thiserror::Error;

#[derive(Error, Debug)]
pub enum KgwError {
    #[error(
        "Insufficient history: {required} headers required, \
         {available} available"
    )]
    InsufficientHistory { required: u64, available: u64 },
    #[error(
        "Window tip is at height {found}, expected {expected}"
    )]
    HeightMismatch { expected: u64, found: u64 },
    #[error(
        "Non-contiguous headers: expected height {expected}, \
         got {found}"
    )]
    NonContiguousHeaders { expected: u64, found: u64 },
    #[error(
        "Window capacity {capacity} is below the required \
         {required} headers"
    )]
    WindowCapacity { capacity: usize, required: usize },
    #[error("Header window is empty")]
    EmptyWindow,
    #[error("Hash rate must be greater than zero")]
    ZeroHashRate,
    #[error("Time to block does not fit into 64 bits")]
    BlockTimeOverflow,
    #[error("Timestamp out of range")]
    TimestampOverflow,
    #[error("Target too large for compact encoding")]
    CompactOverflow,
    #[error("Invalid network parameters: {0}")]
    InvalidParameters(String),
    #[error("Invalid header snapshot: {0}")]
    InvalidSnapshot(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, KgwError>;
