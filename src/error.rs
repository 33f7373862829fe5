use thiserror::Error;

#[derive(Debug, Error)]
pub enum CosmogridError {
    #[error("unsupported shape: {0}")]
    UnsupportedShape(String),

    #[error("out of bounds: {0}")]
    OutOfBounds(String),

    #[error("too few ghost slabs: order {order} needs ({needed_left}, {needed_right}), grid has ({have_left}, {have_right})")]
    GhostTooThin {
        order: usize,
        needed_left: usize,
        needed_right: usize,
        have_left: usize,
        have_right: usize,
    },

    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("grid file has dimension {found}, expected {expected}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("numeric anomaly: {0}")]
    NumericAnomaly(String),
}

pub type Result<T> = std::result::Result<T, CosmogridError>;
