use thiserror::Error;

pub type BspResult<T> = Result<T, BspError>;

#[derive(Debug, Error)]
pub enum BspError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("compute failed at vertex {vertex_id}: {source}")]
    Compute {
        vertex_id: String,
        #[source]
        source: Box<BspError>,
    },

    /// Raised by user compute logic.
    #[error("{0}")]
    ComputeFailed(String),

    #[error("relay to {target_id} failed: {message}")]
    Relay { target_id: String, message: String },

    #[error("message queue is closed")]
    QueueClosed,

    #[error("superstep cancelled")]
    Cancelled,

    #[error("invalid message destination: {0}")]
    InvalidMessageDestination(String),

    #[error("unknown vertex: {0}")]
    UnknownVertex(String),

    #[error("unknown aggregator: {0}")]
    UnknownAggregator(String),

    #[error("aggregator {aggregator} expects {expected} values, got {found}")]
    AggregateTypeMismatch {
        aggregator: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("codec error: {0}")]
    Codec(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BspError {
    pub fn compute_failed(msg: impl Into<String>) -> Self {
        BspError::ComputeFailed(msg.into())
    }

    /// Errors that keep their identity when surfaced from a vertex compute call.
    pub fn is_engine_error(&self) -> bool {
        matches!(
            self,
            BspError::Relay { .. }
                | BspError::Cancelled
                | BspError::QueueClosed
                | BspError::InvalidMessageDestination(_)
        )
    }
}
