use thiserror::Error;
use tonic::Status;

/// Application-level error type for the aggregator.
#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Transport(#[from] tonic::transport::Error),

    #[error("reflection build error: {0}")]
    Reflection(#[from] tonic_reflection::server::Error),

    #[error(transparent)]
    GrpcStatus(#[from] Status),

    #[error("attestor {endpoint} connection failed: {source}")]
    AttestorConnection {
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },

    #[error("malformed attestation from {endpoint}: {reason}")]
    InvalidAttestation { endpoint: String, reason: String },

    #[error("quorum not reached: required {required}, tally {tally:?}")]
    QuorumNotReached {
        required: usize,
        /// Partial tally of (height, agreeing attestors) for observability
        tally: Vec<(u64, usize)>,
    },

    #[error("insufficient endpoints: {responsive} can still answer, quorum is {required}")]
    InsufficientEndpoints { responsive: usize, required: usize },

    #[error("aggregation timed out after {0}ms")]
    Timeout(u64),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<AggregatorError> for Status {
    fn from(err: AggregatorError) -> Self {
        match err {
            AggregatorError::Config(msg) => Self::invalid_argument(msg),

            AggregatorError::Transport(e) => Self::unavailable(e.to_string()),

            AggregatorError::AttestorConnection { endpoint, source } => {
                Self::unavailable(format!("failed to connect to {endpoint}: {source}"))
            }

            AggregatorError::GrpcStatus(status) => status,

            AggregatorError::InvalidAttestation { endpoint, reason } => {
                Self::invalid_argument(format!("malformed attestation from {endpoint}: {reason}"))
            }

            AggregatorError::Timeout(ms) => {
                Self::deadline_exceeded(format!("aggregation timed out after {ms}ms"))
            }

            AggregatorError::QuorumNotReached { required, tally } => Self::failed_precondition(
                format!("quorum not reached: required {required}, tally {tally:?}"),
            ),

            AggregatorError::InsufficientEndpoints {
                responsive,
                required,
            } => Self::failed_precondition(format!(
                "insufficient endpoints: {responsive} can still answer, quorum is {required}"
            )),

            AggregatorError::Reflection(e) => Self::internal(e.to_string()),

            AggregatorError::Internal(msg) => Self::internal(msg),
        }
    }
}

/// Result type alias for aggregator operations
pub type Result<T> = std::result::Result<T, AggregatorError>;
