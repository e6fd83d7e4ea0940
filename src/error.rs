use {crate::shortener::EncodeError, std::time::Duration};

/// Failure talking to the range authority.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// Authority address could not be parsed.
    #[error("Invalid authority address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Connection could not be established.
    #[error("Failed to connect to range authority: {0}")]
    Connect(String),

    /// Call did not complete before its deadline.
    #[error("Range authority call timed out after {0:?}")]
    Timeout(Duration),

    /// Authority answered with a non-OK status.
    #[error("Range authority returned {code}: {message}")]
    Status { code: String, message: String },
}

impl From<tonic::Status> for TransportError {
    fn from(status: tonic::Status) -> Self {
        TransportError::Status {
            code: status.code().description().to_string(),
            message: status.message().to_string(),
        }
    }
}

/// The authority answered, but the answer is unusable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    /// Lease response carried no range.
    #[error("Lease response carried no range")]
    MissingRange,

    /// Range upper bound lies below its lower bound.
    #[error("Invalid range bounds [{start_id}, {end_id}]")]
    InvertedBounds { start_id: i64, end_id: i64 },

    /// Range starts below zero.
    #[error("Range starts at negative id {0}")]
    NegativeStart(i64),

    /// Range was leased to somebody else.
    #[error("Range {range_id} belongs to service {actual:?}, expected {expected:?}")]
    ForeignRange {
        range_id: String,
        expected: String,
        actual: String,
    },

    /// Status value outside of the known enumeration.
    #[error("Unknown status value {0}")]
    UnknownStatus(i32),
}

/// Error returned by every [`RangeClient`](crate::RangeClient) call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Lease width must be positive; rejected before anything is sent.
    #[error("Range size must be positive, got {0}")]
    NonPositiveSize(i64),

    /// Authority is reachable but not serving.
    #[error("Range authority is not serving: {0}")]
    NotServing(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Invalid or unreadable configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Service id must be non-empty.
    #[error("Empty service id")]
    EmptyServiceId,

    /// Requested lease width must be positive.
    #[error("Range size must be positive, got {0}")]
    NonPositiveRangeSize(i64),

    /// Authority address must be non-empty.
    #[error("Empty range authority address")]
    EmptyAddress,

    /// Configuration file could not be read or parsed.
    #[error("Failed to load configuration: {0}")]
    Load(String),
}

/// Error returned by [`RangeManager::next_id`](crate::RangeManager::next_id).
///
/// Whatever the variant, the manager is left in the state it was in before
/// the failed remote call, so the call can simply be retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AllocationError {
    /// Leasing a new range failed.
    #[error("Failed to allocate new range: {0}")]
    Lease(#[source] ClientError),

    /// Reporting an exhausted range failed.
    #[error("Failed to report range {range_id} as exhausted: {source}")]
    Report {
        range_id: String,
        #[source]
        source: ClientError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Issued id has no short-link encoding.
    #[error("Failed to encode id: {0}")]
    Encode(#[from] EncodeError),
}

impl AllocationError {
    /// Underlying client error, if the failure came from the authority.
    pub fn client_error(&self) -> Option<&ClientError> {
        match self {
            AllocationError::Lease(err) | AllocationError::Report { source: err, .. } => Some(err),
            AllocationError::Config(_) | AllocationError::Encode(_) => None,
        }
    }

    /// Whether the authority returned an unusable range.
    pub fn is_protocol(&self) -> bool {
        matches!(self.client_error(), Some(ClientError::Protocol(_)))
    }
}

pub type AllocationResult<T> = Result<T, AllocationError>;
