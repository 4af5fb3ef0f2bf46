use serde::{Deserialize, Serialize};

/// The error taxonomy every component in the control plane maps its
/// failures into . Kinds, not type names — a handful of HTTP/WS
/// surfaces translate these into status codes or wire error codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    InvalidRequest,
    Unauthorized,
    NotFound,
    RoomFull,
    CallAlreadyExists,
    InvalidCallState,
    PermissionDenied,
    MediaError,
    Timeout,
    CircuitOpen,
    StateStoreError,
    Unknown,
}

impl ErrorKind {
    /// Three error-code ranges per: 100-199 general, 200-299 room,
    /// 300-399 participant, 400-499 track, 500-599 transport.
    pub fn code(&self) -> u32 {
        match self {
            ErrorKind::InvalidRequest => 100,
            ErrorKind::Unauthorized => 101,
            ErrorKind::Unknown => 199,
            ErrorKind::RoomFull => 201,
            ErrorKind::CallAlreadyExists => 202,
            ErrorKind::InvalidCallState => 203,
            ErrorKind::NotFound => 300,
            ErrorKind::PermissionDenied => 301,
            ErrorKind::MediaError => 500,
            ErrorKind::Timeout => 501,
            ErrorKind::CircuitOpen => 502,
            ErrorKind::StateStoreError => 503,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::InvalidRequest => "invalidRequest",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::NotFound => "notFound",
            ErrorKind::RoomFull => "roomFull",
            ErrorKind::CallAlreadyExists => "callAlreadyExists",
            ErrorKind::InvalidCallState => "invalidCallState",
            ErrorKind::PermissionDenied => "permissionDenied",
            ErrorKind::MediaError => "mediaError",
            ErrorKind::Timeout => "timeout",
            ErrorKind::CircuitOpen => "circuitOpen",
            ErrorKind::StateStoreError => "stateStoreError",
            ErrorKind::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// A domain-level failure: a kind plus a human-readable reason, the unit
/// carried by the `{ok:false, reason}` result pattern in.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct DomainError {
    pub kind: ErrorKind,
    pub message: String,
}

impl DomainError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, message)
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

/// The `{ok: true, value} | {ok: false, reason}` result pattern mandated by
/// for every RoomManager/CallManager mutation. Distinct from
/// `DomainResult` so application services can serialize outcomes directly
/// without collapsing into the `Result` wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "ok")]
pub enum OpOutcome<T> {
    #[serde(rename = "true")]
    Ok { value: T },
    #[serde(rename = "false")]
    Err { reason: ErrorKind, message: String },
}

impl<T> OpOutcome<T> {
    pub fn ok(value: T) -> Self {
        OpOutcome::Ok { value }
    }

    pub fn err(reason: ErrorKind, message: impl Into<String>) -> Self {
        OpOutcome::Err {
            reason,
            message: message.into(),
        }
    }

    pub fn from_domain(result: DomainResult<T>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(e) => Self::err(e.kind, e.message),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, OpOutcome::Ok { .. })
    }

    pub fn into_result(self) -> DomainResult<T> {
        match self {
            OpOutcome::Ok { value } => Ok(value),
            OpOutcome::Err { reason, message } => Err(DomainError::new(reason, message)),
        }
    }
}
