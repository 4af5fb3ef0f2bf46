use thiserror::Error;

/// Failures the client mirror can hit: transport-level (the signaling
/// socket) and protocol-level (a frame the server itself reported as an
/// error,). Distinct from `sfunet_domain::DomainError`, which is a
/// server-side result type — the client never constructs one of those.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("signaling connection failed: {0}")]
    Connect(String),
    #[error("signaling connection closed")]
    Disconnected,
    #[error("server rejected the request: {0} ({1})")]
    Server(u32, String),
    #[error("malformed frame: {0}")]
    Protocol(String),
}

pub type ClientResult<T> = Result<T, ClientError>;
