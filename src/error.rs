use thiserror::Error;

/// Non-2xx HTTP status or transport failure against the media metadata API.
/// Carries the status text the remote reported.
#[derive(Debug, Error)]
#[error("network error: {0}")]
pub struct NetworkError(pub String);

/// Document-store operation failure, typically wrapping a transport or
/// permission error from the remote service.
#[derive(Debug, Error)]
#[error("remote service error: {0}")]
pub struct RemoteServiceError(pub String);
