use chatline_protocol::ProtocolError;

/// Errors that can occur in the transport layer.
///
/// Every variant means the round trip itself failed. A backend that
/// answers "invalid password" is NOT a transport error; that arrives as a
/// normal [`ApiResponse`](chatline_protocol::ApiResponse) with
/// `success: false`.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// A URL could not be built from the configured base.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// The HTTP request could not be sent or its body could not be read.
    #[error("request failed: {0}")]
    Request(String),

    /// The server answered with an error status and a body that isn't an
    /// API response (a proxy error page, for instance).
    #[error("request failed with status code {status}")]
    Status { status: u16 },

    /// The server answered with a success status but the body couldn't be
    /// decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(#[source] ProtocolError),

    /// Opening the realtime connection failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The realtime handshake did not finish in time.
    #[error("connect timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),
}
