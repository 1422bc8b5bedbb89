//! Codec trait and implementations for serializing/deserializing messages.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The transports don't care HOW a realtime frame or an API body is
//! encoded — they just hold something that implements [`Codec`].

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// - `Send + Sync + 'static` → the codec can live inside the spawned
///   reader task of a realtime channel.
/// - `decode<T: DeserializeOwned>` → the result owns its data, so the
///   frame buffer can be dropped straight after decoding.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Both the auth API and the realtime channel speak JSON, so this is the
/// codec every shipped transport uses. It sits behind the `json` feature
/// (on by default).
///
/// ## Example
///
/// ```rust
/// use chatline_protocol::{Codec, FrameHeader, JsonCodec, RosterFrame};
///
/// let codec = JsonCodec;
/// let raw = br#"{"event":"getOnlineUsers","data":["U1"]}"#;
///
/// let header: FrameHeader = codec.decode(raw).unwrap();
/// assert_eq!(header.event, "getOnlineUsers");
///
/// let roster: RosterFrame = codec.decode(raw).unwrap();
/// assert_eq!(roster.data.len(), 1);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{ApiResponse, Identity};

    #[test]
    fn test_json_codec_decode_malformed_returns_decode_error() {
        let result: Result<ApiResponse, _> = JsonCodec.decode(b"<html>502</html>");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_json_codec_encode_identity_uses_wire_names() {
        let mut identity = Identity::new("U1");
        identity.full_name = Some("Ada".into());

        let bytes = JsonCodec.encode(&identity).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.contains("\"_id\":\"U1\""));
        assert!(text.contains("\"fullName\":\"Ada\""));
    }
}
