//! Codec trait and implementations for serializing/deserializing frames.
//!
//! The dispatcher never touches `serde_json` directly: it holds something
//! that implements [`Codec`], so the frame format can change without the
//! connection handling code noticing.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Converts values to bytes and back.
///
/// `Send + Sync + 'static` because a single codec instance is shared by
/// every connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value cannot be represented
    /// in this format.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match the expected shape.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that speaks JSON, which is what browser clients send.
///
/// ```rust
/// use tunequeue_protocol::{
///     ClientRequest, Codec, Envelope, JsonCodec, Payload, SessionCode,
/// };
///
/// let codec = JsonCodec;
/// let envelope = Envelope {
///     seq: 1,
///     timestamp: 0,
///     payload: Payload::Request(ClientRequest::JoinSession(
///         SessionCode::from("AB12"),
///     )),
/// };
///
/// let bytes = codec.encode(&envelope).unwrap();
/// let decoded: Envelope = codec.decode(&bytes).unwrap();
/// assert_eq!(envelope, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Envelope, Payload, SystemMessage};

    #[test]
    fn test_json_codec_decode_garbage_returns_decode_error() {
        let result: Result<Envelope, _> = JsonCodec.decode(b"not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_json_codec_accepts_text_frame_bytes() {
        // Browsers send text frames; the transport hands us their UTF-8 bytes.
        let raw = br#"{"seq":3,"timestamp":0,"payload":{"type":"System","data":{"type":"Heartbeat","client_time":9}}}"#;
        let env: Envelope = JsonCodec.decode(raw).unwrap();
        assert_eq!(env.seq, 3);
        assert_eq!(
            env.payload,
            Payload::System(SystemMessage::Heartbeat { client_time: 9 })
        );
    }
}
