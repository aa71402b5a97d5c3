//! Text codecs for events
//!
//! WebSocket transports carry one event per text frame and use
//! [`encode_event`] / [`decode_event`] directly. Stream transports use
//! [`EventCodec`], which frames one JSON event per line.

use std::marker::PhantomData;

use bytes::{BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;

/// Maximum size of a single encoded event (64 KiB)
pub const MAX_EVENT_SIZE: usize = 64 * 1024;

/// Encode an event as a JSON text frame
pub fn encode_event<T: Serialize>(event: &T) -> Result<String, ProtocolError> {
    let text = serde_json::to_string(event)?;
    if text.len() > MAX_EVENT_SIZE {
        return Err(ProtocolError::EventTooLarge {
            size: text.len(),
            max: MAX_EVENT_SIZE,
        });
    }
    Ok(text)
}

/// Decode an event from a JSON text frame
pub fn decode_event<T: DeserializeOwned>(text: &str) -> Result<T, ProtocolError> {
    if text.len() > MAX_EVENT_SIZE {
        return Err(ProtocolError::EventTooLarge {
            size: text.len(),
            max: MAX_EVENT_SIZE,
        });
    }
    Ok(serde_json::from_str(text)?)
}

/// Newline-delimited JSON codec.
///
/// `In` is the event type read from the peer, `Out` the type written to it.
/// Malformed lines are skipped with a warning so a single bad event does not
/// tear down the stream; only an oversize line is fatal.
#[derive(Debug)]
pub struct EventCodec<In, Out> {
    /// How far into the buffer we've already searched for a newline
    next_index: usize,
    _marker: PhantomData<fn(Out) -> In>,
}

impl<In, Out> EventCodec<In, Out> {
    /// Create a new codec
    pub fn new() -> Self {
        Self {
            next_index: 0,
            _marker: PhantomData,
        }
    }
}

impl<In, Out> Default for EventCodec<In, Out> {
    fn default() -> Self {
        Self::new()
    }
}

impl<In: DeserializeOwned, Out> Decoder for EventCodec<In, Out> {
    type Item = In;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                if src.len() > MAX_EVENT_SIZE {
                    return Err(ProtocolError::EventTooLarge {
                        size: src.len(),
                        max: MAX_EVENT_SIZE,
                    });
                }
                // Need more data
                self.next_index = src.len();
                return Ok(None);
            };

            let line_end = self.next_index + offset;
            self.next_index = 0;
            let line = src.split_to(line_end + 1);

            if line_end > MAX_EVENT_SIZE {
                return Err(ProtocolError::EventTooLarge {
                    size: line_end,
                    max: MAX_EVENT_SIZE,
                });
            }

            let text = String::from_utf8_lossy(&line[..line_end]);
            let text = text.trim();
            if text.is_empty() {
                continue;
            }

            match serde_json::from_str(text) {
                Ok(event) => return Ok(Some(event)),
                Err(e) => {
                    tracing::warn!("Dropping malformed event line: {}", e);
                }
            }
        }
    }
}

impl<In, Out: Serialize> Encoder<Out> for EventCodec<In, Out> {
    type Error = ProtocolError;

    fn encode(&mut self, event: Out, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let text = encode_event(&event)?;
        dst.reserve(text.len() + 1);
        dst.put_slice(text.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ClientEvent, CreatePollPayload, ServerEvent};

    type ServerSide = EventCodec<ClientEvent, ServerEvent>;

    #[test]
    fn test_codec_decodes_line() {
        let mut codec = ServerSide::new();
        let mut buf = BytesMut::from(&b"{\"event\":\"close_poll\"}\n"[..]);

        let decoded = codec.decode(&mut buf).unwrap();
        assert_eq!(decoded, Some(ClientEvent::ClosePoll));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_codec_partial_read() {
        let mut codec = ServerSide::new();
        let mut buf = BytesMut::from(&b"{\"event\":\"clo"[..]);

        // Should return None (need more data)
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"se_poll\"}\r\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(ClientEvent::ClosePoll));
    }

    #[test]
    fn test_codec_skips_malformed_and_blank_lines() {
        let mut codec = ServerSide::new();
        let mut buf = BytesMut::from(
            &b"not json\n\n{\"event\":\"create_poll\",\"data\":{\"question\":\"Q?\",\"options\":[\"a\",\"b\"]}}\n"[..],
        );

        let decoded = codec.decode(&mut buf).unwrap();
        assert_eq!(
            decoded,
            Some(ClientEvent::CreatePoll(CreatePollPayload {
                question: "Q?".to_string(),
                options: vec!["a".to_string(), "b".to_string()],
            }))
        );
    }

    #[test]
    fn test_codec_rejects_oversize_line() {
        let mut codec = ServerSide::new();
        let mut buf = BytesMut::from(vec![b'x'; MAX_EVENT_SIZE + 1].as_slice());

        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::EventTooLarge { .. })
        ));
    }

    #[test]
    fn test_codec_encodes_with_newline() {
        let mut codec = ServerSide::new();
        let mut buf = BytesMut::new();
        codec.encode(ServerEvent::PollEnded, &mut buf).unwrap();

        assert_eq!(&buf[..], b"{\"event\":\"poll_ended\"}\n");
    }

    #[test]
    fn test_decode_event_reports_malformed() {
        let result = decode_event::<ClientEvent>("{\"event\":\"identify\"}");
        assert!(matches!(result, Err(ProtocolError::Malformed(_))));
    }
}
