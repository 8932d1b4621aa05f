use bytes::{Buf, BytesMut};
use std::io::{self, Cursor};
use thiserror::Error as ThisError;
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::{self, Frame};

/// Default upper bound for a single buffered frame.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;

#[derive(Debug, ThisError)]
pub enum CodecError {
    #[error(transparent)]
    Frame(#[from] frame::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("frame size exceeds limit of {0} bytes")]
    FrameTooLarge(usize),
}

/// Turns a byte stream into [`Frame`]s and back. The same codec reads client sockets and the
/// append-only log, so both share one framing contract.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = CodecError;

    // An empty buffer at end of stream is a clean close. Leftover bytes are reported by the
    // default `decode_eof` as an error, which covers streams that end mid-frame.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Check if the frame size exceeds a certain limit to prevent DoS attacks
        if src.len() > self.max_frame_size {
            return Err(CodecError::FrameTooLarge(self.max_frame_size));
        }

        let mut cursor = Cursor::new(&src[..]);
        let frame = match Frame::parse(&mut cursor) {
            Ok(frame) => frame,
            Err(frame::Error::Incomplete) => return Ok(None), // Not enough data to parse a frame.
            Err(err) => return Err(err.into()),
        };

        // The cursor never moves past the end of `src`, so its position fits in a usize.
        let position = cursor.position() as usize;

        // Remove the parsed frame from the buffer.
        src.advance(position);

        Ok(Some(frame))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        frame.write_to(dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn decode_waits_for_complete_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"*2\r\n$3\r\nGET\r\n$3\r\nke"[..]);

        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 19);

        buf.extend_from_slice(b"y\r\n");
        let frame = codec.decode(&mut buf).unwrap();

        assert_eq!(
            frame,
            Some(Frame::Array(vec![
                Frame::Bulk(Bytes::from("GET")),
                Frame::Bulk(Bytes::from("key")),
            ]))
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_back_to_back_frames() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b":1\r\n+OK\r\n"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Frame::Integer(1)));
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Frame::Simple("OK".to_string()))
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn decode_eof_on_empty_buffer_is_clean() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn decode_eof_mid_frame_is_an_error() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"$5\r\nhel"[..]);

        assert!(codec.decode_eof(&mut buf).is_err());
    }

    #[test]
    fn decode_rejects_malformed_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"*x\r\n"[..]);

        assert!(matches!(
            codec.decode(&mut buf),
            Err(CodecError::Frame(frame::Error::InvalidLength(_)))
        ));
    }

    #[test]
    fn decode_rejects_oversized_buffer() {
        let mut codec = FrameCodec::with_max_frame_size(8);
        let mut buf = BytesMut::from(&b"$10\r\n0123456789\r\n"[..]);

        assert!(matches!(
            codec.decode(&mut buf),
            Err(CodecError::FrameTooLarge(8))
        ));
    }

    #[test]
    fn encode_writes_wire_bytes() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        codec
            .encode(Frame::Simple("PONG".to_string()), &mut buf)
            .unwrap();
        codec.encode(Frame::Null, &mut buf).unwrap();

        assert_eq!(&buf[..], b"+PONG\r\n$-1\r\n");
    }
}
