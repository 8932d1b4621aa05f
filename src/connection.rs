use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use uuid::Uuid;

use crate::codec::{CodecError, FrameCodec};
use crate::frame::Frame;

/// A client connection. Data read from the socket is buffered by the framed transport until a
/// whole frame can be parsed; replies are encoded straight into its write buffer.
pub struct Connection {
    pub id: Uuid,
    framed: Framed<TcpStream, FrameCodec>,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Connection {
        Self::with_codec(stream, FrameCodec::new())
    }

    pub fn with_codec(stream: TcpStream, codec: FrameCodec) -> Connection {
        Connection {
            id: Uuid::new_v4(),
            framed: Framed::new(stream, codec),
        }
    }

    /// Reads the next frame. `None` means the peer closed the connection between two frames.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, CodecError> {
        self.framed.next().await.transpose()
    }

    pub async fn write_frame(&mut self, frame: Frame) -> Result<(), CodecError> {
        self.framed.send(frame).await
    }
}
