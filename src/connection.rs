use futures::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::debug;
use uuid::Uuid;

use crate::codec::FrameCodec;
use crate::frame::Frame;
use crate::Error;

/// A single TCP connection to the store speaking RESP.
pub struct Connection {
    pub id: Uuid,
    // Data read from the socket is buffered by the codec until a whole frame can be parsed.
    framed: Framed<TcpStream, FrameCodec>,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Connection {
        Connection {
            id: Uuid::new_v4(),
            framed: Framed::new(stream, FrameCodec::new()),
        }
    }

    pub async fn connect(host: &str, port: u16) -> Result<Connection, Error> {
        let stream = TcpStream::connect((host, port)).await?;
        Ok(Connection::new(stream))
    }

    /// Reads the next frame. `None` means the peer closed the connection cleanly.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, Error> {
        self.framed.next().await.transpose()
    }

    pub async fn write_frame(&mut self, frame: Frame) -> Result<(), Error> {
        self.framed.send(frame).await
    }

    /// Sends one request and waits for exactly one reply.
    pub async fn round_trip(&mut self, frame: Frame) -> Result<Frame, Error> {
        debug!(connection_id = %self.id, "sending {}", frame);
        self.write_frame(frame).await?;

        match self.read_frame().await? {
            Some(reply) => {
                debug!(connection_id = %self.id, "received {}", reply);
                Ok(reply)
            }
            None => Err("connection closed by server".into()),
        }
    }

    pub async fn shutdown(mut self) -> Result<(), Error> {
        self.framed.get_mut().shutdown().await?;
        Ok(())
    }
}
