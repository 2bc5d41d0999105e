use bspgraph_common::error::{BspError, BspResult};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use futures::{SinkExt, StreamExt};

#[derive(Debug, Serialize, Deserialize)]
pub enum RelayRequest {
    Deliver {
        target_id: String,
        message_type: String,
        payload: Vec<u8>,
    },
    Ping,
}

#[derive(Debug, Serialize, Deserialize)]
pub enum RelayResponse {
    Delivered,
    Pong,
    Error { message: String },
}

pub type RelayFramed = Framed<TcpStream, LengthDelimitedCodec>;

pub fn framed(stream: TcpStream) -> RelayFramed {
    Framed::new(stream, LengthDelimitedCodec::new())
}

pub fn encode<T: Serialize>(value: &T) -> BspResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| BspError::Codec(format!("bincode encode: {e}")))
}

pub fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> BspResult<T> {
    bincode::deserialize(bytes).map_err(|e| BspError::Codec(format!("bincode decode: {e}")))
}

pub async fn send_msg<T: Serialize>(framed: &mut RelayFramed, msg: &T) -> BspResult<()> {
    let bytes = encode(msg)?;
    framed.send(Bytes::from(bytes)).await?;
    Ok(())
}

/// `None` once the peer has closed the connection.
pub async fn try_recv_msg<T: for<'de> Deserialize<'de>>(
    framed: &mut RelayFramed,
) -> BspResult<Option<T>> {
    match framed.next().await {
        None => Ok(None),
        Some(frame) => Ok(Some(decode(&frame?)?)),
    }
}

pub async fn recv_msg<T: for<'de> Deserialize<'de>>(framed: &mut RelayFramed) -> BspResult<T> {
    try_recv_msg(framed)
        .await?
        .ok_or_else(|| BspError::Internal("connection closed".to_string()))
}
