use crate::distributed::protocol::{
    decode, encode, framed, recv_msg, send_msg, try_recv_msg, RelayFramed, RelayRequest,
    RelayResponse,
};
use crate::partition::Partitioner;
use crate::queue::MessageSink;
use bspgraph_api::message::Message;
use bspgraph_api::relay::Relayer;
use bspgraph_common::error::{BspError, BspResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

const CONNECT_ATTEMPTS: u32 = 20;

/// Forwards messages to the partition that owns the target vertex over
/// length-delimited TCP frames, one connection per peer.
///
/// `relay` blocks the calling worker thread until the peer acknowledges the
/// delivery, so it must not be called from inside the runtime whose handle
/// it was built with.
pub struct TcpRelayer<M> {
    partitioner: Arc<dyn Partitioner>,
    local_partition: usize,
    peers: Vec<SocketAddr>,
    connections: Vec<Mutex<Option<RelayFramed>>>,
    runtime: Handle,
    _message: PhantomData<fn(M)>,
}

impl<M> TcpRelayer<M> {
    /// `peers[i]` is the relay address of partition `i`.
    pub fn new(
        partitioner: Arc<dyn Partitioner>,
        local_partition: usize,
        peers: Vec<SocketAddr>,
        runtime: Handle,
    ) -> BspResult<Self> {
        if peers.len() != partitioner.partition_count() {
            return Err(BspError::InvalidArgument(format!(
                "{} relay peers for {} partitions",
                peers.len(),
                partitioner.partition_count()
            )));
        }
        let connections = peers.iter().map(|_| Mutex::new(None)).collect();
        Ok(Self {
            partitioner,
            local_partition,
            peers,
            connections,
            runtime,
            _message: PhantomData,
        })
    }

    /// Pings every remote peer, retrying while they come up.
    pub fn wait_for_peers(&self) -> BspResult<()> {
        for partition in 0..self.peers.len() {
            if partition == self.local_partition {
                continue;
            }
            self.runtime
                .block_on(self.exchange(partition, &RelayRequest::Ping))?;
        }
        Ok(())
    }

    async fn exchange(&self, partition: usize, request: &RelayRequest) -> BspResult<()> {
        let mut slot = self.connections[partition].lock().await;
        if slot.is_none() {
            *slot = Some(connect(self.peers[partition]).await?);
        }
        let result = match slot.as_mut() {
            Some(conn) => round_trip(conn, request).await,
            None => Err(BspError::Internal("relay connection missing".to_string())),
        };
        if result.is_err() {
            // Reconnect on the next request rather than reuse a broken stream.
            *slot = None;
        }
        result
    }
}

impl<M> Relayer<M> for TcpRelayer<M>
where
    M: Message + Serialize,
{
    fn relay(&self, target_id: &str, message: M) -> BspResult<()> {
        let partition = self.partitioner.partition_of(target_id);
        if partition >= self.peers.len() {
            return Err(BspError::InvalidMessageDestination(target_id.to_string()));
        }
        let request = RelayRequest::Deliver {
            target_id: target_id.to_string(),
            message_type: message.type_name().to_string(),
            payload: encode(&message)?,
        };
        metrics::counter!("bspgraph_relay_requests_total").increment(1);
        self.runtime
            .block_on(self.exchange(partition, &request))
            .map_err(|e| {
                tracing::warn!(target_id, partition, error = %e, "relay failed");
                match e {
                    relay @ BspError::Relay { .. } => relay,
                    other => BspError::Relay {
                        target_id: target_id.to_string(),
                        message: other.to_string(),
                    },
                }
            })
    }
}

async fn connect(addr: SocketAddr) -> BspResult<RelayFramed> {
    let mut attempt = 0;
    loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(framed(stream));
            }
            Err(e) if attempt + 1 >= CONNECT_ATTEMPTS => return Err(e.into()),
            Err(_) => {
                attempt += 1;
                sleep(Duration::from_millis(25 * u64::from(attempt))).await;
            }
        }
    }
}

async fn round_trip(conn: &mut RelayFramed, request: &RelayRequest) -> BspResult<()> {
    send_msg(conn, request).await?;
    match recv_msg::<RelayResponse>(conn).await? {
        RelayResponse::Delivered | RelayResponse::Pong => Ok(()),
        RelayResponse::Error { message } => {
            let target_id = match request {
                RelayRequest::Deliver { target_id, .. } => target_id.clone(),
                RelayRequest::Ping => String::new(),
            };
            Err(BspError::Relay { target_id, message })
        }
    }
}

/// Accepts relay connections and hands every delivered message to `sink`
/// until `shutdown` fires.
pub async fn serve_relay<M>(
    listener: TcpListener,
    sink: MessageSink<M>,
    shutdown: CancellationToken,
) -> BspResult<()>
where
    M: Message + DeserializeOwned,
{
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                stream.set_nodelay(true)?;
                let sink = sink.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, sink, shutdown).await {
                        tracing::warn!(%peer, error = %e, "relay connection failed");
                    }
                });
            }
        }
    }
}

async fn handle_connection<M>(
    stream: TcpStream,
    sink: MessageSink<M>,
    shutdown: CancellationToken,
) -> BspResult<()>
where
    M: Message + DeserializeOwned,
{
    let mut conn = framed(stream);
    loop {
        let request: RelayRequest = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            next = try_recv_msg(&mut conn) => match next? {
                Some(request) => request,
                None => return Ok(()),
            },
        };
        let response = match request {
            RelayRequest::Ping => RelayResponse::Pong,
            RelayRequest::Deliver {
                target_id,
                message_type,
                payload,
            } => match decode::<M>(&payload).and_then(|msg| sink.deliver(&target_id, msg)) {
                Ok(()) => RelayResponse::Delivered,
                Err(e) => {
                    tracing::warn!(%target_id, %message_type, error = %e, "relayed message rejected");
                    RelayResponse::Error {
                        message: e.to_string(),
                    }
                }
            },
        };
        send_msg(&mut conn, &response).await?;
    }
}
