//! TCP network adapter.
//!
//! Maintains one long-lived connection per direction and peer:
//!
//! - the outbound connection to a peer carries this replica's frames and is
//!   re-dialed by the engine (via `Action::Connect`) after a failure
//! - the inbound connection from a peer is accepted by the listener and
//!   read until it drops
//!
//! Frames are length-prefixed (`u32` big-endian) followed by the codec's
//! versioned record bytes. The first frame on every outbound connection is
//! an identity frame naming the sender's listen address, so inbound frames
//! can be attributed to a member `Host` rather than an ephemeral port.
//! Undecodable frames surface as `Event::MessageFailed` and are discarded.

use borsh::BorshDeserialize;
use palisade_core::Event;
use palisade_messages::{decode_message, encode_message, WireMessage};
use palisade_types::Host;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

/// Upper bound on a single frame; anything larger is a protocol violation.
const MAX_FRAME_BYTES: usize = 10 * 1024 * 1024;

/// Transport errors surfaced at bind time. Steady-state connection failures
/// become connection events, not errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The listener could not be bound.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

struct Shared {
    /// Writer channels of the open outbound connections.
    outbound: Mutex<HashMap<Host, mpsc::UnboundedSender<Vec<u8>>>>,
}

/// Authenticated point-to-point channel to every peer.
pub struct TcpAdapter {
    local: Host,
    shared: Arc<Shared>,
    event_tx: mpsc::Sender<Event>,
}

impl TcpAdapter {
    /// Binds the listener on `local` and starts accepting inbound
    /// connections. Inbound traffic and connection events are delivered on
    /// `event_tx`.
    pub async fn bind(local: Host, event_tx: mpsc::Sender<Event>) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(local.socket_addr()).await?;
        info!(%local, "transport listening");

        let adapter = Self {
            local,
            shared: Arc::new(Shared {
                outbound: Mutex::new(HashMap::new()),
            }),
            event_tx: event_tx.clone(),
        };

        tokio::spawn(accept_loop(listener, event_tx));
        Ok(adapter)
    }

    /// This replica's listen address.
    pub fn local(&self) -> Host {
        self.local
    }

    /// Opens the outbound connection to `host` unless one is already up.
    /// The outcome arrives as `OutboundUp` or `OutboundFailed`.
    pub fn dial(&self, host: Host) {
        if host == self.local {
            return;
        }
        let shared = self.shared.clone();
        let event_tx = self.event_tx.clone();
        let local = self.local;

        tokio::spawn(async move {
            if shared.outbound.lock().await.contains_key(&host) {
                debug!(%host, "already connected, skipping dial");
                return;
            }

            let stream = match TcpStream::connect(host.socket_addr()).await {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(%host, %err, "outbound connection failed");
                    let _ = event_tx.send(Event::OutboundFailed { host }).await;
                    return;
                }
            };
            let _ = stream.set_nodelay(true);
            let mut stream = BufStream::new(stream);

            // Identity frame: tell the peer which member is calling.
            let identity = borsh::to_vec(&local).expect("host serializes to memory");
            if write_frame(&mut stream, &identity).await.is_err() {
                let _ = event_tx.send(Event::OutboundFailed { host }).await;
                return;
            }

            let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<Vec<u8>>();
            shared.outbound.lock().await.insert(host, frame_tx);
            let _ = event_tx.send(Event::OutboundUp { host }).await;

            while let Some(frame) = frame_rx.recv().await {
                if write_frame(&mut stream, &frame).await.is_err() {
                    break;
                }
            }

            shared.outbound.lock().await.remove(&host);
            let _ = event_tx.send(Event::OutboundDown { host }).await;
        });
    }

    /// Sends a message on the open connection to `to`. Without an open
    /// connection the message is dropped; there is no retry.
    pub async fn send(&self, to: Host, message: &WireMessage) {
        let frame = encode_message(message);
        let outbound = self.shared.outbound.lock().await;
        match outbound.get(&to) {
            Some(frame_tx) => {
                if frame_tx.send(frame).is_err() {
                    warn!(%to, "outbound writer gone, dropping message");
                }
            }
            None => {
                warn!(%to, kind = message.type_name(), "no open connection, dropping message");
            }
        }
    }
}

async fn accept_loop(listener: TcpListener, event_tx: mpsc::Sender<Event>) {
    loop {
        match listener.accept().await {
            Ok((stream, remote)) => {
                let _ = stream.set_nodelay(true);
                debug!(%remote, "accepted inbound connection");
                tokio::spawn(inbound_task(stream, event_tx.clone()));
            }
            Err(err) => {
                warn!(%err, "accept failed");
            }
        }
    }
}

async fn inbound_task(stream: TcpStream, event_tx: mpsc::Sender<Event>) {
    let mut stream = BufStream::new(stream);

    let peer = match read_frame(&mut stream).await {
        Ok(frame) => match Host::try_from_slice(&frame) {
            Ok(peer) => peer,
            Err(err) => {
                warn!(%err, "malformed identity frame, closing connection");
                return;
            }
        },
        Err(err) => {
            warn!(%err, "inbound connection closed before identity frame");
            return;
        }
    };

    let _ = event_tx.send(Event::InboundUp { host: peer }).await;

    loop {
        let frame = match read_frame(&mut stream).await {
            Ok(frame) => frame,
            Err(_) => break,
        };
        match decode_message(&frame) {
            Ok(message) => {
                let event = message_event(peer, message);
                if event_tx.send(event).await.is_err() {
                    return;
                }
            }
            Err(err) => {
                warn!(%peer, %err, "dropping undecodable frame");
                let _ = event_tx.send(Event::MessageFailed { from: peer }).await;
            }
        }
    }

    let _ = event_tx.send(Event::InboundDown { host: peer }).await;
}

fn message_event(from: Host, message: WireMessage) -> Event {
    match message {
        WireMessage::PrePrepare(message) => Event::PrePrepareReceived { from, message },
        WireMessage::Prepare(message) => Event::PrepareReceived { from, message },
        WireMessage::Commit(message) => Event::CommitReceived { from, message },
    }
}

async fn read_frame<S: AsyncRead + Unpin>(stream: &mut S) -> std::io::Result<Vec<u8>> {
    let len = stream.read_u32().await? as usize;
    if len > MAX_FRAME_BYTES {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "oversized frame",
        ));
    }
    let mut frame = vec![0u8; len];
    stream.read_exact(&mut frame).await?;
    Ok(frame)
}

async fn write_frame<S: AsyncWrite + Unpin>(stream: &mut S, frame: &[u8]) -> std::io::Result<()> {
    stream.write_u32(frame.len() as u32).await?;
    stream.write_all(frame).await?;
    stream.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use palisade_messages::PrepareMessage;
    use palisade_types::{Hash, SecretKey, SeqN, SlotKey};
    use std::net::Ipv4Addr;

    async fn bound_adapter(port: u16) -> (TcpAdapter, mpsc::Receiver<Event>) {
        let (event_tx, event_rx) = mpsc::channel(64);
        let local = Host::new(Ipv4Addr::LOCALHOST, port);
        let adapter = TcpAdapter::bind(local, event_tx).await.unwrap();
        (adapter, event_rx)
    }

    fn prepare_message() -> WireMessage {
        let secret = SecretKey::from_seed(&[1u8; 32]);
        let node: Host = "127.0.0.1:5000".parse().unwrap();
        WireMessage::Prepare(PrepareMessage::signed(
            SlotKey::new(Hash::digest(b"op"), SeqN::new(1, node), 1),
            "replica-0".into(),
            &secret,
        ))
    }

    #[tokio::test]
    async fn frames_flow_between_two_adapters() {
        let (a, mut a_events) = bound_adapter(16101).await;
        let (b, mut b_events) = bound_adapter(16102).await;

        a.dial(b.local());
        // a sees the connection come up, b sees the identity frame.
        let up = a_events.recv().await.unwrap();
        assert!(matches!(up, Event::OutboundUp { host } if host == b.local()));
        let inbound = b_events.recv().await.unwrap();
        assert!(matches!(inbound, Event::InboundUp { host } if host == a.local()));

        let message = prepare_message();
        a.send(b.local(), &message).await;

        let received = b_events.recv().await.unwrap();
        match received {
            Event::PrepareReceived { from, message: m } => {
                assert_eq!(from, a.local());
                assert_eq!(WireMessage::Prepare(m), message);
            }
            other => panic!("unexpected event {}", other.type_name()),
        }
    }

    #[tokio::test]
    async fn dialing_a_dead_peer_reports_failure() {
        let (a, mut a_events) = bound_adapter(16103).await;
        let dead = Host::new(Ipv4Addr::LOCALHOST, 16199);

        a.dial(dead);
        let event = tokio::time::timeout(std::time::Duration::from_secs(5), a_events.recv())
            .await
            .expect("timeout")
            .expect("channel closed");
        assert!(matches!(event, Event::OutboundFailed { host } if host == dead));
    }

    #[tokio::test]
    async fn sending_without_a_connection_drops_the_message() {
        let (a, mut a_events) = bound_adapter(16104).await;
        let absent = Host::new(Ipv4Addr::LOCALHOST, 16198);

        a.send(absent, &prepare_message()).await;

        // Nothing arrives: no connection was opened and no event is emitted.
        let result =
            tokio::time::timeout(std::time::Duration::from_millis(100), a_events.recv()).await;
        assert!(result.is_err());
    }
}
