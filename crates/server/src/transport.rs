//! Line-based TCP front end.
//!
//! Every request line is published as a [`PacketReceived`] event and then
//! dispatched; the result goes back to the peer as a framed response:
//!
//! ```text
//! [u8 status][u32 BE length][payload]
//! ```
//!
//! `status` is [`STATUS_OK`] with the handler's bytes as payload, or
//! [`STATUS_ERROR`] with a UTF-8 error message.
use std::future::Future;
use std::net::SocketAddr;

use backbone::events::{NetworkFailure, PacketReceived, UntrustedClientDetected};
use backbone::{DispatchError, Dispatcher, EventBus};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

pub const STATUS_OK: u8 = 0;
pub const STATUS_ERROR: u8 = 1;

/// Length of the status byte plus the length prefix.
pub const FRAME_HEADER_LEN: usize = 5;

/// Builds the response frame for a dispatch result.
pub fn encode_response(result: &Result<Vec<u8>, DispatchError>) -> Vec<u8> {
    let (status, payload) = match result {
        Ok(bytes) => (STATUS_OK, bytes.clone()),
        Err(err) => (STATUS_ERROR, err.to_string().into_bytes()),
    };

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.push(status);
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    frame
}

/// Why a connection stopped being read.
#[derive(Debug, PartialEq, Eq)]
enum LineOutcome {
    Line(Vec<u8>),
    Closed,
    Untrusted { packet: Vec<u8>, reason: String },
}

/// Accepts connections and serves request lines.
///
/// Cheap to clone; each connection task holds its own clone.
#[derive(Clone)]
pub struct Transport {
    bus: EventBus,
    dispatcher: Dispatcher,
    max_line_len: usize,
}

impl Transport {
    pub fn new(bus: EventBus, dispatcher: Dispatcher, max_line_len: usize) -> Self {
        Self {
            bus,
            dispatcher,
            max_line_len: max_line_len.max(1),
        }
    }

    /// Runs the accept loop until `shutdown` resolves.
    ///
    /// Accept errors are published as [`NetworkFailure`] and do not stop the
    /// loop. Connections already accepted keep running on their own tasks.
    pub async fn serve(&self, listener: TcpListener, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Transport shutting down");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "Peer connected");
                        let transport = self.clone();
                        tokio::spawn(async move {
                            transport.handle_connection(stream, peer).await;
                        });
                    }
                    Err(err) => {
                        warn!(error = %err, "Failed to accept connection");
                        self.bus.post(NetworkFailure::from_io(None, &err));
                    }
                },
            }
        }
    }

    async fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        loop {
            let line = match self.read_line(&mut reader).await {
                Ok(LineOutcome::Line(line)) => line,
                Ok(LineOutcome::Closed) => break,
                Ok(LineOutcome::Untrusted { packet, reason }) => {
                    warn!(%peer, %reason, "Closing untrusted connection");
                    self.bus.post(UntrustedClientDetected {
                        source: peer,
                        packet,
                        reason,
                    });
                    break;
                }
                Err(err) => {
                    self.bus.post(NetworkFailure::from_io(Some(peer), &err));
                    break;
                }
            };

            self.bus.post(PacketReceived {
                packet: line.clone(),
                source: peer,
            });

            // ASCII was checked by `read_line`.
            let request = String::from_utf8_lossy(&line);
            let response = encode_response(&self.dispatcher.dispatch(&request));

            if let Err(err) = writer.write_all(&response).await {
                self.bus.post(NetworkFailure::from_io(Some(peer), &err));
                break;
            }
        }

        debug!(%peer, "Peer disconnected");
    }

    /// Reads one line, without its `\n` or `\r\n` terminator.
    async fn read_line<R>(&self, reader: &mut R) -> std::io::Result<LineOutcome>
    where
        R: tokio::io::AsyncBufRead + Unpin,
    {
        let mut buf = Vec::new();
        // One byte past the limit is enough to tell an over-long line apart.
        let limit = (self.max_line_len as u64).saturating_add(1);
        let read = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
        if read == 0 {
            return Ok(LineOutcome::Closed);
        }

        let terminated = buf.last() == Some(&b'\n');
        if terminated {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        } else if buf.len() > self.max_line_len {
            return Ok(LineOutcome::Untrusted {
                packet: buf,
                reason: format!("line exceeds {} bytes", self.max_line_len),
            });
        }

        if !buf.is_ascii() {
            return Ok(LineOutcome::Untrusted {
                packet: buf,
                reason: "packet contains non-ASCII bytes".to_string(),
            });
        }

        Ok(LineOutcome::Line(buf))
    }
}
