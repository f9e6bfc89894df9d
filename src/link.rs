//! Peer transports. Every connection, the operator console included, is
//! driven through the same capability set: send a line, receive a line, poll
//! for a ready frame, close. The variants are picked at construction time.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::constants::POLL_INTERVAL_MS;
use crate::protocol::{decode_frame, FRAME_DELIMITER, LEAVE_FRAME};

/// Shared record of everything a scripted peer was sent.
pub type Transcript = Arc<Mutex<Vec<String>>>;

/// One peer connection.
///
/// `send` is best effort: a broken connection swallows the line instead of
/// propagating an error. `receive` blocks until a full frame arrives and
/// yields the disconnect sentinel once the peer is gone. `poll` answers
/// "is a frame queued" within one poll interval without consuming it.
pub enum PeerLink {
    Remote(RemoteLink),
    Console(ConsoleLink),
    Scripted(ScriptedLink),
}

impl PeerLink {
    /// Wrap an accepted socket. Byte pumping runs on two I/O tasks; the game
    /// loop only ever touches the channel ends.
    pub fn remote(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(pump_inbound(read_half, inbound_tx)).abort_handle();
        tokio::spawn(pump_outbound(write_half, outbound_rx));
        Self::Remote(RemoteLink {
            outbound: Some(outbound_tx),
            inbound: inbound_rx,
            peeked: None,
            reader,
        })
    }

    /// The operator's shell. Same surface as a remote peer, minus the socket
    /// escape handling; `Q` and end-of-input read as the disconnect sentinel.
    pub fn console() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(line).is_err() {
                    return;
                }
            }
        });
        Self::Console(ConsoleLink {
            inbound: rx,
            peeked: None,
        })
    }

    pub fn send(&mut self, line: &str) {
        match self {
            Self::Remote(link) => {
                if let Some(outbound) = &link.outbound {
                    let _ = outbound.send(line.to_string());
                }
            }
            Self::Console(_) => println!("{line}"),
            Self::Scripted(link) => {
                if !link.closed {
                    if let Ok(mut sent) = link.sent.lock() {
                        sent.push(line.to_string());
                    }
                }
            }
        }
    }

    /// Block until one full frame is available. A vanished peer, an exhausted
    /// script or a closed channel all read as the disconnect sentinel.
    pub async fn receive(&mut self) -> String {
        match self {
            Self::Remote(link) => match link.peeked.take() {
                Some(frame) => frame,
                None => link
                    .inbound
                    .recv()
                    .await
                    .unwrap_or_else(|| LEAVE_FRAME.to_string()),
            },
            Self::Console(link) => {
                let line = match link.peeked.take() {
                    Some(line) => line,
                    None => link
                        .inbound
                        .recv()
                        .await
                        .unwrap_or_else(|| LEAVE_FRAME.to_string()),
                };
                map_console_line(line)
            }
            Self::Scripted(link) => link
                .queue
                .pop_front()
                .unwrap_or_else(|| LEAVE_FRAME.to_string()),
        }
    }

    /// Non-blocking readiness check. `is_turn` is advisory: the live
    /// transports ignore it, the scripted one uses it (unless eager) so that
    /// canned inputs are only offered on the peer's own turn.
    pub async fn poll(&mut self, is_turn: bool) -> bool {
        match self {
            Self::Remote(link) => {
                if link.peeked.is_some() {
                    return true;
                }
                match timeout(Duration::from_millis(POLL_INTERVAL_MS), link.inbound.recv()).await {
                    Ok(Some(frame)) => {
                        link.peeked = Some(frame);
                        true
                    }
                    Ok(None) => {
                        link.peeked = Some(LEAVE_FRAME.to_string());
                        true
                    }
                    Err(_) => false,
                }
            }
            Self::Console(link) => {
                if link.peeked.is_some() {
                    return true;
                }
                match link.inbound.try_recv() {
                    Ok(line) => {
                        link.peeked = Some(line);
                        true
                    }
                    Err(_) => false,
                }
            }
            Self::Scripted(link) => !link.closed && !link.queue.is_empty() && (link.eager || is_turn),
        }
    }

    /// Release the underlying connection. Idempotent.
    pub fn close(&mut self) {
        match self {
            Self::Remote(link) => {
                link.outbound = None;
                link.reader.abort();
                link.inbound.close();
            }
            Self::Console(_) => {}
            Self::Scripted(link) => link.closed = true,
        }
    }
}

pub struct RemoteLink {
    outbound: Option<mpsc::UnboundedSender<String>>,
    inbound: mpsc::UnboundedReceiver<String>,
    peeked: Option<String>,
    reader: AbortHandle,
}

pub struct ConsoleLink {
    inbound: mpsc::UnboundedReceiver<String>,
    peeked: Option<String>,
}

/// Deterministic peer for tests: serves canned frames, records sent lines.
pub struct ScriptedLink {
    queue: VecDeque<String>,
    sent: Transcript,
    eager: bool,
    closed: bool,
}

impl ScriptedLink {
    /// A peer that only offers its next frame when polled as the turn-holder,
    /// so multi-peer scripts interleave in turn order.
    pub fn new(frames: &[&str]) -> Self {
        Self {
            queue: frames.iter().map(|frame| frame.to_string()).collect(),
            sent: Arc::new(Mutex::new(Vec::new())),
            eager: false,
            closed: false,
        }
    }

    /// A peer that reports readiness whenever a frame is queued, for
    /// exercising out-of-turn traffic such as a mid-game disconnect.
    pub fn eager(frames: &[&str]) -> Self {
        Self {
            eager: true,
            ..Self::new(frames)
        }
    }

    pub fn transcript(&self) -> Transcript {
        Arc::clone(&self.sent)
    }
}

fn map_console_line(line: String) -> String {
    if line.eq_ignore_ascii_case("Q") {
        LEAVE_FRAME.to_string()
    } else {
        line
    }
}

async fn pump_inbound(read_half: OwnedReadHalf, frames: mpsc::UnboundedSender<String>) {
    let mut reader = BufReader::new(read_half);
    let mut raw = Vec::new();
    loop {
        raw.clear();
        match reader.read_until(FRAME_DELIMITER, &mut raw).await {
            Ok(0) => break,
            Ok(_) => {
                if raw.last() == Some(&FRAME_DELIMITER) {
                    raw.pop();
                }
                if frames.send(decode_frame(&raw)).is_err() {
                    return;
                }
            }
            Err(error) => {
                debug!(%error, "peer read failed");
                break;
            }
        }
    }
    let _ = frames.send(LEAVE_FRAME.to_string());
}

async fn pump_outbound(mut write_half: OwnedWriteHalf, mut frames: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = frames.recv().await {
        let mut bytes = line.into_bytes();
        bytes.push(FRAME_DELIMITER);
        if write_half.write_all(&bytes).await.is_err() {
            break;
        }
    }
}

/// Where new connections come from.
pub enum Acceptor {
    Tcp(TcpListener),
    /// Yields a prearranged batch once, like a test fixture of clients that
    /// all connect before the game starts.
    Scripted(Vec<PeerLink>),
    Closed,
}

impl Acceptor {
    pub async fn bind(addr: impl ToSocketAddrs) -> std::io::Result<Self> {
        Ok(Self::Tcp(TcpListener::bind(addr).await?))
    }

    pub fn scripted(links: Vec<PeerLink>) -> Self {
        Self::Scripted(links)
    }

    /// Check for pending connections within one poll interval.
    pub async fn poll_accept(&mut self) -> Vec<PeerLink> {
        match self {
            Self::Tcp(listener) => {
                match timeout(Duration::from_millis(POLL_INTERVAL_MS), listener.accept()).await {
                    Ok(Ok((stream, addr))) => {
                        debug!(%addr, "peer connected");
                        vec![PeerLink::remote(stream)]
                    }
                    Ok(Err(error)) => {
                        warn!(%error, "accepting a connection failed");
                        Vec::new()
                    }
                    Err(_) => Vec::new(),
                }
            }
            Self::Scripted(links) => std::mem::take(links),
            Self::Closed => Vec::new(),
        }
    }

    /// Release the listening endpoint.
    pub fn close(&mut self) {
        *self = Self::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn connected_pair() -> (PeerLink, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener addr");
        let client = TcpStream::connect(addr).await.expect("connect");
        let (server_side, _) = listener.accept().await.expect("accept");
        (PeerLink::remote(server_side), client)
    }

    #[tokio::test]
    async fn remote_link_splits_frames_and_translates_escapes() {
        let (mut link, mut client) = connected_pair().await;
        client
            .write_all(b"hello\nwor$ld\n")
            .await
            .expect("client write");

        assert_eq!(link.receive().await, "hello");
        assert_eq!(link.receive().await, "wor\nld");
    }

    #[tokio::test]
    async fn remote_link_reports_disconnect_as_sentinel() {
        let (mut link, client) = connected_pair().await;
        drop(client);

        assert!(link.poll(false).await);
        assert_eq!(link.receive().await, LEAVE_FRAME);
    }

    #[tokio::test]
    async fn remote_link_sends_delimited_lines() {
        let (mut link, client) = connected_pair().await;
        link.send("your move");
        link.send(crate::protocol::BLANK_LINE_FRAME);

        let mut reader = BufReader::new(client);
        let mut line = String::new();
        reader.read_line(&mut line).await.expect("read line");
        assert_eq!(line, "your move\n");
        line.clear();
        reader.read_line(&mut line).await.expect("read line");
        assert_eq!(line, "$\n");
    }

    #[tokio::test]
    async fn remote_poll_times_out_quietly() {
        let (mut link, _client) = connected_pair().await;
        assert!(!link.poll(true).await);
    }

    #[tokio::test]
    async fn send_after_close_is_swallowed() {
        let (mut link, _client) = connected_pair().await;
        link.close();
        link.close();
        link.send("into the void");
    }

    #[tokio::test]
    async fn scripted_link_gates_on_turn_unless_eager() {
        let mut gated = PeerLink::Scripted(ScriptedLink::new(&["N"]));
        assert!(!gated.poll(false).await);
        assert!(gated.poll(true).await);
        assert_eq!(gated.receive().await, "N");
        assert!(!gated.poll(true).await);
        assert_eq!(gated.receive().await, LEAVE_FRAME);

        let mut eager = PeerLink::Scripted(ScriptedLink::eager(&["0"]));
        assert!(eager.poll(false).await);
    }

    #[tokio::test]
    async fn scripted_link_records_sent_lines() {
        let scripted = ScriptedLink::new(&[]);
        let transcript = scripted.transcript();
        let mut link = PeerLink::Scripted(scripted);
        link.send("one");
        link.send("two");
        link.close();
        link.send("dropped");

        let sent = transcript.lock().expect("transcript lock");
        assert_eq!(*sent, vec!["one".to_string(), "two".to_string()]);
    }

    #[tokio::test]
    async fn scripted_acceptor_yields_batch_once() {
        let mut acceptor =
            Acceptor::scripted(vec![PeerLink::Scripted(ScriptedLink::new(&["C"]))]);
        assert_eq!(acceptor.poll_accept().await.len(), 1);
        assert!(acceptor.poll_accept().await.is_empty());
        acceptor.close();
        assert!(acceptor.poll_accept().await.is_empty());
    }
}
