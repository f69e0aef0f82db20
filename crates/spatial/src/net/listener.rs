use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::entity::Snapshot;

use super::config::ListenerConfig;
use super::protocol::{ServerMessage, decode_message};
use super::stats::TransportCounters;

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected { addr: SocketAddr },
    Snapshot(Snapshot),
    Disconnected { reason: String },
    GaveUp { attempts: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("event receiver dropped")]
    ChannelClosed,
}

/// Reads newline-delimited messages from the feed and forwards each
/// `entity_update` as a [`Snapshot`], in arrival order.
pub struct TransportListener {
    config: ListenerConfig,
    counters: Arc<TransportCounters>,
}

impl TransportListener {
    pub fn new(config: ListenerConfig) -> Self {
        Self {
            config,
            counters: Arc::new(TransportCounters::new()),
        }
    }

    pub fn counters(&self) -> Arc<TransportCounters> {
        Arc::clone(&self.counters)
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    pub fn start(
        self,
    ) -> (
        mpsc::Receiver<TransportEvent>,
        JoinHandle<Result<(), TransportError>>,
    ) {
        let (tx, rx) = mpsc::channel(self.config.event_buffer.max(1));
        let handle = tokio::spawn(self.run(tx));
        (rx, handle)
    }

    pub async fn run(self, events: mpsc::Sender<TransportEvent>) -> Result<(), TransportError> {
        match self.connect_loop(&events).await {
            Err(TransportError::ChannelClosed) => {
                log::debug!("Event receiver dropped, stopping listener");
                Ok(())
            }
            result => result,
        }
    }

    async fn connect_loop(
        &self,
        events: &mpsc::Sender<TransportEvent>,
    ) -> Result<(), TransportError> {
        let mut attempt = 0u32;

        loop {
            self.counters.record_attempt();

            match self.connect().await {
                Ok((stream, addr)) => {
                    self.counters.record_connection();
                    log::info!("Connected to feed at {}", addr);
                    send(events, TransportEvent::Connected { addr }).await?;

                    let received = self.counters.stats().messages_received;
                    let reason = match self.pump(BufReader::new(stream), events).await {
                        Ok(()) => "connection closed by server".to_string(),
                        Err(TransportError::ChannelClosed) => return Ok(()),
                        Err(e) => e.to_string(),
                    };
                    log::warn!("Feed connection lost: {}", reason);
                    send(events, TransportEvent::Disconnected { reason }).await?;

                    // Only a connection that delivered a message resets the backoff.
                    if self.counters.stats().messages_received > received {
                        attempt = 0;
                    }
                }
                Err(e) => {
                    log::warn!("Connection to {} failed: {}", self.config.server_addr, e);
                }
            }

            let Some(delay) = self.config.reconnect.delay_for(attempt) else {
                log::error!(
                    "Giving up on {} after {} retries",
                    self.config.server_addr,
                    attempt
                );
                send(events, TransportEvent::GaveUp { attempts: attempt }).await?;
                return Ok(());
            };

            attempt += 1;
            log::info!("Reconnecting in {:?} (attempt {})", delay, attempt);
            tokio::time::sleep(delay).await;

            if events.is_closed() {
                return Ok(());
            }
        }
    }

    async fn connect(&self) -> io::Result<(TcpStream, SocketAddr)> {
        let addr = self.config.server_addr.as_str();
        let stream = tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;
        let peer = stream.peer_addr()?;
        Ok((stream, peer))
    }

    pub async fn pump<R>(
        &self,
        mut reader: R,
        events: &mpsc::Sender<TransportEvent>,
    ) -> Result<(), TransportError>
    where
        R: AsyncBufRead + Unpin,
    {
        let limit = self.config.max_message_bytes;
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let line = read_line(&mut reader, &mut buf, limit).await?;
            let read = match line {
                Line::Eof => return Ok(()),
                Line::Complete(read) => read,
                Line::Oversized(read) => {
                    self.counters.record_bytes(read);
                    self.counters.record_message();
                    self.counters.record_dropped();
                    log::warn!("Dropping {} byte message, limit is {}", read, limit);
                    continue;
                }
            };
            self.counters.record_bytes(read);

            let Ok(text) = std::str::from_utf8(&buf) else {
                self.counters.record_message();
                self.counters.record_dropped();
                log::debug!("Dropping message that is not valid utf-8");
                continue;
            };

            if let Some(snapshot) = self.handle_line(text) {
                send(events, TransportEvent::Snapshot(snapshot)).await?;
            }
        }
    }

    /// Decodes one line. Malformed or non-update messages yield `None` and
    /// are only counted.
    pub fn handle_line(&self, line: &str) -> Option<Snapshot> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        self.counters.record_message();

        match decode_message(line) {
            Ok(ServerMessage::EntityUpdate(update)) => {
                self.counters.record_snapshot();
                Some(Snapshot::from_update(&update))
            }
            Ok(ServerMessage::Other { kind }) => {
                self.counters.record_ignored();
                log::trace!("Ignoring message of type {:?}", kind);
                None
            }
            Err(e) => {
                self.counters.record_dropped();
                log::debug!("Dropping malformed message: {}", e);
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Line {
    Eof,
    Complete(usize),
    Oversized(usize),
}

/// Reads up to and including the next newline, keeping at most `limit`
/// bytes of content in `buf`. An oversized line is consumed in full and
/// leaves `buf` empty.
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>, limit: usize) -> io::Result<Line>
where
    R: AsyncBufRead + Unpin,
{
    let mut read = 0;
    let mut oversized = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(match (read, oversized) {
                (0, _) => Line::Eof,
                (_, true) => Line::Oversized(read),
                (_, false) => Line::Complete(read),
            });
        }

        let newline = available.iter().position(|&b| b == b'\n');
        let (used, content) = match newline {
            Some(i) => (i + 1, i),
            None => (available.len(), available.len()),
        };

        if !oversized {
            if buf.len() + content > limit {
                oversized = true;
                buf.clear();
            } else {
                buf.extend_from_slice(&available[..content]);
            }
        }

        reader.consume(used);
        read += used;

        if newline.is_some() {
            return Ok(if oversized {
                Line::Oversized(read)
            } else {
                Line::Complete(read)
            });
        }
    }
}

async fn send(
    events: &mpsc::Sender<TransportEvent>,
    event: TransportEvent,
) -> Result<(), TransportError> {
    events
        .send(event)
        .await
        .map_err(|_| TransportError::ChannelClosed)
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    fn listener() -> TransportListener {
        TransportListener::new(ListenerConfig::default())
    }

    fn capped(max_message_bytes: usize) -> TransportListener {
        TransportListener::new(ListenerConfig {
            max_message_bytes,
            ..ListenerConfig::default()
        })
    }

    async fn collect(rx: &mut mpsc::Receiver<TransportEvent>) -> Vec<Snapshot> {
        let mut snapshots = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                TransportEvent::Snapshot(snapshot) => snapshots.push(snapshot),
                other => panic!("unexpected event {:?}", other),
            }
        }
        snapshots
    }

    #[test]
    fn test_handle_line_forwards_updates() {
        let listener = listener();

        let snapshot = listener
            .handle_line(r#"{"type":"entity_update","entities":[{"id":"e1","coordinates":{"x":1,"y":2,"z":3},"status":"alert"}]}"#)
            .unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.entities()[0].id, "e1");

        let stats = listener.counters().stats();
        assert_eq!(stats.messages_received, 1);
        assert_eq!(stats.snapshots_forwarded, 1);
    }

    #[test]
    fn test_handle_line_drops_bad_input() {
        let listener = listener();

        assert!(listener.handle_line("garbage").is_none());
        assert!(listener.handle_line(r#"{"entities":[]}"#).is_none());
        assert!(listener.handle_line(r#"{"type":"chat","text":"hi"}"#).is_none());
        assert!(listener.handle_line("   ").is_none());

        let stats = listener.counters().stats();
        assert_eq!(stats.messages_received, 3);
        assert_eq!(stats.messages_dropped, 2);
        assert_eq!(stats.messages_ignored, 1);
        assert_eq!(stats.snapshots_forwarded, 0);
    }

    #[tokio::test]
    async fn test_pump_keeps_order_and_survives_garbage() {
        let listener = listener();
        let (tx, mut rx) = mpsc::channel(16);

        let input: &[u8] = b"{\"type\":\"entity_update\",\"entities\":[{\"id\":\"a\"}]}\n\
            not json at all\n\
            \xff\xfe\n\
            {\"type\":\"entity_update\",\"entities\":[]}\n\
            {\"type\":\"entity_update\",\"entities\":[{\"id\":\"b\"}]}";

        listener.pump(input, &tx).await.unwrap();
        drop(tx);

        let snapshots = collect(&mut rx).await;

        assert_eq!(snapshots.len(), 3);
        assert_eq!(snapshots[0].ids().collect::<Vec<_>>(), vec!["a"]);
        assert!(snapshots[1].is_empty());
        assert_eq!(snapshots[2].ids().collect::<Vec<_>>(), vec!["b"]);

        let stats = listener.counters().stats();
        assert_eq!(stats.messages_dropped, 2);
    }

    #[tokio::test]
    async fn test_pump_stops_when_receiver_dropped() {
        let listener = listener();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let input: &[u8] = b"{\"type\":\"entity_update\",\"entities\":[]}\n";
        let result = listener.pump(input, &tx).await;

        assert!(matches!(result, Err(TransportError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_pump_drops_oversized_line_and_resyncs() {
        let listener = capped(64);
        let (tx, mut rx) = mpsc::channel(16);

        let huge = tokio::io::repeat(b'x').take(10_000);
        let rest: &[u8] = b"\n{\"type\":\"entity_update\",\"entities\":[{\"id\":\"a\"}]}\n";
        let input = BufReader::with_capacity(16, huge.chain(rest));

        listener.pump(input, &tx).await.unwrap();
        drop(tx);

        let snapshots = collect(&mut rx).await;
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].ids().collect::<Vec<_>>(), vec!["a"]);

        let stats = listener.counters().stats();
        assert_eq!(stats.messages_received, 2);
        assert_eq!(stats.messages_dropped, 1);
        assert_eq!(stats.snapshots_forwarded, 1);
        assert_eq!(stats.bytes_received, 10_000 + rest.len() as u64);
    }

    #[tokio::test]
    async fn test_line_at_limit_is_kept() {
        let line = b"{\"type\":\"entity_update\",\"entities\":[]}";
        let listener = capped(line.len());
        let (tx, mut rx) = mpsc::channel(4);

        let mut input = line.to_vec();
        input.push(b'\n');
        input.extend_from_slice(line);
        input.extend_from_slice(b" \n");

        listener.pump(input.as_slice(), &tx).await.unwrap();
        drop(tx);

        assert_eq!(collect(&mut rx).await.len(), 1);
        assert_eq!(listener.counters().stats().messages_dropped, 1);
    }

    #[tokio::test]
    async fn test_oversized_tail_without_newline_is_dropped() {
        let listener = capped(8);
        let (tx, mut rx) = mpsc::channel(4);

        listener
            .pump(&b"{\"type\":\"entity_update\"}"[..], &tx)
            .await
            .unwrap();
        drop(tx);

        assert!(collect(&mut rx).await.is_empty());
        assert_eq!(listener.counters().stats().messages_dropped, 1);
    }
}
