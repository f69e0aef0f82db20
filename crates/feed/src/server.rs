use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio::time::{Interval, MissedTickBehavior};

use spatial::encode_update;

use crate::config::FeedConfig;
use crate::events::{DisconnectReason, FeedEvent};
use crate::simulation::FeedWorld;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, Default)]
pub struct FeedStats {
    pub tick: u64,
    pub uptime_secs: u64,
    pub client_count: usize,
    pub max_clients: usize,
    pub entity_count: usize,
    pub snapshots_broadcast: u64,
    pub lines_sent: u64,
    pub bytes_sent: u64,
    pub lag_skips: u64,
}

#[derive(Debug, Default)]
struct FeedCounters {
    clients: AtomicUsize,
    lines_sent: AtomicU64,
    bytes_sent: AtomicU64,
    lag_skips: AtomicU64,
}

/// Broadcasts one complete `entity_update` line per tick to every connected
/// client. Each client gets its own writer task fed through a broadcast
/// channel; a client that falls behind skips straight to the newest line.
pub struct FeedServer {
    listener: TcpListener,
    config: FeedConfig,
    world: FeedWorld,
    interval: Interval,
    updates: broadcast::Sender<Arc<str>>,
    latest: Option<Arc<str>>,
    clients: JoinSet<()>,
    counters: Arc<FeedCounters>,
    events_tx: mpsc::UnboundedSender<FeedEvent>,
    events_rx: mpsc::UnboundedReceiver<FeedEvent>,
    next_client_id: u32,
    snapshots_broadcast: u64,
    running: Arc<AtomicBool>,
    start_time: Instant,
}

impl FeedServer {
    pub async fn bind(bind_addr: &str, config: FeedConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(bind_addr).await?;

        let period = Duration::from_secs_f64(1.0 / config.tick_rate.max(1) as f64);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let (updates, _) = broadcast::channel(config.client_buffer.max(1));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Self {
            listener,
            world: FeedWorld::new(&config),
            interval,
            updates,
            latest: None,
            clients: JoinSet::new(),
            counters: Arc::new(FeedCounters::default()),
            events_tx,
            events_rx,
            next_client_id: 1,
            snapshots_broadcast: 0,
            running: Arc::new(AtomicBool::new(true)),
            start_time: Instant::now(),
            config,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = FeedEvent> + '_ {
        std::iter::from_fn(move || self.events_rx.try_recv().ok())
    }

    pub fn stats(&self) -> FeedStats {
        FeedStats {
            tick: self.world.tick(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            client_count: self.counters.clients.load(Ordering::Relaxed),
            max_clients: self.config.max_clients,
            entity_count: self.world.len(),
            snapshots_broadcast: self.snapshots_broadcast,
            lines_sent: self.counters.lines_sent.load(Ordering::Relaxed),
            bytes_sent: self.counters.bytes_sent.load(Ordering::Relaxed),
            lag_skips: self.counters.lag_skips.load(Ordering::Relaxed),
        }
    }

    pub async fn step(&mut self) {
        tokio::select! {
            _ = self.interval.tick() => self.tick(),
            accepted = self.listener.accept() => match accepted {
                Ok((stream, addr)) => self.accept(stream, addr),
                Err(e) => self.push_event(FeedEvent::Error {
                    message: format!("Accept failed: {}", e),
                }),
            },
        }
    }

    pub async fn run(&mut self) {
        while self.running.load(Ordering::SeqCst) {
            self.step().await;
            let events: Vec<_> = self.drain_events().collect();
            for event in events {
                log_event(&event);
            }
        }
    }

    fn tick(&mut self) {
        while self.clients.try_join_next().is_some() {}

        let snapshot = self.world.step();
        let line = match encode_update(&snapshot.to_update()) {
            Ok(json) => Arc::<str>::from(format!("{}\n", json)),
            Err(e) => {
                self.push_event(FeedEvent::Error {
                    message: format!("Failed to encode tick {}: {}", self.world.tick(), e),
                });
                return;
            }
        };

        if self.updates.send(Arc::clone(&line)).is_ok() {
            self.snapshots_broadcast += 1;
        }
        self.latest = Some(line);
    }

    fn accept(&mut self, stream: TcpStream, addr: SocketAddr) {
        if self.counters.clients.load(Ordering::SeqCst) >= self.config.max_clients {
            self.push_event(FeedEvent::ConnectionDenied {
                addr,
                reason: format!("server full ({} clients)", self.config.max_clients),
            });
            return;
        }

        let client_id = self.next_client_id;
        self.next_client_id = self.next_client_id.wrapping_add(1);

        let _ = stream.set_nodelay(true);
        self.counters.clients.fetch_add(1, Ordering::SeqCst);
        self.push_event(FeedEvent::ClientConnected { client_id, addr });

        let client = ClientWriter {
            client_id,
            stream,
            updates: self.updates.subscribe(),
            counters: Arc::clone(&self.counters),
            events: self.events_tx.clone(),
        };
        let latest = self.latest.clone();
        self.clients.spawn(client.run(latest));
    }

    /// Closes the broadcast channel so every writer finishes, giving slow
    /// ones a short grace period before aborting them.
    pub async fn shutdown(self) {
        self.running.store(false, Ordering::SeqCst);
        let Self {
            updates,
            mut clients,
            ..
        } = self;
        drop(updates);

        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while clients.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            log::warn!("Aborting {} unresponsive clients", clients.len());
            clients.shutdown().await;
        }
    }

    fn push_event(&self, event: FeedEvent) {
        let _ = self.events_tx.send(event);
    }
}

struct ClientWriter {
    client_id: u32,
    stream: TcpStream,
    updates: broadcast::Receiver<Arc<str>>,
    counters: Arc<FeedCounters>,
    events: mpsc::UnboundedSender<FeedEvent>,
}

impl ClientWriter {
    async fn run(mut self, latest: Option<Arc<str>>) {
        let reason = self.pump(latest).await;
        let _ = self.stream.shutdown().await;
        self.counters.clients.fetch_sub(1, Ordering::SeqCst);
        let _ = self.events.send(FeedEvent::ClientDisconnected {
            client_id: self.client_id,
            reason,
        });
    }

    async fn pump(&mut self, latest: Option<Arc<str>>) -> DisconnectReason {
        if let Some(line) = latest {
            if self.write(&line).await.is_err() {
                return DisconnectReason::WriteFailed;
            }
        }

        loop {
            match self.updates.recv().await {
                Ok(line) => {
                    if let Err(e) = self.write(&line).await {
                        return if is_disconnect(&e) {
                            DisconnectReason::Closed
                        } else {
                            DisconnectReason::WriteFailed
                        };
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    self.counters.lag_skips.fetch_add(skipped, Ordering::Relaxed);
                    let _ = self.events.send(FeedEvent::ClientLagged {
                        client_id: self.client_id,
                        skipped,
                    });
                }
                Err(broadcast::error::RecvError::Closed) => return DisconnectReason::Shutdown,
            }
        }
    }

    async fn write(&mut self, line: &str) -> io::Result<()> {
        self.stream.write_all(line.as_bytes()).await?;
        self.counters.lines_sent.fetch_add(1, Ordering::Relaxed);
        self.counters
            .bytes_sent
            .fetch_add(line.len() as u64, Ordering::Relaxed);
        Ok(())
    }
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
    )
}

pub fn log_event(event: &FeedEvent) {
    match event {
        FeedEvent::ClientConnected { client_id, addr } => {
            log::info!("Client {} connected from {}", client_id, addr);
        }
        FeedEvent::ClientDisconnected { client_id, reason } => {
            log::info!("Client {} {}", client_id, reason.as_str());
        }
        FeedEvent::ClientLagged { client_id, skipped } => {
            log::warn!("Client {} lagging, skipped {} snapshots", client_id, skipped);
        }
        FeedEvent::ConnectionDenied { addr, reason } => {
            log::warn!("Connection denied to {}: {}", addr, reason);
        }
        FeedEvent::Error { message } => log::error!("{}", message),
    }
}

#[cfg(test)]
mod tests {
    use spatial::{ServerMessage, Snapshot, decode_message};
    use tokio::io::{AsyncBufReadExt, BufReader};

    use super::*;

    fn config() -> FeedConfig {
        FeedConfig {
            tick_rate: 100,
            entity_count: 4,
            seed: Some(42),
            ..FeedConfig::default()
        }
    }

    async fn read_snapshot(reader: &mut BufReader<TcpStream>) -> Snapshot {
        let mut line = String::new();
        tokio::time::timeout(Duration::from_secs(2), reader.read_line(&mut line))
            .await
            .unwrap()
            .unwrap();
        match decode_message(&line).unwrap() {
            ServerMessage::EntityUpdate(update) => Snapshot::from_update(&update),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    async fn step_until<F: Fn(&FeedServer) -> bool>(server: &mut FeedServer, done: F) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !done(server) {
                server.step().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_client_receives_complete_snapshots() {
        let mut server = FeedServer::bind("127.0.0.1:0", config()).await.unwrap();
        let addr = server.local_addr().unwrap();

        let stream = TcpStream::connect(addr).await.unwrap();
        step_until(&mut server, |s| s.stats().client_count == 1).await;
        step_until(&mut server, |s| s.stats().snapshots_broadcast >= 2).await;

        let mut reader = BufReader::new(stream);
        let first = read_snapshot(&mut reader).await;
        let second = read_snapshot(&mut reader).await;

        assert_eq!(first.len(), 4);
        assert_eq!(second.len(), 4);

        let events: Vec<_> = server.drain_events().collect();
        assert!(matches!(
            events.first(),
            Some(FeedEvent::ClientConnected { client_id: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_late_client_gets_latest_snapshot_first() {
        let mut server = FeedServer::bind("127.0.0.1:0", config()).await.unwrap();
        let addr = server.local_addr().unwrap();

        step_until(&mut server, |s| s.stats().tick >= 3).await;
        let expected = server.world.snapshot();

        let stream = TcpStream::connect(addr).await.unwrap();
        step_until(&mut server, |s| s.stats().client_count == 1).await;

        let mut reader = BufReader::new(stream);
        let first = read_snapshot(&mut reader).await;

        assert_eq!(first.ids().collect::<Vec<_>>(), expected.ids().collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_denies_clients_over_capacity() {
        let config = FeedConfig {
            max_clients: 1,
            ..config()
        };
        let mut server = FeedServer::bind("127.0.0.1:0", config).await.unwrap();
        let addr = server.local_addr().unwrap();

        let _first = TcpStream::connect(addr).await.unwrap();
        step_until(&mut server, |s| s.stats().client_count == 1).await;
        let _second = TcpStream::connect(addr).await.unwrap();

        let mut denied = false;
        tokio::time::timeout(Duration::from_secs(2), async {
            while !denied {
                server.step().await;
                denied = server
                    .drain_events()
                    .any(|e| matches!(e, FeedEvent::ConnectionDenied { .. }));
            }
        })
        .await
        .unwrap();

        assert_eq!(server.stats().client_count, 1);
    }

    #[tokio::test]
    async fn test_shutdown_closes_clients() {
        let mut server = FeedServer::bind("127.0.0.1:0", config()).await.unwrap();
        let addr = server.local_addr().unwrap();

        let stream = TcpStream::connect(addr).await.unwrap();
        step_until(&mut server, |s| s.stats().client_count == 1).await;
        server.shutdown().await;

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        loop {
            line.clear();
            let read = tokio::time::timeout(Duration::from_secs(2), reader.read_line(&mut line))
                .await
                .unwrap()
                .unwrap();
            if read == 0 {
                break;
            }
        }
    }
}
