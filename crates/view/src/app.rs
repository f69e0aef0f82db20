use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::MissedTickBehavior;

use spatial::{MemoryScene, Reconciler, Scene, SyncReport, TransportCounters, TransportEvent};

use crate::config::ViewConfig;
use crate::debug::FrameStats;
use crate::render::{FrameContext, FrameRenderer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected(SocketAddr),
    Reconnecting { reason: String },
    Lost,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Connected(addr) => write!(f, "connected to {}", addr),
            Self::Reconnecting { reason } => write!(f, "reconnecting ({})", reason),
            Self::Lost => write!(f, "feed lost"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub snapshots: usize,
    pub sync: SyncReport,
    pub feed_ended: bool,
}

/// Sole owner of the registry and scene. Events are applied at the start
/// of a tick, before the scene is drawn.
pub struct App {
    reconciler: Reconciler<MemoryScene>,
    events: mpsc::Receiver<TransportEvent>,
    counters: Arc<TransportCounters>,
    connection: ConnectionStatus,
    stats: FrameStats,
    last_sync: SyncReport,
    frame: u64,
    last_frame_time: Option<Instant>,
    feed_ended: bool,
}

impl App {
    pub fn new(events: mpsc::Receiver<TransportEvent>, counters: Arc<TransportCounters>) -> Self {
        Self {
            reconciler: Reconciler::new(MemoryScene::new()),
            events,
            counters,
            connection: ConnectionStatus::Connecting,
            stats: FrameStats::new(),
            last_sync: SyncReport::default(),
            frame: 0,
            last_frame_time: None,
            feed_ended: false,
        }
    }

    pub fn connection(&self) -> &ConnectionStatus {
        &self.connection
    }

    pub fn scene(&self) -> &MemoryScene {
        self.reconciler.scene()
    }

    /// Applies the events queued when the tick starts, in arrival order.
    /// Events arriving meanwhile wait for the next tick.
    pub fn tick(&mut self) -> TickOutcome {
        self.drain(self.events.len())
    }

    fn drain(&mut self, limit: usize) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        for _ in 0..limit {
            match self.events.try_recv() {
                Ok(event) => self.handle_event(event, &mut outcome),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }

        if self.events.is_empty() && self.events.is_closed() {
            if !self.feed_ended {
                log::info!("Transport listener stopped");
            }
            self.feed_ended = true;
        }

        if outcome.snapshots > 0 {
            self.last_sync = outcome.sync;
        }
        outcome.feed_ended = self.feed_ended;
        outcome
    }

    fn handle_event(&mut self, event: TransportEvent, outcome: &mut TickOutcome) {
        match event {
            TransportEvent::Connected { addr } => {
                self.connection = ConnectionStatus::Connected(addr);
            }
            TransportEvent::Snapshot(snapshot) => {
                let (diff, report) = self.reconciler.apply_snapshot(snapshot);
                if !diff.is_empty() {
                    log::debug!(
                        "Applied snapshot {}: {}",
                        self.reconciler.registry().generation(),
                        diff
                    );
                }
                self.stats.record_snapshot();
                outcome.snapshots += 1;
                outcome.sync += report;
            }
            TransportEvent::Disconnected { reason } => {
                self.connection = ConnectionStatus::Reconnecting { reason };
            }
            TransportEvent::GaveUp { attempts } => {
                log::warn!(
                    "Feed lost after {} reconnect attempts, keeping last scene",
                    attempts
                );
                self.connection = ConnectionStatus::Lost;
                self.feed_ended = true;
            }
        }
    }

    pub fn render(&mut self, renderer: &mut dyn FrameRenderer) -> Result<()> {
        let now = Instant::now();
        if let Some(last) = self.last_frame_time {
            self.stats.record_frame(now.duration_since(last).as_secs_f32());
        }
        self.last_frame_time = Some(now);

        let frame = FrameContext {
            scene: self.reconciler.scene(),
            registry: self.reconciler.registry(),
            connection: &self.connection,
            transport: self.counters.stats(),
            last_sync: self.last_sync,
            frame: self.frame,
            fps: self.stats.fps(),
            snapshot_rate: self.stats.snapshot_rate(),
        };
        renderer.draw(&frame)?;
        self.frame += 1;
        Ok(())
    }

    pub async fn run(
        &mut self,
        config: &ViewConfig,
        renderer: &mut dyn FrameRenderer,
    ) -> Result<()> {
        let period = Duration::from_secs_f64(1.0 / config.frame_rate.max(1) as f64);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = &mut shutdown => {
                    log::info!("Interrupted, shutting down");
                    break;
                }
            }

            let outcome = self.tick();
            self.render(renderer)?;

            if renderer.quit_requested() {
                break;
            }
            if outcome.feed_ended && config.exit_when_feed_ends {
                log::info!("Feed ended, exiting");
                break;
            }
        }

        log::info!(
            "Render loop stopped after {} frames with {} objects in scene",
            self.frame,
            self.scene().object_count()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use glam::DVec3;
    use spatial::{Entity, EntityStatus, Snapshot};

    use super::*;

    struct Recorder {
        frames: Vec<(u64, usize)>,
    }

    impl FrameRenderer for Recorder {
        fn draw(&mut self, frame: &FrameContext<'_>) -> Result<()> {
            self.frames.push((frame.frame, frame.scene.object_count()));
            Ok(())
        }
    }

    fn app() -> (App, mpsc::Sender<TransportEvent>) {
        let (tx, rx) = mpsc::channel(16);
        (App::new(rx, Arc::new(TransportCounters::new())), tx)
    }

    fn snapshot(ids: &[&str]) -> TransportEvent {
        TransportEvent::Snapshot(Snapshot::new(
            ids.iter()
                .map(|id| Entity::new(*id, DVec3::ZERO, EntityStatus::Active))
                .collect(),
        ))
    }

    #[test]
    fn test_tick_applies_queued_snapshots_in_order() {
        let (mut app, tx) = app();

        tx.try_send(snapshot(&["a", "b"])).unwrap();
        tx.try_send(snapshot(&["b", "c"])).unwrap();
        tx.try_send(snapshot(&["c"])).unwrap();

        let outcome = app.tick();

        assert_eq!(outcome.snapshots, 3);
        assert_eq!(outcome.sync.created, 3);
        assert_eq!(outcome.sync.destroyed, 2);
        assert!(!outcome.feed_ended);

        let labels: Vec<_> = app.scene().objects().map(|o| o.label.clone()).collect();
        assert_eq!(labels, vec!["c"]);
    }

    #[test]
    fn test_tick_without_events_changes_nothing() {
        let (mut app, _tx) = app();
        let outcome = app.tick();

        assert_eq!(outcome.snapshots, 0);
        assert!(outcome.sync.is_noop());
        assert_eq!(app.scene().object_count(), 0);
    }

    #[test]
    fn test_connection_status_follows_events() {
        let (mut app, tx) = app();
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();

        tx.try_send(TransportEvent::Connected { addr }).unwrap();
        app.tick();
        assert_eq!(app.connection(), &ConnectionStatus::Connected(addr));

        tx.try_send(TransportEvent::Disconnected {
            reason: "reset".to_string(),
        })
        .unwrap();
        app.tick();
        assert_eq!(
            app.connection(),
            &ConnectionStatus::Reconnecting {
                reason: "reset".to_string()
            }
        );

        tx.try_send(TransportEvent::GaveUp { attempts: 3 }).unwrap();
        let outcome = app.tick();
        assert_eq!(app.connection(), &ConnectionStatus::Lost);
        assert!(outcome.feed_ended);
    }

    #[test]
    fn test_scene_survives_feed_loss() {
        let (mut app, tx) = app();

        tx.try_send(snapshot(&["a"])).unwrap();
        app.tick();
        drop(tx);

        let outcome = app.tick();

        assert!(outcome.feed_ended);
        assert_eq!(app.scene().object_count(), 1);
    }

    #[test]
    fn test_render_sees_applied_state() {
        let (mut app, tx) = app();
        let mut recorder = Recorder { frames: Vec::new() };

        app.render(&mut recorder).unwrap();
        tx.try_send(snapshot(&["a", "b"])).unwrap();
        app.tick();
        app.render(&mut recorder).unwrap();

        assert_eq!(recorder.frames, vec![(0, 0), (1, 2)]);
    }

    #[test]
    fn test_drain_stops_at_limit() {
        let (mut app, tx) = app();

        tx.try_send(snapshot(&["a"])).unwrap();
        tx.try_send(snapshot(&["a", "b"])).unwrap();

        let outcome = app.drain(1);
        assert_eq!(outcome.snapshots, 1);
        assert_eq!(app.scene().object_count(), 1);

        let outcome = app.tick();
        assert_eq!(outcome.snapshots, 1);
        assert_eq!(app.scene().object_count(), 2);
    }

    #[test]
    fn test_feed_end_waits_for_queued_events() {
        let (mut app, tx) = app();

        tx.try_send(snapshot(&["a"])).unwrap();
        tx.try_send(snapshot(&["a", "b"])).unwrap();
        drop(tx);

        let outcome = app.drain(1);
        assert!(!outcome.feed_ended);

        let outcome = app.tick();
        assert!(outcome.feed_ended);
        assert_eq!(app.scene().object_count(), 2);
    }

    #[tokio::test]
    async fn test_run_exits_when_feed_ends() {
        let (mut app, tx) = app();
        let mut recorder = Recorder { frames: Vec::new() };
        let config = ViewConfig {
            frame_rate: 200,
            exit_when_feed_ends: true,
            ..ViewConfig::default()
        };

        tx.send(snapshot(&["a"])).await.unwrap();
        drop(tx);

        tokio::time::timeout(Duration::from_secs(2), app.run(&config, &mut recorder))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(app.scene().object_count(), 1);
        assert!(!recorder.frames.is_empty());
    }
}
