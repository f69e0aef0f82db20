mod app;
mod config;
mod debug;
mod render;

use std::time::Duration;

use clap::Parser;
use env_logger::Env;

use spatial::{ListenerConfig, ReconnectPolicy, TransportListener};

use app::App;
use config::{DEFAULT_FRAME_RATE, DEFAULT_SUMMARY_EVERY, ViewConfig};
use render::{FrameRenderer, HeadlessRenderer, TerminalRenderer};

#[derive(Parser)]
#[command(name = "spatial-view")]
#[command(about = "Live 3D view of a streaming entity feed")]
struct Args {
    #[arg(
        short,
        long,
        default_value_t = format!("127.0.0.1:{}", spatial::DEFAULT_PORT),
        help = "Feed address to connect to"
    )]
    server: String,

    #[arg(long, default_value_t = DEFAULT_FRAME_RATE, help = "Frames per second")]
    fps: u32,

    #[arg(long, help = "Log scene summaries instead of drawing to the terminal")]
    headless: bool,

    #[arg(long, default_value_t = DEFAULT_SUMMARY_EVERY, help = "Frames between headless summaries")]
    summary_every: u64,

    #[arg(long, default_value_t = 5, help = "Reconnect attempts before giving up")]
    retries: u32,

    #[arg(long, default_value_t = 250, help = "Initial reconnect delay in milliseconds")]
    retry_delay_ms: u64,

    #[arg(long, help = "Do not reconnect after the feed drops")]
    no_retry: bool,

    #[arg(long, help = "Exit once the feed is lost for good")]
    exit_on_loss: bool,
}

impl Args {
    fn into_config(self) -> ViewConfig {
        let reconnect = if self.no_retry {
            ReconnectPolicy::fail_stop()
        } else {
            ReconnectPolicy {
                initial_delay: Duration::from_millis(self.retry_delay_ms),
                max_attempts: self.retries,
                ..ReconnectPolicy::default()
            }
        };

        ViewConfig {
            listener: ListenerConfig {
                server_addr: self.server,
                reconnect,
                ..ListenerConfig::default()
            },
            frame_rate: self.fps,
            headless: self.headless,
            summary_every: self.summary_every,
            exit_when_feed_ends: self.exit_on_loss,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Args::parse().into_config();

    // The terminal view owns stdout, so it only logs when asked to.
    if config.headless || std::env::var_os("RUST_LOG").is_some() {
        env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    }

    log::info!("Connecting to feed at {}", config.listener.server_addr);

    let listener = TransportListener::new(config.listener.clone());
    let counters = listener.counters();
    let (events, handle) = listener.start();

    let mut renderer: Box<dyn FrameRenderer> = if config.headless {
        Box::new(HeadlessRenderer::new(config.summary_every))
    } else {
        Box::new(TerminalRenderer::new()?)
    };

    let mut app = App::new(events, counters);
    let result = app.run(&config, renderer.as_mut()).await;
    drop(renderer);

    handle.abort();
    result
}
