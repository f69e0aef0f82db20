mod config;
mod events;
mod server;
mod simulation;
mod tui;

use std::io;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use config::FeedConfig;
use server::FeedServer;
use tui::TuiState;

const UI_REFRESH: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[command(name = "spatial-feed")]
#[command(about = "Development feed that streams simulated entity snapshots")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long, default_value_t = spatial::DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, default_value_t = 10, help = "Snapshots per second")]
    tick_rate: u32,

    #[arg(short, long, default_value_t = 12)]
    entities: usize,

    #[arg(short, long, default_value_t = 32)]
    max_clients: usize,

    #[arg(long, help = "Seed for a reproducible feed")]
    seed: Option<u64>,

    #[arg(long)]
    headless: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let bind_addr = format!("{}:{}", args.bind, args.port);

    let config = FeedConfig {
        tick_rate: args.tick_rate,
        entity_count: args.entities,
        max_clients: args.max_clients,
        seed: args.seed,
        ..Default::default()
    };

    let mut server = FeedServer::bind(&bind_addr, config).await?;

    if args.headless {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        log::info!("Feed started on {}", server.local_addr()?);
        tokio::select! {
            _ = server.run() => {}
            _ = tokio::signal::ctrl_c() => {}
        }
        log::info!("Feed shutting down");
    } else {
        run_with_tui(&mut server).await?;
    }

    server.shutdown().await;
    Ok(())
}

async fn run_with_tui(server: &mut FeedServer) -> io::Result<()> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let running = server.running();
    let mut tui_state = TuiState::new();
    let mut refresh = tokio::time::interval(UI_REFRESH);

    tui_state.log_info(format!("Feed started on {}", server.local_addr()?));

    while running.load(Ordering::SeqCst) {
        tokio::select! {
            _ = server.step() => continue,
            _ = refresh.tick() => {}
        }

        for event in server.drain_events() {
            tui_state.record(&event);
        }

        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press
                    && matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
                {
                    running.store(false, Ordering::SeqCst);
                }
            }
        }

        let stats = server.stats();
        terminal.draw(|frame| {
            tui::render(frame, &tui_state, &stats);
        })?;
    }

    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, cursor::Show)?;

    Ok(())
}
