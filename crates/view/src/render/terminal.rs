use std::io;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};
use glam::DVec3;
use ratatui::Frame;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::text::{Line, Span};
use ratatui::widgets::canvas::{Canvas, Points};
use ratatui::widgets::{Block, Borders, Paragraph};

use super::camera::Camera;
use super::{FrameContext, FrameRenderer};

const ROTATE_STEP: f64 = 0.1;
const ZOOM_STEP: f64 = 1.15;

pub struct TerminalRenderer {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    camera: Camera,
    auto_frame: bool,
    show_labels: bool,
    should_quit: bool,
}

impl TerminalRenderer {
    pub fn new() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            camera: Camera::new(1.0),
            auto_frame: true,
            show_labels: true,
            should_quit: false,
        })
    }

    fn poll_input(&mut self) -> io::Result<()> {
        while event::poll(Duration::ZERO)? {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }

            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
                KeyCode::Left => self.camera.rotate(-ROTATE_STEP, 0.0),
                KeyCode::Right => self.camera.rotate(ROTATE_STEP, 0.0),
                KeyCode::Up => self.camera.rotate(0.0, ROTATE_STEP),
                KeyCode::Down => self.camera.rotate(0.0, -ROTATE_STEP),
                KeyCode::Char('+') | KeyCode::Char('=') => {
                    self.auto_frame = false;
                    self.camera.zoom(1.0 / ZOOM_STEP);
                }
                KeyCode::Char('-') => {
                    self.auto_frame = false;
                    self.camera.zoom(ZOOM_STEP);
                }
                KeyCode::Char('f') => self.auto_frame = !self.auto_frame,
                KeyCode::Char('l') => self.show_labels = !self.show_labels,
                _ => {}
            }
        }
        Ok(())
    }
}

impl Drop for TerminalRenderer {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let _ = execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            cursor::Show
        );
    }
}

impl FrameRenderer for TerminalRenderer {
    fn draw(&mut self, frame: &FrameContext<'_>) -> Result<()> {
        self.poll_input()?;

        if self.auto_frame {
            if let Some((min, max)) = frame.scene.bounds() {
                self.camera.frame_bounds(min, max);
            }
        }

        let camera = &mut self.camera;
        let show_labels = self.show_labels;
        self.terminal.draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(4),
                    Constraint::Min(0),
                    Constraint::Length(1),
                ])
                .split(f.area());

            render_header(f, chunks[0], frame);
            render_scene(f, chunks[1], frame, camera, show_labels);
            render_help(f, chunks[2]);
        })?;

        Ok(())
    }

    fn quit_requested(&mut self) -> bool {
        self.should_quit
    }
}

fn render_header(frame: &mut Frame, area: Rect, ctx: &FrameContext<'_>) {
    let block = Block::default()
        .title(format!(" Spatial View - {} ", ctx.connection))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let counts = ctx.status_counts();
    let transport = &ctx.transport;
    let lines = vec![
        Line::from(vec![
            Span::styled("Entities: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{} ", ctx.registry.len()),
                Style::default().fg(Color::White),
            ),
            Span::styled(
                format!("{} active ", counts.active),
                Style::default().fg(Color::Green),
            ),
            Span::styled(
                format!("{} idle ", counts.idle),
                Style::default().fg(Color::Yellow),
            ),
            Span::styled(
                format!("{} alert ", counts.alert),
                Style::default().fg(Color::Red),
            ),
            Span::styled(
                format!("{} unknown", counts.unknown),
                Style::default().fg(Color::Gray),
            ),
        ]),
        Line::from(vec![
            Span::styled("Feed: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!(
                    "{} snapshots ({:.1}/s), {} ignored, {} dropped, {} | last sync +{} ~{} -{} | {:.0} fps",
                    transport.snapshots_forwarded,
                    ctx.snapshot_rate,
                    transport.messages_ignored,
                    transport.messages_dropped,
                    format_bytes(transport.bytes_received),
                    ctx.last_sync.created,
                    ctx.last_sync.updated,
                    ctx.last_sync.destroyed,
                    ctx.fps,
                ),
                Style::default().fg(Color::White),
            ),
        ]),
    ];

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_scene(
    frame: &mut Frame,
    area: Rect,
    ctx: &FrameContext<'_>,
    camera: &mut Camera,
    show_labels: bool,
) {
    // Terminal cells are roughly twice as tall as they are wide.
    camera.aspect = area.width.max(1) as f64 / (area.height.max(1) as f64 * 2.0);
    let view_projection = camera.view_projection();

    let origin = camera.project(&view_projection, DVec3::ZERO);
    let projected: Vec<_> = ctx
        .scene
        .objects()
        .filter_map(|object| {
            camera
                .project(&view_projection, object.position)
                .map(|point| (point, object))
        })
        .collect();

    let canvas = Canvas::default()
        .block(
            Block::default()
                .title(" Scene ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        )
        .marker(Marker::Braille)
        .x_bounds([-1.0, 1.0])
        .y_bounds([-1.0, 1.0])
        .paint(move |painter| {
            if let Some(point) = origin {
                painter.draw(&Points {
                    coords: &[point],
                    color: Color::DarkGray,
                });
            }

            for ((x, y), object) in &projected {
                let [r, g, b] = object.color.to_rgb8();
                let color = Color::Rgb(r, g, b);
                painter.draw(&Points {
                    coords: &[(*x, *y)],
                    color,
                });
                if show_labels {
                    painter.print(
                        *x,
                        *y,
                        Span::styled(format!(" {}", object.label), Style::default().fg(color)),
                    );
                }
            }
        });

    frame.render_widget(canvas, area);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let text = Paragraph::new(
        " q/Esc quit  arrows orbit  +/- zoom  f auto-frame  l labels",
    )
    .style(
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
    );

    frame.render_widget(text, area);
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{}B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1}KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1}GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
