use chrono::{DateTime, Utc};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use depth_pulse::{
    pump, ConnectionStatus, DepthEngine, DepthFeed, DepthView, EngineConfig, EngineStats,
    FeedConfig, PressureSummary, PriceLevel, SharedEngine, Side, SlotView, SummarySampler,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, BorderType, Borders, Paragraph, Sparkline},
    Frame, Terminal,
};
use rustls::crypto::ring::default_provider;
use std::{
    error::Error,
    io,
    time::{Duration, Instant},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const BID_COLOR: Color = Color::Rgb(58, 255, 67);
const ASK_COLOR: Color = Color::Rgb(255, 40, 66);
const PRESSURE_COLOR: Color = Color::Rgb(255, 215, 0);
const CURSOR_COLOR: Color = Color::Rgb(235, 235, 235);
const PANEL_BG: Color = Color::Rgb(18, 18, 28);
const MUTED: Color = Color::Rgb(128, 128, 128);

/// Bar values are heights in hundredths; the tallest bar is always 7.00.
const BAR_RESOLUTION: f64 = 100.0;
const BAR_MAX: u64 = 700;

const Y_AXIS_WIDTH: u16 = 9;

/// Everything one frame needs, copied out of the engine so the lock is released before drawing.
struct Screen {
    view: DepthView,
    hover: Option<PriceLevel>,
    trail: Vec<u64>,
    summary: PressureSummary,
    stats: EngineStats,
    received_at: DateTime<Utc>,
    spread: Option<f64>,
    mid: Option<f64>,
}

struct App {
    cursor: usize,
    sampler: SummarySampler,
}

impl App {
    fn new(depth: usize) -> Self {
        Self {
            // Start hovering the best ask
            cursor: depth,
            sampler: SummarySampler::default(),
        }
    }

    fn move_cursor(&mut self, delta: isize, slots: usize) {
        let last = slots.saturating_sub(1);
        self.cursor = self.cursor.saturating_add_signed(delta).min(last);
    }

    async fn screen(&mut self, engine: &SharedEngine) -> Screen {
        let engine = engine.lock().await;
        let snapshot = engine.snapshot();

        Screen {
            view: engine.view(),
            hover: engine.level_at(self.cursor),
            trail: engine
                .history()
                .iter()
                .map(|snapshot| (snapshot.total_quantity() * BAR_RESOLUTION).round() as u64)
                .collect(),
            summary: self.sampler.sample(&engine).clone(),
            stats: engine.stats(),
            received_at: snapshot.received_at(),
            spread: snapshot.spread(),
            mid: snapshot.mid_price(),
        }
    }
}

fn init_logging() -> Result<(), Box<dyn Error>> {
    let path =
        std::env::var("DEPTH_PULSE_LOG").unwrap_or_else(|_| "depth-pulse.log".to_string());
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = default_provider().install_default();
    init_logging()?;

    let engine_config = EngineConfig::from_env();
    let feed_config = FeedConfig::from_env();
    info!(?engine_config, url = %feed_config.url, "starting depth pulse");

    let engine = DepthEngine::shared(engine_config);
    let events = DepthFeed::with_config(feed_config).start();
    tokio::spawn(pump(events, engine.clone()));

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, engine).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    engine: SharedEngine,
) -> Result<(), Box<dyn Error>> {
    let depth = engine.lock().await.config().depth;
    let slots = depth * 2;
    let mut app = App::new(depth);

    let draw_interval = Duration::from_millis(100);
    let mut last_draw: Option<Instant> = None;

    loop {
        if event::poll(Duration::from_millis(5))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                        KeyCode::Left => app.move_cursor(-1, slots),
                        KeyCode::Right => app.move_cursor(1, slots),
                        KeyCode::Home => app.cursor = 0,
                        KeyCode::End => app.cursor = slots - 1,
                        _ => {}
                    }
                    // Redraw immediately so the hover follows the key
                    last_draw = None;
                }
            }
        }

        if last_draw.map_or(true, |last| last.elapsed() >= draw_interval) {
            let screen = app.screen(&engine).await;
            terminal.draw(|f| ui(f, &screen, app.cursor))?;
            last_draw = Some(Instant::now());
        }

        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn ui(f: &mut Frame, screen: &Screen, cursor: usize) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(10),
            Constraint::Length(4),
            Constraint::Length(6),
        ])
        .split(f.area());

    render_status_bar(f, chunks[0], screen);
    render_depth_chart(f, chunks[1], screen, cursor);
    render_trail(f, chunks[2], screen);

    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[3]);

    render_summary(f, bottom[0], screen);
    render_hover(f, bottom[1], screen, cursor);
}

fn status_style(status: ConnectionStatus) -> (&'static str, Color) {
    match status {
        ConnectionStatus::Live => ("●", Color::Rgb(0, 255, 127)),
        ConnectionStatus::Connecting => ("◐", Color::Rgb(255, 165, 0)),
        ConnectionStatus::Disconnected => ("○", Color::Rgb(255, 69, 58)),
    }
}

fn render_status_bar(f: &mut Frame, area: Rect, screen: &Screen) {
    let (symbol, color) = status_style(screen.view.status);

    let status = Span::styled(
        format!(" {} {} ", symbol, screen.view.status.label()),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    );

    let time = if screen.view.live {
        format!(" ⏱  {} ", screen.received_at.format("%H:%M:%S%.3f"))
    } else {
        " ⏱  waiting for data ".to_string()
    };
    let time = Span::styled(time, Style::default().fg(Color::Rgb(100, 149, 237)));

    let title = Span::styled(
        " ◆ DEPTH PULSE ◆ ",
        Style::default()
            .fg(PRESSURE_COLOR)
            .add_modifier(Modifier::BOLD),
    );

    let counters = Span::styled(
        format!(
            " upd {} rej {} excl {} resets {} ",
            screen.stats.updates_applied,
            screen.stats.updates_rejected,
            screen.stats.levels_excluded,
            screen.stats.history_resets
        ),
        Style::default().fg(MUTED),
    );

    let help = Span::styled(" [←/→] Hover  [Q] Quit ", Style::default().fg(MUTED));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Double)
        .border_style(Style::default().fg(Color::Rgb(138, 43, 226)))
        .style(Style::default().bg(PANEL_BG));

    let paragraph = Paragraph::new(Line::from(vec![status, time, title, counters, help]))
        .block(block)
        .alignment(Alignment::Center);

    f.render_widget(paragraph, area);
}

fn bar_style(slot: &SlotView, cursor: usize) -> Style {
    let color = match slot.level.map(|level| level.side) {
        _ if slot.index == cursor => CURSOR_COLOR,
        _ if slot.pressure => PRESSURE_COLOR,
        Some(Side::Bid) => BID_COLOR,
        Some(Side::Ask) => ASK_COLOR,
        None => MUTED,
    };

    let style = Style::default().fg(color);
    if slot.pressure {
        style.add_modifier(Modifier::BOLD)
    } else {
        style
    }
}

/// Bar width and gap so `slots` bars fit in `width` columns.
fn bar_geometry(width: u16, slots: u16) -> (u16, u16) {
    let slots = slots.max(1);
    let gap = if u32::from(width) >= 2 * u32::from(slots) { 1 } else { 0 };
    let bar_width = (width.saturating_sub(gap * (slots - 1)) / slots).max(1);
    (bar_width, gap)
}

fn render_depth_chart(f: &mut Frame, area: Rect, screen: &Screen, cursor: usize) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(70, 70, 90)))
        .title(Span::styled(
            format!(
                " DEPTH  scale ×{:.3}  max {:.4} ",
                screen.view.scale.factor, screen.view.scale.max_quantity
            ),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ))
        .style(Style::default().bg(PANEL_BG));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(Y_AXIS_WIDTH), Constraint::Min(1)])
        .split(inner);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(columns[1]);
    let (bars_area, x_axis_area) = (rows[0], rows[1]);

    let slots = u16::try_from(screen.view.slots.len()).unwrap_or(u16::MAX);
    let (bar_width, gap) = bar_geometry(bars_area.width, slots);

    let bars: Vec<Bar> = screen
        .view
        .slots
        .iter()
        .map(|slot| {
            Bar::default()
                .value((slot.height * BAR_RESOLUTION).round() as u64)
                .text_value(String::new())
                .style(bar_style(slot, cursor))
        })
        .collect();

    let chart = BarChart::default()
        .data(BarGroup::default().bars(&bars))
        .bar_width(bar_width)
        .bar_gap(gap)
        .max(BAR_MAX);
    f.render_widget(chart, bars_area);

    // Y axis: quantity ticks, bottom to top
    let y_ticks = &screen.view.ticks.y_ticks;
    let mut y_lines = vec![Line::from(""); bars_area.height as usize];
    for (i, quantity) in y_ticks.iter().enumerate() {
        if let Some(row) = tick_row(i, y_ticks.len(), bars_area.height as usize) {
            y_lines[row] = Line::from(Span::styled(
                format!("{:>7.3} ┤", quantity),
                Style::default().fg(MUTED),
            ));
        }
    }
    let y_area = Rect {
        height: bars_area.height,
        ..columns[0]
    };
    f.render_widget(Paragraph::new(y_lines), y_area);

    // X axis: price ticks under their slot
    let depth = screen.view.slots.len() / 2;
    let labels: Vec<(usize, String)> = screen
        .view
        .ticks
        .x_ticks
        .iter()
        .map(|tick| {
            let slot = (tick.slot_x + depth as f64 - 0.5).round().max(0.0) as usize;
            let column = slot * (usize::from(bar_width) + usize::from(gap))
                + usize::from(bar_width) / 2;
            (column, format!("{:.2}", tick.price))
        })
        .collect();
    let axis = place_labels(x_axis_area.width as usize, &labels);
    f.render_widget(
        Paragraph::new(Span::styled(axis, Style::default().fg(MUTED))),
        x_axis_area,
    );
}

/// Row (from the top) of Y tick `index` out of `count` in a column `height` rows tall.
fn tick_row(index: usize, count: usize, height: usize) -> Option<usize> {
    if height == 0 || count < 2 || index >= count {
        return None;
    }
    let from_bottom = (index as f64 * (height - 1) as f64 / (count - 1) as f64).round() as usize;
    Some(height - 1 - from_bottom)
}

/// Lay out labels centred on their columns, skipping any that would overlap a previous one.
fn place_labels(width: usize, labels: &[(usize, String)]) -> String {
    let mut line = vec![' '; width];
    let mut next_free = 0;

    for (column, text) in labels {
        let len = text.chars().count();
        let start = column.saturating_sub(len / 2);
        if start < next_free || start + len > width {
            continue;
        }
        for (offset, ch) in text.chars().enumerate() {
            line[start + offset] = ch;
        }
        next_free = start + len + 1;
    }

    line.into_iter().collect()
}

fn render_trail(f: &mut Frame, area: Rect, screen: &Screen) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(70, 70, 90)))
        .title(Span::styled(
            format!(" GHOST TRAIL  {} snapshots ", screen.trail.len()),
            Style::default().fg(Color::Rgb(100, 149, 237)),
        ))
        .style(Style::default().bg(PANEL_BG));

    let sparkline = Sparkline::default()
        .block(block)
        .data(&screen.trail)
        .style(Style::default().fg(Color::Rgb(100, 149, 237)))
        .max(screen.trail.iter().max().copied().unwrap_or(100));

    f.render_widget(sparkline, area);
}

fn render_summary(f: &mut Frame, area: Rect, screen: &Screen) {
    let summary = &screen.summary;

    let range = match summary.price_range {
        Some((low, high)) => format!("{:.2} - {:.2}", low, high),
        None => "-".to_string(),
    };

    let lines = vec![
        Line::from(vec![
            Span::styled("zones  ", Style::default().fg(MUTED)),
            Span::styled(
                summary.count.to_string(),
                Style::default()
                    .fg(PRESSURE_COLOR)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("   avg qty  ", Style::default().fg(MUTED)),
            Span::raw(format!("{:.4}", summary.avg_quantity)),
        ]),
        Line::from(vec![
            Span::styled("range  ", Style::default().fg(MUTED)),
            Span::raw(range),
        ]),
        Line::from(vec![
            Span::styled("spread ", Style::default().fg(MUTED)),
            Span::raw(
                screen
                    .spread
                    .map_or_else(|| "-".to_string(), |spread| format!("{:.2}", spread)),
            ),
            Span::styled("   mid  ", Style::default().fg(MUTED)),
            Span::raw(
                screen
                    .mid
                    .map_or_else(|| "-".to_string(), |mid| format!("{:.2}", mid)),
            ),
        ]),
        Line::from(Span::styled(
            summary.method.clone(),
            Style::default().fg(MUTED),
        )),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(70, 70, 90)))
        .title(Span::styled(
            " PRESSURE ZONES ",
            Style::default()
                .fg(PRESSURE_COLOR)
                .add_modifier(Modifier::BOLD),
        ))
        .style(Style::default().bg(PANEL_BG));

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_hover(f: &mut Frame, area: Rect, screen: &Screen, cursor: usize) {
    let pressure = screen
        .view
        .slots
        .get(cursor)
        .map_or(false, |slot| slot.pressure);

    let lines = match screen.hover {
        Some(level) => {
            let color = if level.side.is_bid() {
                BID_COLOR
            } else {
                ASK_COLOR
            };
            let mut lines = vec![
                Line::from(vec![
                    Span::styled("side   ", Style::default().fg(MUTED)),
                    Span::styled(
                        level.side.as_str().to_uppercase(),
                        Style::default().fg(color).add_modifier(Modifier::BOLD),
                    ),
                ]),
                Line::from(vec![
                    Span::styled("price  ", Style::default().fg(MUTED)),
                    Span::raw(format!("{:.2}", level.price)),
                ]),
                Line::from(vec![
                    Span::styled("qty    ", Style::default().fg(MUTED)),
                    Span::raw(format!("{:.4}", level.quantity)),
                ]),
            ];
            if pressure {
                lines.push(Line::from(Span::styled(
                    "PRESSURE ZONE",
                    Style::default()
                        .fg(PRESSURE_COLOR)
                        .add_modifier(Modifier::BOLD),
                )));
            }
            lines
        }
        None => vec![Line::from(Span::styled(
            "empty slot",
            Style::default().fg(MUTED),
        ))],
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(70, 70, 90)))
        .title(Span::styled(
            format!(" HOVER  slot {} ", cursor),
            Style::default().fg(CURSOR_COLOR).add_modifier(Modifier::BOLD),
        ))
        .style(Style::default().bg(PANEL_BG));

    f.render_widget(Paragraph::new(lines).block(block), area);
}
