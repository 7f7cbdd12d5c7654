mod tui_app;

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use tui_app::{format_change, format_price, format_volume, truncate, AppState, LoadStatus};

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> io::Result<()> {
    let dir = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("OUTPUT_DIR").ok())
        .unwrap_or_else(|| "web".to_string());

    let mut app = AppState::new(PathBuf::from(dir));

    // Initial load before rendering
    app.refresh();

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut picks_state = TableState::default();
    picks_state.select(if app.picks.picks.is_empty() { None } else { Some(0) });

    let result = run_loop(&mut terminal, &mut app, &mut picks_state);

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    picks_state: &mut TableState,
) -> io::Result<()> {
    let refresh_interval = Duration::from_secs(5);
    let mut last_tick = std::time::Instant::now();

    loop {
        terminal.draw(|f| render(f, app, picks_state))?;

        let timeout = refresh_interval
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => return Ok(()),
                        KeyCode::Char('r') | KeyCode::Char('R') => {
                            app.refresh();
                            clamp_selection(app, picks_state);
                            last_tick = std::time::Instant::now();
                        }
                        KeyCode::Down | KeyCode::Char('j') => {
                            let max = app.picks.picks.len().saturating_sub(1);
                            let next = picks_state.selected().map_or(0, |i| (i + 1).min(max));
                            picks_state.select(Some(next));
                        }
                        KeyCode::Up | KeyCode::Char('k') => {
                            let prev = picks_state
                                .selected()
                                .map_or(0, |i| i.saturating_sub(1));
                            picks_state.select(Some(prev));
                        }
                        _ => {}
                    }
                }
            }
        }

        if last_tick.elapsed() >= refresh_interval {
            app.refresh();
            clamp_selection(app, picks_state);
            last_tick = std::time::Instant::now();
        }
    }
}

/// A reload can shrink the picks list under the cursor.
fn clamp_selection(app: &AppState, state: &mut TableState) {
    let len = app.picks.picks.len();
    match state.selected() {
        _ if len == 0 => state.select(None),
        Some(i) if i >= len => state.select(Some(len - 1)),
        None => state.select(Some(0)),
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, app: &AppState, picks_state: &mut TableState) {
    let area = f.area();

    // Outer vertical split: header | body | footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(0),    // body
            Constraint::Length(1), // footer
        ])
        .split(area);

    render_header(f, app, chunks[0]);
    render_body(f, app, picks_state, chunks[1]);
    render_footer(f, chunks[2]);
}

fn render_header(f: &mut Frame, app: &AppState, area: Rect) {
    let (status_text, status_color) = match &app.status {
        LoadStatus::Loaded => ("● loaded".to_string(), Color::Green),
        LoadStatus::Loading => ("◌ loading".to_string(), Color::Yellow),
        LoadStatus::Error(e) => (format!("✗ {}", truncate(e, 60)), Color::Red),
    };

    let market = app
        .picks
        .market
        .as_deref()
        .unwrap_or("Bursa Malaysia");

    let title_spans = vec![
        Span::styled(
            format!(" {market} Picks  "),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw("  │  "),
        Span::styled(
            format!("data {}", app.picks.date),
            Style::default().fg(Color::White),
        ),
        Span::raw("  │  "),
        Span::styled(
            format!("updated {}", app.picks.last_updated),
            Style::default().fg(Color::White),
        ),
        Span::raw("  │  "),
        Span::styled(
            format!("{} stocks", app.prices.total_stocks),
            Style::default().fg(Color::White),
        ),
    ];

    let header_line = Line::from(title_spans);
    let paragraph = Paragraph::new(header_line)
        .block(Block::default().borders(Borders::ALL).border_style(
            Style::default().fg(Color::DarkGray),
        ));

    f.render_widget(paragraph, area);
}

fn render_body(f: &mut Frame, app: &AppState, picks_state: &mut TableState, area: Rect) {
    // Horizontal split: picks (60%) | detail + sectors (40%)
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(12), Constraint::Min(0)])
        .split(halves[1]);

    render_picks_table(f, app, picks_state, halves[0]);
    render_detail(f, app, picks_state.selected(), right[0]);
    render_sectors_table(f, app, right[1]);
}

fn score_color(score: f64) -> Color {
    if score >= 80.0 {
        Color::Green
    } else if score >= 60.0 {
        Color::LightGreen
    } else if score >= 50.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

fn change_color(change: f64) -> Color {
    if change > 0.0 {
        Color::Green
    } else if change < 0.0 {
        Color::Red
    } else {
        Color::White
    }
}

fn render_picks_table(f: &mut Frame, app: &AppState, state: &mut TableState, area: Rect) {
    let header_cells = ["#", "Code", "Name", "Price", "Chg", "Score", "Pot", "Rec"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = app
        .picks
        .picks
        .iter()
        .map(|p| {
            Row::new(vec![
                Cell::from(p.rank.to_string()).style(Style::default().fg(Color::DarkGray)),
                Cell::from(p.code.clone()).style(Style::default().fg(Color::Cyan)),
                Cell::from(truncate(&p.name, 24)),
                Cell::from(format_price(p.current_price)),
                Cell::from(format_change(p.daily_change))
                    .style(Style::default().fg(change_color(p.daily_change))),
                Cell::from(format!("{:.1}", p.score)).style(Style::default().fg(score_color(p.score))),
                Cell::from(format!("{:.0}", p.potential_score)),
                Cell::from(p.recommendation.clone()),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(3),
            Constraint::Length(6),
            Constraint::Min(10),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(6),
            Constraint::Length(4),
            Constraint::Length(11),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                format!(" TOP {} PICKS ", app.picks.picks.len()),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
    )
    .row_highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    );

    f.render_stateful_widget(table, area, state);
}

fn render_detail(f: &mut Frame, app: &AppState, selected: Option<usize>, area: Rect) {
    let label = |s: &'static str| Span::styled(s, Style::default().fg(Color::DarkGray));

    let lines: Vec<Line> = match app.selected_pick(selected) {
        Some(p) => vec![
            Line::from(vec![
                Span::styled(
                    format!("{} ", p.code),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ),
                Span::raw(p.name.clone()),
            ]),
            Line::from(vec![label("Type      "), Span::raw(p.instrument_type.clone())]),
            Line::from(vec![label("Sector    "), Span::raw(p.sector.clone())]),
            Line::from(vec![label("Status    "), Span::raw(p.status.clone())]),
            Line::from(vec![label("Volume    "), Span::raw(format_volume(p.volume))]),
            Line::from(vec![label("RSI       "), Span::raw(format!("{:.1}", p.rsi))]),
            Line::from(vec![label("Risk      "), Span::raw(p.risk_level.clone())]),
            Line::from(vec![
                label("Signals   "),
                Span::styled(p.potential_reasons.clone(), Style::default().fg(Color::LightGreen)),
            ]),
        ],
        None => vec![Line::from(label("no pick selected"))],
    };

    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                " DETAIL ",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
    );

    f.render_widget(paragraph, area);
}

fn render_sectors_table(f: &mut Frame, app: &AppState, area: Rect) {
    let header_cells = ["Sector", "Stocks", "Avg Chg"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = app
        .sectors
        .iter()
        .map(|s| {
            Row::new(vec![
                Cell::from(truncate(&s.name, 26)),
                Cell::from(s.count.to_string()).style(Style::default().fg(Color::Cyan)),
                Cell::from(format_change(s.avg_change))
                    .style(Style::default().fg(change_color(s.avg_change))),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Min(10),
            Constraint::Length(7),
            Constraint::Length(8),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                " SECTORS ",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
    );

    f.render_widget(table, area);
}

fn render_footer(f: &mut Frame, area: Rect) {
    let line = Line::from(vec![
        Span::styled(" [q] ", Style::default().fg(Color::Yellow)),
        Span::raw("quit  "),
        Span::styled("[r] ", Style::default().fg(Color::Yellow)),
        Span::raw("reload  "),
        Span::styled("[↑↓ / j k] ", Style::default().fg(Color::Yellow)),
        Span::raw("select pick  "),
        Span::styled("auto-reload: 5s", Style::default().fg(Color::DarkGray)),
    ]);
    let paragraph = Paragraph::new(line).style(Style::default().fg(Color::White));
    f.render_widget(paragraph, area);
}
